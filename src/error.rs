use std::{io, path::PathBuf};

use thiserror::Error;

/// Main error type for the csvherd application.
///
/// Covers I/O, CSV parsing, configuration, and the merge-specific failure
/// modes (unreadable input folder, unparseable drop file, busy master file).
/// Per-file and per-cycle failures are values; only startup configuration
/// errors terminate the process.
#[derive(Debug, Error)]
pub enum Error {
   /// I/O error occurred during file operations.
   #[error("io error: {0}")]
   Io(#[from] io::Error),

   /// CSV read or write error occurred.
   #[error("csv error: {0}")]
   Csv(#[from] csv::Error),

   /// Configuration-related error occurred.
   #[error("config error: {0}")]
   Config(#[from] ConfigError),

   /// TOML serialization error occurred.
   #[error("toml error: {0}")]
   Toml(#[from] toml::ser::Error),

   /// JSON serialization error occurred.
   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),

   /// The input folder exists but could not be enumerated.
   #[error("cannot read input folder {path}: {source}", path = .path.display())]
   FolderAccess {
      path:   PathBuf,
      #[source]
      source: io::Error,
   },

   /// A drop file could not be parsed as CSV.
   #[error("cannot parse {file}: {reason}")]
   FileParse { file: String, reason: String },

   /// The master file is held by another process during a write phase.
   #[error("master file {path} is busy", path = .path.display())]
   MasterBusy {
      path:   PathBuf,
      #[source]
      source: io::Error,
   },
}

impl Error {
   pub fn exit_code(&self) -> i32 {
      match self {
         Self::MasterBusy { .. } => 10,
         Self::Config(_) => 2,
         _ => 1,
      }
   }
}

/// Errors raised while loading or validating the startup configuration.
///
/// These are the only fatal errors in the system; everything after the
/// monitoring loop starts is logged and survived.
#[derive(Debug, Error)]
pub enum ConfigError {
   /// Required `input_folder` is missing from config/env/flags.
   #[error("input_folder is required")]
   MissingInputFolder,

   /// Required `output_folder` is missing from config/env/flags.
   #[error("output_folder is required")]
   MissingOutputFolder,

   /// `output_base_name` must be a bare file stem.
   #[error("output_base_name must be a non-empty name without path separators: {0:?}")]
   InvalidBaseName(String),

   /// `polling_interval_seconds` must be at least 1.
   #[error("polling_interval_seconds must be at least 1")]
   InvalidPollingInterval,

   /// The config file could not be read or parsed.
   #[error("failed to load config {path}: {reason}", path = .path.display())]
   Load { path: PathBuf, reason: String },
}

/// Standard result type using [`enum@Error`] as the default error type
pub type Result<T, E = Error> = std::result::Result<T, E>;
