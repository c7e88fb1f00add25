//! Configuration loading and validation.
//!
//! Settings are layered (built-in defaults, then a TOML file, then
//! `CSVHERD_`-prefixed environment variables) into one immutable [`Config`]
//! value constructed at startup and passed explicitly to every component.

use std::{
   collections::HashSet,
   fs,
   path::{Path, PathBuf},
   time::Duration,
};

use directories::BaseDirs;
use figment::{
   Figment,
   providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
   error::{ConfigError, Result},
   schema::SOURCE_COLUMN,
};

/// Application configuration for the watcher and merge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
   /// Folder watched for CSV drops.
   pub input_folder:  PathBuf,
   /// Folder holding the master file and pid file.
   pub output_folder: PathBuf,
   /// Master file stem; the master lives at `{output_folder}/{output_base_name}.csv`.
   pub output_base_name: String,

   /// Require drop filenames to match the 14-digit timestamp contract.
   pub validate_filename_format: bool,
   /// Record SHA-256 content hashes in snapshots to catch same-size edits.
   pub use_file_hashing: bool,

   pub polling_interval_seconds: u64,
   pub wait_for_stable_file_ms:  u64,
   pub max_polling_retries:      u32,
   pub retry_backoff_ms:         u64,

   /// Purge master rows whose source file disappeared from the input folder.
   pub purge_removed_files: bool,
   /// Columns excluded from duplicate signatures; the provenance column is
   /// always excluded regardless of this list.
   pub dedup_exclude_columns: Vec<String>,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         input_folder: PathBuf::new(),
         output_folder: PathBuf::new(),
         output_base_name: "master".to_string(),
         validate_filename_format: false,
         use_file_hashing: false,
         polling_interval_seconds: 10,
         wait_for_stable_file_ms: 2000,
         max_polling_retries: 3,
         retry_backoff_ms: 500,
         purge_removed_files: false,
         dedup_exclude_columns: vec![SOURCE_COLUMN.to_string()],
      }
   }
}

impl Config {
   /// Loads configuration from the given file (or the default location when
   /// `None`), overlaid with `CSVHERD_`-prefixed environment variables.
   ///
   /// An explicitly named file must exist; the default location is optional.
   pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
      let mut figment = Figment::from(Serialized::defaults(Self::default()));

      match explicit {
         Some(path) => {
            if !path.exists() {
               return Err(ConfigError::Load {
                  path:   path.to_path_buf(),
                  reason: "file not found".to_string(),
               });
            }
            figment = figment.merge(Toml::file(path));
         },
         None => {
            let path = default_config_path();
            if path.exists() {
               figment = figment.merge(Toml::file(path));
            }
         },
      }

      figment
         .merge(Env::prefixed("CSVHERD_").lowercase(true))
         .extract()
         .map_err(|e| ConfigError::Load {
            path:   explicit.map_or_else(default_config_path, Path::to_path_buf),
            reason: e.to_string(),
         })
   }

   /// Validates the startup invariants; violations are fatal.
   pub fn validate(&self) -> Result<(), ConfigError> {
      if self.input_folder.as_os_str().is_empty() {
         return Err(ConfigError::MissingInputFolder);
      }
      if self.output_folder.as_os_str().is_empty() {
         return Err(ConfigError::MissingOutputFolder);
      }
      if self.output_base_name.is_empty()
         || self.output_base_name.contains(['/', '\\'])
      {
         return Err(ConfigError::InvalidBaseName(self.output_base_name.clone()));
      }
      if self.polling_interval_seconds < 1 {
         return Err(ConfigError::InvalidPollingInterval);
      }
      Ok(())
   }

   /// Writes a default config file, creating parent directories.
   pub fn write_default(path: &Path) -> Result<()> {
      if let Some(parent) = path.parent() {
         fs::create_dir_all(parent)?;
      }
      let text = toml::to_string_pretty(&Self::default())?;
      fs::write(path, text)?;
      Ok(())
   }

   pub fn master_path(&self) -> PathBuf {
      self
         .output_folder
         .join(format!("{}.csv", self.output_base_name))
   }

   pub fn pid_path(&self) -> PathBuf {
      self
         .output_folder
         .join(format!("{}.pid", self.output_base_name))
   }

   pub const fn poll_interval(&self) -> Duration {
      Duration::from_secs(self.polling_interval_seconds)
   }

   pub const fn stable_wait(&self) -> Duration {
      Duration::from_millis(self.wait_for_stable_file_ms)
   }

   pub const fn retry_backoff(&self) -> Duration {
      Duration::from_millis(self.retry_backoff_ms)
   }

   /// Columns excluded from duplicate signatures. Always contains the
   /// provenance column.
   pub fn dedup_exclusions(&self) -> HashSet<String> {
      let mut exclude: HashSet<String> = self.dedup_exclude_columns.iter().cloned().collect();
      exclude.insert(SOURCE_COLUMN.to_string());
      exclude
   }
}

/// Returns the default config file location (`~/.csvherd/config.toml`).
pub fn default_config_path() -> PathBuf {
   resolve_base_dir(".csvherd").join("config.toml")
}

fn resolve_base_dir(dir_name: &str) -> PathBuf {
   BaseDirs::new()
      .map(|d| d.home_dir().join(dir_name))
      .or_else(|| {
         std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(dir_name))
      })
      .unwrap_or_else(|| {
         std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(dir_name)
      })
}
