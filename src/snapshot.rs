//! Input-folder snapshots and per-file identity metadata.
//!
//! A snapshot is a point-in-time record of the accepted files in the input
//! folder. It is captured fresh each cycle and never mutated; change
//! detection diffs two snapshots.

use std::{
   collections::BTreeMap,
   fs::{self, File},
   io::Read,
   path::{Path, PathBuf},
   sync::LazyLock,
   time::UNIX_EPOCH,
};

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::hash::ContentHash;

/// Drop filenames under the timestamp contract: exactly 14 digits + `.csv`.
static TIMESTAMP_NAME: LazyLock<Regex> =
   LazyLock::new(|| Regex::new(r"^\d{14}\.csv$").expect("timestamp pattern is valid"));

/// Filename acceptance predicate applied while scanning the input folder.
///
/// Files failing the predicate are invisible to the rest of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenamePolicy {
   /// Any `*.csv` file (case-insensitive extension).
   AnyCsv,
   /// Only `{14-digit timestamp}.csv` names.
   TimestampedCsv,
}

impl FilenamePolicy {
   pub const fn from_config(validate_filename_format: bool) -> Self {
      if validate_filename_format {
         Self::TimestampedCsv
      } else {
         Self::AnyCsv
      }
   }

   pub fn accepts(self, name: &str) -> bool {
      match self {
         Self::AnyCsv => Path::new(name)
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("csv")),
         Self::TimestampedCsv => TIMESTAMP_NAME.is_match(name),
      }
   }
}

/// Identity metadata for one accepted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
   pub name:     String,
   /// Modification time as Unix seconds; 0 when unavailable.
   pub modified: u64,
   pub size:     u64,
   /// Content hash; `None` when hashing is disabled or failed for this file.
   pub hash:     Option<ContentHash>,
}

/// Point-in-time record of the input folder's accepted files.
#[derive(Debug, Clone)]
pub struct Snapshot {
   files:        BTreeMap<String, FileRecord>,
   pub taken_at: DateTime<Utc>,
}

impl Snapshot {
   pub fn empty() -> Self {
      Self { files: BTreeMap::new(), taken_at: Utc::now() }
   }

   pub fn get(&self, name: &str) -> Option<&FileRecord> {
      self.files.get(name)
   }

   pub fn contains(&self, name: &str) -> bool {
      self.files.contains_key(name)
   }

   /// File names in deterministic (lexicographic) enumeration order.
   pub fn names(&self) -> impl Iterator<Item = &str> {
      self.files.keys().map(String::as_str)
   }

   pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
      self.files.values()
   }

   pub fn len(&self) -> usize {
      self.files.len()
   }

   pub fn is_empty(&self) -> bool {
      self.files.is_empty()
   }
}

/// Scans the input folder into [`Snapshot`] values.
pub struct Snapshotter {
   folder:  PathBuf,
   policy:  FilenamePolicy,
   hashing: bool,
}

impl Snapshotter {
   pub const fn new(folder: PathBuf, policy: FilenamePolicy, hashing: bool) -> Self {
      Self { folder, policy, hashing }
   }

   /// Captures the folder's current state.
   ///
   /// A missing or unreadable folder yields an empty snapshot and a warning;
   /// the monitoring loop must keep running. A hashing failure for one file
   /// degrades to `hash: None` for that file rather than aborting the scan.
   pub fn capture(&self) -> Snapshot {
      let mut files = BTreeMap::new();

      let entries = match fs::read_dir(&self.folder) {
         Ok(entries) => entries,
         Err(e) => {
            tracing::warn!(folder = %self.folder.display(), "cannot read input folder: {e}");
            return Snapshot::empty();
         },
      };

      for entry in entries.filter_map(|e| e.ok()) {
         let Ok(file_type) = entry.file_type() else {
            continue;
         };
         if !file_type.is_file() {
            continue;
         }

         let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
         };
         if !self.policy.accepts(&name) {
            continue;
         }

         let Ok(metadata) = entry.metadata() else {
            continue;
         };
         let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());

         let hash = if self.hashing {
            hash_file(&entry.path())
         } else {
            None
         };

         files.insert(name.clone(), FileRecord {
            name,
            modified,
            size: metadata.len(),
            hash,
         });
      }

      Snapshot { files, taken_at: Utc::now() }
   }
}

/// Streams a file through SHA-256 without loading it whole.
fn hash_file(path: &Path) -> Option<ContentHash> {
   let mut file = match File::open(path) {
      Ok(f) => f,
      Err(e) => {
         tracing::warn!(file = %path.display(), "cannot hash file: {e}");
         return None;
      },
   };

   let mut hasher = Sha256::new();
   let mut buf = [0u8; 8192];
   loop {
      match file.read(&mut buf) {
         Ok(0) => break,
         Ok(n) => hasher.update(&buf[..n]),
         Err(e) => {
            tracing::warn!(file = %path.display(), "read failed while hashing: {e}");
            return None;
         },
      }
   }

   Some(ContentHash::from_hasher(hasher))
}

#[cfg(test)]
mod tests {
   use tempfile::TempDir;

   use super::*;

   #[test]
   fn timestamp_contract_enforced() {
      let policy = FilenamePolicy::TimestampedCsv;
      assert!(policy.accepts("20240131093055.csv"));
      assert!(!policy.accepts("20240131093055.txt"));
      assert!(!policy.accepts("2024013109305.csv"));
      assert!(!policy.accepts("notes.csv"));
      assert!(!policy.accepts("20240131093055.csv.bak"));
   }

   #[test]
   fn any_csv_requires_extension() {
      let policy = FilenamePolicy::AnyCsv;
      assert!(policy.accepts("report.csv"));
      assert!(policy.accepts("REPORT.CSV"));
      assert!(!policy.accepts("report.txt"));
      assert!(!policy.accepts("report"));
   }

   #[test]
   fn missing_folder_yields_empty_snapshot() {
      let snapshotter = Snapshotter::new(
         PathBuf::from("/definitely/not/here"),
         FilenamePolicy::AnyCsv,
         false,
      );
      assert!(snapshotter.capture().is_empty());
   }

   #[test]
   fn rejected_names_are_invisible() {
      let dir = TempDir::new().unwrap();
      fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();
      fs::write(dir.path().join("b.txt"), "x\n1\n").unwrap();

      let snapshotter =
         Snapshotter::new(dir.path().to_path_buf(), FilenamePolicy::AnyCsv, false);
      let snapshot = snapshotter.capture();
      assert_eq!(snapshot.len(), 1);
      assert!(snapshot.contains("a.csv"));
   }

   #[test]
   fn hashing_records_content_hash() {
      let dir = TempDir::new().unwrap();
      fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();

      let snapshotter =
         Snapshotter::new(dir.path().to_path_buf(), FilenamePolicy::AnyCsv, true);
      let snapshot = snapshotter.capture();
      let record = snapshot.get("a.csv").unwrap();
      assert_eq!(record.hash, Some(ContentHash::sum(b"x\n1\n")));
      assert_eq!(record.size, 4);
   }
}
