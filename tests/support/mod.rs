#![allow(dead_code)]

use std::fs;

use csvherd::{
   changes::{self, ChangeSet},
   config::Config,
   snapshot::{FilenamePolicy, Snapshot, Snapshotter},
};
use tempfile::TempDir;

/// Isolated input/output folder pair for one test.
pub struct Sandbox {
   pub input:  TempDir,
   pub output: TempDir,
}

impl Sandbox {
   pub fn new() -> Self {
      Self {
         input:  TempDir::new().expect("input dir"),
         output: TempDir::new().expect("output dir"),
      }
   }

   pub fn config(&self) -> Config {
      Config {
         input_folder: self.input.path().to_path_buf(),
         output_folder: self.output.path().to_path_buf(),
         ..Config::default()
      }
   }

   pub fn drop_file(&self, name: &str, content: &str) {
      fs::write(self.input.path().join(name), content).expect("write drop file");
   }

   pub fn remove_file(&self, name: &str) {
      fs::remove_file(self.input.path().join(name)).expect("remove drop file");
   }

   pub fn snapshot(&self) -> Snapshot {
      Snapshotter::new(
         self.input.path().to_path_buf(),
         FilenamePolicy::AnyCsv,
         false,
      )
      .capture()
   }

   pub fn diff(&self, old: &Snapshot) -> (Snapshot, ChangeSet) {
      let new = self.snapshot();
      let changes = changes::diff(old, &new);
      (new, changes)
   }

   pub fn master_text(&self) -> String {
      fs::read_to_string(self.output.path().join("master.csv")).expect("read master")
   }

   pub fn master_exists(&self) -> bool {
      self.output.path().join("master.csv").exists()
   }
}
