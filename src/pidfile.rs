//! Watcher pid bookkeeping.
//!
//! The pid file lives next to the master file and is the interface the
//! `stop` and `status` commands use to find a running watcher.

use std::{
   fs,
   path::{Path, PathBuf},
};

use crate::error::Result;

pub fn write(path: &Path) -> Result<()> {
   if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
   }
   fs::write(path, std::process::id().to_string())?;
   Ok(())
}

pub fn read(path: &Path) -> Option<u32> {
   let text = fs::read_to_string(path).ok()?;
   text.trim().parse().ok()
}

pub fn remove(path: &Path) {
   let _ = fs::remove_file(path);
}

/// Removes the pid file when the watcher exits, however it exits.
pub struct PidFileGuard {
   path: PathBuf,
}

impl PidFileGuard {
   pub const fn new(path: PathBuf) -> Self {
      Self { path }
   }
}

impl Drop for PidFileGuard {
   fn drop(&mut self) {
      remove(&self.path);
   }
}

/// Sanity check before signalling: does this pid look like a csvherd
/// watcher? Avoids killing an unrelated process that reused the pid.
#[cfg(unix)]
pub fn looks_like_watcher(pid: u32) -> bool {
   let Ok(bytes) = fs::read(format!("/proc/{pid}/cmdline")) else {
      return false;
   };
   let cmdline = String::from_utf8_lossy(&bytes);
   cmdline.contains("csvherd") && cmdline.contains("watch")
}

#[cfg(not(unix))]
pub fn looks_like_watcher(_pid: u32) -> bool {
   false
}

#[cfg(test)]
mod tests {
   use tempfile::TempDir;

   use super::*;

   #[test]
   fn write_read_remove_roundtrip() {
      let dir = TempDir::new().unwrap();
      let path = dir.path().join("out").join("master.pid");

      write(&path).unwrap();
      assert_eq!(read(&path), Some(std::process::id()));

      remove(&path);
      assert_eq!(read(&path), None);
   }

   #[test]
   fn guard_removes_on_drop() {
      let dir = TempDir::new().unwrap();
      let path = dir.path().join("master.pid");
      write(&path).unwrap();
      {
         let _guard = PidFileGuard::new(path.clone());
      }
      assert!(!path.exists());
   }
}
