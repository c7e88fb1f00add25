//! Delay-and-retry gate for files that may still be mid-write.
//!
//! Advisory only: after the retries are spent the engine proceeds anyway.
//! This reduces, not eliminates, the chance of reading a half-written file.

use std::{fs::OpenOptions, path::Path, time::Duration};

use fs4::FileExt;
use tokio::time;

pub struct StabilityGate {
   pre_delay: Duration,
   retries:   u32,
   backoff:   Duration,
}

impl StabilityGate {
   pub const fn new(pre_delay: Duration, retries: u32, backoff: Duration) -> Self {
      Self { pre_delay, retries, backoff }
   }

   /// Sleeps the pre-delay once, then probes each file with an
   /// exclusive-lock open, backing off between attempts.
   pub async fn settle<S: AsRef<str>>(&self, folder: &Path, names: &[S]) {
      if !self.pre_delay.is_zero() && !names.is_empty() {
         time::sleep(self.pre_delay).await;
      }

      for name in names {
         let name = name.as_ref();
         let path = folder.join(name);
         let mut attempt = 0u32;
         loop {
            if probe(&path) {
               break;
            }
            if attempt >= self.retries {
               tracing::warn!(file = name, "still busy after {} probes, proceeding", attempt + 1);
               break;
            }
            attempt += 1;
            tracing::debug!(file = name, attempt, "file busy, retrying");
            time::sleep(self.backoff).await;
         }
      }
   }
}

/// Returns true when the file can be opened and exclusively locked.
///
/// A vanished file counts as settled; the engine will notice it later.
fn probe(path: &Path) -> bool {
   let Ok(file) = OpenOptions::new().read(true).open(path) else {
      return true;
   };
   match file.try_lock_exclusive() {
      Ok(()) => {
         let _ = file.unlock();
         true
      },
      Err(_) => false,
   }
}

#[cfg(test)]
mod tests {
   use std::fs;

   use tempfile::TempDir;

   use super::*;

   #[tokio::test]
   async fn settle_passes_unlocked_files() {
      let dir = TempDir::new().unwrap();
      fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();

      let gate = StabilityGate::new(Duration::ZERO, 1, Duration::from_millis(1));
      gate.settle(dir.path(), &["a.csv"]).await;
   }

   #[tokio::test]
   async fn settle_gives_up_on_locked_file() {
      let dir = TempDir::new().unwrap();
      let path = dir.path().join("a.csv");
      fs::write(&path, "x\n1\n").unwrap();

      let holder = fs::File::open(&path).unwrap();
      holder.try_lock_exclusive().unwrap();

      // Must return despite the lock being held for the whole call.
      let gate = StabilityGate::new(Duration::ZERO, 2, Duration::from_millis(5));
      gate.settle(dir.path(), &["a.csv"]).await;

      let _ = holder.unlock();
   }

   #[tokio::test]
   async fn vanished_file_counts_as_settled() {
      let dir = TempDir::new().unwrap();
      let gate = StabilityGate::new(Duration::ZERO, 3, Duration::from_millis(1));
      gate.settle(dir.path(), &["gone.csv"]).await;
   }
}
