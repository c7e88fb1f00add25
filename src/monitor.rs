//! Periodic monitoring loop driving merge cycles.
//!
//! One tokio task, one cycle at a time. Each tick captures a fresh
//! snapshot, diffs it against the retained one, and on any change (or a
//! vanished master) runs the stability gate and the merge engine. Every
//! per-cycle failure is caught and logged; a single bad cycle never
//! terminates monitoring.

use std::{path::PathBuf, time::Duration};

use tokio::{sync::watch, time};

use crate::{
   changes::{self, ChangeSet},
   config::Config,
   engine::MergeEngine,
   error::Error,
   snapshot::{FilenamePolicy, Snapshot, Snapshotter},
   stability::StabilityGate,
};

pub struct MonitoringLoop {
   snapshotter:  Snapshotter,
   gate:         StabilityGate,
   engine:       MergeEngine,
   interval:     Duration,
   input_folder: PathBuf,
   previous:     Snapshot,
}

impl MonitoringLoop {
   pub fn new(config: &Config) -> Self {
      Self {
         snapshotter: Snapshotter::new(
            config.input_folder.clone(),
            FilenamePolicy::from_config(config.validate_filename_format),
            config.use_file_hashing,
         ),
         gate: StabilityGate::new(
            config.stable_wait(),
            config.max_polling_retries,
            config.retry_backoff(),
         ),
         engine: MergeEngine::new(config),
         interval: config.poll_interval(),
         input_folder: config.input_folder.clone(),
         previous: Snapshot::empty(),
      }
   }

   /// Runs until `shutdown` flips to true.
   pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
      // Initial cycle: process everything not yet in the registry.
      let startup = self.snapshotter.capture();
      let names: Vec<String> = startup.names().map(str::to_owned).collect();
      self.gate.settle(&self.input_folder, &names).await;
      if self.run_contained(&startup, None) {
         self.previous = self.snapshotter.capture();
      } else {
         // Failed before anything was written: an empty retained snapshot
         // makes every file look added on the next tick, forcing a retry.
         self.previous = Snapshot::empty();
      }

      loop {
         tokio::select! {
            () = time::sleep(self.interval) => {},
            changed = shutdown.changed() => {
               if changed.is_err() || *shutdown.borrow() {
                  tracing::info!("shutdown requested, stopping monitor");
                  return;
               }
               continue;
            },
         }

         let current = self.snapshotter.capture();
         let changes = changes::diff(&self.previous, &current);
         let master_missing = !self.engine.master().exists();

         if !changes.has_changes() && !master_missing {
            self.previous = current;
            continue;
         }

         if master_missing {
            tracing::warn!("master file missing, reprocessing everything");
         } else {
            tracing::info!(
               added = changes.added.len(),
               modified = changes.modified.len(),
               removed = changes.removed.len(),
               "change detected"
            );
         }

         let unstable: Vec<String> = if master_missing {
            current.names().map(str::to_owned).collect()
         } else {
            changes.to_process().map(str::to_owned).collect()
         };
         self.gate.settle(&self.input_folder, &unstable).await;

         // A vanished master forces first-run semantics: the registry is
         // empty, so everything gets reprocessed.
         let triggered: Option<&ChangeSet> = if master_missing { None } else { Some(&changes) };
         if self.run_contained(&current, triggered) {
            // Retain a post-merge snapshot so the next diff reflects the
            // state the engine actually consumed.
            self.previous = self.snapshotter.capture();
         }
         // On failure the retained snapshot stays put: the same delta is
         // re-detected next tick and the pending files are retried, since
         // the registry still does not list them.
      }
   }

   /// Runs one engine cycle with loop-boundary error containment. Returns
   /// whether the cycle completed.
   fn run_contained(&self, snapshot: &Snapshot, changes: Option<&ChangeSet>) -> bool {
      match self.engine.run_cycle(snapshot, changes) {
         Ok(_) => true,
         Err(Error::MasterBusy { path, source }) => {
            tracing::warn!(
               master = %path.display(),
               "master busy ({source}); cycle abandoned, will retry on next change"
            );
            false
         },
         Err(e) => {
            tracing::error!("cycle failed: {e}");
            false
         },
      }
   }
}
