//! Snapshot diffing into added/modified/removed file sets.

use crate::snapshot::{FileRecord, Snapshot};

/// The file-set delta between two snapshots. Derived per cycle, then
/// discarded.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
   pub added:    Vec<String>,
   pub modified: Vec<String>,
   pub removed:  Vec<String>,
}

impl ChangeSet {
   pub fn has_changes(&self) -> bool {
      !self.added.is_empty() || !self.modified.is_empty() || !self.removed.is_empty()
   }

   /// Names whose rows must be (re)built this cycle, in snapshot order.
   pub fn to_process(&self) -> impl Iterator<Item = &str> {
      self
         .added
         .iter()
         .chain(self.modified.iter())
         .map(String::as_str)
   }
}

/// Diffs two snapshots.
///
/// Size and modification time are the cheap signals; hashes are consulted as
/// additional evidence only when both sides have one, catching content edits
/// that preserved size and mtime.
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangeSet {
   let mut changes = ChangeSet::default();

   for record in new.records() {
      match old.get(&record.name) {
         None => changes.added.push(record.name.clone()),
         Some(previous) => {
            if is_modified(previous, record) {
               changes.modified.push(record.name.clone());
            }
         },
      }
   }

   for record in old.records() {
      if !new.contains(&record.name) {
         changes.removed.push(record.name.clone());
      }
   }

   changes
}

fn is_modified(old: &FileRecord, new: &FileRecord) -> bool {
   if old.size != new.size || old.modified != new.modified {
      return true;
   }
   match (old.hash, new.hash) {
      (Some(old_hash), Some(new_hash)) => old_hash != new_hash,
      _ => false,
   }
}
