//! Row signatures and order-preserving duplicate removal.
//!
//! A row's signature is the SHA-256 of its sorted, non-excluded,
//! non-empty (column, value) pairs in a length-prefixed encoding. Ignoring
//! empty values keeps a row's signature stable when the schema later grows
//! and old rows are gap-filled with empty cells.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::{hash::ContentHash, row::Row};

/// Stable first-wins duplicate filter.
///
/// Feed existing master rows through [`observe`](Self::observe) first, then
/// gate new rows with [`admit`](Self::admit): an existing row always beats a
/// content-identical new one.
pub struct DuplicateFilter {
   exclude: HashSet<String>,
   seen:    HashSet<ContentHash>,
}

impl DuplicateFilter {
   pub fn new(exclude: HashSet<String>) -> Self {
      Self { exclude, seen: HashSet::new() }
   }

   /// Records a row's signature without filtering.
   pub fn observe(&mut self, row: &Row) {
      let signature = self.signature(row);
      self.seen.insert(signature);
   }

   /// Returns true when this is the first row with its signature; the caller
   /// keeps admitted rows and drops the rest.
   pub fn admit(&mut self, row: &Row) -> bool {
      let signature = self.signature(row);
      self.seen.insert(signature)
   }

   pub fn signature(&self, row: &Row) -> ContentHash {
      let mut pairs: Vec<(&str, &str)> = row
         .iter()
         .filter(|(column, value)| !self.exclude.contains(*column) && !value.is_empty())
         .collect();
      pairs.sort_unstable();

      let mut hasher = Sha256::new();
      for (column, value) in pairs {
         hasher.update((column.len() as u64).to_le_bytes());
         hasher.update(column.as_bytes());
         hasher.update((value.len() as u64).to_le_bytes());
         hasher.update(value.as_bytes());
      }
      ContentHash::from_hasher(hasher)
   }
}
