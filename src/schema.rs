//! Unified schema construction and header handling.
//!
//! The master schema is the deterministic, order-stable union of the
//! provenance column, the existing master columns, and every new column in
//! first-seen order. Column order only ever grows at the tail; spreadsheet
//! consumers rely on positions staying put.

use std::collections::HashMap;

use indexmap::IndexSet;

/// Reserved provenance column recording which input file produced a row.
/// Always the first column of the master schema.
pub const SOURCE_COLUMN: &str = "SourceFile";

/// Ordered, unique column names with the provenance column first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedSchema {
   columns: IndexSet<String>,
}

impl UnifiedSchema {
   /// Builds the union of `existing` (master header, possibly empty) and
   /// `observed` (new files' columns in file-then-column discovery order).
   pub fn unify<I>(existing: &[String], observed: I) -> Self
   where
      I: IntoIterator<Item = String>,
   {
      let mut columns = IndexSet::new();
      columns.insert(SOURCE_COLUMN.to_string());

      for column in existing {
         if column == SOURCE_COLUMN || column.is_empty() {
            continue;
         }
         columns.insert(column.clone());
      }

      for column in observed {
         if column == SOURCE_COLUMN || column.is_empty() {
            continue;
         }
         columns.insert(column);
      }

      Self { columns }
   }

   pub fn columns(&self) -> impl Iterator<Item = &str> {
      self.columns.iter().map(String::as_str)
   }

   pub fn contains(&self, column: &str) -> bool {
      self.columns.contains(column)
   }

   pub fn column_count(&self) -> usize {
      self.columns.len()
   }

   pub fn header(&self) -> Vec<String> {
      self.columns.iter().cloned().collect()
   }

   /// Whether writing under this schema requires rewriting a master file
   /// that currently carries `existing` as its header.
   pub fn differs_from(&self, existing: &[String]) -> bool {
      !self.columns.iter().eq(existing.iter())
   }
}

/// Normalizes one file's raw header cells into unique column names.
///
/// Cells are whitespace-trimmed; blanks become `Unnamed`; repeats are
/// suffixed `_2`, `_3`, ... in encounter order.
pub fn disambiguate_header<'a, I>(raw: I) -> Vec<String>
where
   I: IntoIterator<Item = &'a str>,
{
   let mut seen: HashMap<String, usize> = HashMap::new();
   let mut columns = Vec::new();

   for cell in raw {
      let trimmed = cell.trim();
      let base = if trimmed.is_empty() { "Unnamed" } else { trimmed };

      let count = seen.entry(base.to_string()).or_insert(0);
      *count += 1;
      if *count == 1 {
         columns.push(base.to_string());
      } else {
         columns.push(format!("{base}_{count}"));
      }
   }

   columns
}

#[cfg(test)]
mod tests {
   use proptest::prelude::*;

   use super::*;

   #[test]
   fn provenance_column_is_always_first() {
      let schema = UnifiedSchema::unify(&[], ["Name".to_string(), "Age".to_string()]);
      let columns: Vec<_> = schema.columns().collect();
      assert_eq!(columns, vec![SOURCE_COLUMN, "Name", "Age"]);
   }

   #[test]
   fn existing_order_is_preserved_and_new_columns_append() {
      let existing = vec![
         SOURCE_COLUMN.to_string(),
         "Name".to_string(),
         "Age".to_string(),
      ];
      let schema = UnifiedSchema::unify(&existing, ["City".to_string(), "Name".to_string()]);
      let columns: Vec<_> = schema.columns().collect();
      assert_eq!(columns, vec![SOURCE_COLUMN, "Name", "Age", "City"]);
   }

   #[test]
   fn duplicate_provenance_never_enters_twice() {
      let existing = vec![SOURCE_COLUMN.to_string(), "Name".to_string()];
      let schema = UnifiedSchema::unify(&existing, [SOURCE_COLUMN.to_string()]);
      assert_eq!(schema.columns().filter(|c| *c == SOURCE_COLUMN).count(), 1);
   }

   #[test]
   fn growth_detection() {
      let existing = vec![SOURCE_COLUMN.to_string(), "Name".to_string()];
      let same = UnifiedSchema::unify(&existing, std::iter::empty());
      assert!(!same.differs_from(&existing));

      let wider = UnifiedSchema::unify(&existing, ["Dept".to_string()]);
      assert!(wider.differs_from(&existing));
   }

   #[test]
   fn header_disambiguation_suffixes_in_encounter_order() {
      let columns = disambiguate_header(["Name", " Name ", "Age", "Name"]);
      assert_eq!(columns, vec!["Name", "Name_2", "Age", "Name_3"]);
   }

   #[test]
   fn blank_header_cells_get_stable_names() {
      let columns = disambiguate_header(["", "  ", "Name"]);
      assert_eq!(columns, vec!["Unnamed", "Unnamed_2", "Name"]);
   }

   proptest! {
      // Column order is append-only: unifying more columns on top of an
      // existing schema never reorders what was already there.
      #[test]
      fn unify_is_append_only(
         first in prop::collection::vec("[A-Z][a-z]{0,6}", 0..6),
         second in prop::collection::vec("[A-Z][a-z]{0,6}", 0..6),
      ) {
         let base = UnifiedSchema::unify(&[], first);
         let base_header = base.header();
         let wider = UnifiedSchema::unify(&base_header, second);
         let wider_columns: Vec<_> = wider.columns().collect();
         prop_assert!(wider.column_count() >= base.column_count());
         for (i, column) in base.columns().enumerate() {
            prop_assert_eq!(wider_columns[i], column);
         }
      }
   }
}
