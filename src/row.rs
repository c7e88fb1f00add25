//! Row values keyed by column name, and projection onto the unified schema.

use indexmap::IndexMap;

use crate::schema::{SOURCE_COLUMN, UnifiedSchema};

/// One row as an ordered column → value mapping. All values are opaque
/// strings; CSV text never gets type-coerced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
   cells: IndexMap<String, String>,
}

impl Row {
   pub fn new() -> Self {
      Self { cells: IndexMap::new() }
   }

   pub fn from_pairs<I>(pairs: I) -> Self
   where
      I: IntoIterator<Item = (String, String)>,
   {
      Self { cells: pairs.into_iter().collect() }
   }

   pub fn get(&self, column: &str) -> Option<&str> {
      self.cells.get(column).map(String::as_str)
   }

   pub fn set(&mut self, column: String, value: String) {
      self.cells.insert(column, value);
   }

   pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
      self
         .cells
         .iter()
         .map(|(column, value)| (column.as_str(), value.as_str()))
   }

   /// Values in column order, for writing.
   pub fn values(&self) -> impl Iterator<Item = &str> {
      self.cells.values().map(String::as_str)
   }

   pub fn len(&self) -> usize {
      self.cells.len()
   }

   pub fn is_empty(&self) -> bool {
      self.cells.is_empty()
   }
}

/// Projects a source row onto the unified schema.
///
/// Matching columns are copied; columns the source lacks become the empty
/// string; the provenance column is set to `provenance`. A `None` source
/// (gap-filled historical rows) yields all-empty values except provenance.
pub fn normalize(source: Option<&Row>, schema: &UnifiedSchema, provenance: &str) -> Row {
   let mut cells = IndexMap::with_capacity(schema.column_count());

   for column in schema.columns() {
      let value = if column == SOURCE_COLUMN {
         provenance.to_string()
      } else {
         source
            .and_then(|row| row.get(column))
            .unwrap_or_default()
            .to_string()
      };
      cells.insert(column.to_string(), value);
   }

   Row { cells }
}
