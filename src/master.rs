//! Streaming access to the master CSV file.
//!
//! The master file is the sole shared mutable resource. Every read here is
//! streaming (header-only, column scans, record-at-a-time); every mutation
//! is either a pure append or a copy-to-temp-then-atomic-rename, so a
//! failed cycle never leaves a half-written master behind.

use std::{
   collections::HashSet,
   fs::{self, File, OpenOptions},
   io::BufWriter,
   path::{Path, PathBuf},
};

use csv::{Reader, ReaderBuilder, StringRecord, WriterBuilder};
use fs4::FileExt;
use tempfile::NamedTempFile;

use crate::{
   error::{Error, Result},
   row::Row,
   schema::{SOURCE_COLUMN, UnifiedSchema},
};

pub struct MasterFile {
   path: PathBuf,
}

/// Exclusive advisory lock held across a cycle's mutation phase.
///
/// Dropping the guard releases the lock.
#[derive(Debug)]
pub struct MasterLock {
   file: File,
}

impl Drop for MasterLock {
   fn drop(&mut self) {
      let _ = self.file.unlock();
   }
}

impl MasterFile {
   pub const fn new(path: PathBuf) -> Self {
      Self { path }
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   pub fn exists(&self) -> bool {
      self.path.exists()
   }

   /// Header columns; empty when the file is missing or has no header yet.
   pub fn schema(&self) -> Result<Vec<String>> {
      let Some(mut reader) = self.reader()? else {
         return Ok(Vec::new());
      };
      let headers = reader.headers()?;
      if headers.iter().all(|h| h.trim().is_empty()) {
         return Ok(Vec::new());
      }
      Ok(headers.iter().map(str::to_owned).collect())
   }

   /// Number of data rows, via a streaming line scan.
   pub fn row_count(&self) -> Result<u64> {
      let Some(mut reader) = self.reader()? else {
         return Ok(0);
      };
      let mut count = 0u64;
      let mut record = StringRecord::new();
      while reader.read_record(&mut record)? {
         count += 1;
      }
      Ok(count)
   }

   /// The set of source filenames already represented in the master.
   ///
   /// Always recomputed from the provenance column, never cached, so it
   /// cannot drift from what is actually on disk.
   pub fn processed_files(&self) -> Result<HashSet<String>> {
      let mut processed = HashSet::new();
      let Some(mut reader) = self.reader()? else {
         return Ok(processed);
      };

      let Some(provenance) = reader
         .headers()?
         .iter()
         .position(|h| h == SOURCE_COLUMN)
      else {
         return Ok(processed);
      };

      let mut record = StringRecord::new();
      while reader.read_record(&mut record)? {
         if let Some(value) = record.get(provenance)
            && !value.is_empty()
         {
            processed.insert(value.to_string());
         }
      }
      Ok(processed)
   }

   /// Acquires an exclusive lock for the mutation phase of a cycle.
   ///
   /// Returns `None` when the master does not exist yet (nothing to
   /// protect); a lock held elsewhere surfaces as [`Error::MasterBusy`], and
   /// the cycle aborts before any byte changes.
   pub fn lock_for_update(&self) -> Result<Option<MasterLock>> {
      if !self.path.exists() {
         return Ok(None);
      }

      let file = OpenOptions::new()
         .read(true)
         .write(true)
         .open(&self.path)
         .map_err(|e| Error::MasterBusy { path: self.path.clone(), source: e })?;
      file
         .try_lock_exclusive()
         .map_err(|e| Error::MasterBusy { path: self.path.clone(), source: e })?;
      Ok(Some(MasterLock { file }))
   }

   /// Streams every row as a [`Row`] keyed by the current header.
   pub fn rows(&self) -> Result<Option<MasterRows>> {
      let Some(mut reader) = self.reader()? else {
         return Ok(None);
      };
      let columns: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
      Ok(Some(MasterRows {
         reader,
         columns,
         record: StringRecord::new(),
      }))
   }

   /// Deletes all rows whose provenance is in `sources`, via a streaming
   /// copy to a temp file and an atomic replace. Returns the removed count.
   pub fn remove_rows_for(&self, sources: &HashSet<String>) -> Result<u64> {
      if sources.is_empty() {
         return Ok(0);
      }
      let Some(mut reader) = self.reader()? else {
         return Ok(0);
      };

      let headers = reader.headers()?.clone();
      let Some(provenance) = headers.iter().position(|h| h == SOURCE_COLUMN) else {
         return Ok(0);
      };

      let mut tmp = self.sibling_tempfile()?;
      let mut removed = 0u64;
      {
         let mut writer = WriterBuilder::new().from_writer(tmp.as_file_mut());
         writer.write_record(&headers)?;

         let mut record = StringRecord::new();
         while reader.read_record(&mut record)? {
            let matches = record
               .get(provenance)
               .is_some_and(|value| sources.contains(value));
            if matches {
               removed += 1;
            } else {
               writer.write_record(&record)?;
            }
         }
         writer.flush()?;
      }

      if removed > 0 {
         tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
      }
      Ok(removed)
   }

   /// Rewrites the master under a wider schema, expanding rows written
   /// under a narrower historical header with empty cells.
   pub fn rewrite_with_schema(&self, schema: &UnifiedSchema) -> Result<()> {
      let Some(mut reader) = self.reader()? else {
         return Ok(());
      };
      let old_header = reader.headers()?.clone();

      // Index of each unified column in the old header, if present.
      let positions: Vec<Option<usize>> = schema
         .columns()
         .map(|column| old_header.iter().position(|h| h == column))
         .collect();

      let mut tmp = self.sibling_tempfile()?;
      {
         let mut writer = WriterBuilder::new().from_writer(tmp.as_file_mut());
         writer.write_record(schema.columns())?;

         let mut record = StringRecord::new();
         while reader.read_record(&mut record)? {
            writer.write_record(positions.iter().map(|position| {
               position
                  .and_then(|i| record.get(i))
                  .unwrap_or_default()
            }))?;
         }
         writer.flush()?;
      }

      tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
      Ok(())
   }

   /// Appends rows under `schema`, creating the file (with a header) when
   /// it is missing or schema-empty. The caller guarantees an existing
   /// header already equals `schema` (see [`rewrite_with_schema`]).
   ///
   /// [`rewrite_with_schema`]: Self::rewrite_with_schema
   pub fn append(&self, schema: &UnifiedSchema, rows: &[Row]) -> Result<u64> {
      if rows.is_empty() {
         return Ok(0);
      }

      if self.schema()?.is_empty() {
         if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
         }
         let mut writer = WriterBuilder::new().from_path(&self.path)?;
         writer.write_record(schema.columns())?;
         for row in rows {
            writer.write_record(row.values())?;
         }
         writer.flush()?;
         return Ok(rows.len() as u64);
      }

      let file = OpenOptions::new()
         .append(true)
         .open(&self.path)
         .map_err(|e| Error::MasterBusy { path: self.path.clone(), source: e })?;
      let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));
      for row in rows {
         writer.write_record(row.values())?;
      }
      writer.flush()?;
      Ok(rows.len() as u64)
   }

   fn reader(&self) -> Result<Option<Reader<File>>> {
      if !self.path.exists() {
         return Ok(None);
      }
      let reader = ReaderBuilder::new()
         .flexible(true)
         .from_path(&self.path)?;
      Ok(Some(reader))
   }

   fn sibling_tempfile(&self) -> Result<NamedTempFile> {
      let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
      Ok(NamedTempFile::new_in(dir)?)
   }
}

/// Streaming iterator over master rows.
pub struct MasterRows {
   reader:  Reader<File>,
   columns: Vec<String>,
   record:  StringRecord,
}

impl MasterRows {
   pub fn next_row(&mut self) -> Result<Option<Row>> {
      if !self.reader.read_record(&mut self.record)? {
         return Ok(None);
      }
      let mut row = Row::new();
      for (i, column) in self.columns.iter().enumerate() {
         row.set(
            column.clone(),
            self.record.get(i).unwrap_or_default().to_string(),
         );
      }
      Ok(Some(row))
   }
}

#[cfg(test)]
mod tests {
   use tempfile::TempDir;

   use super::*;
   use crate::row::normalize;

   fn master_in(dir: &TempDir) -> MasterFile {
      MasterFile::new(dir.path().join("master.csv"))
   }

   fn schema(columns: &[&str]) -> UnifiedSchema {
      UnifiedSchema::unify(&[], columns.iter().map(|c| (*c).to_string()))
   }

   fn source_row(schema: &UnifiedSchema, provenance: &str, pairs: &[(&str, &str)]) -> Row {
      let source = Row::from_pairs(
         pairs
            .iter()
            .map(|(c, v)| ((*c).to_string(), (*v).to_string())),
      );
      normalize(Some(&source), schema, provenance)
   }

   #[test]
   fn missing_master_reads_as_empty() {
      let dir = TempDir::new().unwrap();
      let master = master_in(&dir);
      assert!(master.schema().unwrap().is_empty());
      assert_eq!(master.row_count().unwrap(), 0);
      assert!(master.processed_files().unwrap().is_empty());
      assert!(master.rows().unwrap().is_none());
   }

   #[test]
   fn append_creates_with_header_then_appends() {
      let dir = TempDir::new().unwrap();
      let master = master_in(&dir);
      let schema = schema(&["Name"]);

      let first = source_row(&schema, "a.csv", &[("Name", "John")]);
      assert_eq!(master.append(&schema, &[first]).unwrap(), 1);
      assert_eq!(master.schema().unwrap(), vec![SOURCE_COLUMN, "Name"]);
      assert_eq!(master.row_count().unwrap(), 1);

      let second = source_row(&schema, "b.csv", &[("Name", "Jane")]);
      assert_eq!(master.append(&schema, &[second]).unwrap(), 1);
      assert_eq!(master.row_count().unwrap(), 2);
      let processed = master.processed_files().unwrap();
      assert!(processed.contains("a.csv") && processed.contains("b.csv"));
   }

   #[test]
   fn remove_rows_for_is_selective() {
      let dir = TempDir::new().unwrap();
      let master = master_in(&dir);
      let schema = schema(&["Name"]);
      master
         .append(&schema, &[
            source_row(&schema, "a.csv", &[("Name", "John")]),
            source_row(&schema, "a.csv", &[("Name", "Jane")]),
            source_row(&schema, "b.csv", &[("Name", "Bob")]),
         ])
         .unwrap();

      let stale: HashSet<String> = std::iter::once("a.csv".to_string()).collect();
      assert_eq!(master.remove_rows_for(&stale).unwrap(), 2);
      assert_eq!(master.row_count().unwrap(), 1);
      assert!(!master.processed_files().unwrap().contains("a.csv"));
   }

   #[test]
   fn rewrite_expands_old_rows_with_empty_cells() {
      let dir = TempDir::new().unwrap();
      let master = master_in(&dir);
      let narrow = schema(&["Name"]);
      master
         .append(&narrow, &[source_row(&narrow, "a.csv", &[("Name", "John")])])
         .unwrap();

      let wide = UnifiedSchema::unify(&master.schema().unwrap(), ["City".to_string()]);
      master.rewrite_with_schema(&wide).unwrap();

      assert_eq!(master.schema().unwrap(), vec![SOURCE_COLUMN, "Name", "City"]);
      let mut rows = master.rows().unwrap().unwrap();
      let row = rows.next_row().unwrap().unwrap();
      assert_eq!(row.get("Name"), Some("John"));
      assert_eq!(row.get("City"), Some(""));
      assert!(rows.next_row().unwrap().is_none());
   }

   #[test]
   fn quoted_values_round_trip() {
      let dir = TempDir::new().unwrap();
      let master = master_in(&dir);
      let schema = schema(&["Note"]);
      let tricky = "said \"hi\", then\nleft";
      master
         .append(&schema, &[source_row(&schema, "a.csv", &[("Note", tricky)])])
         .unwrap();

      let mut rows = master.rows().unwrap().unwrap();
      assert_eq!(rows.next_row().unwrap().unwrap().get("Note"), Some(tricky));
   }

   #[test]
   fn busy_master_refuses_lock() {
      let dir = TempDir::new().unwrap();
      let master = master_in(&dir);
      let schema = schema(&["Name"]);
      master
         .append(&schema, &[source_row(&schema, "a.csv", &[("Name", "John")])])
         .unwrap();

      let holder = File::open(master.path()).unwrap();
      holder.try_lock_exclusive().unwrap();
      let err = master.lock_for_update().unwrap_err();
      assert!(matches!(err, Error::MasterBusy { .. }));
      let _ = holder.unlock();

      assert!(master.lock_for_update().unwrap().is_some());
   }
}
