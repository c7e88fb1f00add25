//! Per-cycle merge orchestration.
//!
//! One run per detected change: analyze the master, decide which files to
//! (re)process, drop stale rows, parse the new drops, unify and
//! deduplicate, persist. A per-file parse failure skips that file; a busy
//! master aborts the cycle before anything on disk changes and the same
//! files are naturally retried on the next detected change.

use std::{collections::HashSet, path::PathBuf};

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;

use crate::{
   changes::ChangeSet,
   config::Config,
   dedup::DuplicateFilter,
   error::{Error, Result},
   master::MasterFile,
   row::{Row, normalize},
   schema::{UnifiedSchema, disambiguate_header},
   snapshot::Snapshot,
};

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
   pub files_processed:   usize,
   pub rows_appended:     u64,
   pub rows_removed:      u64,
   pub duplicates_dropped: u64,
   pub schema_columns:    usize,
   pub master_rows:       u64,
}

/// One parsed drop file: disambiguated columns plus its data rows.
struct ParsedFile {
   name:    String,
   columns: Vec<String>,
   rows:    Vec<Row>,
}

pub struct MergeEngine {
   master:        MasterFile,
   input_folder:  PathBuf,
   purge_removed: bool,
   dedup_exclude: HashSet<String>,
}

impl MergeEngine {
   pub fn new(config: &Config) -> Self {
      Self {
         master:        MasterFile::new(config.master_path()),
         input_folder:  config.input_folder.clone(),
         purge_removed: config.purge_removed_files,
         dedup_exclude: config.dedup_exclusions(),
      }
   }

   pub const fn master(&self) -> &MasterFile {
      &self.master
   }

   /// Runs one merge cycle.
   ///
   /// With `changes: None` (first run, or master vanished) every snapshot
   /// file absent from the processed-file registry is processed; with a
   /// [`ChangeSet`] only its added and modified files are.
   pub fn run_cycle(
      &self,
      snapshot: &Snapshot,
      changes: Option<&ChangeSet>,
   ) -> Result<CycleSummary> {
      // Analyze: streaming reads only.
      let existing_schema = self.master.schema()?;
      let initial_rows = self.master.row_count()?;
      let processed = self.master.processed_files()?;

      // Determine which files this cycle touches.
      let targets: Vec<String> = match changes {
         None => snapshot
            .names()
            .filter(|name| !processed.contains(*name))
            .map(str::to_owned)
            .collect(),
         Some(changes) => changes
            .to_process()
            .filter(|&name| snapshot.contains(name))
            .map(str::to_owned)
            .collect(),
      };

      let mut stale: HashSet<String> = HashSet::new();
      if let Some(changes) = changes {
         stale.extend(changes.modified.iter().cloned());
         if self.purge_removed {
            stale.extend(changes.removed.iter().cloned());
         } else if !changes.removed.is_empty() {
            tracing::info!(
               count = changes.removed.len(),
               "source files removed; retaining their rows (purge_removed_files = false)"
            );
         }
      }

      if targets.is_empty() && stale.is_empty() {
         tracing::debug!("nothing to process this cycle");
         return Ok(CycleSummary {
            schema_columns: existing_schema.len(),
            master_rows: initial_rows,
            ..CycleSummary::default()
         });
      }

      // Lock up front: an externally-held master aborts the cycle before
      // removals or appends touch the file.
      let _lock = self.master.lock_for_update()?;

      // Drop stale rows (modified files, plus removed ones when purging).
      let rows_removed = self.master.remove_rows_for(&stale)?;

      // Parse the drops. A broken file contributes zero rows and the batch
      // continues.
      let mut parsed = Vec::with_capacity(targets.len());
      for name in &targets {
         match self.parse_file(name) {
            Ok(file) => parsed.push(file),
            Err(e) => {
               tracing::warn!(file = name.as_str(), "skipping unparseable file: {e}");
               parsed.push(ParsedFile {
                  name:    name.clone(),
                  columns: Vec::new(),
                  rows:    Vec::new(),
               });
            },
         }
      }

      // Unify and deduplicate.
      let observed = parsed
         .iter()
         .flat_map(|file| file.columns.iter().cloned());
      let schema = UnifiedSchema::unify(&existing_schema, observed);

      let mut filter = DuplicateFilter::new(self.dedup_exclude.clone());
      if let Some(mut rows) = self.master.rows()? {
         while let Some(row) = rows.next_row()? {
            filter.observe(&row);
         }
      }

      let mut fresh = Vec::new();
      let mut duplicates_dropped = 0u64;
      for file in &parsed {
         for row in &file.rows {
            let normalized = normalize(Some(row), &schema, &file.name);
            if filter.admit(&normalized) {
               fresh.push(normalized);
            } else {
               duplicates_dropped += 1;
            }
         }
      }

      // Persist: widen first if the schema grew, then append.
      if !existing_schema.is_empty() && schema.differs_from(&existing_schema) {
         self.master.rewrite_with_schema(&schema)?;
      }
      let rows_appended = self.master.append(&schema, &fresh)?;

      let summary = CycleSummary {
         files_processed: targets.len(),
         rows_appended,
         rows_removed,
         duplicates_dropped,
         schema_columns: schema.column_count(),
         master_rows: initial_rows - rows_removed + rows_appended,
      };
      tracing::info!(
         files = summary.files_processed,
         appended = summary.rows_appended,
         removed = summary.rows_removed,
         duplicates = summary.duplicates_dropped,
         columns = summary.schema_columns,
         "cycle complete"
      );
      Ok(summary)
   }

   /// Parses one drop file into disambiguated columns and rows.
   ///
   /// A syntactically empty file (no header at all) parses to zero columns
   /// and zero rows. Short records are padded with empty strings; cells
   /// beyond the header are dropped.
   fn parse_file(&self, name: &str) -> Result<ParsedFile> {
      let path = self.input_folder.join(name);
      let mut reader = ReaderBuilder::new()
         .flexible(true)
         .from_path(&path)
         .map_err(|e| parse_error(name, &e.to_string()))?;

      let headers = reader
         .headers()
         .map_err(|e| parse_error(name, &e.to_string()))?
         .clone();

      if headers.iter().all(|h| h.trim().is_empty()) {
         tracing::debug!(file = name, "empty or headerless file, zero rows");
         return Ok(ParsedFile {
            name:    name.to_string(),
            columns: Vec::new(),
            rows:    Vec::new(),
         });
      }

      let columns = disambiguate_header(headers.iter());
      let mut rows = Vec::new();
      let mut record = StringRecord::new();
      loop {
         match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
               let mut row = Row::new();
               for (i, column) in columns.iter().enumerate() {
                  row.set(
                     column.clone(),
                     record.get(i).unwrap_or_default().to_string(),
                  );
               }
               rows.push(row);
            },
            Err(e) => return Err(parse_error(name, &e.to_string())),
         }
      }

      Ok(ParsedFile { name: name.to_string(), columns, rows })
   }
}

fn parse_error(file: &str, reason: &str) -> Error {
   Error::FileParse { file: file.to_string(), reason: reason.to_string() }
}
