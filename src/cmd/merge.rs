//! One-shot merge command.
//!
//! Runs a single forced cycle with first-run semantics: every accepted
//! file absent from the processed-file registry is merged.

use std::path::PathBuf;

use console::style;

use crate::{
   Error, Result,
   config::Config,
   engine::MergeEngine,
   snapshot::{FilenamePolicy, Snapshotter},
   stability::StabilityGate,
};

pub async fn execute(
   config_path: Option<PathBuf>,
   input: Option<PathBuf>,
   output: Option<PathBuf>,
   json: bool,
) -> Result<()> {
   let mut config = Config::load(config_path.as_deref())?;
   if let Some(folder) = input {
      config.input_folder = folder;
   }
   if let Some(folder) = output {
      config.output_folder = folder;
   }
   config.validate()?;

   // Unlike the watcher, a one-shot merge treats an unreadable input folder
   // as a hard error rather than an empty snapshot.
   if let Err(e) = std::fs::read_dir(&config.input_folder) {
      return Err(Error::FolderAccess { path: config.input_folder.clone(), source: e });
   }

   let snapshotter = Snapshotter::new(
      config.input_folder.clone(),
      FilenamePolicy::from_config(config.validate_filename_format),
      config.use_file_hashing,
   );
   let snapshot = snapshotter.capture();

   let names: Vec<String> = snapshot.names().map(str::to_owned).collect();
   StabilityGate::new(
      config.stable_wait(),
      config.max_polling_retries,
      config.retry_backoff(),
   )
   .settle(&config.input_folder, &names)
   .await;

   let summary = MergeEngine::new(&config).run_cycle(&snapshot, None)?;

   if json {
      println!("{}", serde_json::to_string_pretty(&summary)?);
      return Ok(());
   }

   println!("{}", style("Merge complete").green().bold());
   println!("Files processed: {}", style(summary.files_processed).cyan());
   println!("Rows appended: {}", style(summary.rows_appended).cyan());
   println!("Rows removed: {}", style(summary.rows_removed).cyan());
   println!(
      "Duplicates dropped: {}",
      style(summary.duplicates_dropped).cyan()
   );
   println!(
      "Master: {} rows x {} columns",
      style(summary.master_rows).cyan(),
      style(summary.schema_columns).cyan()
   );
   Ok(())
}
