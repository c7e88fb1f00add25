//! Master-file and watcher status command.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use console::style;

use crate::{Result, config::Config, master::MasterFile, pidfile};

pub fn execute(config_path: Option<PathBuf>, json: bool) -> Result<()> {
   let config = Config::load(config_path.as_deref())?;
   config.validate()?;

   let master = MasterFile::new(config.master_path());
   let schema = master.schema()?;
   let rows = master.row_count()?;
   let sources = master.processed_files()?;

   let modified_at = master
      .path()
      .metadata()
      .ok()
      .and_then(|m| m.modified().ok())
      .map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true));

   let pid = pidfile::read(&config.pid_path());
   let watcher_running = pid.is_some_and(pidfile::looks_like_watcher);

   if json {
      let value = serde_json::json!({
         "master": master.path().display().to_string(),
         "exists": master.exists(),
         "columns": schema,
         "rows": rows,
         "source_files": sources.len(),
         "modified_at": modified_at,
         "watcher_pid": pid,
         "watcher_running": watcher_running,
      });
      println!("{}", serde_json::to_string_pretty(&value)?);
      return Ok(());
   }

   println!("Master: {}", style(master.path().display()).cyan());
   if master.exists() {
      println!(
         "Rows: {} across {} source files, {} columns",
         style(rows).cyan(),
         style(sources.len()).cyan(),
         style(schema.len()).cyan()
      );
      if let Some(at) = modified_at {
         println!("Modified: {}", style(at).dim());
      }
   } else {
      println!("{}", style("Master file not created yet").yellow());
   }

   match (pid, watcher_running) {
      (Some(pid), true) => println!("Watcher: {} (pid {pid})", style("running").green()),
      (Some(pid), false) => {
         println!("Watcher: {} (stale pid file, pid {pid})", style("not running").yellow());
      },
      (None, _) => println!("Watcher: {}", style("not running").dim()),
   }
   Ok(())
}
