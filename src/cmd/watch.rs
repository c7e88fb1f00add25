//! Long-running watcher command.
//!
//! Loads and validates configuration, writes the pid file, and drives the
//! monitoring loop until a shutdown signal arrives.

use std::{fs, path::PathBuf};

use console::style;
use tokio::sync::watch;

use crate::{
   Result,
   config::Config,
   monitor::MonitoringLoop,
   pidfile::{self, PidFileGuard},
};

pub async fn execute(
   config_path: Option<PathBuf>,
   input: Option<PathBuf>,
   output: Option<PathBuf>,
) -> Result<()> {
   let mut config = Config::load(config_path.as_deref())?;
   if let Some(folder) = input {
      config.input_folder = folder;
   }
   if let Some(folder) = output {
      config.output_folder = folder;
   }
   config.validate()?;

   fs::create_dir_all(&config.output_folder)?;
   pidfile::write(&config.pid_path())?;
   let _pid_guard = PidFileGuard::new(config.pid_path());

   println!("{}", style("Starting csvherd watcher...").green().bold());
   println!("Input: {}", style(config.input_folder.display()).cyan());
   println!("Master: {}", style(config.master_path().display()).cyan());
   println!(
      "Interval: {}",
      style(format!("{}s", config.polling_interval_seconds)).dim()
   );

   let (shutdown_tx, shutdown_rx) = watch::channel(false);
   tokio::spawn(async move {
      wait_for_shutdown_signal().await;
      let _ = shutdown_tx.send(true);
   });

   MonitoringLoop::new(&config).run(shutdown_rx).await;

   println!("{}", style("Watcher stopped").yellow());
   Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
   use tokio::signal::unix::{SignalKind, signal};

   let Ok(mut term) = signal(SignalKind::terminate()) else {
      let _ = tokio::signal::ctrl_c().await;
      return;
   };
   tokio::select! {
      _ = tokio::signal::ctrl_c() => {},
      _ = term.recv() => {},
   }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
   let _ = tokio::signal::ctrl_c().await;
}
