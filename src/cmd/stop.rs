//! Stops a running watcher via its pid file.

use std::path::PathBuf;

use console::style;

use crate::{Result, config::Config, pidfile};

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
   let config = Config::load(config_path.as_deref())?;
   config.validate()?;

   let pid_path = config.pid_path();
   let Some(pid) = pidfile::read(&pid_path) else {
      println!("{}", style("No watcher running").yellow());
      return Ok(());
   };

   if pidfile::looks_like_watcher(pid) {
      terminate(pid)?;
      println!("{} (pid {pid})", style("Watcher stopped").green());
   } else {
      println!(
         "{} (pid {pid})",
         style("Stale pid file; no csvherd watcher with that pid").yellow()
      );
   }

   pidfile::remove(&pid_path);
   Ok(())
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
   use std::process::Command;

   let _ = Command::new("kill")
      .args(["-TERM", &pid.to_string()])
      .status()?;
   Ok(())
}

#[cfg(not(unix))]
fn terminate(_pid: u32) -> Result<()> {
   println!(
      "{}",
      style("Signal delivery is not supported on this platform; stop the process manually").yellow()
   );
   Ok(())
}
