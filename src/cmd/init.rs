//! Writes a starter configuration file.

use std::path::PathBuf;

use console::style;

use crate::{Result, config};

pub fn execute(config_path: Option<PathBuf>, force: bool) -> Result<()> {
   let path = config_path.unwrap_or_else(config::default_config_path);

   if path.exists() && !force {
      println!(
         "{} {} (use --force to overwrite)",
         style("Already exists:").yellow(),
         path.display()
      );
      return Ok(());
   }

   config::Config::write_default(&path)?;
   println!("{} {}", style("Wrote").green(), path.display());
   println!("Set input_folder and output_folder before starting the watcher.");
   Ok(())
}
