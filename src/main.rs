use std::path::PathBuf;

use clap::{Parser, Subcommand};
use csvherd::{Result, cmd};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the csvherd application
#[derive(Parser)]
#[command(name = "csvherd")]
#[command(about = "Consolidates dropped CSV files into one master file")]
#[command(version)]
struct Cli {
   #[arg(long, global = true, env = "CSVHERD_CONFIG", help = "Path to config TOML")]
   config: Option<PathBuf>,

   #[command(subcommand)]
   command: Cmd,
}

/// Available subcommands for csvherd
#[derive(Subcommand)]
enum Cmd {
   #[command(about = "Watch the input folder and merge continuously")]
   Watch {
      #[arg(short = 'i', long, help = "Input folder (overrides config)")]
      input: Option<PathBuf>,

      #[arg(short = 'o', long, help = "Output folder (overrides config)")]
      output: Option<PathBuf>,
   },

   #[command(about = "Run one merge cycle and exit")]
   Merge {
      #[arg(short = 'i', long, help = "Input folder (overrides config)")]
      input: Option<PathBuf>,

      #[arg(short = 'o', long, help = "Output folder (overrides config)")]
      output: Option<PathBuf>,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   #[command(about = "Show master file and watcher status")]
   Status {
      #[arg(long, help = "JSON output")]
      json: bool,
   },

   #[command(about = "Stop a running watcher")]
   Stop,

   #[command(about = "Write a starter config file")]
   Init {
      #[arg(long, help = "Overwrite an existing config file")]
      force: bool,
   },
}

#[tokio::main]
async fn main() {
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
      .init();

   let cli = Cli::parse();
   if let Err(err) = run(cli).await {
      eprintln!("{err}");
      std::process::exit(err.exit_code());
   }
}

async fn run(cli: Cli) -> Result<()> {
   match cli.command {
      Cmd::Watch { input, output } => cmd::watch::execute(cli.config, input, output).await,
      Cmd::Merge { input, output, json } => {
         cmd::merge::execute(cli.config, input, output, json).await
      },
      Cmd::Status { json } => cmd::status::execute(cli.config, json),
      Cmd::Stop => cmd::stop::execute(cli.config),
      Cmd::Init { force } => cmd::init::execute(cli.config, force),
   }
}
