mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{RunArgs, cmd_check, cmd_info, cmd_init, cmd_requirements, cmd_run};
use crate::output::{OutputFormat, print_error};

/// deployer - Compile and run device deployment scripts
#[derive(Parser)]
#[command(name = "deployer")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a script and report its diagnostics
  Check {
    /// Path to the deployment script
    file: PathBuf,
  },

  /// List the external inputs a script needs
  Requirements {
    /// Path to the deployment script
    file: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Run a script against a device
  Run(RunArgs),

  /// Create a loopback device directory
  Init {
    /// Directory to create the device in
    path: PathBuf,

    /// Number of empty disks to create
    #[arg(long, default_value_t = 2)]
    disks: u32,
  },

  /// Show application directories and the state of a device
  Info {
    /// Loopback device directory to inspect
    #[arg(long)]
    device: Option<PathBuf>,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Check { file } => cmd_check(&file),
    Commands::Requirements { file, output } => cmd_requirements(&file, output),
    Commands::Run(args) => cmd_run(args),
    Commands::Init { path, disks } => cmd_init(&path, disks),
    Commands::Info { device } => cmd_info(device.as_deref()),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::from(1)
    }
  }
}
