use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use lambo::cli::setup::setup;
use lambo::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Work out what an investment at the first listed price is worth today
    Lookup {
        /// One or more asset symbols, e.g. BTC ETH
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Amount invested at the opening price
        #[arg(short, long)]
        investment: u64,
    },
    /// Show recent lookups
    Usage {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

impl From<Commands> for lambo::AppCommand {
    fn from(cmd: Commands) -> lambo::AppCommand {
        match cmd {
            Commands::Lookup {
                symbols,
                investment,
            } => lambo::AppCommand::Lookup {
                symbols,
                investment,
            },
            Commands::Usage { limit } => lambo::AppCommand::Usage { limit },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => lambo::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
