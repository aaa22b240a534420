//! AIOS CLI - run helpers and validators locally, classify tasks
//!
//! # Usage
//!
//! ```bash
//! # List helpers defined in a file
//! aios helpers list --file helpers.json
//!
//! # Run a helper with JSON arguments
//! aios helpers run double '{"x": 3}' --file helpers.json
//!
//! # Validate arguments for a command
//! aios validate send_email '{"to": "dev@example.com"}' --file validators.json
//!
//! # Classify a task and see the recommended parallel mode
//! aios classify "Design new architecture" --file src/a.rs --criterion "is fast"
//!
//! # Show effective configuration
//! aios info
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{classify, helpers, info, validate};

/// AIOS - bounded helpers, complexity routing and parallel providers
#[derive(Parser)]
#[command(
    name = "aios",
    version,
    about = "AIOS CLI - Bounded tool helpers and task routing",
    long_about = "AIOS runs tool helper and validator snippets inside a bounded\n\
                  WebAssembly sandbox and classifies tasks to pick an\n\
                  orchestration mode for parallel providers."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and run helper snippets
    #[command(name = "helpers")]
    Helpers(helpers::HelpersArgs),

    /// Validate command arguments
    #[command(name = "validate")]
    Validate(validate::ValidateArgs),

    /// Classify task complexity
    #[command(name = "classify")]
    Classify(classify::ClassifyArgs),

    /// Show effective configuration
    #[command(name = "info")]
    Info(info::InfoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Helpers(args) => helpers::run(args).await,
        Commands::Validate(args) => validate::run(args).await,
        Commands::Classify(args) => classify::run(args),
        Commands::Info(args) => info::run(args),
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print a failure message with an X
pub fn print_failure(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg);
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}
