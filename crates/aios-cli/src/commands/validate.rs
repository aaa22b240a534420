//! Validate command - check arguments against a command's validator
//!
//! Usage:
//! ```bash
//! aios validate send_email '{"to": "dev@example.com"}' --file validators.json
//! aios validate send_email '{}' --file validators.json --declarative
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use aios_sandbox::{SandboxConfig, ValidationHelper, ValidatorDefinitions, WasmRuntime};

use super::{parse_args, read_json};
use crate::{print_failure, print_info, print_success};

/// Arguments for the validate command
#[derive(Args)]
pub struct ValidateArgs {
    /// Command whose arguments are validated
    command: String,

    /// JSON arguments to validate
    #[arg(default_value = "{}")]
    args: String,

    /// JSON file with validator definitions
    #[arg(short, long, default_value = "validators.json")]
    file: PathBuf,

    /// Only run declarative checks, skip the sandboxed validator
    #[arg(long)]
    declarative: bool,

    /// Output the raw validation result as JSON
    #[arg(long)]
    raw: bool,
}

/// Run the validate command
pub async fn run(args: ValidateArgs) -> Result<()> {
    let definitions: ValidatorDefinitions = serde_json::from_value(read_json(&args.file)?)
        .with_context(|| {
            format!("{} does not contain validator definitions", args.file.display())
        })?;

    let helper =
        ValidationHelper::with_runtime(Arc::new(WasmRuntime::new()), SandboxConfig::from_env()?);
    helper.load(definitions.into_specs());

    let input = parse_args(&args.args)?;
    let result = if args.declarative {
        helper.validate_declarative(&args.command, &input)
    } else {
        helper.validate_full(&args.command, input).await
    };

    if args.raw {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.valid {
        print_success(&format!("Arguments for '{}' are valid", args.command.green()));
    } else {
        print_failure(&format!("Arguments for '{}' are invalid", args.command.red()));
        for error in &result.errors {
            println!("  {} {}", "•".red(), error);
        }
    }
    if let Some(note) = &result.note {
        print_info(note);
    }
    if let Some(ms) = result.duration_ms {
        println!("{} {}ms", "Validation time:".dimmed(), ms);
    }

    Ok(())
}
