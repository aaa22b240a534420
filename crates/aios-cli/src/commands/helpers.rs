//! Helpers command - inspect and run helper snippets from a definitions file
//!
//! Usage:
//! ```bash
//! aios helpers list --file helpers.json
//! aios helpers info double --file helpers.json
//! aios helpers run double '{"x": 3}' --file helpers.json
//! ```

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use aios_sandbox::{HelperExecutor, HelperSpec, SandboxConfig, WasmRuntime};

use super::{parse_args, read_json};

/// Arguments for the helpers command
#[derive(Args)]
pub struct HelpersArgs {
    /// JSON file with helper definitions (a list or `{"helpers": [...]}`)
    #[arg(short, long, global = true, default_value = "helpers.json")]
    file: PathBuf,

    #[command(subcommand)]
    command: HelpersCommand,
}

#[derive(Subcommand)]
pub enum HelpersCommand {
    /// List registered helpers
    #[command(name = "list")]
    List,

    /// Show metadata for one helper
    #[command(name = "info")]
    Info {
        /// Helper id
        id: String,
    },

    /// Run a helper with JSON arguments
    #[command(name = "run")]
    Run {
        /// Helper id
        id: String,

        /// JSON arguments for the helper
        #[arg(default_value = "{}")]
        args: String,

        /// Output raw JSON (no formatting)
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HelperFile {
    List(Vec<HelperSpec>),
    Wrapped { helpers: Vec<HelperSpec> },
}

/// Run the helpers command
pub async fn run(args: HelpersArgs) -> Result<()> {
    let executor = load_executor(&args.file)?;

    match args.command {
        HelpersCommand::List => list_helpers(&executor),
        HelpersCommand::Info { id } => show_info(&executor, &id),
        HelpersCommand::Run { id, args, raw } => run_helper(&executor, &id, &args, raw).await,
    }
}

fn load_executor(path: &Path) -> Result<HelperExecutor> {
    let specs = match serde_json::from_value(read_json(path)?)
        .with_context(|| format!("{} does not contain helper definitions", path.display()))?
    {
        HelperFile::List(specs) | HelperFile::Wrapped { helpers: specs } => specs,
    };

    let config = SandboxConfig::from_env()?;
    let executor = HelperExecutor::with_runtime(Arc::new(WasmRuntime::new()), config);
    let loaded = executor.load(specs);
    tracing::info!(loaded, file = %path.display(), "Loaded helper definitions");
    Ok(executor)
}

fn list_helpers(executor: &HelperExecutor) -> Result<()> {
    println!("{}", "🧩 AIOS Helpers".bold().cyan());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Id").fg(Color::Cyan),
            Cell::new("Language").fg(Color::Cyan),
            Cell::new("Runtime").fg(Color::Cyan),
        ]);

    for id in executor.list() {
        if let Some(info) = executor.info(&id) {
            table.add_row(vec![
                Cell::new(info.id).fg(Color::Green),
                Cell::new(info.language),
                Cell::new(info.runtime).fg(Color::Yellow),
            ]);
        }
    }

    println!("{table}");
    println!();
    println!("Run a helper: {}", "aios helpers run <id> '<json_args>'".green());

    Ok(())
}

fn show_info(executor: &HelperExecutor, id: &str) -> Result<()> {
    let info = executor.info(id).ok_or_else(|| {
        anyhow::anyhow!(
            "Helper '{}' not found. Run 'aios helpers list' to see available helpers.",
            id
        )
    })?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

async fn run_helper(executor: &HelperExecutor, id: &str, args: &str, raw: bool) -> Result<()> {
    let args = parse_args(args)?;

    if !raw {
        println!("{} Running helper '{}'...", "⚙".blue(), id.green());
        println!();
    }

    let start = Instant::now();
    let value = executor
        .execute(id, args)
        .await
        .with_context(|| format!("Helper '{}' execution failed", id))?;

    if raw {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", "Result:".bold());
        println!("{}", serde_json::to_string_pretty(&value)?);
        println!();
        println!("{} {}ms", "Execution time:".dimmed(), start.elapsed().as_millis());
    }

    Ok(())
}
