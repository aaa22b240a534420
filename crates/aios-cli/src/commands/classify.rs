//! Classify command - score task complexity and recommend a parallel mode
//!
//! Usage:
//! ```bash
//! aios classify "Fix typo in readme"
//! aios classify "Design new auth architecture" --file src/auth.rs --criterion "tokens rotate"
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use aios_parallel::recommend_mode;
use aios_router::{ComplexityLevel, TaskComplexityClassifier, TaskDescriptor};

/// Arguments for the classify command
#[derive(Args)]
pub struct ClassifyArgs {
    /// Task description
    #[arg(default_value = "")]
    description: String,

    /// File touched by the task (repeatable)
    #[arg(short, long = "file")]
    files: Vec<String>,

    /// Acceptance criterion (repeatable)
    #[arg(short, long = "criterion")]
    criteria: Vec<String>,

    /// Output the raw result as JSON
    #[arg(long)]
    json: bool,
}

/// Run the classify command
pub fn run(args: ClassifyArgs) -> Result<()> {
    let task = TaskDescriptor::new(args.description)
        .with_files(args.files)
        .with_acceptance_criteria(args.criteria);

    let result = TaskComplexityClassifier::new().classify(&task);
    let mode = recommend_mode(&result);

    if args.json {
        let output = serde_json::json!({ "classification": result, "recommended_mode": mode });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Level").fg(Color::Cyan),
            Cell::new("Score").fg(Color::Cyan),
        ]);

    for level in ComplexityLevel::ALL {
        let cell = Cell::new(level.as_str());
        let cell = if level == result.level { cell.fg(Color::Green) } else { cell };
        table.add_row(vec![cell, Cell::new(format!("{:.3}", result.scores.get(level)))]);
    }

    println!("{table}");
    println!();
    println!("{} {}", "Level:".bold(), result.level.to_string().green().bold());
    println!("{} {:.2}", "Confidence:".bold(), result.confidence);
    println!("{} {}", "Recommended mode:".bold(), mode.to_string().yellow());

    Ok(())
}
