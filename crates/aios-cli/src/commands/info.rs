//! Info command - show version and effective configuration
//!
//! Usage:
//! ```bash
//! aios info
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use aios_parallel::ParallelConfig;
use aios_router::ClassifierConfig;
use aios_sandbox::SandboxConfig;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs;

/// Run the info command
pub fn run(_args: InfoArgs) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let sandbox = SandboxConfig::from_env()?;
    let parallel = ParallelConfig::from_env()?;
    let classifier = ClassifierConfig::default();

    println!("{}", "AIOS - Bounded Helpers and Parallel Providers".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();

    println!("{}", "Version Information:".bold());
    println!("  {} {}", "CLI Version:".dimmed(), version.green());
    println!();

    println!("{}", "Sandbox:".bold());
    println!(
        "  {} {}ms / {} MiB",
        "Helper limits:".dimmed(),
        sandbox.helper_limits.timeout_ms(),
        sandbox.helper_limits.memory_bytes / (1024 * 1024)
    );
    println!(
        "  {} {}ms / {} MiB (target {}ms)",
        "Validator limits:".dimmed(),
        sandbox.validator_limits.timeout_ms(),
        sandbox.validator_limits.memory_bytes / (1024 * 1024),
        sandbox.validator_target.as_millis()
    );
    println!(
        "  {} '{}' up to {} bytes",
        "Attachment guard:".dimmed(),
        sandbox.attachment_helper,
        sandbox.max_attachment_bytes
    );
    println!();

    println!("{}", "Parallel:".bold());
    println!("  {} {}", "Default mode:".dimmed(), parallel.mode.to_string().green());
    println!(
        "  {} {}",
        "Branch timeout:".dimmed(),
        parallel
            .timeout
            .map(|t| format!("{}ms", t.as_millis()))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  {} {}", "Consensus similarity:".dimmed(), parallel.consensus_similarity);
    println!();

    println!("{}", "Classifier:".bold());
    println!(
        "  {} simple {} / complex {}",
        "Thresholds:".dimmed(),
        classifier.simple_threshold,
        classifier.complex_threshold
    );
    println!();

    println!("{}", "Configuration:".bold());
    println!("  {} Override limits with AIOS_* environment variables", "ℹ".blue());
    println!();

    Ok(())
}
