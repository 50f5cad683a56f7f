//! Agent MRI command-line front end.
//!
//! Reads an agent run log (file or stdin), runs the analysis pipeline, and
//! prints the generated reports. All analysis lives in `agent-mri-analysis`;
//! this binary only handles I/O and output formatting.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use agent_mri_analysis::analyze;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agent-mri")]
#[command(about = "Risk analysis for agent run logs", long_about = None)]
#[command(version)]
struct Cli {
    /// Run log JSON file, or `-` to read from stdin
    log: PathBuf,

    /// Optional reviewer critique markdown to attach to the report
    #[arg(long)]
    critique: Option<PathBuf>,

    /// Emit the full analysis result as JSON instead of markdown
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let raw_text = read_log(&cli.log)?;
    let raw: serde_json::Value = serde_json::from_str(&raw_text)
        .with_context(|| format!("run log {} is not valid JSON", cli.log.display()))?;

    let critique = match &cli.critique {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read critique file {}", path.display()))?,
        ),
        None => None,
    };

    let result = analyze(&raw, critique.as_deref())?;
    debug!(
        steps = result.summary.total_steps,
        score = result.risk.score,
        "analysis complete"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    println!("{}", result.report_markdown);
    println!("\n---\n");
    println!("{}", result.timeline_markdown);
    println!("\n---\n");
    println!("## Reviewer Critique\n");
    println!("{}", result.critique_markdown);

    Ok(())
}

fn read_log(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read run log from stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read run log {}", path.display()))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
