//! rulescore CLI
//!
//! Command-line interface for scoring conversation transcripts.
//!
//! ## Usage
//!
//! ```bash
//! # Score a transcript against a ruleset
//! rulescore score --input convo.jsonl --rules rulesets/trajectory_v1.yaml
//!
//! # Pipe the transcript from stdin
//! cat convo.jsonl | rulescore score --rules rulesets/trajectory_v1.yaml
//!
//! # JSON report, fail the run when the score reaches 60
//! rulescore score --input convo.jsonl --rules ruleset.yaml --format json --fail-at 60
//!
//! # Validate a ruleset
//! rulescore rules validate rulesets/trajectory_v1.yaml
//! ```
//!
//! ## Exit Codes
//!
//! - 0: Success
//! - 1: Score reached `--fail-at`, or ruleset validation failed
//! - 3: Error

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

use rulescore_core::{Report, Ruleset, Transcript};

/// rulescore: rule-based risk scoring for conversation transcripts
#[derive(Parser)]
#[command(name = "rulescore")]
#[command(version)]
#[command(about = "Score conversation transcripts against declarative detection rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a transcript against a ruleset
    Score {
        /// Path to the transcript (JSONL, reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Path to the ruleset (YAML or JSON)
        #[arg(short, long)]
        rules: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Exit with code 1 when the total reaches this score
        #[arg(long)]
        fail_at: Option<u32>,

        /// Explicit timestamp for deterministic reports (ISO 8601 / RFC 3339).
        /// Example: --evaluated-at 2025-12-20T00:00:00Z
        #[arg(long, value_parser = parse_datetime)]
        evaluated_at: Option<DateTime<Utc>>,
    },

    /// Ruleset management commands
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// Validate a ruleset file (parse and compile)
    Validate {
        /// Path to the ruleset file
        path: PathBuf,
    },

    /// Show ruleset details
    Show {
        /// Path to the ruleset file
        path: PathBuf,
    },

    /// List rulesets in a directory
    List {
        /// Directory containing rulesets
        #[arg(default_value = "./rulesets")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Parse ISO 8601 / RFC 3339 datetime string to DateTime<Utc>.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid datetime format: {}. Expected ISO 8601/RFC 3339 (e.g., 2025-12-20T00:00:00Z)", e))
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays a clean report
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    match run() {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            input,
            rules,
            format,
            fail_at,
            evaluated_at,
        } => score_command(input, rules, format, fail_at, evaluated_at),

        Commands::Rules { action } => match action {
            RulesAction::Validate { path } => validate_ruleset(path),
            RulesAction::Show { path } => show_ruleset(path),
            RulesAction::List { path } => list_rulesets(path),
        },
    }
}

fn load_ruleset(path: &Path) -> Result<Ruleset> {
    Ruleset::from_path(path).with_context(|| format!("Failed to load ruleset from {:?}", path))
}

fn score_command(
    input_path: Option<PathBuf>,
    rules_path: PathBuf,
    format: OutputFormat,
    fail_at: Option<u32>,
    evaluated_at: Option<DateTime<Utc>>,
) -> Result<ExitCode> {
    let ruleset = load_ruleset(&rules_path)?;
    let compiled = ruleset
        .compile()
        .with_context(|| format!("Failed to compile ruleset {:?}", rules_path))?;

    let transcript = match input_path {
        Some(path) => Transcript::from_jsonl_file(&path)
            .with_context(|| format!("Failed to load transcript from {:?}", path))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Transcript::from_jsonl(&buffer).context("Failed to parse transcript from stdin")?
        }
    };

    let result = rulescore_core::score(transcript.turns(), &compiled);
    debug!(total = result.total, fired = result.fired.len(), "Evaluation complete");

    let report = Report::build_at(
        transcript.turns(),
        &result,
        evaluated_at.unwrap_or_else(Utc::now),
    );

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            print!("{}", report.render_text());
        }
    }

    Ok(match fail_at {
        Some(threshold) if result.total >= threshold => ExitCode::from(1),
        _ => ExitCode::from(0),
    })
}

fn validate_ruleset(path: PathBuf) -> Result<ExitCode> {
    let ruleset = match Ruleset::from_path(&path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Ruleset validation failed: {}", e);
            return Ok(ExitCode::from(1));
        }
    };

    match ruleset.compile() {
        Ok(compiled) => {
            println!(
                "Ruleset is valid: {}",
                ruleset.name.as_deref().unwrap_or("(unnamed)")
            );
            println!();
            if let Some(version) = &ruleset.version {
                println!("Version: {}", version);
            }
            println!("Rules: {}", compiled.len());
            println!("Independent: {}", compiled.independent().count());
            println!("Dependent: {}", compiled.dependent().count());
            Ok(ExitCode::from(0))
        }
        Err(e) => {
            eprintln!("Ruleset validation failed: {}", e);
            Ok(ExitCode::from(1))
        }
    }
}

fn show_ruleset(path: PathBuf) -> Result<ExitCode> {
    let ruleset = load_ruleset(&path)?;

    println!("Ruleset: {}", ruleset.name.as_deref().unwrap_or("(unnamed)"));
    if let Some(version) = &ruleset.version {
        println!("Version: {}", version);
    }
    if let Some(description) = &ruleset.description {
        println!("Description: {}", description.trim());
    }
    println!();

    println!("Rules:");
    for rule in &ruleset.rules {
        println!(
            "  [{}] {:+} {} ({}, {} patterns)",
            rule.id,
            rule.points,
            rule.name.as_deref().unwrap_or(&rule.id),
            rule.applies_to,
            rule.patterns.len()
        );
        if let Some(dep) = &rule.depends_on {
            println!(
                "      after {} within {} turn(s)",
                dep,
                rule.window_turns as u64 + 1
            );
        }
    }

    Ok(ExitCode::from(0))
}

fn list_rulesets(path: PathBuf) -> Result<ExitCode> {
    let entries = std::fs::read_dir(&path)
        .with_context(|| format!("Failed to read directory {:?}", path))?;

    let mut paths: Vec<PathBuf> = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    paths.sort();

    let mut found = false;
    for path in paths {
        if !path
            .extension()
            .map(|e| e == "yaml" || e == "yml" || e == "json")
            .unwrap_or(false)
        {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match Ruleset::from_path(&path) {
            Ok(r) => {
                println!(
                    "{}: {} ({} rules)",
                    file_name,
                    r.name.as_deref().unwrap_or("(unnamed)"),
                    r.rules.len()
                );
                found = true;
            }
            Err(e) => {
                eprintln!("{}: INVALID - {}", file_name, e);
            }
        }
    }

    if !found {
        println!("No rulesets found in {:?}", path);
    }

    Ok(ExitCode::from(0))
}
