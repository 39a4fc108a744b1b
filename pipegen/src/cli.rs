//! CLI command definitions and terminal rendering

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use crate::events::{Icon, Phase, ProgressEvent};
use crate::validation::{Severity, ValidationFinding, ValidationResult};

/// pipegen - natural-language to data-pipeline generator
#[derive(Parser)]
#[command(
    name = "pg",
    about = "Generate data pipeline definitions from natural language, validated and repaired in a loop",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Log to stderr instead of the log file
        #[arg(long)]
        stderr_log: bool,
    },

    /// Generate a pipeline, printing progress as it happens
    Generate {
        /// What the pipeline should do
        prompt: String,

        /// Metadata JSON file (defaults to the configured sources)
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Maximum validate/repair iterations
        #[arg(short = 'n', long)]
        max_iterations: Option<u32>,
    },

    /// Validate a saved artifact without calling the generator
    Validate {
        /// Artifact file
        artifact: PathBuf,

        /// Metadata JSON file used for table checks
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Treat unknown table references as errors
        #[arg(long)]
        strict: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for the validate command
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pipegen")
        .join("logs")
        .join("pipegen.log")
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Generating => "generating",
        Phase::Iterating => "iterating",
        Phase::Validating => "validating",
        Phase::Complete => "complete",
        Phase::Incomplete => "incomplete",
    }
}

fn icon_mark(icon: Icon, severity: Option<Severity>) -> String {
    match (icon, severity) {
        (_, Some(Severity::Warning)) => "⚠".yellow().to_string(),
        (Icon::Error, _) => "✗".red().to_string(),
        (Icon::Success, _) => "✓".green().to_string(),
        (Icon::Retry, _) => "↻".yellow().to_string(),
        (Icon::Fix, _) => "→".cyan().to_string(),
        (Icon::Agent | Icon::Loading | Icon::Doc, _) => "•".to_string(),
    }
}

/// One progress event as terminal text
pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Status { phase, message, .. } => {
            format!("{} {}", format!("[{}]", phase_label(*phase)).cyan().bold(), message)
        }
        ProgressEvent::Detail {
            icon,
            title,
            message,
            severity,
            suggestion,
        } => {
            let mut line = format!("  {} {}: {}", icon_mark(*icon, *severity), title.bold(), message);
            if let Some(suggestion) = suggestion {
                line.push_str(&format!("\n      {} {}", "Suggestion:".dimmed(), suggestion));
            }
            line
        }
        ProgressEvent::Complete { success, message, .. } => {
            if *success {
                format!("{} {}", "✓".green().bold(), message.green())
            } else {
                format!("{} {}", "✗".red().bold(), message.red())
            }
        }
    }
}

fn format_finding(finding: &ValidationFinding) -> String {
    let severity = match finding.severity {
        Severity::Critical => "critical".red().bold(),
        Severity::Error => "error".red(),
        Severity::Warning => "warning".yellow(),
    };
    let mut line = format!("  [{}] {}: {}", severity, finding.category, finding.message);
    if let Some(suggestion) = &finding.suggestion {
        line.push_str(&format!("\n      {} {}", "Suggestion:".dimmed(), suggestion));
    }
    line
}

/// A validation result as terminal text
pub fn format_validation(result: &ValidationResult) -> String {
    let blocking = result.blocking().count();
    let mut out = if result.is_valid {
        format!("{} Pipeline is valid", "✓".green().bold())
    } else {
        format!("{} Pipeline has {} blocking problem(s)", "✗".red().bold(), blocking)
    };
    for finding in &result.findings {
        out.push('\n');
        out.push_str(&format_finding(finding));
    }
    out
}
