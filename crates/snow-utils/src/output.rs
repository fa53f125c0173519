//! Progress reporting and result documents
//!
//! Text mode prints step-by-step progress with ✓/✗/⚠ markers on stdout.
//! JSON mode sends progress to the log (stderr) and prints exactly one
//! result document on stdout.

use anyhow::Result;
use serde::Serialize;
use snow_utils_common::Masker;
use tracing::{info, warn};

/// `--output` values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Trait for reporting workflow progress
///
/// Lets the same workflow drive human-readable output or structured logs.
pub trait ProgressReporter: Send + Sync {
    /// A new numbered or named step begins
    fn step(&self, title: &str);

    fn success(&self, message: &str);

    fn warning(&self, message: &str);

    fn failure(&self, message: &str);

    /// A labelled value; masked when it looks like an identifier
    fn detail(&self, label: &str, value: &str);
}

/// Human-readable progress on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReporter {
    masker: Masker,
}

impl TextReporter {
    pub fn new(masker: Masker) -> Self {
        Self { masker }
    }
}

impl ProgressReporter for TextReporter {
    fn step(&self, title: &str) {
        println!("{}", "─".repeat(40));
        println!("{title}");
        println!("{}", "─".repeat(40));
    }

    fn success(&self, message: &str) {
        println!("✓ {message}");
    }

    fn warning(&self, message: &str) {
        println!("⚠ {message}");
    }

    fn failure(&self, message: &str) {
        println!("✗ {message}");
    }

    fn detail(&self, label: &str, value: &str) {
        println!("  {label}: {}", self.masker.auto(value));
    }
}

/// Progress as structured log events (keeps stdout clean for JSON)
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter {
    masker: Masker,
}

impl LogReporter {
    pub fn new(masker: Masker) -> Self {
        Self { masker }
    }
}

impl ProgressReporter for LogReporter {
    fn step(&self, title: &str) {
        info!(step = %title, "Step");
    }

    fn success(&self, message: &str) {
        info!("{message}");
    }

    fn warning(&self, message: &str) {
        warn!("{message}");
    }

    fn failure(&self, message: &str) {
        warn!(failed = true, "{message}");
    }

    fn detail(&self, label: &str, value: &str) {
        info!(value = %self.masker.auto(value), "{label}");
    }
}

/// Reporter chosen from `--output`
#[derive(Debug, Clone, Copy)]
pub enum Reporter {
    Text(TextReporter),
    Log(LogReporter),
}

impl Reporter {
    pub fn for_format(format: OutputFormat, masker: Masker) -> Self {
        match format {
            OutputFormat::Text => Reporter::Text(TextReporter::new(masker)),
            OutputFormat::Json => Reporter::Log(LogReporter::new(masker)),
        }
    }

    fn inner(&self) -> &dyn ProgressReporter {
        match self {
            Reporter::Text(r) => r,
            Reporter::Log(r) => r,
        }
    }
}

impl ProgressReporter for Reporter {
    fn step(&self, title: &str) {
        self.inner().step(title);
    }

    fn success(&self, message: &str) {
        self.inner().success(message);
    }

    fn warning(&self, message: &str) {
        self.inner().warning(message);
    }

    fn failure(&self, message: &str) {
        self.inner().failure(message);
    }

    fn detail(&self, label: &str, value: &str) {
        self.inner().detail(label, value);
    }
}

/// Serialize `value`, mask it, and render it as pretty JSON
pub fn render_json<T: Serialize>(value: &T, masker: Masker) -> Result<String> {
    let doc = serde_json::to_value(value)?;
    Ok(serde_json::to_string_pretty(&masker.mask_json(&doc))?)
}

/// Print a single JSON result document on stdout
pub fn print_json<T: Serialize>(value: &T, masker: Masker) -> Result<()> {
    println!("{}", render_json(value, masker)?);
    Ok(())
}

/// Print a horizontal rule banner, as used around command headers
pub fn banner(title: &str) {
    println!("{}", "=".repeat(60));
    println!("{title}");
    println!("{}", "=".repeat(60));
}
