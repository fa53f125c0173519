//! Plumbing shared by the binaries: connection flags, logging, error
//! reporting, exit codes and confirmation prompts

use crate::config::{ENV_DEFAULT_CONNECTION, ServiceCredentials, SnowCliOptions};
use crate::error::PreconditionError;
use crate::output::OutputFormat;
use snow_utils_common::naming::NamingError;
use snow_utils_common::{ExitCode, InvalidModeType, Masker};
use std::io::{BufRead, IsTerminal, Write};

/// Connection and verbosity flags accepted by every tool
#[derive(clap::Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Named snow CLI connection
    #[arg(short = 'c', long, global = true, env = ENV_DEFAULT_CONNECTION)]
    pub connection: Option<String>,

    /// Ignore SA_PAT and use the named connection
    #[arg(long, global = true)]
    pub user_connection: bool,

    /// Log every statement and forward --debug to snow
    #[arg(long, global = true)]
    pub debug: bool,

    /// Forward --verbose to snow
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print account ids, IPs and ARNs unredacted
    #[arg(long, global = true)]
    pub no_mask: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

impl ConnectionArgs {
    pub fn snow_options(&self) -> SnowCliOptions {
        SnowCliOptions {
            connection: self.connection.clone(),
            verbose: self.verbose,
            debug: self.debug,
            force_user_connection: self.user_connection,
            credentials: ServiceCredentials::from_env(),
        }
    }

    pub fn masker(&self) -> Masker {
        if self.no_mask {
            Masker::disabled()
        } else {
            Masker::enabled()
        }
    }
}

/// Install the stderr subscriber
///
/// `RUST_LOG` still wins for targets it names.
pub fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    for target in ["aws_config", "aws_sdk_iam", "aws_sdk_s3", "aws_sdk_sts", "aws_smithy_runtime", "hyper", "reqwest"] {
        if let Ok(directive) = format!("{target}=warn").parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print error in a user-friendly way
pub fn print_error(e: &anyhow::Error) {
    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    // Only print backtrace hint if not already showing
    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// Classify an error that escaped a command
pub fn exit_code_for(e: &anyhow::Error) -> ExitCode {
    if let Some(pre) = e.downcast_ref::<PreconditionError>() {
        return match pre {
            PreconditionError::NeedsConfirmation => ExitCode::NeedsConfirmation,
            _ => ExitCode::Precondition,
        };
    }
    if e.downcast_ref::<InvalidModeType>().is_some() || e.downcast_ref::<NamingError>().is_some() {
        return ExitCode::Precondition;
    }
    ExitCode::Error
}

/// Report `result` and turn it into the process exit status
pub fn finish(result: anyhow::Result<ExitCode>) -> std::process::ExitCode {
    match result {
        Ok(code) => code.into(),
        Err(e) => {
            print_error(&e);
            exit_code_for(&e).into()
        }
    }
}

/// Ask for confirmation before a destructive action
///
/// `yes` skips the prompt. Without a terminal on stdin there is nobody to
/// ask, so the caller gets [`PreconditionError::NeedsConfirmation`].
pub fn confirm(prompt: &str, yes: bool) -> Result<(), PreconditionError> {
    if yes {
        return Ok(());
    }
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Err(PreconditionError::NeedsConfirmation);
    }
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{prompt} [y/N]: ");
    let _ = stderr.flush();

    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        return Err(PreconditionError::Declined);
    }
    if is_yes(&answer) {
        Ok(())
    } else {
        Err(PreconditionError::Declined)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Split a comma-separated flag value, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
