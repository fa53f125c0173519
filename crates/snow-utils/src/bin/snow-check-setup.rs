//! snow-check-setup: pre-flight check for the snow-utils role and database
//!
//! Exit codes: 0 ready, 1 missing (or setup failed), 2 error during check.

use anyhow::Result;
use clap::Parser;
use snow_utils::cli::{ConnectionArgs, finish, init_tracing};
use snow_utils::config::{ENV_SA_ROLE, ENV_SNOW_UTILS_DB, ENV_SNOWFLAKE_USER};
use snow_utils::output::print_json;
use snow_utils::setup_check::{SetupChecker, suggested_names};
use snow_utils::snow::SnowCli;
use snow_utils_common::ExitCode;
use snow_utils_common::defaults::{DEFAULT_NETWORK_SCHEMA, DEFAULT_POLICY_SCHEMA};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "snow-check-setup")]
#[command(about = "Check that the snow-utils role and database exist")]
#[command(version)]
struct Args {
    #[command(flatten)]
    conn: ConnectionArgs,

    /// Service role to check (defaults to <SNOWFLAKE_USER>_SNOW_UTILS_SA)
    #[arg(short, long, env = ENV_SA_ROLE)]
    role: Option<String>,

    /// Database to check (defaults to <SNOWFLAKE_USER>_SNOW_UTILS)
    #[arg(short, long, env = ENV_SNOW_UTILS_DB)]
    database: Option<String>,

    /// Snowflake user the defaults are derived from
    #[arg(long, env = ENV_SNOWFLAKE_USER)]
    snowflake_user: Option<String>,

    /// Print suggested names and readiness as JSON, always exit 0
    #[arg(long)]
    suggest: bool,

    /// Create the role, database and schemas if missing
    #[arg(long)]
    run_setup: bool,

    /// Only report through the exit code
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    init_tracing(args.conn.debug);
    finish(run(args).await)
}

async fn run(args: Args) -> Result<ExitCode> {
    let user = args.snowflake_user.as_deref().filter(|u| !u.trim().is_empty());
    let (default_role, default_db) = suggested_names(user);
    let role = args.role.clone().unwrap_or(default_role).to_uppercase();
    let database = args.database.clone().unwrap_or(default_db).to_uppercase();
    let say = |msg: String| {
        if !args.quiet {
            println!("{msg}");
        }
    };

    let exec = SnowCli::new(args.conn.snow_options());
    let checker = SetupChecker::new(&exec);

    if args.suggest {
        let suggestion = checker.suggest(user, &role, &database).await?;
        print_json(&suggestion, args.conn.masker())?;
        return Ok(ExitCode::Success);
    }

    say("Snow-utils infrastructure check\n".to_string());
    if let Some(user) = user {
        say(format!("Detected user: {}", user.to_uppercase()));
    }
    say(format!("  SA_ROLE: {role}"));
    say(format!("  SNOW_UTILS_DB: {database}\n"));

    let status = checker.check(&role, &database).await?;

    if status.ready() {
        say("✓ Infrastructure ready".to_string());
        say(format!("  Database: {database}"));
        say(format!("  Role: {role}"));
        if !checker.user_has_role(&role).await? {
            say(format!("\n⚠ Note: You don't have {role} granted to your user."));
            say(format!("  Run: snow sql -q \"GRANT ROLE {role} TO USER <your_username>\""));
        }
        return Ok(ExitCode::Success);
    }

    say("⚠ Infrastructure not ready".to_string());
    let mark = |ok: bool| if ok { "✓" } else { "✗" };
    say(format!(
        "  {} Database {database} {}",
        mark(status.database_exists),
        if status.database_exists { "exists" } else { "does not exist" }
    ));
    say(format!(
        "  {} Role {role} {}",
        mark(status.role_exists),
        if status.role_exists { "exists" } else { "does not exist" }
    ));

    if !args.run_setup {
        say("\nTo create infrastructure, re-run with --run-setup".to_string());
        return Ok(ExitCode::Precondition);
    }

    say("\nRunning setup with ACCOUNTADMIN...".to_string());
    say(format!("  - Role: {role} (with scoped privileges)"));
    say(format!("  - Database: {database}"));
    say(format!(
        "  - Schemas: {database}.{DEFAULT_NETWORK_SCHEMA}, {database}.{DEFAULT_POLICY_SCHEMA}"
    ));

    match checker.run_setup(&role, &database).await {
        Ok(()) => {
            say("\n✓ Setup complete!".to_string());
            Ok(ExitCode::Success)
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Setup failed");
            say("\n✗ Setup failed".to_string());
            Ok(ExitCode::Precondition)
        }
    }
}
