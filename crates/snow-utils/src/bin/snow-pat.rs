//! snow-pat: programmatic access tokens for Snowflake service users
//!
//! A PAT is only issued behind a network policy and a PAT-only
//! authentication policy. The token is written to a `.env` file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use snow_utils::cli::{ConnectionArgs, confirm, finish, init_tracing, split_list};
use snow_utils::config::{ENV_SA_ADMIN_ROLE, ENV_SA_PAT, ENV_SA_ROLE, ENV_SA_USER, ENV_SNOW_UTILS_DB};
use snow_utils::env_file;
use snow_utils::error::PreconditionError;
use snow_utils::network::presets::{dedup_preserving_order, local_cidr};
use snow_utils::network::{IpPresets, PresetSelection};
use snow_utils::output::{OutputFormat, ProgressReporter, Reporter, banner, print_json};
use snow_utils::pat::{IssuedPat, PatConfig, PatManager, PatResources};
use snow_utils::snow::{DryRunExecutor, SnowCli, SqlExecutor};
use snow_utils_common::defaults::{
    DEFAULT_ADMIN_ROLE, DEFAULT_ENV_FILE, DEFAULT_PAT_EXPIRY_DAYS, DEFAULT_PAT_MAX_EXPIRY_DAYS,
    DEFAULT_SNOW_UTILS_DB,
};
use snow_utils_common::{ExitCode, Masker, ProvisioningResult, ProvisioningStatus};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "snow-pat")]
#[command(about = "Manage programmatic access tokens for Snowflake service users")]
#[command(version)]
struct Args {
    #[command(flatten)]
    conn: ConnectionArgs,

    /// Role used for DDL
    #[arg(short = 'a', long, global = true, env = ENV_SA_ADMIN_ROLE, default_value = DEFAULT_ADMIN_ROLE)]
    admin_role: String,

    #[command(subcommand)]
    command: Command,
}

/// The service user and where its objects live
#[derive(clap::Args, Debug)]
struct UserArgs {
    /// Service user name
    #[arg(short, long, env = ENV_SA_USER)]
    user: String,

    /// Database holding the NETWORKS and POLICIES schemas
    #[arg(short = 'd', long, env = ENV_SNOW_UTILS_DB, default_value = DEFAULT_SNOW_UTILS_DB)]
    db: String,

    /// PAT name (defaults to <USER>_PAT)
    #[arg(long, env = "PAT_NAME")]
    pat_name: Option<String>,

    /// File the token is written to
    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the service user, network and authentication policies, and a PAT
    Create {
        #[command(flatten)]
        target: UserArgs,

        /// Role the PAT is restricted to
        #[arg(short, long, env = ENV_SA_ROLE)]
        role: String,

        /// Issue a new PAT instead of rotating an existing one
        #[arg(long)]
        no_rotate: bool,

        /// Use this IP instead of detecting the public one
        #[arg(long)]
        local_ip: Option<String>,

        /// Leave this machine's IP out of the network rule
        #[arg(long, conflicts_with = "local_ip")]
        no_local: bool,

        /// Include GitHub Actions ranges
        #[arg(long)]
        allow_gh: bool,

        /// Include Google ranges
        #[arg(long)]
        allow_google: bool,

        /// Additional comma-separated CIDRs
        #[arg(long)]
        extra_values: Option<String>,

        #[arg(long, default_value_t = DEFAULT_PAT_EXPIRY_DAYS)]
        default_expiry_days: u32,

        #[arg(long, default_value_t = DEFAULT_PAT_MAX_EXPIRY_DAYS)]
        max_expiry_days: u32,

        #[arg(long)]
        skip_verify: bool,

        /// Print the SQL instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Rotate an existing PAT, keeping policies
    Rotate {
        #[command(flatten)]
        target: UserArgs,

        #[arg(short, long, env = ENV_SA_ROLE)]
        role: String,

        #[arg(long)]
        skip_verify: bool,
    },

    /// Remove the PAT and its policies
    Remove {
        #[command(flatten)]
        target: UserArgs,

        /// Only remove the PAT, keep network and authentication policies
        #[arg(long)]
        pat_only: bool,

        /// Also drop the service user
        #[arg(long)]
        drop_user: bool,

        #[arg(short, long)]
        yes: bool,
    },

    /// Log in with the PAT and run a trivial query
    Verify {
        #[command(flatten)]
        target: UserArgs,

        #[arg(short, long, env = ENV_SA_ROLE)]
        role: String,

        /// Token to test (defaults to SA_PAT, then the .env file)
        #[arg(short, long, env = ENV_SA_PAT, hide_env_values = true)]
        password: Option<String>,
    },
}

#[derive(Serialize)]
struct PatDetails {
    user: String,
    pat_name: String,
    pat_role: String,
    admin_role: String,
    database: String,
    resources: PatResources,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_ip: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cidrs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    env_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<String>,
}

impl PatDetails {
    fn new(config: &PatConfig) -> Self {
        Self {
            user: config.user.clone(),
            pat_name: config.pat_name.clone(),
            pat_role: config.role.clone(),
            admin_role: config.admin_role.clone(),
            database: config.database.clone(),
            resources: config.resources(),
            local_ip: None,
            cidrs: Vec::new(),
            env_file: None,
            sql: None,
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    init_tracing(args.conn.debug);
    finish(run(args).await)
}

fn pat_config(args: &Args, target: &UserArgs, role: &str) -> PatConfig {
    let mut config = PatConfig::new(target.user.to_uppercase(), role.to_uppercase(), target.db.to_uppercase());
    if let Some(name) = &target.pat_name {
        config.pat_name = name.to_uppercase();
    }
    config.admin_role = args.admin_role.clone();
    config
}

fn header(args: &Args, title: &str, config: &PatConfig) {
    if args.conn.output == OutputFormat::Text {
        banner(title);
        println!("User:     {}", config.user);
        println!("Role:     {}", config.role);
        println!("Database: {}", config.database);
        println!("PAT Name: {}", config.pat_name);
        println!();
    }
}

/// Write the token and report where it went
fn store(reporter: &Reporter, path: &Path, config: &PatConfig, token: &str) -> Result<()> {
    let backup = env_file::store_credentials(path, &config.user, token, &config.role)?;
    if let Some(backup) = backup {
        reporter.success(&format!("Backed up {} to {}", path.display(), backup.display()));
    }
    reporter.success(&format!("Updated {}", path.display()));
    Ok(())
}

async fn verify_token<E: SqlExecutor>(manager: &PatManager<'_, E, Reporter>, skip: bool, token: &str) -> Result<()> {
    if skip {
        return Ok(());
    }
    manager.verify(token).await
}

async fn run(args: Args) -> Result<ExitCode> {
    let masker = args.conn.masker();
    let json_output = args.conn.output == OutputFormat::Json;
    let reporter = Reporter::for_format(args.conn.output, masker);

    match &args.command {
        Command::Create {
            target,
            role,
            no_rotate,
            local_ip,
            no_local,
            allow_gh,
            allow_google,
            extra_values,
            default_expiry_days,
            max_expiry_days,
            skip_verify,
            dry_run,
        } => {
            let mut config = pat_config(&args, target, role);
            config.default_expiry_days = *default_expiry_days;
            config.max_expiry_days = *max_expiry_days;

            let presets = IpPresets::new()?;
            let local = match (local_ip, no_local) {
                (Some(ip), _) => Some(local_cidr(ip)?),
                (None, true) => None,
                (None, false) => Some(presets.local_ip().await?.to_string()),
            };
            let extra = extra_values.as_deref().map(split_list).unwrap_or_default();
            let selection = PresetSelection {
                local: false,
                github: *allow_gh,
                google: *allow_google,
            };
            let mut cidrs: Vec<String> = local.iter().cloned().collect();
            cidrs.extend(presets.collect(selection, &extra).await?);
            let cidrs = dedup_preserving_order(cidrs);
            if cidrs.is_empty() {
                return Err(PreconditionError::NoValues(config.resources().network_rule).into());
            }

            let mut details = PatDetails::new(&config);
            details.local_ip = local;
            details.cidrs = cidrs.clone();

            if *dry_run {
                let exec = DryRunExecutor::new();
                let silent = Reporter::for_format(OutputFormat::Json, Masker::disabled());
                PatManager::new(&exec, &silent, &config)
                    .dry_run(true)
                    .create(&cidrs, !no_rotate)
                    .await?;
                if json_output {
                    details.sql = Some(exec.plan());
                    print_json(&ProvisioningResult::dry_run(details), Masker::disabled())?;
                } else {
                    header(&args, "Snowflake PAT Manager [DRY RUN]", &config);
                    println!("SQL that would be executed:");
                    println!("{}", "─".repeat(60));
                    println!("{}", exec.plan());
                    println!("{}", "─".repeat(60));
                }
                return Ok(ExitCode::Success);
            }

            header(&args, "Snowflake PAT Manager", &config);
            let exec = SnowCli::new(args.conn.snow_options());
            let manager = PatManager::new(&exec, &reporter, &config);
            let (_, IssuedPat { token, .. }) = manager.create(&cidrs, !no_rotate).await?;
            let token = token.context("No token returned")?;

            reporter.step("Step 5: Update .env");
            store(&reporter, &target.env_file, &config, &token)?;
            details.env_file = Some(target.env_file.display().to_string());

            if !skip_verify {
                reporter.step("Step 6: Verify connection");
            }
            verify_token(&manager, *skip_verify, &token).await?;

            if json_output {
                print_json(&ProvisioningResult::success(details).with_token(token), masker)?;
            } else {
                banner("✓ PAT setup completed successfully!");
            }
            Ok(ExitCode::Success)
        }

        Command::Rotate {
            target,
            role,
            skip_verify,
        } => {
            let config = pat_config(&args, target, role);
            header(&args, "Snowflake PAT Manager - Rotate", &config);
            let exec = SnowCli::new(args.conn.snow_options());
            let manager = PatManager::new(&exec, &reporter, &config);
            let token = manager.rotate().await?.token.context("No token returned")?;

            store(&reporter, &target.env_file, &config, &token)?;
            verify_token(&manager, *skip_verify, &token).await?;

            if json_output {
                let mut details = PatDetails::new(&config);
                details.env_file = Some(target.env_file.display().to_string());
                print_json(
                    &ProvisioningResult::with_status(ProvisioningStatus::Rotated, details).with_token(token),
                    masker,
                )?;
            } else {
                banner("✓ PAT rotated successfully!");
            }
            Ok(ExitCode::Success)
        }

        Command::Remove {
            target,
            pat_only,
            drop_user,
            yes,
        } => {
            let config = pat_config(&args, target, "");
            let what = if *pat_only { "PAT" } else { "PAT and associated objects" };
            confirm(&format!("Remove {what} for {}?", config.user), *yes)?;

            let exec = SnowCli::new(args.conn.snow_options());
            PatManager::new(&exec, &reporter, &config)
                .remove(*pat_only, *drop_user)
                .await?;

            reporter.step("Clear .env credentials");
            if env_file::clear_token(&target.env_file)? {
                reporter.success(&format!("Cleared token in {}", target.env_file.display()));
            } else {
                reporter.warning(&format!("{} not found", target.env_file.display()));
            }

            if json_output {
                let mut details = PatDetails::new(&config);
                details.env_file = Some(target.env_file.display().to_string());
                print_json(
                    &ProvisioningResult::with_status(ProvisioningStatus::Removed, details),
                    masker,
                )?;
            } else {
                banner("✓ PAT removal completed!");
            }
            Ok(ExitCode::Success)
        }

        Command::Verify {
            target,
            role,
            password,
        } => {
            let config = pat_config(&args, target, role);
            let token = match password.as_deref().filter(|p| !p.is_empty()) {
                Some(token) => token.to_string(),
                None => {
                    let stored = env_file::read_token(&target.env_file)?.filter(|t| !t.is_empty());
                    match stored {
                        Some(token) => {
                            reporter.success(&format!("Using token from {}", target.env_file.display()));
                            token
                        }
                        None => return Err(PreconditionError::MissingToken.into()),
                    }
                }
            };

            let exec = SnowCli::new(args.conn.snow_options());
            PatManager::new(&exec, &reporter, &config).verify(&token).await?;
            if json_output {
                print_json(&ProvisioningResult::success(PatDetails::new(&config)), masker)?;
            }
            Ok(ExitCode::Success)
        }
    }
}
