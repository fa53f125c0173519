//! snow-extvolume: S3-backed Snowflake external volumes
//!
//! Creates the bucket, IAM policy and role, the external volume, and wires
//! the role's trust to the IAM user Snowflake assigns to the volume.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use snow_utils::aws::{AwsCloud, CloudApi};
use snow_utils::cli::{ConnectionArgs, confirm, finish, init_tracing};
use snow_utils::config::{ENV_AWS_REGION, ENV_EXTVOLUME_PREFIX};
use snow_utils::error::PreconditionError;
use snow_utils::output::{OutputFormat, ProgressReporter, Reporter, banner, print_json};
use snow_utils::snow::{SnowCli, row_str};
use snow_utils::volume::plan::render_create_plan;
use snow_utils::volume::{
    CreateOptions, ExternalVolumeConfig, VolumeOverrides, VolumeReconciler, VolumeWorkflow,
    resolve_prefix,
};
use snow_utils_common::defaults::{ACCOUNT_ID_PLACEHOLDER, DEFAULT_REGION};
use snow_utils_common::{ExitCode, Masker, ProvisioningResult, ProvisioningStatus};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "snow-extvolume")]
#[command(about = "Manage Snowflake external volumes backed by S3")]
#[command(version)]
struct Args {
    #[command(flatten)]
    conn: ConnectionArgs,

    /// AWS region
    #[arg(long, global = true, env = ENV_AWS_REGION, default_value = DEFAULT_REGION)]
    region: String,

    /// Prefix for derived names (defaults to the OS user name)
    #[arg(long, global = true, env = ENV_EXTVOLUME_PREFIX)]
    prefix: Option<String>,

    /// Use names exactly as derived from the bucket
    #[arg(long, global = true)]
    no_prefix: bool,

    #[command(subcommand)]
    command: Command,
}

/// Explicit names overriding the derived defaults
#[derive(clap::Args, Debug)]
struct NameArgs {
    #[arg(long)]
    role_name: Option<String>,

    #[arg(long)]
    policy_name: Option<String>,

    #[arg(long)]
    volume_name: Option<String>,

    #[arg(long)]
    storage_location: Option<String>,

    #[arg(long)]
    external_id: Option<String>,
}

impl NameArgs {
    fn overrides(&self) -> VolumeOverrides {
        VolumeOverrides {
            role_name: self.role_name.clone(),
            policy_name: self.policy_name.clone(),
            volume_name: self.volume_name.clone(),
            storage_location: self.storage_location.clone(),
            external_id: self.external_id.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create bucket, IAM policy and role, and the external volume
    Create {
        /// Base bucket name (no dots)
        #[arg(short, long)]
        bucket: String,

        #[command(flatten)]
        names: NameArgs,

        /// Create a read-only volume
        #[arg(long)]
        no_writes: bool,

        /// Replace an existing external volume
        #[arg(short, long)]
        force: bool,

        /// Print the plan instead of running it
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        skip_verify: bool,
    },

    /// Drop the volume and delete the role and policy
    Delete {
        #[arg(short, long)]
        bucket: String,

        #[command(flatten)]
        names: NameArgs,

        /// Also delete the S3 bucket
        #[arg(long)]
        delete_bucket: bool,

        /// Empty a versioned bucket before deleting it
        #[arg(short, long)]
        force: bool,

        #[arg(short, long)]
        yes: bool,
    },

    /// Run SYSTEM$VERIFY_EXTERNAL_VOLUME
    Verify {
        #[arg(long)]
        volume_name: Option<String>,

        #[arg(short, long)]
        bucket: Option<String>,
    },

    /// Show DESC EXTERNAL VOLUME
    Describe {
        #[arg(long)]
        volume_name: Option<String>,

        #[arg(short, long)]
        bucket: Option<String>,
    },

    /// Re-sync the role's trust policy with the volume's IAM user
    UpdateTrust {
        #[arg(short, long)]
        bucket: Option<String>,

        #[arg(long)]
        role_name: Option<String>,

        #[arg(long)]
        volume_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    init_tracing(args.conn.debug);
    finish(run(args).await)
}

fn resolve(args: &Args, bucket: &str, names: VolumeOverrides, allow_writes: bool) -> Result<ExternalVolumeConfig> {
    let prefix = resolve_prefix(args.no_prefix, args.prefix.clone());
    Ok(ExternalVolumeConfig::resolve(
        bucket,
        prefix.as_deref(),
        &args.region,
        allow_writes,
        names,
    )?)
}

/// Volume name from `--volume-name`, or derived from `--bucket`
fn volume_name(args: &Args, volume_name: &Option<String>, bucket: &Option<String>) -> Result<String> {
    match (volume_name, bucket) {
        (Some(name), _) => Ok(name.clone()),
        (None, Some(bucket)) => Ok(resolve(args, bucket, VolumeOverrides::default(), true)?.volume_name),
        (None, None) => Err(PreconditionError::Missing("--volume-name or --bucket").into()),
    }
}

async fn aws_cloud(args: &Args) -> AwsCloud {
    AwsCloud::new(&args.region, resolve_prefix(args.no_prefix, args.prefix.clone())).await
}

fn config_details(config: &ExternalVolumeConfig) -> Result<Map<String, Value>> {
    match serde_json::to_value(config)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let masker = args.conn.masker();
    let json_output = args.conn.output == OutputFormat::Json;

    match &args.command {
        Command::Create {
            bucket,
            names,
            no_writes,
            force,
            dry_run,
            skip_verify,
        } => {
            let config = resolve(&args, bucket, names.overrides(), !no_writes)?;
            let cloud = aws_cloud(&args).await;

            if *dry_run {
                let account = match cloud.account_id().await {
                    Ok(account) => account.to_string(),
                    Err(e) => {
                        warn!(error = %e, "Could not determine AWS account, using placeholder");
                        ACCOUNT_ID_PLACEHOLDER.to_string()
                    }
                };
                let plan = render_create_plan(&config, &account, *force);
                if json_output {
                    let mut details = config_details(&config)?;
                    details.insert("account_id".into(), Value::String(account));
                    details.insert("plan".into(), Value::String(plan));
                    print_json(&ProvisioningResult::dry_run(details), Masker::disabled())?;
                } else {
                    banner("DRY RUN - no changes will be made");
                    print!("{plan}");
                }
                return Ok(ExitCode::Success);
            }

            if !json_output {
                banner(&format!("Creating external volume {}", config.volume_name));
            }
            let exec = SnowCli::new(args.conn.snow_options());
            let reporter = Reporter::for_format(args.conn.output, masker);
            let workflow = VolumeWorkflow::new(&cloud, &exec, &reporter, masker);
            let options = CreateOptions {
                force: *force,
                skip_verify: *skip_verify,
            };

            match workflow.create(&config, options).await {
                Ok(outcome) => {
                    if json_output {
                        let mut details = config_details(&config)?;
                        if let Value::Object(extra) = serde_json::to_value(&outcome)? {
                            details.extend(extra);
                        }
                        print_json(&ProvisioningResult::success(details), masker)?;
                    } else {
                        reporter.success(&format!("External volume {} ready", config.volume_name));
                        reporter.detail("Role ARN", &outcome.role_arn);
                        reporter.detail("Snowflake IAM User ARN", &outcome.storage.iam_user_arn);
                        if !options.skip_verify && !outcome.verified {
                            reporter.warning("Verification did not succeed; re-run `verify` once IAM settles");
                        }
                    }
                    Ok(ExitCode::Success)
                }
                Err(failed) => {
                    if json_output {
                        let mut details = config_details(&config)?;
                        details.insert("state".into(), json!(failed.state));
                        let rollback: Vec<Value> = failed
                            .rollback
                            .iter()
                            .map(|(kind, result)| json!({"resource": kind, "result": result}))
                            .collect();
                        details.insert("rollback".into(), Value::Array(rollback));
                        print_json(
                            &ProvisioningResult::failed(details, format!("{:#}", failed.error)),
                            masker,
                        )?;
                    }
                    Err(anyhow::Error::new(failed).context("Failed to create external volume"))
                }
            }
        }

        Command::Delete {
            bucket,
            names,
            delete_bucket,
            force,
            yes,
        } => {
            let config = resolve(&args, bucket, names.overrides(), true)?;
            let mut prompt = format!(
                "Delete external volume {}, IAM role {} and IAM policy {}",
                config.volume_name, config.role_name, config.policy_name
            );
            if *delete_bucket {
                prompt.push_str(&format!(" and S3 bucket {}", config.bucket_name));
            }
            confirm(&format!("{prompt}?"), *yes)?;

            let cloud = aws_cloud(&args).await;
            let exec = SnowCli::new(args.conn.snow_options());
            let reporter = Reporter::for_format(args.conn.output, masker);
            let outcome = VolumeWorkflow::new(&cloud, &exec, &reporter, masker)
                .delete(&config, *delete_bucket, *force)
                .await?;
            if json_output {
                let mut details = config_details(&config)?;
                details.insert("removed".into(), serde_json::to_value(&outcome.removed)?);
                print_json(
                    &ProvisioningResult::with_status(ProvisioningStatus::Removed, details),
                    masker,
                )?;
            }
            Ok(ExitCode::Success)
        }

        Command::Verify { volume_name: name, bucket } => {
            let name = volume_name(&args, name, bucket)?;
            let exec = SnowCli::new(args.conn.snow_options());
            let verification = VolumeReconciler::new(&exec)
                .verify(&name)
                .await
                .with_context(|| format!("Failed to verify external volume {name}"))?;
            let success = verification.as_ref().is_some_and(|v| v.success);
            if json_output {
                let doc = json!({"volume_name": name, "verification": verification});
                let result = if success {
                    ProvisioningResult::success(doc)
                } else {
                    ProvisioningResult::failed(doc, "External volume verification failed")
                };
                print_json(&result, masker)?;
            } else {
                let reporter = Reporter::for_format(args.conn.output, masker);
                match &verification {
                    Some(v) if v.success => reporter.success(&format!("External volume {name} verified")),
                    Some(v) => {
                        reporter.failure(&format!("External volume {name} verification failed"));
                        if let Some(result) = &v.storage_location_selection_result {
                            reporter.detail("storageLocationSelectionResult", result);
                        }
                    }
                    None => reporter.warning("No verification result returned"),
                }
            }
            Ok(if success { ExitCode::Success } else { ExitCode::Error })
        }

        Command::Describe { volume_name: name, bucket } => {
            let name = volume_name(&args, name, bucket)?;
            let exec = SnowCli::new(args.conn.snow_options());
            let rows = VolumeReconciler::new(&exec).describe_rows(&name).await?;
            if json_output {
                print_json(&json!({"volume_name": name, "properties": rows}), masker)?;
            } else {
                banner(&format!("External volume {name}"));
                for row in &rows {
                    println!(
                        "{}: {}",
                        row_str(row, "property").unwrap_or_default(),
                        masker.auto(row_str(row, "property_value").unwrap_or_default())
                    );
                }
            }
            Ok(ExitCode::Success)
        }

        Command::UpdateTrust {
            bucket,
            role_name,
            volume_name,
        } => {
            let (role, volume) = match (bucket, role_name, volume_name) {
                (_, Some(role), Some(volume)) => (role.clone(), volume.clone()),
                (Some(bucket), role, volume) => {
                    let config = resolve(
                        &args,
                        bucket,
                        VolumeOverrides {
                            role_name: role.clone(),
                            volume_name: volume.clone(),
                            ..Default::default()
                        },
                        true,
                    )?;
                    (config.role_name, config.volume_name)
                }
                _ => return Err(PreconditionError::MissingVolumeTarget.into()),
            };
            let cloud = aws_cloud(&args).await;
            let exec = SnowCli::new(args.conn.snow_options());
            let reporter = Reporter::for_format(args.conn.output, masker);
            let storage = VolumeWorkflow::new(&cloud, &exec, &reporter, masker)
                .update_trust(&role, &volume)
                .await?;
            if json_output {
                print_json(
                    &ProvisioningResult::success(json!({
                        "role_name": role,
                        "volume_name": volume,
                        "storage": storage,
                    })),
                    masker,
                )?;
            }
            Ok(ExitCode::Success)
        }
    }
}
