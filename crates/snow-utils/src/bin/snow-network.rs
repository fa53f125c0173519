//! snow-network: Snowflake network rules and policies
//!
//! Rules can be filled from IPv4 presets (this machine's public IP,
//! GitHub Actions runners, Google ranges) or explicit values.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use snow_utils::cli::{ConnectionArgs, confirm, finish, init_tracing, split_list};
use snow_utils::config::{ENV_SA_ADMIN_ROLE, ENV_SNOW_UTILS_DB};
use snow_utils::error::PreconditionError;
use snow_utils::network::{IpPresets, NetworkPolicySpec, NetworkReconciler, NetworkRuleSpec, PresetSelection};
use snow_utils::output::{OutputFormat, print_json};
use snow_utils::snow::{DryRunExecutor, SnowCli, SqlExecutor, row_str};
use snow_utils_common::defaults::{DEFAULT_ADMIN_ROLE, DEFAULT_NETWORK_SCHEMA};
use snow_utils_common::{ExitCode, NetworkMode, NetworkType, ProvisioningResult};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "snow-network")]
#[command(about = "Manage Snowflake network rules and policies")]
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

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage network rules
    #[command(subcommand)]
    Rule(RuleCommand),

    /// Manage network policies
    #[command(subcommand)]
    Policy(PolicyCommand),
}

/// Where a rule lives
#[derive(clap::Args, Debug)]
struct RuleLocation {
    /// Network rule name
    #[arg(short, long, env = "NW_RULE_NAME")]
    name: String,

    /// Database for the rule
    #[arg(long, env = ENV_SNOW_UTILS_DB)]
    db: String,

    #[arg(short, long, env = "NW_RULE_SCHEMA", default_value = DEFAULT_NETWORK_SCHEMA)]
    schema: String,
}

impl RuleLocation {
    fn fqn(&self) -> String {
        format!("{}.{}.{}", self.db, self.schema, self.name).to_uppercase()
    }
}

/// Values and IPv4 presets
#[derive(clap::Args, Debug)]
struct ValueArgs {
    /// Comma-separated values (CIDRs, host:port, VPC endpoint ids)
    #[arg(long)]
    values: Option<String>,

    /// Include this machine's public IP (on by default for IPV4)
    #[arg(long, conflicts_with = "no_local")]
    allow_local: bool,

    /// Leave out this machine's public IP
    #[arg(long)]
    no_local: bool,

    /// Include GitHub Actions ranges
    #[arg(short = 'G', long)]
    allow_gh: bool,

    /// Include Google ranges
    #[arg(short = 'g', long)]
    allow_google: bool,
}

impl ValueArgs {
    fn selection(&self, value_type: NetworkType) -> PresetSelection {
        let local = match value_type {
            NetworkType::Ipv4 => !self.no_local,
            _ => self.allow_local,
        };
        PresetSelection {
            local,
            github: self.allow_gh,
            google: self.allow_google,
        }
    }

    /// Resolve the final VALUE_LIST
    async fn resolve(&self, rule: &str, value_type: NetworkType) -> Result<Vec<String>> {
        let extra = self.values.as_deref().map(split_list).unwrap_or_default();
        let selection = self.selection(value_type);
        if selection.any() && value_type != NetworkType::Ipv4 {
            return Err(PreconditionError::PresetsRequireIpv4(value_type).into());
        }
        let values = if selection.any() {
            IpPresets::new()?.collect(selection, &extra).await?
        } else {
            extra
        };
        if values.is_empty() {
            return Err(PreconditionError::NoValues(rule.to_string()).into());
        }
        Ok(values)
    }
}

#[derive(Subcommand, Debug)]
enum RuleCommand {
    /// Create a network rule, optionally with a policy
    Create {
        #[command(flatten)]
        location: RuleLocation,

        #[arg(short, long, default_value_t = NetworkMode::Ingress)]
        mode: NetworkMode,

        #[arg(short = 't', long = "type", default_value_t = NetworkType::Ipv4)]
        value_type: NetworkType,

        #[command(flatten)]
        values: ValueArgs,

        /// Also create or alter this network policy
        #[arg(short, long)]
        policy: Option<String>,

        #[arg(long, value_enum, default_value_t = PolicyMode::Create)]
        policy_mode: PolicyMode,

        /// Replace an existing rule or policy
        #[arg(short, long)]
        force: bool,

        /// Print the SQL instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Replace the values of an existing rule
    Update {
        #[command(flatten)]
        location: RuleLocation,

        #[command(flatten)]
        values: ValueArgs,

        #[arg(long)]
        dry_run: bool,
    },

    /// Delete a network rule
    Delete {
        #[command(flatten)]
        location: RuleLocation,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List network rules in a schema
    List {
        #[arg(long, env = ENV_SNOW_UTILS_DB)]
        db: String,

        #[arg(short, long, env = "NW_RULE_SCHEMA", default_value = DEFAULT_NETWORK_SCHEMA)]
        schema: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum PolicyMode {
    /// Create the policy (replace with --force)
    Create,
    /// Add the rule to an existing policy
    Alter,
}

#[derive(Subcommand, Debug)]
enum PolicyCommand {
    /// Create a network policy
    Create {
        #[arg(short, long)]
        name: String,

        /// Comma-separated fully qualified rule names (db.schema.rule)
        #[arg(short, long)]
        rules: String,

        #[arg(short, long)]
        force: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Add rules to an existing network policy
    Alter {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        rules: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Delete a network policy
    Delete {
        #[arg(short, long)]
        name: String,

        /// Unset the policy from this user first
        #[arg(short, long)]
        user: Option<String>,

        #[arg(short, long)]
        yes: bool,
    },

    /// List network policies
    List,

    /// Assign a network policy to a user
    Assign {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        user: String,
    },
}

impl Command {
    fn dry_run(&self) -> bool {
        match self {
            Command::Rule(RuleCommand::Create { dry_run, .. } | RuleCommand::Update { dry_run, .. }) => *dry_run,
            Command::Policy(PolicyCommand::Create { dry_run, .. } | PolicyCommand::Alter { dry_run, .. }) => {
                *dry_run
            }
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct RuleDetails {
    network_rule: String,
    mode: NetworkMode,
    #[serde(rename = "type")]
    value_type: NetworkType,
    values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_policy: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    init_tracing(args.conn.debug);
    finish(run(args).await)
}

async fn run(args: Args) -> Result<ExitCode> {
    if args.command.dry_run() {
        let exec = DryRunExecutor::new();
        let doc = execute(&exec, &args).await?;
        match args.conn.output {
            OutputFormat::Json => {
                let mut result = ProvisioningResult::dry_run(doc);
                if let Value::Object(map) = &mut result.details {
                    map.insert("sql".into(), Value::String(exec.plan()));
                }
                print_json(&result, args.conn.masker())?;
            }
            OutputFormat::Text => {
                println!("SQL that would be executed:");
                println!("{}", "─".repeat(60));
                println!("{}", exec.plan());
            }
        }
        return Ok(ExitCode::Success);
    }

    let exec = SnowCli::new(args.conn.snow_options());
    let doc = execute(&exec, &args).await?;
    if args.conn.output == OutputFormat::Json {
        print_json(&ProvisioningResult::success(doc), args.conn.masker())?;
    }
    Ok(ExitCode::Success)
}

/// Run the command against `exec`, printing text progress, and return the
/// JSON details
async fn execute<E: SqlExecutor>(exec: &E, args: &Args) -> Result<Value> {
    let network = NetworkReconciler::new(exec, args.admin_role.clone());
    let text = args.conn.output == OutputFormat::Text && !args.command.dry_run();
    let say = |msg: String| {
        if text {
            println!("{msg}");
        }
    };

    match &args.command {
        Command::Rule(RuleCommand::Create {
            location,
            mode,
            value_type,
            values,
            policy,
            policy_mode,
            force,
            ..
        }) => {
            let name = location.name.to_uppercase();
            let resolved = values.resolve(&name, *value_type).await?;
            info!(rule = %name, mode = %mode, value_type = %value_type, count = resolved.len(), "Creating network rule");
            let spec = NetworkRuleSpec {
                name,
                database: location.db.to_uppercase(),
                schema: location.schema.to_uppercase(),
                mode: *mode,
                value_type: *value_type,
                values: resolved.clone(),
                comment: None,
            };
            let fqn = network.create_rule(&spec, *force).await?;
            say(format!("✓ Created rule: {fqn}"));

            let policy = match policy {
                Some(policy) => {
                    let policy = policy.to_uppercase();
                    match policy_mode {
                        PolicyMode::Alter => {
                            network.alter_policy(&policy, std::slice::from_ref(&fqn)).await?;
                            say(format!("✓ Updated policy: {policy}"));
                        }
                        PolicyMode::Create => {
                            let spec = NetworkPolicySpec {
                                name: policy.clone(),
                                rules: vec![fqn.clone()],
                                comment: None,
                            };
                            network.create_policy(&spec, *force).await?;
                            say(format!("✓ Created policy: {policy}"));
                        }
                    }
                    Some(policy)
                }
                None => None,
            };

            Ok(serde_json::to_value(RuleDetails {
                network_rule: fqn,
                mode: *mode,
                value_type: *value_type,
                values: resolved,
                network_policy: policy,
            })?)
        }

        Command::Rule(RuleCommand::Update { location, values, .. }) => {
            let fqn = location.fqn();
            let resolved = values.resolve(&fqn, NetworkType::Ipv4).await?;
            network.update_rule(&fqn, &resolved).await?;
            say(format!("✓ Updated rule: {fqn} ({} values)", resolved.len()));
            Ok(json!({"network_rule": fqn, "values": resolved}))
        }

        Command::Rule(RuleCommand::Delete { location, yes }) => {
            let fqn = location.fqn();
            confirm(&format!("Delete network rule {fqn}?"), *yes)?;
            network.delete_rule(&fqn).await?;
            say(format!("✓ Deleted: {fqn}"));
            Ok(json!({"network_rule": fqn}))
        }

        Command::Rule(RuleCommand::List { db, schema }) => {
            let rows = network
                .list_rules(&db.to_uppercase(), &schema.to_uppercase())
                .await?;
            if text {
                println!("Network rules in {}.{}:", db.to_uppercase(), schema.to_uppercase());
                if rows.is_empty() {
                    println!("  (none)");
                }
                for row in &rows {
                    println!(
                        "  {} ({}, {})",
                        row_str(row, "name").unwrap_or("N/A"),
                        row_str(row, "mode").unwrap_or("N/A"),
                        row_str(row, "type").unwrap_or("N/A"),
                    );
                }
            }
            Ok(json!({"network_rules": rows}))
        }

        Command::Policy(PolicyCommand::Create {
            name, rules, force, ..
        }) => {
            let spec = NetworkPolicySpec {
                name: name.to_uppercase(),
                rules: split_list(&rules.to_uppercase()),
                comment: None,
            };
            let policy = network.create_policy(&spec, *force).await?;
            say(format!("✓ Created: {policy}"));
            Ok(json!({"network_policy": policy, "rules": spec.rules}))
        }

        Command::Policy(PolicyCommand::Alter { name, rules, .. }) => {
            let policy = name.to_uppercase();
            let rules = split_list(&rules.to_uppercase());
            network.alter_policy(&policy, &rules).await?;
            say(format!("✓ Updated: {policy}"));
            Ok(json!({"network_policy": policy, "rules": rules}))
        }

        Command::Policy(PolicyCommand::Delete { name, user, yes }) => {
            let policy = name.to_uppercase();
            confirm(&format!("Delete network policy {policy}?"), *yes)?;
            network.delete_policy(&policy, user.as_deref()).await?;
            say(format!("✓ Deleted: {policy}"));
            Ok(json!({"network_policy": policy}))
        }

        Command::Policy(PolicyCommand::List) => {
            let rows = network.list_policies().await?;
            if text {
                println!("Network policies:");
                if rows.is_empty() {
                    println!("  (none)");
                }
                for row in &rows {
                    println!("  {}", row_str(row, "name").unwrap_or("N/A"));
                }
            }
            Ok(json!({"network_policies": rows}))
        }

        Command::Policy(PolicyCommand::Assign { name, user }) => {
            let (policy, user) = (name.to_uppercase(), user.to_uppercase());
            network.assign_policy(&policy, &user).await?;
            say(format!("✓ Assigned {policy} to {user}"));
            Ok(json!({"network_policy": policy, "user": user}))
        }
    }
}
