use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Environment that could switch the tools into service-account mode or
/// change defaults
const SCRUBBED_ENV: &[&str] = &[
    "SA_PAT",
    "SA_USER",
    "SA_ROLE",
    "SA_ADMIN_ROLE",
    "SNOW_UTILS_DB",
    "SNOWFLAKE_ACCOUNT",
    "SNOWFLAKE_USER",
    "SNOWFLAKE_DEFAULT_CONNECTION_NAME",
    "EXTVOLUME_PREFIX",
    "NW_RULE_NAME",
    "NW_RULE_SCHEMA",
    "PAT_NAME",
];

fn tool(cmd: Command) -> Command {
    let mut cmd = cmd;
    for key in SCRUBBED_ENV {
        cmd.env_remove(key);
    }
    cmd.env("RUST_LOG", "error");
    cmd
}

fn network() -> Command {
    tool(cargo_bin_cmd!("snow-network").into())
}

fn extvolume() -> Command {
    tool(cargo_bin_cmd!("snow-extvolume").into())
}

fn pat() -> Command {
    tool(cargo_bin_cmd!("snow-pat").into())
}

// --- Binary startup ---

#[test]
fn binaries_run() {
    for (mut cmd, name) in [
        (network(), "snow-network"),
        (extvolume(), "snow-extvolume"),
        (pat(), "snow-pat"),
        (tool(cargo_bin_cmd!("snow-check-setup").into()), "snow-check-setup"),
    ] {
        cmd.arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(name));
    }
}

// --- snow-network ---

#[test]
fn network_rule_create_dry_run_prints_sql() {
    network()
        .args([
            "rule", "create", "--name", "dev_rule", "--db", "my_db", "--no-local", "--values",
            "10.0.0.1/32, 192.0.2.0/24", "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("USE ROLE ACCOUNTADMIN;"))
        .stdout(predicate::str::contains(
            "CREATE NETWORK RULE IF NOT EXISTS MY_DB.NETWORKS.DEV_RULE",
        ))
        .stdout(predicate::str::contains(
            "VALUE_LIST = ('10.0.0.1/32', '192.0.2.0/24')",
        ));
}

#[test]
fn network_rule_create_with_policy_json() {
    let output = network()
        .args([
            "rule", "create", "--name", "ci_rule", "--db", "my_db", "--no-local", "--values",
            "10.0.0.1/32", "--policy", "ci_policy", "--dry-run", "-o", "json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let doc: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(doc["status"], "dry_run");
    assert_eq!(doc["network_rule"], "MY_DB.NETWORKS.CI_RULE");
    assert_eq!(doc["network_policy"], "CI_POLICY");
    let sql = doc["sql"].as_str().unwrap();
    assert!(sql.contains("CREATE NETWORK POLICY IF NOT EXISTS CI_POLICY"));
}

#[test]
fn network_rule_create_rejects_invalid_mode_type() {
    network()
        .args([
            "rule", "create", "--name", "r", "--db", "d", "--mode", "ingress", "--type",
            "host_port", "--values", "api.example.com:443", "--dry-run",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid type 'HOST_PORT' for mode 'INGRESS'"));
}

#[test]
fn network_rule_create_rejects_presets_for_host_port() {
    network()
        .args([
            "rule", "create", "--name", "r", "--db", "d", "--mode", "egress", "--type",
            "host_port", "--allow-gh", "--values", "api.example.com:443", "--dry-run",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("require type IPV4"));
}

#[test]
fn network_rule_create_requires_values() {
    network()
        .args(["rule", "create", "--name", "r", "--db", "d", "--no-local", "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No values for network rule"));
}

#[test]
fn network_delete_without_terminal_needs_confirmation() {
    network()
        .args(["policy", "delete", "--name", "p"])
        .write_stdin("")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--yes"));
}

// --- snow-pat ---

#[test]
fn pat_create_dry_run_prints_every_step() {
    pat()
        .args([
            "create", "--user", "svc", "--role", "demo_role", "--db", "snow_utils", "--no-local",
            "--extra-values", "10.0.0.1/32", "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE USER IF NOT EXISTS SVC"))
        .stdout(predicate::str::contains(
            "CREATE OR REPLACE NETWORK RULE SNOW_UTILS.NETWORKS.SVC_NETWORK_RULE",
        ))
        .stdout(predicate::str::contains(
            "CREATE OR ALTER AUTHENTICATION POLICY SNOW_UTILS.POLICIES.SVC_AUTH_POLICY",
        ))
        .stdout(predicate::str::contains(
            "ALTER USER IF EXISTS SVC ADD PAT SVC_PAT ROLE_RESTRICTION = DEMO_ROLE",
        ));
}

#[test]
fn pat_create_dry_run_json() {
    let output = pat()
        .args([
            "create", "--user", "svc", "--role", "demo_role", "--no-local", "--extra-values",
            "10.0.0.1/32", "--dry-run", "-o", "json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let doc: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(doc["status"], "dry_run");
    assert_eq!(doc["pat_name"], "SVC_PAT");
    assert_eq!(doc["database"], "SNOW_UTILS");
    assert_eq!(doc["resources"]["auth_policy"], "SNOW_UTILS.POLICIES.SVC_AUTH_POLICY");
    assert_eq!(doc["cidrs"][0], "10.0.0.1/32");
    assert!(doc.get("token").is_none());
}

#[test]
fn pat_verify_without_token_fails_early() {
    let tmp = TempDir::new().unwrap();
    pat()
        .current_dir(tmp.path())
        .args(["verify", "--user", "svc", "--role", "demo_role"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No token available"));
}

// --- snow-extvolume ---

#[test]
fn extvolume_rejects_dotted_bucket() {
    extvolume()
        .args(["create", "--bucket", "my.bucket", "--no-prefix", "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot contain dots"));
}

#[test]
fn extvolume_update_trust_needs_target() {
    extvolume()
        .args(["update-trust"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--role-name and --volume-name"));
}

#[test]
fn extvolume_delete_without_terminal_needs_confirmation() {
    extvolume()
        .args(["delete", "--bucket", "lake", "--no-prefix"])
        .write_stdin("")
        .assert()
        .code(3);
}
