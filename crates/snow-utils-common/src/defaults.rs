//! Default configuration values shared by every snow-utils tool
//!
//! These constants keep the network, volume and PAT tools consistent with
//! one another when the same objects are touched from different commands.

use std::time::Duration;

/// Default AWS region for bucket and IAM operations
pub const DEFAULT_REGION: &str = "us-west-2";

/// Region that rejects an explicit bucket location constraint
pub const US_EAST_1: &str = "us-east-1";

/// Role used to run DDL when none is configured
pub const DEFAULT_ADMIN_ROLE: &str = "ACCOUNTADMIN";

/// Schema holding network rules created for users
pub const DEFAULT_NETWORK_SCHEMA: &str = "NETWORKS";

/// Schema holding authentication policies
pub const DEFAULT_POLICY_SCHEMA: &str = "POLICIES";

/// Comment attached to network rules and policies without an explicit one
pub const DEFAULT_COMMENT: &str = "Created by snow-utils";

/// Default PAT lifetime in days
pub const DEFAULT_PAT_EXPIRY_DAYS: u32 = 45;

/// Maximum PAT lifetime in days allowed by the authentication policy
pub const DEFAULT_PAT_MAX_EXPIRY_DAYS: u32 = 90;

/// Service-account role checked by the setup tool when no user is known
pub const DEFAULT_SA_ROLE: &str = "SNOW_UTILS_SA";

/// Database checked by the setup tool when no user is known
pub const DEFAULT_SNOW_UTILS_DB: &str = "SNOW_UTILS";

/// Default local configuration file rewritten with fresh tokens
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Placeholder shown in dry-run plans when the AWS account cannot be resolved
pub const ACCOUNT_ID_PLACEHOLDER: &str = "<AWS_ACCOUNT_ID>";

// Backoff used while waiting for IAM eventual consistency

/// Number of checks before giving up and proceeding anyway
pub const WAIT_MAX_ATTEMPTS: u32 = 6;

/// Delay after the first failed check
pub const WAIT_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Upper bound for a single delay
pub const WAIT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Growth factor applied after each failed check
pub const WAIT_FACTOR: f64 = 2.0;

// HTTP timeouts for IP preset endpoints

/// Timeout for the published range lists
pub const PRESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the public IP echo service
pub const LOCAL_IP_TIMEOUT: Duration = Duration::from_secs(10);
