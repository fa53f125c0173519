//! Helpers for snow-utils tests that create real AWS resources
//!
//! Those tests are `#[ignore]`d and need credentials. Every name produced
//! here is unique per call so parallel runs never collide, and every name
//! is a valid S3 bucket base (lowercase, no dots, short enough to take the
//! `-snowflake-policy` suffix and stay within IAM's 64-character limit).

use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Region for live tests: `AWS_REGION`, then `AWS_DEFAULT_REGION`, then us-west-2
pub fn get_test_region() -> String {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "us-west-2".to_string())
}

/// `test-{unix seconds}-{counter}`
pub fn test_run_id() -> String {
    static SEQ: AtomicU32 = AtomicU32::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("test-{}-{seq}", Utc::now().timestamp())
}

/// Bucket base for one test: `snow-utils-test-{unix seconds}-{counter}`
pub fn test_bucket_name() -> String {
    format!("snow-utils-{}", test_run_id())
}
