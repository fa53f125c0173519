//! AWS resource tag constants for snow-utils
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `snow-utils:tool` | Static identifier ("snow-utils") |
//! | `snow-utils:created-at` | RFC 3339 creation timestamp |
//! | `snow-utils:prefix` | Name prefix used for the run (optional) |

/// Tag key for tool identification
pub const TAG_TOOL: &str = "snow-utils:tool";

/// Tag value for tool identification
pub const TAG_TOOL_VALUE: &str = "snow-utils";

/// Tag key for creation timestamp (RFC 3339 format)
pub const TAG_CREATED_AT: &str = "snow-utils:created-at";

/// Tag key for the naming prefix
pub const TAG_PREFIX: &str = "snow-utils:prefix";

/// Format a creation timestamp for tags
pub fn format_created_at(time: chrono::DateTime<chrono::Utc>) -> String {
    time.to_rfc3339()
}

/// Standard tag set for a resource created now
pub fn standard_tags(prefix: Option<&str>) -> Vec<(&'static str, String)> {
    let mut tags = vec![
        (TAG_TOOL, TAG_TOOL_VALUE.to_string()),
        (TAG_CREATED_AT, format_created_at(chrono::Utc::now())),
    ];
    if let Some(p) = prefix {
        tags.push((TAG_PREFIX, p.to_string()));
    }
    tags
}
