//! Redaction of account ids, IP addresses, ARNs and external ids
//!
//! A [`Masker`] is passed to every reporter and workflow that prints
//! identifiers. Dry-run previews build a disabled masker so users can
//! review the exact values that would be used.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static ACCOUNT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12}$").expect("valid account id regex"));

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)\.([0-9]+)\.[0-9]+\.[0-9]+(/[0-9]+)?$").expect("valid ipv4 regex")
});

static ARN_ACCOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(arn:aws:[^:]+:[^:]*:)([0-9]{12})(:\S+)").expect("valid arn regex")
});

/// Prefix shared by every AWS ARN
pub const ARN_PREFIX: &str = "arn:aws:";

/// Key fragments that mark a JSON field as sensitive
pub const SENSITIVE_KEYS: &[&str] = &["aws", "arn", "account", "external", "ip", "address"];

/// How a value should be interpreted before masking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskKind {
    /// Detect account id, then IP, then ARN
    #[default]
    Auto,
    AccountId,
    Ip,
    Arn,
    ExternalId,
}

/// Masking configuration threaded through output code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Masker {
    enabled: bool,
}

impl Default for Masker {
    fn default() -> Self {
        Self::enabled()
    }
}

impl Masker {
    /// A masker that redacts values
    pub const fn enabled() -> Self {
        Self { enabled: true }
    }

    /// A masker that passes every value through unchanged
    pub const fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Mask a single value according to `kind`
    pub fn mask(self, value: &str, kind: MaskKind) -> String {
        if !self.enabled {
            return value.to_string();
        }
        match kind {
            MaskKind::AccountId => mask_account_id(value),
            MaskKind::Ip => mask_ip(value),
            MaskKind::Arn => mask_arn(value),
            MaskKind::ExternalId => mask_external_id(value),
            MaskKind::Auto => mask_auto(value),
        }
    }

    /// Shorthand for [`MaskKind::Auto`]
    pub fn auto(self, value: &str) -> String {
        self.mask(value, MaskKind::Auto)
    }

    /// Recursively mask string leaves in a JSON document
    pub fn mask_json(self, value: &Value) -> Value {
        if !self.enabled {
            return value.clone();
        }
        mask_json_inner(value, None)
    }
}

fn mask_account_id(value: &str) -> String {
    if ACCOUNT_ID.is_match(value) {
        format!("{}****{}", &value[..4], &value[8..])
    } else {
        value.to_string()
    }
}

fn mask_ip(value: &str) -> String {
    match IPV4.captures(value) {
        Some(caps) => format!(
            "{}.{}.***.***{}",
            &caps[1],
            &caps[2],
            caps.get(3).map_or("", |m| m.as_str())
        ),
        None => value.to_string(),
    }
}

fn mask_arn(value: &str) -> String {
    ARN_ACCOUNT
        .replace_all(value, |caps: &regex::Captures<'_>| {
            format!("{}{}{}", &caps[1], mask_account_id(&caps[2]), &caps[3])
        })
        .into_owned()
}

fn mask_external_id(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 6))
}

fn mask_auto(value: &str) -> String {
    if ACCOUNT_ID.is_match(value) {
        mask_account_id(value)
    } else if IPV4.is_match(value) {
        mask_ip(value)
    } else if value.starts_with(ARN_PREFIX) {
        mask_arn(value)
    } else {
        value.to_string()
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|k| key.contains(k))
}

fn mask_json_inner(value: &Value, parent_key: Option<&str>) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), mask_json_inner(v, Some(k))))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| mask_json_inner(v, parent_key))
                .collect(),
        ),
        Value::String(s) => Value::String(mask_leaf(s, parent_key)),
        other => other.clone(),
    }
}

fn mask_leaf(value: &str, key: Option<&str>) -> String {
    if value.contains(ARN_PREFIX) {
        mask_arn(value)
    } else if ACCOUNT_ID.is_match(value) {
        mask_account_id(value)
    } else if IPV4.is_match(value) {
        mask_ip(value)
    } else if key.is_some_and(is_sensitive_key) && value.chars().count() > 6 {
        mask_external_id(value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const M: Masker = Masker::enabled();

    #[test]
    fn test_account_id() {
        assert_eq!(M.mask("123456789012", MaskKind::AccountId), "1234****9012");
        assert_eq!(M.mask("12345", MaskKind::AccountId), "12345");
    }

    #[test]
    fn test_non_ascii_digits_are_not_identifiers() {
        let devanagari = "\u{0966}".repeat(12);
        assert_eq!(M.auto(&devanagari), devanagari);
        assert_eq!(M.mask(&devanagari, MaskKind::AccountId), devanagari);

        let ip = "\u{0661}.\u{0662}.\u{0663}.\u{0664}";
        assert_eq!(M.mask(ip, MaskKind::Ip), ip);

        let arn = format!("arn:aws:iam::{devanagari}:role/r");
        assert_eq!(M.mask(&arn, MaskKind::Arn), arn);
    }

    #[test]
    fn test_ip_keeps_cidr_suffix() {
        assert_eq!(M.mask("192.168.1.100/32", MaskKind::Ip), "192.168.***.***/32");
        assert_eq!(M.mask("10.0.0.1", MaskKind::Ip), "10.0.***.***");
        assert_eq!(M.mask("not-an-ip", MaskKind::Ip), "not-an-ip");
    }

    #[test]
    fn test_external_id() {
        assert_eq!(M.mask("short", MaskKind::ExternalId), "*****");
        assert_eq!(M.mask("abcdef", MaskKind::ExternalId), "******");
        assert_eq!(M.mask("abc123xyz", MaskKind::ExternalId), "abc***xyz");
    }

    #[test]
    fn test_arn_masks_only_account_segment() {
        assert_eq!(
            M.mask("arn:aws:iam::123456789012:role/my-role", MaskKind::Arn),
            "arn:aws:iam::1234****9012:role/my-role"
        );
        // S3 ARNs carry no account
        assert_eq!(
            M.mask("arn:aws:s3:::bucket/*", MaskKind::Arn),
            "arn:aws:s3:::bucket/*"
        );
    }

    #[test]
    fn test_auto_detection_order() {
        assert_eq!(M.auto("123456789012"), "1234****9012");
        assert_eq!(M.auto("203.0.113.7/32"), "203.0.***.***/32");
        assert_eq!(
            M.auto("arn:aws:iam::210987654321:user/sf"),
            "arn:aws:iam::2109****4321:user/sf"
        );
        assert_eq!(M.auto("MY_VOLUME"), "MY_VOLUME");
    }

    #[test]
    fn test_disabled_passes_through() {
        let m = Masker::disabled();
        assert_eq!(m.mask("123456789012", MaskKind::AccountId), "123456789012");
        let doc = json!({"account_id": "123456789012"});
        assert_eq!(m.mask_json(&doc), doc);
    }

    #[test]
    fn test_mask_json() {
        let doc = json!({
            "status": "success",
            "aws": {
                "bucket": "data-lake",
                "account_id": "123456789012",
                "role_arn": "arn:aws:iam::123456789012:role/r",
            },
            "snowflake": {
                "external_id": "MY_BUCKET_EXT_1A2B3C4D",
                "external_volume": "MY_VOLUME",
            },
            "ip_list": ["10.1.2.3/32", "short"],
            "count": 3,
        });

        let masked = M.mask_json(&doc);
        assert_eq!(masked["status"], "success");
        // Children are judged by their own key, not the parent's
        assert_eq!(masked["aws"]["bucket"], "data-lake");
        assert_eq!(masked["aws"]["account_id"], "1234****9012");
        assert_eq!(masked["aws"]["role_arn"], "arn:aws:iam::1234****9012:role/r");
        assert_eq!(masked["snowflake"]["external_id"], "MY_****************C4D");
        assert_eq!(masked["snowflake"]["external_volume"], "MY_***UME");
        assert_eq!(masked["ip_list"][0], "10.1.***.***/32");
        assert_eq!(masked["ip_list"][1], "short");
        assert_eq!(masked["count"], 3);
    }
}
