//! IPv4 CIDR presets: local public IP, GitHub Actions and Google ranges

use anyhow::{Context, Result, bail};
use serde_json::Value;
use snow_utils_common::defaults::{LOCAL_IP_TIMEOUT, PRESET_TIMEOUT};
use std::net::Ipv4Addr;
use tokio::sync::OnceCell;
use tracing::debug;

const GITHUB_META_URL: &str = "https://api.github.com/meta";
const GOOGLE_RANGES_URL: &str = "https://www.gstatic.com/ipranges/goog.json";
const PUBLIC_IP_URL: &str = "https://api.ipify.org";

/// Which presets to include when collecting CIDRs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresetSelection {
    pub local: bool,
    pub github: bool,
    pub google: bool,
}

impl PresetSelection {
    pub fn any(self) -> bool {
        self.local || self.github || self.google
    }
}

/// Fetches preset ranges, caching each one for the lifetime of the value
pub struct IpPresets {
    client: reqwest::Client,
    github: OnceCell<Vec<String>>,
    google: OnceCell<Vec<String>>,
    local: OnceCell<String>,
}

impl IpPresets {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("snow-utils/", env!("CARGO_PKG_VERSION")))
            .timeout(PRESET_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            github: OnceCell::new(),
            google: OnceCell::new(),
            local: OnceCell::new(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch {url}"))?
            .json()
            .await
            .with_context(|| format!("Invalid JSON from {url}"))
    }

    /// GitHub Actions runner IPv4 ranges
    pub async fn github_actions(&self) -> Result<&[String]> {
        let ranges = self
            .github
            .get_or_try_init(|| async {
                let meta = self.get_json(GITHUB_META_URL).await?;
                let ranges = parse_github_actions(&meta);
                debug!(count = ranges.len(), "Fetched GitHub Actions ranges");
                Ok::<_, anyhow::Error>(ranges)
            })
            .await?;
        Ok(ranges)
    }

    /// Google published IPv4 ranges
    pub async fn google(&self) -> Result<&[String]> {
        let ranges = self
            .google
            .get_or_try_init(|| async {
                let doc = self.get_json(GOOGLE_RANGES_URL).await?;
                let ranges = parse_google_ranges(&doc);
                debug!(count = ranges.len(), "Fetched Google ranges");
                Ok::<_, anyhow::Error>(ranges)
            })
            .await?;
        Ok(ranges)
    }

    /// Public IP of this machine as a `/32` CIDR
    pub async fn local_ip(&self) -> Result<&str> {
        let cidr = self
            .local
            .get_or_try_init(|| async {
                let body = self
                    .client
                    .get(PUBLIC_IP_URL)
                    .timeout(LOCAL_IP_TIMEOUT)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("Failed to fetch public IP from {PUBLIC_IP_URL}"))?
                    .text()
                    .await
                    .context("Failed to read response body")?;
                local_cidr(&body)
            })
            .await?;
        Ok(cidr)
    }

    /// Selected presets followed by `extra`, deduplicated in first-seen order
    pub async fn collect(&self, selection: PresetSelection, extra: &[String]) -> Result<Vec<String>> {
        let mut cidrs = Vec::new();
        if selection.local {
            cidrs.push(self.local_ip().await?.to_string());
        }
        if selection.github {
            cidrs.extend_from_slice(self.github_actions().await?);
        }
        if selection.google {
            cidrs.extend_from_slice(self.google().await?);
        }
        cidrs.extend_from_slice(extra);
        Ok(dedup_preserving_order(cidrs))
    }
}

/// IPv4 entries of the `actions` list in GitHub's meta document
pub fn parse_github_actions(meta: &Value) -> Vec<String> {
    meta.get("actions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|cidr| !cidr.contains(':'))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `ipv4Prefix` values from Google's range document
pub fn parse_google_ranges(doc: &Value) -> Vec<String> {
    doc.get("prefixes")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|p| p.get("ipv4Prefix").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Turn an IP echo response body into a `/32` CIDR
pub fn local_cidr(body: &str) -> Result<String> {
    let ip = body.trim();
    if ip.parse::<Ipv4Addr>().is_err() {
        bail!("Invalid IPv4 address received: {ip}");
    }
    Ok(format!("{ip}/32"))
}

pub fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}
