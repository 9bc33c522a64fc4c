// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan targets: domains, addresses, URLs, and asset references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// A single scan target as submitted with a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// Bare domain name (`example.com`)
    Domain { name: String },
    /// IP address (v4 or v6)
    Ip { addr: IpAddr },
    /// Full URL (`https://example.com/app`)
    Url { url: String },
    /// Reference to an asset in the inventory (resolved by the caller)
    Asset { asset_id: String },
}

impl Target {
    /// Classify a raw submission string.
    ///
    /// URLs start with a scheme, addresses parse as `IpAddr`, everything
    /// else without a path separator is treated as a domain.
    pub fn parse(raw: &str) -> Option<Target> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Some(Target::Url {
                url: raw.to_string(),
            });
        }
        if let Ok(addr) = raw.parse::<IpAddr>() {
            return Some(Target::Ip { addr });
        }
        if raw.contains('/') || raw.contains(' ') {
            return None;
        }
        Some(Target::Domain {
            name: raw.to_string(),
        })
    }

    /// The host portion used for probing and fingerprinting.
    pub fn host(&self) -> String {
        match self {
            Target::Domain { name } => name.clone(),
            Target::Ip { addr } => addr.to_string(),
            Target::Url { url } => host_of_url(url).unwrap_or_else(|| url.clone()),
            Target::Asset { asset_id } => asset_id.clone(),
        }
    }

    /// True when the target can be probed over HTTP as-is.
    pub fn is_url(&self) -> bool {
        matches!(self, Target::Url { .. })
    }

    /// A URL usable for web-facing stages. Domains get an `https://` prefix,
    /// matching how the original scanners promote bare hosts.
    pub fn as_scan_url(&self) -> Option<String> {
        match self {
            Target::Url { url } => Some(url.clone()),
            Target::Domain { name } => Some(format!("https://{}", name)),
            Target::Ip { addr } => Some(format!("https://{}", addr)),
            Target::Asset { .. } => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Domain { name } => write!(f, "{}", name),
            Target::Ip { addr } => write!(f, "{}", addr),
            Target::Url { url } => write!(f, "{}", url),
            Target::Asset { asset_id } => write!(f, "asset:{}", asset_id),
        }
    }
}

fn host_of_url(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    // Strip a port, but not the closing bracket of an IPv6 literal
    let host = match host.strip_prefix('[') {
        Some(v6) => v6.split(']').next()?,
        None => host.split(':').next()?,
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
