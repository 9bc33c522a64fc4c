// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSRF-safe URL validation.
//!
//! A URL is admissible iff its scheme and port are allowed, its host is not
//! deny-listed, and every address the host resolves to is globally routable
//! (not private, loopback, link-local, or otherwise reserved). The address
//! class is re-checked after DNS resolution, so a public hostname pointing
//! at an internal address is still rejected.

use async_trait::async_trait;
use pal_core::SsrfConfig;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("malformed url: {0}")]
    Malformed(String),
    #[error("scheme not allowed: {0}")]
    SchemeNotAllowed(String),
    #[error("url has no host")]
    MissingHost,
    #[error("port not allowed: {0}")]
    PortNotAllowed(u16),
    #[error("host is deny-listed: {0}")]
    DenyListed(String),
    #[error("address {0} is not globally routable")]
    NonRoutable(IpAddr),
    #[error("dns resolution failed for {host}: {message}")]
    Resolution { host: String, message: String },
}

/// DNS seam so validation is testable without real lookups.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Production resolver over `tokio::net::lookup_host`.
pub struct TokioResolver;

#[async_trait]
impl DnsResolver for TokioResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// Stateless apart from its configuration; shared freely across tasks.
#[derive(Clone)]
pub struct UrlValidator {
    config: SsrfConfig,
    resolver: Arc<dyn DnsResolver>,
}

impl UrlValidator {
    pub fn new(config: SsrfConfig) -> Self {
        Self::with_resolver(config, Arc::new(TokioResolver))
    }

    pub fn with_resolver(config: SsrfConfig, resolver: Arc<dyn DnsResolver>) -> Self {
        Self { config, resolver }
    }

    /// Parse-time checks only: scheme, host presence, port, deny-list, and
    /// the address class of literal-IP hosts.
    pub fn check_syntax(&self, raw: &str) -> Result<Url, UrlValidationError> {
        let url = Url::parse(raw).map_err(|e| UrlValidationError::Malformed(e.to_string()))?;

        let scheme = url.scheme().to_string();
        if !self.config.allowed_schemes.iter().any(|s| s == &scheme) {
            return Err(UrlValidationError::SchemeNotAllowed(scheme));
        }

        let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

        let port = effective_port(&url);
        if !self.config.allowed_ports.is_empty() && !self.config.allowed_ports.contains(&port) {
            return Err(UrlValidationError::PortNotAllowed(port));
        }

        let host_lower = host.to_ascii_lowercase();
        for denied in &self.config.host_denylist {
            let denied = denied.to_ascii_lowercase();
            if host_lower == denied || host_lower.ends_with(&format!(".{}", denied)) {
                return Err(UrlValidationError::DenyListed(host_lower));
            }
        }

        if let Ok(addr) = host_lower.trim_matches(['[', ']']).parse::<IpAddr>() {
            check_routable(addr)?;
        }

        Ok(url)
    }

    /// Full validation: syntax checks plus DNS resolution with the address
    /// class re-checked on every resolved address.
    pub async fn validate(&self, raw: &str) -> Result<Url, UrlValidationError> {
        let url = self.check_syntax(raw)?;
        let host = url
            .host_str()
            .ok_or(UrlValidationError::MissingHost)?
            .trim_matches(['[', ']'])
            .to_string();

        // Literal addresses were already class-checked.
        if host.parse::<IpAddr>().is_ok() {
            return Ok(url);
        }

        let port = effective_port(&url);
        let timeout = Duration::from_secs(self.config.dns_timeout_s.max(1));
        let resolved = tokio::time::timeout(timeout, self.resolver.resolve(&host, port))
            .await
            .map_err(|_| UrlValidationError::Resolution {
                host: host.clone(),
                message: "timed out".to_string(),
            })?
            .map_err(|e| UrlValidationError::Resolution {
                host: host.clone(),
                message: e.to_string(),
            })?;

        if resolved.is_empty() {
            return Err(UrlValidationError::Resolution {
                host,
                message: "no addresses".to_string(),
            });
        }
        for addr in resolved {
            check_routable(addr)?;
        }
        Ok(url)
    }
}

fn effective_port(url: &Url) -> u16 {
    url.port().unwrap_or(match url.scheme() {
        "https" => 443,
        _ => 80,
    })
}

fn check_routable(addr: IpAddr) -> Result<(), UrlValidationError> {
    if is_global(&addr) {
        Ok(())
    } else {
        Err(UrlValidationError::NonRoutable(addr))
    }
}

/// Whether an address is globally routable. Std's `is_global` is unstable,
/// so the reserved ranges are enumerated here.
pub fn is_global(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_global_v4(v4),
        IpAddr::V6(v6) => is_global_v6(v6),
    }
}

fn is_global_v4(addr: &Ipv4Addr) -> bool {
    let octets = addr.octets();
    !(addr.is_unspecified()
        || addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_broadcast()
        || addr.is_documentation()
        // Shared address space 100.64.0.0/10 (RFC 6598)
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        // Benchmarking 198.18.0.0/15
        || (octets[0] == 198 && (octets[1] & 0xfe) == 18)
        // Reserved 240.0.0.0/4
        || octets[0] >= 240)
}

fn is_global_v6(addr: &Ipv6Addr) -> bool {
    if let Some(mapped) = addr.to_ipv4_mapped() {
        return is_global_v4(&mapped);
    }
    let segments = addr.segments();
    !(addr.is_unspecified()
        || addr.is_loopback()
        // Unique local fc00::/7
        || (segments[0] & 0xfe00) == 0xfc00
        // Link local fe80::/10
        || (segments[0] & 0xffc0) == 0xfe80
        // Documentation 2001:db8::/32
        || (segments[0] == 0x2001 && segments[1] == 0x0db8))
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake_dns {
    //! Scripted resolver for tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeResolver {
        hosts: Mutex<HashMap<String, Vec<IpAddr>>>,
    }

    impl FakeResolver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn record(&self, host: &str, addrs: Vec<IpAddr>) {
            self.hosts.lock().insert(host.to_string(), addrs);
        }
    }

    #[async_trait]
    impl DnsResolver for FakeResolver {
        async fn resolve(&self, host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
            self.hosts.lock().get(host).cloned().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "name not known")
            })
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
