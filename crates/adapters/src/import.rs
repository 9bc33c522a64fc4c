// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target-list import: CSV, JSON, and Nmap XML.

use pal_core::Target;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("csv parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no targets found in input")]
    Empty,
}

/// One imported asset row. CSV columns map 1:1; JSON objects may omit any
/// field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportedAsset {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub asset_type: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub owner: String,
    /// Comma-separated in CSV.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub criticality: String,
}

impl ImportedAsset {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The scan targets this row contributes: domain and/or address.
    pub fn targets(&self) -> Vec<Target> {
        let mut targets = Vec::new();
        if let Some(t) = Target::parse(&self.domain) {
            targets.push(t);
        }
        if let Some(t) = Target::parse(&self.ip_address) {
            targets.push(t);
        }
        targets
    }
}

/// Parse CSV with the header
/// `name,type,domain,ip_address,organization,owner,tags,criticality`.
pub fn parse_csv_targets(input: &str) -> Result<Vec<Target>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut targets = Vec::new();
    for row in reader.deserialize::<ImportedAsset>() {
        let asset = row?;
        for target in asset.targets() {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }
    if targets.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(targets)
}

/// Parse JSON: either a bare list of asset objects or `{"assets": [...]}`.
pub fn parse_json_targets(input: &str) -> Result<Vec<Target>, ImportError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Wrapped { assets: Vec<ImportedAsset> },
        Bare(Vec<ImportedAsset>),
    }

    let assets = match serde_json::from_str::<Shape>(input)? {
        Shape::Wrapped { assets } => assets,
        Shape::Bare(assets) => assets,
    };

    let mut targets = Vec::new();
    for asset in assets {
        for target in asset.targets() {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }
    if targets.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(targets)
}

/// Parse Nmap XML `<host>` blocks into targets.
///
/// Only `<address addrtype="ipv4|ipv6" addr="..">` and
/// `<hostname name="..">` are consumed; the structure is regular enough
/// that field extraction with anchored expressions is sufficient.
pub fn parse_nmap_targets(input: &str) -> Result<Vec<Target>, ImportError> {
    // Expressions are static and known-good.
    #[allow(clippy::unwrap_used)]
    let host_re = regex::Regex::new(r"(?s)<host[\s>].*?</host>").unwrap();
    #[allow(clippy::unwrap_used)]
    let addr_re = regex::Regex::new(
        r#"<address\s+[^>]*addrtype="ipv[46]"[^>]*addr="([^"]+)"|<address\s+[^>]*addr="([^"]+)"[^>]*addrtype="ipv[46]""#,
    )
    .unwrap();
    #[allow(clippy::unwrap_used)]
    let name_re = regex::Regex::new(r#"<hostname\s+[^>]*name="([^"]+)""#).unwrap();

    let mut targets = Vec::new();
    for host_block in host_re.find_iter(input) {
        let block = host_block.as_str();
        for capture in addr_re.captures_iter(block) {
            let addr = capture.get(1).or_else(|| capture.get(2));
            if let Some(target) = addr.and_then(|m| Target::parse(m.as_str())) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        for capture in name_re.captures_iter(block) {
            if let Some(target) = capture.get(1).and_then(|m| Target::parse(m.as_str())) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
    }
    if targets.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(targets)
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
