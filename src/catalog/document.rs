//! Upstream catalog document decoding.
//!
//! # Known Schema Variants
//! ```text
//! document: [entry, ...] | {"addons": [entry, ...]}
//!
//! entry (simple):   {id, name, builds: [{arch, range, url, checksum?}]}
//! entry (packaged): {id, name, description, author, homepage_url, license_url,
//!                    primary_type, packages: [{architecture, version, url, checksum,
//!                    gateway: {min, max}, language: {name, versions}, test_only?}]}
//! ```
//!
//! The top-level shape is mandatory. Entries and builds are decoded one at a time so
//! that a single bad record only drops that record.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::model::{Architecture, Build, Catalog, CatalogEntry, LanguageRequirement};
use crate::catalog::range::{CompatibilityRange, RangeError};

/// Errors that reject a whole upstream document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The body is not JSON at all.
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON, but neither a list nor an `addons` wrapper.
    #[error("document is not a list of add-ons")]
    Shape,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Listing(Vec<Value>),
    Wrapped { addons: Vec<Value> },
}

impl RawDocument {
    fn into_entries(self) -> Vec<Value> {
        match self {
            RawDocument::Listing(entries) => entries,
            RawDocument::Wrapped { addons } => addons,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Packaged(PackagedEntry),
    Simple(SimpleEntry),
}

#[derive(Debug, Deserialize)]
struct PackagedEntry {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    homepage_url: Option<String>,
    #[serde(default)]
    license_url: Option<String>,
    #[serde(default)]
    primary_type: Option<String>,
    packages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PackagedBuild {
    architecture: String,
    version: String,
    url: String,
    checksum: String,
    gateway: GatewayBounds,
    #[serde(default)]
    language: Option<RawLanguage>,
    #[serde(default)]
    test_only: bool,
}

#[derive(Debug, Deserialize)]
struct GatewayBounds {
    min: String,
    max: String,
}

#[derive(Debug, Deserialize)]
struct RawLanguage {
    name: String,
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SimpleEntry {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    builds: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SimpleBuild {
    #[serde(alias = "architecture")]
    arch: String,
    #[serde(default, alias = "compatibility")]
    range: Option<String>,
    url: String,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

impl PackagedBuild {
    fn into_build(self) -> Result<Build, RangeError> {
        Ok(Build {
            architecture: Architecture::from_tag(&self.architecture),
            compatibility: CompatibilityRange::from_bounds(&self.gateway.min, &self.gateway.max)?,
            url: self.url,
            checksum: Some(self.checksum),
            version: Some(self.version),
            language: self.language.map(|l| LanguageRequirement {
                name: l.name,
                versions: l.versions,
            }),
            test_only: self.test_only,
        })
    }
}

impl SimpleBuild {
    fn into_build(self) -> Result<Build, RangeError> {
        let compatibility = match self.range.as_deref() {
            Some(range) => CompatibilityRange::parse(range)?,
            None => CompatibilityRange::unbounded(),
        };
        Ok(Build {
            architecture: Architecture::from_tag(&self.arch),
            compatibility,
            url: self.url,
            checksum: self.checksum,
            version: self.version,
            language: None,
            test_only: false,
        })
    }
}

impl RawEntry {
    fn into_entry(self) -> CatalogEntry {
        match self {
            RawEntry::Packaged(raw) => {
                let builds = decode_builds(&raw.id, raw.packages, |b: PackagedBuild| b.into_build());
                CatalogEntry {
                    id: raw.id,
                    name: raw.name,
                    description: raw.description,
                    author: raw.author,
                    homepage_url: raw.homepage_url,
                    license_url: raw.license_url,
                    primary_type: raw.primary_type,
                    builds,
                }
            }
            RawEntry::Simple(raw) => {
                let builds = decode_builds(&raw.id, raw.builds, |b: SimpleBuild| b.into_build());
                CatalogEntry {
                    id: raw.id,
                    name: raw.name,
                    description: raw.description,
                    author: raw.author,
                    homepage_url: None,
                    license_url: None,
                    primary_type: None,
                    builds,
                }
            }
        }
    }
}

fn decode_builds<T, F>(entry_id: &str, raw: Vec<Value>, convert: F) -> Vec<Build>
where
    T: for<'de> Deserialize<'de>,
    F: Fn(T) -> Result<Build, RangeError>,
{
    let mut builds = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        let decoded = match serde_json::from_value::<T>(value) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(entry = %entry_id, index, error = %e, "Skipping malformed build");
                continue;
            }
        };
        match convert(decoded) {
            Ok(build) => builds.push(build),
            Err(e) => {
                tracing::warn!(entry = %entry_id, index, error = %e, "Skipping build with invalid range");
            }
        }
    }
    builds
}

/// Decode an upstream document into a catalog.
pub fn decode_catalog(bytes: &[u8]) -> Result<Catalog, DocumentError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let document: RawDocument = serde_json::from_value(value).map_err(|_| DocumentError::Shape)?;

    let raw_entries = document.into_entries();
    let total = raw_entries.len();
    let mut seen = HashSet::with_capacity(total);
    let mut entries = Vec::with_capacity(total);

    for (index, value) in raw_entries.into_iter().enumerate() {
        let raw = match serde_json::from_value::<RawEntry>(value) {
            Ok(raw) => raw,
            Err(_) => {
                tracing::warn!(index, "Skipping catalog entry matching no known schema");
                continue;
            }
        };
        let entry = raw.into_entry();
        if entry.id.trim().is_empty() {
            tracing::warn!(index, "Skipping catalog entry without an id");
            continue;
        }
        if !seen.insert(entry.id.clone()) {
            tracing::warn!(index, id = %entry.id, "Skipping duplicate catalog entry");
            continue;
        }
        entries.push(entry);
    }

    if entries.len() < total {
        tracing::info!(kept = entries.len(), total, "Catalog decoded with skipped entries");
    }
    Ok(Catalog::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> Result<Catalog, DocumentError> {
        decode_catalog(value.to_string().as_bytes())
    }

    #[test]
    fn test_simple_listing() {
        let catalog = decode(json!([
            {"id": "a", "name": "A", "builds": [
                {"arch": "linux-arm", "range": ">=0.5.0", "url": "u1", "checksum": "c1"},
                {"arch": "*", "range": ">=0.5.0", "url": "u2"}
            ]}
        ]))
        .unwrap();

        assert_eq!(catalog.len(), 1);
        let entry = &catalog.entries()[0];
        assert_eq!(entry.id, "a");
        assert_eq!(entry.builds.len(), 2);
        assert_eq!(entry.builds[0].architecture, Architecture::Specific("linux-arm".into()));
        assert_eq!(entry.builds[0].checksum.as_deref(), Some("c1"));
        assert!(entry.builds[1].architecture.is_any());
    }

    #[test]
    fn test_packaged_entry_in_wrapper() {
        let catalog = decode(json!({"addons": [{
            "id": "zwave-adapter",
            "name": "Z-Wave",
            "description": "Z-Wave support",
            "author": "WebThings",
            "homepage_url": "https://example.com/zwave",
            "license_url": "https://example.com/zwave/LICENSE",
            "primary_type": "adapter",
            "packages": [{
                "architecture": "linux-arm",
                "version": "0.10.0",
                "url": "https://example.com/zwave.tgz",
                "checksum": "abc",
                "gateway": {"min": "0.10.0", "max": "*"},
                "language": {"name": "nodejs", "versions": ["57", "64"]},
                "test_only": true
            }]
        }]}))
        .unwrap();

        let entry = catalog.get("zwave-adapter").unwrap();
        assert_eq!(entry.primary_type.as_deref(), Some("adapter"));
        assert_eq!(entry.license_url.as_deref(), Some("https://example.com/zwave/LICENSE"));
        let build = &entry.builds[0];
        assert_eq!(build.version.as_deref(), Some("0.10.0"));
        assert!(build.test_only);
        assert_eq!(build.language.as_ref().unwrap().name, "nodejs");
        assert!(build.compatibility.matches(&semver::Version::new(1, 0, 0)));
        assert!(!build.compatibility.matches(&semver::Version::new(0, 9, 0)));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(matches!(decode(json!({"items": []})), Err(DocumentError::Shape)));
        assert!(matches!(decode(json!("hello")), Err(DocumentError::Shape)));
        assert!(matches!(decode_catalog(b"<html>"), Err(DocumentError::Json(_))));
    }

    #[test]
    fn test_skips_malformed_entries_and_builds() {
        let catalog = decode(json!([
            {"id": "missing-builds", "name": "No builds key"},
            {"id": "ok", "name": "Ok", "builds": [
                {"arch": "*", "range": "not a range", "url": "bad"},
                {"range": ">=1.0.0", "url": "no-arch"},
                {"arch": "*", "range": ">=1.0.0", "url": "good"}
            ]},
            42,
            {"id": "ok", "name": "Duplicate", "builds": []},
            {"id": "", "name": "Blank", "builds": []}
        ]))
        .unwrap();

        assert_eq!(catalog.len(), 1);
        let entry = &catalog.entries()[0];
        assert_eq!(entry.name, "Ok");
        assert_eq!(entry.builds.len(), 1);
        assert_eq!(entry.builds[0].url, "good");
    }

    #[test]
    fn test_empty_listing_is_valid() {
        assert!(decode(json!([])).unwrap().is_empty());
    }
}
