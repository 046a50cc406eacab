//! Internal catalog representation.

use std::fmt;

use crate::catalog::range::CompatibilityRange;

/// Target architecture of a build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// Runs on every architecture (`"*"` or `"any"` upstream).
    Any,
    /// Runs only on the named platform, e.g. `linux-arm`.
    Specific(String),
}

impl Architecture {
    /// Parse an upstream architecture tag.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() || tag == "*" || tag.eq_ignore_ascii_case("any") {
            Architecture::Any
        } else {
            Architecture::Specific(tag.to_string())
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Architecture::Any)
    }

    /// True when this is a platform-specific build for exactly `arch`.
    pub fn is_exactly(&self, arch: &str) -> bool {
        match self {
            Architecture::Any => false,
            Architecture::Specific(tag) => tag == arch,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Any => write!(f, "any"),
            Architecture::Specific(tag) => write!(f, "{}", tag),
        }
    }
}

/// Runtime language a build needs on the host (e.g. nodejs ABI 57).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRequirement {
    pub name: String,
    pub versions: Vec<String>,
}

impl LanguageRequirement {
    /// Whether any of the host's versions is accepted.
    pub fn accepts_any_of<'a>(&self, host_versions: impl IntoIterator<Item = &'a str>) -> bool {
        if self.versions.iter().any(|v| v == "any") {
            return true;
        }
        host_versions
            .into_iter()
            .any(|host| self.versions.iter().any(|v| v == host))
    }
}

/// One installable artifact of an add-on.
#[derive(Debug, Clone, PartialEq)]
pub struct Build {
    pub architecture: Architecture,
    pub compatibility: CompatibilityRange,
    pub url: String,
    pub checksum: Option<String>,
    /// Version of the add-on artifact itself.
    pub version: Option<String>,
    pub language: Option<LanguageRequirement>,
    pub test_only: bool,
}

/// One add-on and all of its published builds.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Unique within a catalog.
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub homepage_url: Option<String>,
    pub license_url: Option<String>,
    pub primary_type: Option<String>,
    pub builds: Vec<Build>,
}

/// Ordered list of add-ons as retrieved from upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}
