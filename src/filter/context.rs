//! Per-request filter inputs.
//!
//! # User-Agent Format
//! ```text
//! <product>/<semver> (<arch>; <os>)
//! webthings-gateway/1.0.0 (linux-arm; linux-raspbian)
//! ```
//!
//! Parsing never fails: whatever cannot be understood is left unset and the filter
//! falls back to architecture-agnostic builds.

use semver::Version;

/// What the requesting host declared about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterContext {
    pub runtime_version: Option<Version>,
    pub architecture: Option<String>,
}

impl RequesterContext {
    pub fn new(runtime_version: Option<Version>, architecture: Option<String>) -> Self {
        Self {
            runtime_version,
            architecture,
        }
    }

    /// Derive the context from a `User-Agent` header value.
    ///
    /// The product version must be a full semantic version here; browsers
    /// sending `Mozilla/5.0` do not pass for a 5.0.0 host.
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
            return Self::default();
        };

        let product = ua.split_whitespace().next().unwrap_or_default();
        let runtime_version = product
            .split_once('/')
            .and_then(|(_, version)| Version::parse(version).ok());

        let architecture = ua
            .split_once('(')
            .and_then(|(_, rest)| rest.split_once(')'))
            .and_then(|(details, _)| details.split(';').next())
            .map(str::trim)
            .filter(|arch| !arch.is_empty())
            .map(str::to_string);

        Self {
            runtime_version,
            architecture,
        }
    }

    /// Apply explicit `version` / `arch` values, e.g. from the query string.
    ///
    /// A version override that does not parse clears the version rather than
    /// keeping the user agent's.
    pub fn with_overrides(mut self, version: Option<&str>, architecture: Option<&str>) -> Self {
        if let Some(version) = version {
            self.runtime_version = parse_version_lenient(version);
        }
        if let Some(arch) = architecture.map(str::trim).filter(|a| !a.is_empty()) {
            self.architecture = Some(arch.to_string());
        }
        self
    }

    /// Architecture used for matching platform-specific builds.
    ///
    /// Without a usable version nothing architecture-specific is served.
    pub fn matching_architecture(&self) -> Option<&str> {
        self.runtime_version.as_ref()?;
        self.architecture.as_deref()
    }
}

/// Parse `1.2.3`, `v1.2.3`, `1.2` or `1`, padding missing components with zero.
pub fn parse_version_lenient(input: &str) -> Option<Version> {
    let trimmed = input.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let core = trimmed.split(['-', '+']).next()?;
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || core.len() != trimmed.len() {
        return None;
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// Optional criteria beyond version and architecture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// Case-insensitive substring matched against id, name, description and author.
    pub query: Option<String>,
    /// Primary add-on type, e.g. `adapter`.
    pub kind: Option<String>,
    /// Serve builds flagged as test-only.
    pub include_test_builds: bool,
    /// Host Node.js ABI version.
    pub node: Option<String>,
    /// Host Python versions.
    pub python: Vec<String>,
}
