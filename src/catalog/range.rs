//! Host version compatibility ranges.
//!
//! # Accepted Syntax
//! - `*`, `any` or empty: every host version
//! - Comparators separated by commas or whitespace: `>=0.6.0 <2.0.0`, `>=0.6.0, <2.0.0`
//! - Operators may be detached from the version: `>= 0.6.0`
//! - Hyphen ranges: `1.0.0 - 2.0.0` (both ends inclusive)
//! - A bare version means exactly that version (`1.2.3`) or that series (`1.2`)
//!
//! Textual ranges are evaluated with `semver::VersionReq`, so a host version with a
//! pre-release tag only matches comparators on the same `major.minor.patch` that also
//! carry one. Packaged `min`/`max` bounds compare by plain version ordering instead, so
//! `1.1.0-beta.1` falls inside `>= 0.10.0`.

use std::fmt;

use semver::{Op, Version, VersionReq};
use thiserror::Error;

/// Errors produced while parsing a compatibility range.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("unsupported range syntax in '{0}'")]
    Unsupported(String),

    #[error("invalid range '{input}': {reason}")]
    Invalid { input: String, reason: String },
}

/// A semver range a build declares itself valid for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityRange {
    constraint: Constraint,
    floor: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Constraint {
    Req(VersionReq),
    /// Inclusive bounds, either side open.
    Bounds {
        min: Option<Version>,
        max: Option<Version>,
    },
}

impl CompatibilityRange {
    /// Range matching every host version.
    pub fn unbounded() -> Self {
        Self {
            constraint: Constraint::Req(VersionReq::STAR),
            floor: None,
        }
    }

    /// Parse a textual range.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "*" || trimmed.eq_ignore_ascii_case("any") {
            return Ok(Self::unbounded());
        }
        if trimmed.contains("||") {
            return Err(RangeError::Unsupported(input.to_string()));
        }

        let comparators = normalize(trimmed).map_err(|reason| RangeError::Invalid {
            input: input.to_string(),
            reason,
        })?;
        if comparators.is_empty() {
            return Ok(Self::unbounded());
        }

        let req = VersionReq::parse(&comparators.join(", ")).map_err(|e| RangeError::Invalid {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_req(req))
    }

    /// Build an inclusive range from separate minimum and maximum versions,
    /// where `*` leaves that side open.
    pub fn from_bounds(min: &str, max: &str) -> Result<Self, RangeError> {
        let min = parse_bound(min)?;
        let max = parse_bound(max)?;
        Ok(Self {
            floor: min.clone(),
            constraint: Constraint::Bounds { min, max },
        })
    }

    fn from_req(req: VersionReq) -> Self {
        let floor = req
            .comparators
            .iter()
            .filter_map(|c| match c.op {
                Op::Exact | Op::Greater | Op::GreaterEq | Op::Tilde | Op::Caret | Op::Wildcard => {
                    Some(Version {
                        major: c.major,
                        minor: c.minor.unwrap_or(0),
                        patch: c.patch.unwrap_or(0),
                        pre: c.pre.clone(),
                        build: semver::BuildMetadata::EMPTY,
                    })
                }
                _ => None,
            })
            .max();
        Self {
            constraint: Constraint::Req(req),
            floor,
        }
    }

    /// Whether the host version satisfies this range.
    pub fn matches(&self, version: &Version) -> bool {
        match &self.constraint {
            Constraint::Req(req) => req.matches(version),
            Constraint::Bounds { min, max } => {
                min.as_ref().is_none_or(|min| version >= min)
                    && max.as_ref().is_none_or(|max| version <= max)
            }
        }
    }

    /// Lowest version the range admits, if it declares one.
    pub fn floor(&self) -> Option<&Version> {
        self.floor.as_ref()
    }

    pub fn is_unbounded(&self) -> bool {
        match &self.constraint {
            Constraint::Req(req) => req.comparators.is_empty(),
            Constraint::Bounds { min, max } => min.is_none() && max.is_none(),
        }
    }
}

impl Default for CompatibilityRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for CompatibilityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Constraint::Req(req) => write!(f, "{}", req),
            Constraint::Bounds { min: None, max: None } => write!(f, "*"),
            Constraint::Bounds { min, max } => {
                let min = min.as_ref().map(|v| format!(">={}", v));
                let max = max.as_ref().map(|v| format!("<={}", v));
                let parts: Vec<String> = min.into_iter().chain(max).collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

/// A packaged bound: a full version, or `*`/empty for an open side.
fn parse_bound(bound: &str) -> Result<Option<Version>, RangeError> {
    let bound = bound.trim();
    if bound.is_empty() || bound == "*" {
        return Ok(None);
    }
    Version::parse(bound)
        .map(Some)
        .map_err(|e| RangeError::Invalid {
            input: bound.to_string(),
            reason: e.to_string(),
        })
}

/// Split a range into comparator strings understood by `VersionReq::parse`.
fn normalize(input: &str) -> Result<Vec<String>, String> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() == 3 && tokens[1] == "-" {
        return Ok(vec![format!(">={}", tokens[0]), format!("<={}", tokens[2])]);
    }

    let mut out = Vec::with_capacity(tokens.len());
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if token.chars().all(is_operator_char) {
            if pending_op.is_some() {
                return Err(format!("dangling operator before '{}'", token));
            }
            pending_op = Some(token);
            continue;
        }

        let comparator = match pending_op.take() {
            Some(op) => format!("{}{}", op, token),
            None if token == "*" || token.eq_ignore_ascii_case("x") => continue,
            None if token.starts_with(|c: char| c.is_ascii_digit()) => format!("={}", token),
            None => token.to_string(),
        };
        out.push(comparator);
    }

    if let Some(op) = pending_op {
        return Err(format!("operator '{}' without a version", op));
    }
    Ok(out)
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '~' | '^')
}
