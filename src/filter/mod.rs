//! Compatibility filtering.
//!
//! # Selection Rules
//! ```text
//! for each entry, in catalog order:
//!     entry-level checks (query, type, host type support)
//!     builds satisfying version range + architecture + options
//!     best = exact arch  >  agnostic
//!            then highest range floor
//!            then first in catalog order
//!     no satisfying build → entry dropped
//! ```
//!
//! # Design Decisions
//! - Pure function over borrowed data: no locks, no I/O, safe from any task
//! - Output borrows from the catalog; callers serialize while holding the `Arc`

pub mod context;

use std::cmp::Ordering;

use semver::Version;

use crate::catalog::{Build, Catalog, CatalogEntry};

pub use context::{parse_version_lenient, FilterOptions, RequesterContext};

/// An add-on paired with the build selected for the requester.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilteredEntry<'a> {
    pub entry: &'a CatalogEntry,
    pub build: &'a Build,
}

/// Filter with version and architecture only.
pub fn filter<'a>(catalog: &'a Catalog, ctx: &RequesterContext) -> Vec<FilteredEntry<'a>> {
    filter_with(catalog, ctx, &FilterOptions::default())
}

/// Filter with the full set of request options.
pub fn filter_with<'a>(
    catalog: &'a Catalog,
    ctx: &RequesterContext,
    options: &FilterOptions,
) -> Vec<FilteredEntry<'a>> {
    catalog
        .entries()
        .iter()
        .filter(|entry| entry_allowed(entry, ctx, options))
        .filter_map(|entry| {
            select_build(entry, ctx, options).map(|build| FilteredEntry { entry, build })
        })
        .collect()
}

/// Pick the best build of an entry, if any is compatible.
pub fn select_build<'a>(
    entry: &'a CatalogEntry,
    ctx: &RequesterContext,
    options: &FilterOptions,
) -> Option<&'a Build> {
    let arch = ctx.matching_architecture();
    let mut best: Option<&Build> = None;

    for build in entry.builds.iter().filter(|b| build_allowed(b, ctx, options)) {
        best = match best {
            Some(current) if rank(build, arch, current) != Ordering::Greater => Some(current),
            _ => Some(build),
        };
    }
    best
}

/// Compare `candidate` against `current`; only a strictly better candidate wins.
fn rank(candidate: &Build, arch: Option<&str>, current: &Build) -> Ordering {
    let exact = |b: &Build| arch.is_some_and(|a| b.architecture.is_exactly(a));
    exact(candidate)
        .cmp(&exact(current))
        .then_with(|| candidate.compatibility.floor().cmp(&current.compatibility.floor()))
}

fn entry_allowed(entry: &CatalogEntry, ctx: &RequesterContext, options: &FilterOptions) -> bool {
    if let Some(query) = options.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let query = query.to_lowercase();
        let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&query));
        if !(hit(Some(entry.id.as_str()))
            || hit(Some(entry.name.as_str()))
            || hit(entry.description.as_deref())
            || hit(entry.author.as_deref()))
        {
            return false;
        }
    }

    if let Some(kind) = options.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        match entry.primary_type.as_deref() {
            Some(primary) if primary.eq_ignore_ascii_case(kind) => {}
            _ => return false,
        }
    }

    match (&ctx.runtime_version, entry.primary_type.as_deref()) {
        (Some(version), Some(primary)) => host_supports_type(version, primary),
        _ => true,
    }
}

/// Hosts before 0.9 only ran adapters; 0.9 added notifiers.
fn host_supports_type(version: &Version, primary_type: &str) -> bool {
    if version.major != 0 || version.minor >= 10 {
        return true;
    }
    let is = |t: &str| primary_type.eq_ignore_ascii_case(t);
    if version.minor <= 8 {
        is("adapter")
    } else {
        is("adapter") || is("notifier")
    }
}

fn build_allowed(build: &Build, ctx: &RequesterContext, options: &FilterOptions) -> bool {
    if build.test_only && !options.include_test_builds {
        return false;
    }

    if !build.architecture.is_any() {
        match ctx.matching_architecture() {
            Some(arch) if build.architecture.is_exactly(arch) => {}
            _ => return false,
        }
    }

    // Without a known host version only the architecture fallback applies.
    if let Some(version) = &ctx.runtime_version {
        if !build.compatibility.matches(version) {
            return false;
        }
    }

    match &build.language {
        Some(lang) if lang.name == "nodejs" => match options.node.as_deref() {
            Some(node) => lang.accepts_any_of([node]),
            None => true,
        },
        Some(lang) if lang.name == "python" => {
            options.python.is_empty() || lang.accepts_any_of(options.python.iter().map(String::as_str))
        }
        _ => true,
    }
}
