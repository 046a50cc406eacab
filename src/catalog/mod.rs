//! Add-on catalog subsystem.
//!
//! # Data Flow
//! ```text
//! upstream JSON bytes
//!     → document.rs (decode known schema variants)
//!     → range.rs (parse compatibility ranges)
//!     → model.rs (Catalog, immutable once built)
//!     → shared via Arc by the cache and the filter
//! ```
//!
//! # Design Decisions
//! - One internal representation regardless of the upstream schema variant
//! - Bad entries and bad builds are skipped, never fatal to the whole document
//! - A catalog is never patched in place; refresh replaces it wholesale

pub mod document;
pub mod model;
pub mod range;

pub use document::{decode_catalog, DocumentError};
pub use model::{Architecture, Build, Catalog, CatalogEntry, LanguageRequirement};
pub use range::{CompatibilityRange, RangeError};
