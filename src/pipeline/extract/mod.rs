//! Pattern extraction: raw lien text in, best-effort field candidates out.
//!
//! Architecture:
//! - `types`: `RawDocument` (what scraper collaborators hand over) and
//!   `RawFieldSet` (what the extractor produces per document)
//! - `patterns`: ordered, first-match-wins pattern tables per field kind
//!
//! Misses are not errors. A field with no matching pattern is simply absent
//! from the `RawFieldSet`, and the mapper decides what that means.

pub mod patterns;
pub mod types;

pub use patterns::PatternExtractor;
pub use types::*;
