//! Field mapping: raw candidates to the canonical 14-column lien record.
//!
//! - `types`: `MappedField`, `MappedRecord`, column and value enums
//! - `normalize`: amount/date/location normalizers (all `Option`-returning)
//! - `classify`: business vs personal names, lien vs release filings
//! - `mapper`: `FieldMapper`, which assigns confidence and provenance per column

pub mod classify;
pub mod mapper;
pub mod normalize;
pub mod types;

pub use mapper::FieldMapper;
pub use normalize::YearPivot;
pub use types::*;
