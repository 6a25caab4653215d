//! Accuracy verification: validation rules, confidence adjustment and the
//! auto-process gate for mapped lien records.

pub mod types;
pub mod validators;
pub mod verifier;

pub use types::*;
pub use verifier::AccuracyVerifier;
