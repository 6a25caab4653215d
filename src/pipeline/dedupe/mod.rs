//! Deduplication against the persisted lien corpus.
//!
//! - `key`: the composite identity key
//! - `deduper`: batch `find_duplicates`/`dedupe` and the `is_duplicate` gate
//! - `store`: the `RowStore` seam and its SQLite implementation

pub mod deduper;
pub mod key;
pub mod store;

pub use deduper::{find_duplicates, is_duplicate, DedupeResult, Deduplicator, DuplicatePreview};
pub use key::{DedupeKey, KeyPart, Row};
pub use store::{AppendResult, RowStore, SqliteRowStore, StoreError};
