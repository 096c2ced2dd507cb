//! Reusable migration building blocks.

mod backfill;

pub use backfill::{BACKFILL_JOURNAL_COLLECTION, FieldBackfill};
