//! Frontier module
//!
//! The durable pending-URL set: per-domain append-only files with
//! offset-based streaming reads (store), the line record format (record),
//! and the ingest path that normalizes, deduplicates, and enqueues newly
//! discovered URLs (writer).

mod record;
mod store;
mod writer;

pub use record::{FrontierRecord, RecordError, MAX_RECORD_BYTES};
pub use store::{FrontierStore, ReadNext};
pub use writer::FrontierWriter;
