//! DefiBank Events - Structured event records for the external indexer
//!
//! Every mutating engine operation emits an `EventRecord` into an injected
//! `EventSink`. The JSONL store persists records append-only, one file per
//! UTC day; the indexing collaborator replays them with `JsonlEventReader`.

pub mod error;
pub mod event;
pub mod reader;
pub mod sink;
pub mod store;

pub use error::EventError;
pub use event::{EventKind, EventRecord};
pub use reader::JsonlEventReader;
pub use sink::{EventSink, MemorySink, NullSink};
pub use store::JsonlEventStore;
