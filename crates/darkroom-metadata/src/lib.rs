//! Metadata storage for Darkroom
//!
//! The keyed record store the ingestion pipeline writes to. Backends
//! implement [`MetadataRepository`]; an in-memory store covers tests and
//! development, PostgreSQL covers deployments. Both publish a change
//! stream consumed by the confirmation notifier.

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;
pub use traits::{MetadataRepository, CHANGE_STREAM_CAPACITY};
