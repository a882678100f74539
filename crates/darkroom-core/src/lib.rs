//! Darkroom Core Library
//!
//! Core types, error taxonomy, configuration, and utilities for the
//! Darkroom image ingestion pipeline.

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::DarkroomConfig;
pub use error::{Error, Result};

/// Darkroom version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Object key suffixes accepted by the default format policy
pub const DEFAULT_ACCEPTED_EXTENSIONS: &[&str] = &[".jpeg", ".png"];

/// Receives before a message is escalated to the dead-letter queue
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 3;

/// Default number of messages handed to a consumer per batch
pub const DEFAULT_BATCH_SIZE: usize = 5;
