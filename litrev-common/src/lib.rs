//! # Litrev Common Library
//!
//! Shared code for the Litrev service crates:
//! - Error type and result alias
//! - Configuration loading (TOML, environment, compiled defaults)
//! - Database initialization and schema
//! - Lifecycle status enums for phases, batches and AI jobs
//! - Realtime change events (LitrevEvent enum) and the EventBus
//! - Server-Sent Events helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod status;
pub mod time;

pub use error::{Error, Result};
pub use status::{BatchStatus, JobStatus, JobType, PhaseStatus};
