//! compliance-mapper - batch classification of compliance scan items
//!
//! Turns a CSV of cloud security scan items into the same table plus one
//! classification column, by sending each eligible row's description to a
//! remote chat-completion service and re-correlating the answers.
//!
//! Module map:
//! - [`table`] — record source (schema-validated CSV reader) and result sink
//! - [`filter`] — per-row preconditions (required fields, platform scope)
//! - [`client`] — remote classification client with retry/backoff
//! - [`scheduler`] — bounded concurrent fan-out per batch, order-restoring join
//! - [`pipeline`] — the batch loop driving source → scheduler → sink
//! - [`config`] — TOML job config and token-file loading

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod scheduler;
pub mod table;
pub mod types;

pub use error::{Error, Result};
