//! cellstore - an in-memory data-structure store with a RESP interface
//!
//! This library provides:
//! - Typed values (strings, lists, sets, hashes) under byte-string keys
//! - Per-key expiration, checked on access and swept in the background
//! - Atomic command execution shared across connections
//! - A TCP server and client speaking RESP2

pub mod client;
pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod expire;
mod parse;
pub mod protocol;
pub mod server;
pub mod snapshot;
pub mod store;
pub mod types;

pub use client::Client;
pub use command::Command;
pub use config::ServerConfig;
pub use db::Db;
pub use error::{CellStoreError, Result};
pub use protocol::Response;
pub use server::CellStoreServer;
pub use snapshot::{MemorySink, Snapshot, SnapshotSink};
pub use store::{Keyspace, Value, ValueKind};
