//! Cradle infrastructure.
//!
//! Persistence and ambient services: the versioned snapshot blob, path and
//! configuration management, in-memory collaborator implementations, and
//! the tracing event sink.

pub mod config;
pub mod dto;
pub mod memory_credit_ledger;
pub mod memory_snapshot_store;
pub mod paths;
pub mod toml_snapshot_store;
pub mod tracing_sink;

pub use config::EngineConfig;
pub use memory_credit_ledger::MemoryCreditLedger;
pub use memory_snapshot_store::MemorySnapshotStore;
pub use toml_snapshot_store::TomlSnapshotStore;
pub use tracing_sink::TracingEventSink;
