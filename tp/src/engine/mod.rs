//! Sync engine with actor pattern
//!
//! SyncEngine owns the conversation transcript, active plan, and progress
//! ledger, processing commands via channels so every mutation is serialized.

mod manager;
mod messages;

pub use manager::{EngineOptions, SyncEngine};
pub use messages::{EngineCommand, EngineError, EngineEvent, EngineResponse, EngineSnapshot};
