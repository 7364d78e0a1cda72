//! Common utilities and types used throughout the bus simulator.
//!
//! This module provides the fundamental types for bus transfers, the
//! transaction arena, simulated time and error handling that are shared
//! across the fabric, the endpoints and the event loop.

/// Bus transfer enums (command, response status, protocol phases).
pub mod data;

/// Error types for configuration and protocol failures.
pub mod error;

/// Simulated time.
pub mod time;

/// Transactions and the reference-counted transaction pool.
pub mod transaction;

pub use data::{BlockingStatus, Command, Phase, ResponseStatus, SyncStatus};
pub use error::{ConfigError, ProtocolError, SimError};
pub use time::SimTime;
pub use transaction::{Transaction, TransactionPool, TxId};
