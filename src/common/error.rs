use crate::common::data::{Phase, SyncStatus};
use crate::common::transaction::TxId;
use thiserror::Error;

/// Result alias for fallible simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors detected while building or elaborating the system.
///
/// Every variant is fatal: the simulation refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "overlap in address map: {first} {first_start:#010x}-{first_end:#010x} \
         intersects {second} {second_start:#010x}-{second_end:#010x}"
    )]
    Overlap {
        first: String,
        first_start: u64,
        first_end: u64,
        second: String,
        second_start: u64,
        second_end: u64,
    },

    #[error("too many {side} bound to the fabric: {count} (max {max})")]
    TooManyDevices {
        side: &'static str,
        count: usize,
        max: usize,
    },

    #[error("{name}: bus index {index} out of range (max {max})")]
    IndexOutOfRange { name: String, index: u32, max: u32 },

    #[error("bus index {index} claimed by both {first} and {second}")]
    DuplicateIndex {
        index: u32,
        first: String,
        second: String,
    },

    #[error("{name}: BAR{bar} has non-contiguous mask {mask:#05x}")]
    MalformedBar { name: String, bar: usize, mask: u32 },

    #[error("{name}: {reason}")]
    InvalidDevice { name: String, reason: String },

    #[error("unknown device kind `{0}`")]
    UnknownKind(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Violations of the split transport protocol.
///
/// These indicate a defect in an attached component and terminate the
/// simulation.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("illegal phase {phase} on forward path from master {master}")]
    IllegalForwardPhase { master: usize, phase: Phase },

    #[error("illegal phase {phase} on backward path from slave {slave}")]
    IllegalBackwardPhase { slave: usize, phase: Phase },

    #[error("transaction {tx} received {phase} while {state}")]
    OutOfOrder {
        tx: TxId,
        phase: Phase,
        state: &'static str,
    },

    #[error("master {master} issued BEGIN_REQ while {pending} is still in its address phase")]
    RequestOverlap { master: usize, pending: TxId },

    #[error("{endpoint} answered {phase} with {status:?}")]
    UnexpectedSync {
        endpoint: String,
        phase: Phase,
        status: SyncStatus,
    },

    #[error("unknown or released transaction {0}")]
    UnknownTransaction(TxId),

    #[error("master index {0} is not bound to the fabric")]
    UnknownMaster(usize),
}

/// Top-level simulator error.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
