//! Bus Transfer Types.
//!
//! This module defines the classification of bus transfers used throughout
//! the simulator: the command carried by a transaction, the response status a
//! target (or the fabric itself) reports back, and the phases and
//! synchronization results of the four-phase split transport protocol.

use std::fmt;

/// Direction of a bus transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Data flows from the target to the initiator.
    Read,

    /// Data flows from the initiator to the target.
    Write,
}

/// Completion status of a transaction.
///
/// Addressing and access-rights failures are reported here and never abort
/// the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResponseStatus {
    /// The transaction has not been serviced yet.
    #[default]
    Incomplete,

    /// The transfer completed successfully.
    Ok,

    /// No target decodes the address.
    AddressError,

    /// The command is not permitted at this address (e.g. a write to the
    /// read-only configuration area).
    CommandError,
}

impl ResponseStatus {
    /// Returns `true` for the `Ok` status.
    pub fn is_ok(self) -> bool {
        self == ResponseStatus::Ok
    }
}

/// Phase of the split transport protocol.
///
/// A transaction always travels `BeginRequest -> EndRequest -> BeginResponse
/// -> EndResponse`; anything else arriving at the fabric is a protocol
/// violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    BeginRequest,
    EndRequest,
    BeginResponse,
    EndResponse,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::BeginRequest => "BEGIN_REQ",
            Phase::EndRequest => "END_REQ",
            Phase::BeginResponse => "BEGIN_RESP",
            Phase::EndResponse => "END_RESP",
        };
        f.write_str(s)
    }
}

/// Synchronous answer to a split transport call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// The callee took the phase; the next phase follows on the opposite path.
    Accepted,

    /// The callee advanced the phase argument in place; the caller must act
    /// on the updated phase after the returned delay.
    Updated,

    /// The callee finished the transaction; remaining phases are implied.
    Completed,
}

/// Result of a blocking transport call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockingStatus {
    /// The transfer was serviced; the response status is in the transaction.
    Completed,

    /// The bus is busy or locked by another master. Nothing was touched;
    /// retry after one clock cycle.
    Contended,
}
