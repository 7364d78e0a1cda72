//! System-on-Chip Traits.
//!
//! This module defines the interfaces between the bus fabric and the
//! endpoints attached to it:
//!
//! * `BusDevice` is the descriptor capability every endpoint implements; the
//!   fabric reads it once at elaboration.
//! * `Target` and `Initiator` are the two sides of the transport protocol.
//! * `InitiatorPort` and `TargetPort` are the fabric-side sockets an endpoint
//!   receives while the event loop runs it.

use crate::common::error::Result;
use crate::common::{BlockingStatus, Phase, SimTime, SyncStatus, Transaction, TxId};
use crate::soc::devices::{Memory, TrafficGenerator};
use crate::soc::interconnect::pnp::{Bar, DESCRIPTOR_WORDS};

/// Plug & play descriptor capability.
pub trait BusDevice {
    /// Returns the user-friendly name of the device.
    ///
    /// Used for logging and in configuration error messages.
    fn name(&self) -> &str;

    /// Bus index (hindex) of the device, below 16 and unique per side.
    fn bus_index(&self) -> u32;

    /// The 8-word plug & play descriptor.
    fn descriptor_words(&self) -> [u32; DESCRIPTOR_WORDS];

    /// Address regions decoded from descriptor words 4..8.
    fn regions(&self) -> Vec<Bar> {
        self.descriptor_words()[4..]
            .iter()
            .filter_map(|w| Bar::decode(*w))
            .collect()
    }
}

/// A device servicing transactions at a decoded address range.
pub trait Target: BusDevice {
    /// Services `tx` synchronously, adding the access time to `delay`.
    fn b_transport(&mut self, tx: &mut Transaction, delay: &mut SimTime);

    /// Split-phase forward path.
    ///
    /// On BEGIN_REQ the target answers `Accepted` (and later sends END_REQ on
    /// the backward path) or `Updated` with the phase set to END_REQ. On
    /// END_RESP it answers `Accepted` or `Completed`.
    fn nb_transport_fw(
        &mut self,
        now: SimTime,
        id: TxId,
        tx: &mut Transaction,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> SyncStatus;

    /// Untimed access; returns the number of bytes transferred.
    fn transport_dbg(&mut self, tx: &mut Transaction) -> usize;

    /// Time the target next wants to run, if any.
    fn next_event(&self) -> Option<SimTime> {
        None
    }

    /// Runs everything due at `now`. Afterwards `next_event` must lie in the
    /// future or be `None`.
    fn advance(&mut self, _now: SimTime, _port: &mut dyn TargetPort) -> Result<()> {
        Ok(())
    }

    /// Downcasts to the memory target if applicable.
    fn as_memory(&self) -> Option<&Memory> {
        None
    }
}

/// A device originating transactions.
pub trait Initiator: BusDevice {
    /// Split-phase backward path.
    ///
    /// On END_REQ the initiator must answer `Accepted`. On BEGIN_RESP it
    /// answers `Accepted` (and later sends END_RESP on the forward path),
    /// `Updated` with the phase set to END_RESP, or `Completed`.
    fn nb_transport_bw(
        &mut self,
        now: SimTime,
        id: TxId,
        tx: &mut Transaction,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> SyncStatus;

    /// Time the initiator next wants to run, if any.
    fn next_event(&self) -> Option<SimTime>;

    /// Runs everything due at `now`. Afterwards `next_event` must lie in the
    /// future or be `None`.
    fn advance(&mut self, now: SimTime, port: &mut dyn InitiatorPort) -> Result<()>;

    /// `true` once the initiator has nothing left to issue or await.
    fn is_done(&self) -> bool;

    /// Downcasts to the traffic generator if applicable.
    fn as_traffic(&self) -> Option<&TrafficGenerator> {
        None
    }
}

/// Fabric socket seen by an initiator.
pub trait InitiatorPort {
    fn now(&self) -> SimTime;

    fn clock_period(&self) -> SimTime;

    /// Stores a transaction in the fabric's pool; the caller holds one
    /// reference.
    fn alloc(&mut self, tx: Transaction) -> TxId;

    fn transaction(&self, id: TxId) -> Option<&Transaction>;

    /// Drops the caller's reference.
    fn release(&mut self, id: TxId) -> Option<Transaction>;

    fn nb_transport_fw(
        &mut self,
        id: TxId,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> Result<SyncStatus>;

    fn b_transport(&mut self, tx: &mut Transaction, delay: &mut SimTime) -> BlockingStatus;

    fn transport_dbg(&mut self, tx: &mut Transaction) -> usize;
}

/// Fabric socket seen by a target.
pub trait TargetPort {
    fn now(&self) -> SimTime;

    fn transaction(&mut self, id: TxId) -> Option<&mut Transaction>;

    fn nb_transport_bw(
        &mut self,
        id: TxId,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> Result<SyncStatus>;
}
