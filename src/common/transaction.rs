//! Transactions and their reference-counted storage.
//!
//! A transaction is created by an initiator, shared with the fabric and the
//! target while in flight, and freed once every holder has released it. The
//! `TransactionPool` is an arena indexed by a generation-checked `TxId`, so a
//! stale handle to a recycled slot is detected instead of aliasing a newer
//! transaction.

use crate::common::data::{Command, ResponseStatus};
use std::fmt;

/// A single bus transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Transfer direction.
    pub command: Command,
    /// 32-bit bus address of the first byte.
    pub address: u32,
    /// Payload; its length is the transfer length.
    pub data: Vec<u8>,
    /// Completion status written by the servicing side.
    pub response: ResponseStatus,
    /// Bus lock attribute. While set, the arbiter grants only the issuing master.
    pub lock: bool,
    /// Index of the issuing master, stamped by the fabric on Begin-Request.
    pub master_id: Option<usize>,
}

impl Transaction {
    /// Creates a read of `len` bytes at `address`.
    pub fn read(address: u32, len: usize) -> Self {
        Self {
            command: Command::Read,
            address,
            data: vec![0; len],
            response: ResponseStatus::Incomplete,
            lock: false,
            master_id: None,
        }
    }

    /// Creates a write of `data` at `address`.
    pub fn write(address: u32, data: &[u8]) -> Self {
        Self {
            command: Command::Write,
            address,
            data: data.to_vec(),
            response: ResponseStatus::Incomplete,
            lock: false,
            master_id: None,
        }
    }

    /// Sets the bus lock attribute.
    pub fn locked(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    /// Transfer length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_read(&self) -> bool {
        self.command == Command::Read
    }

    pub fn is_write(&self) -> bool {
        self.command == Command::Write
    }
}

/// Stable handle to a pooled transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId {
    index: u32,
    generation: u32,
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}.{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    refs: u32,
    tx: Option<Transaction>,
}

/// Arena of reference-counted transactions.
#[derive(Default)]
pub struct TransactionPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `tx` with a reference count of one (held by the caller).
    pub fn alloc(&mut self, tx: Transaction) -> TxId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.refs = 1;
            slot.tx = Some(tx);
            return TxId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            refs: 1,
            tx: Some(tx),
        });
        TxId {
            index,
            generation: 0,
        }
    }

    fn slot(&self, id: TxId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation && s.tx.is_some())
    }

    fn slot_mut(&mut self, id: TxId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation && s.tx.is_some())
    }

    /// Adds a reference. Returns `false` for a stale or unknown handle.
    pub fn acquire(&mut self, id: TxId) -> bool {
        match self.slot_mut(id) {
            Some(slot) => {
                slot.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drops a reference. When the last one goes, the slot is recycled and the
    /// transaction is handed back to the caller.
    pub fn release(&mut self, id: TxId) -> Option<Transaction> {
        let slot = self.slot_mut(id)?;
        slot.refs -= 1;
        if slot.refs > 0 {
            return None;
        }
        let tx = slot.tx.take();
        self.free.push(id.index);
        tx
    }

    pub fn get(&self, id: TxId) -> Option<&Transaction> {
        self.slot(id).and_then(|s| s.tx.as_ref())
    }

    pub fn get_mut(&mut self, id: TxId) -> Option<&mut Transaction> {
        self.slot_mut(id).and_then(|s| s.tx.as_mut())
    }

    /// Current reference count, or 0 for a freed handle.
    pub fn ref_count(&self, id: TxId) -> u32 {
        self.slot(id).map_or(0, |s| s.refs)
    }

    /// Number of live transactions.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
