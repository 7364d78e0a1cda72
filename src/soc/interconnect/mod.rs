//! System Bus Fabric.
//!
//! This module implements the on-chip bus controller that connects up to 16
//! initiators with up to 16 targets. It provides:
//! 1. **Elaboration:** Collects device descriptors, builds the decoder and the
//!    plug & play table, and rejects overlapping address maps.
//! 2. **Blocking transport:** Decode and forward inline while holding the bus.
//! 3. **Split-phase transport:** Requests are queued, arbitrated once per bus
//!    tick and carried through the four-phase pipeline (see `pipeline`).
//! 4. **Debug transport:** Untimed access that bypasses arbitration and locking.
//!
//! The fabric never owns the endpoints. Calls that must reach an endpoint take
//! the endpoint slices as arguments, so the event loop can lend them out.

/// Bus arbitration policies and lock state.
pub mod arbiter;

/// Segment-address decoder with a one-entry cache.
pub mod decoder;

/// Connection records, the four pipeline queues and their consumers.
pub mod pipeline;

/// Descriptors, BARs and the read-only configuration space.
pub mod pnp;

/// Ports handed to endpoints while they run.
pub mod socket;

use self::arbiter::{Arbiter, LockState};
use self::decoder::{AddressDecoder, Region};
use self::pipeline::{Connection, ConnectionState, DataBusState, PipelineQueues};
use self::pnp::{Bar, ConfigSpace, DESCRIPTOR_WORDS};
use crate::common::error::Result;
use crate::common::{
    BlockingStatus, ConfigError, Phase, ProtocolError, ResponseStatus, SimTime, SyncStatus,
    Transaction, TransactionPool, TxId,
};
use crate::config::FabricConfig;
use crate::soc::traits::{BusDevice, Target};
use crate::stats::BusStats;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Maximum number of initiators and of targets on one fabric.
pub const MAX_DEVICES: usize = 16;

/// Descriptor snapshot of one bound device, taken at elaboration.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub bus_index: u32,
    pub words: [u32; DESCRIPTOR_WORDS],
}

impl DeviceInfo {
    pub fn of<D: BusDevice + ?Sized>(dev: &D) -> Self {
        Self {
            name: dev.name().to_string(),
            bus_index: dev.bus_index(),
            words: dev.descriptor_words(),
        }
    }
}

/// Write notification broadcast when a write leaves the address phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnoopEvent {
    pub master: usize,
    pub address: u32,
    pub length: usize,
}

/// Receiver of write snoop events (e.g. a data cache keeping coherent).
pub trait SnoopListener {
    fn snoop(&mut self, event: &SnoopEvent);
}

/// The bus controller.
pub struct Fabric {
    clock: SimTime,
    mem_check: bool,
    default_master: u32,

    decoder: AddressDecoder,
    config_space: ConfigSpace,
    arbiter: Arbiter,
    lock: LockState,

    busy: bool,
    busy_until: SimTime,
    address_bus_owner: Option<usize>,
    data_bus: DataBusState,

    pool: TransactionPool,
    connections: HashMap<TxId, Connection>,
    requests: Vec<Option<TxId>>,
    queues: PipelineQueues,
    next_tick: SimTime,

    masters: Vec<DeviceInfo>,
    slaves: Vec<DeviceInfo>,
    listeners: Vec<Box<dyn SnoopListener>>,
    stats: BusStats,
}

impl Fabric {
    /// Creates an unelaborated fabric.
    ///
    /// # Arguments
    ///
    /// * `config` - Window layout, arbitration policy, checks and clock.
    pub fn new(config: &FabricConfig) -> Self {
        let clock = config.clock_period();
        Self {
            clock,
            mem_check: config.mem_check,
            default_master: config.default_master,
            decoder: AddressDecoder::new(),
            config_space: ConfigSpace::new(
                config.plug_and_play,
                config.io_addr,
                config.io_mask,
                config.cfg_addr,
                config.cfg_mask,
            ),
            arbiter: Arbiter::new(config.arbitration),
            lock: LockState::default(),
            busy: false,
            busy_until: SimTime::ZERO,
            address_bus_owner: None,
            data_bus: DataBusState::Idle,
            pool: TransactionPool::new(),
            connections: HashMap::new(),
            requests: Vec::new(),
            queues: PipelineQueues::new(),
            next_tick: clock + SimTime::RESOLUTION,
            masters: Vec::new(),
            slaves: Vec::new(),
            listeners: Vec::new(),
            stats: BusStats {
                clock_period_ps: clock.as_ps(),
                ..BusStats::default()
            },
        }
    }

    /// Binds the devices and builds the address map.
    ///
    /// Masters and slaves are bound in slice order; that order is the master
    /// id used by arbitration and the slot returned by the decoder. The bus
    /// index of each device selects its plug & play block.
    pub fn elaborate(
        &mut self,
        masters: Vec<DeviceInfo>,
        slaves: Vec<DeviceInfo>,
    ) -> std::result::Result<(), ConfigError> {
        if self.clock == SimTime::ZERO {
            return Err(ConfigError::InvalidDevice {
                name: "fabric".to_string(),
                reason: "clock period must be non-zero".to_string(),
            });
        }
        if slaves.len() > MAX_DEVICES {
            return Err(ConfigError::TooManyDevices {
                side: "slaves",
                count: slaves.len(),
                max: MAX_DEVICES,
            });
        }
        if masters.len() > MAX_DEVICES {
            return Err(ConfigError::TooManyDevices {
                side: "masters",
                count: masters.len(),
                max: MAX_DEVICES,
            });
        }
        check_indices(&masters)?;
        check_indices(&slaves)?;

        info!(
            slaves = slaves.len(),
            masters = masters.len(),
            default_master = self.default_master,
            "decoder initialization"
        );

        self.decoder.clear();
        for (slot, dev) in slaves.iter().enumerate() {
            self.config_space
                .insert_slave(dev.bus_index as usize, dev.words);

            for (bar_no, word) in dev.words[4..].iter().enumerate() {
                let Some(bar) = Bar::decode(*word) else {
                    debug!(bar = bar_no, name = %dev.name, index = dev.bus_index, "BAR of slave unbound");
                    continue;
                };
                if !bar.is_contiguous() {
                    return Err(ConfigError::MalformedBar {
                        name: dev.name.clone(),
                        bar: bar_no,
                        mask: bar.mask,
                    });
                }
                info!(
                    bar = bar_no,
                    addr = bar.addr,
                    mask = bar.mask,
                    name = %dev.name,
                    index = dev.bus_index,
                    "binding BAR of slave to bus address"
                );

                let region = Region {
                    slot,
                    mask: bar.mask,
                    bar: bar_no,
                };
                if let Some(prev) = self.decoder.insert(bar.key(), region) {
                    // Same masked base: keep the first binding.
                    self.decoder.insert(bar.key(), prev);
                    let (first_start, first_end) = region_range(bar.key(), prev.mask);
                    if self.mem_check {
                        error!(first = %slaves[prev.slot].name, second = %dev.name, "overlap in bus memory map");
                        return Err(ConfigError::Overlap {
                            first: slaves[prev.slot].name.clone(),
                            first_start,
                            first_end,
                            second: dev.name.clone(),
                            second_start: bar.start(),
                            second_end: bar.end(),
                        });
                    }
                    warn!(name = %dev.name, addr = bar.addr, "BAR shadowed by an earlier binding");
                }
            }
        }

        for dev in &masters {
            self.config_space
                .insert_master(dev.bus_index as usize, dev.words);
            for (bar_no, word) in dev.words[4..].iter().enumerate() {
                match Bar::decode(*word) {
                    Some(bar) => info!(
                        bar = bar_no,
                        addr = bar.addr,
                        mask = bar.mask,
                        name = %dev.name,
                        index = dev.bus_index,
                        "binding BAR of master to bus address"
                    ),
                    None => {
                        debug!(bar = bar_no, name = %dev.name, index = dev.bus_index, "BAR of master unbound")
                    }
                }
            }
        }

        self.slaves = slaves;
        self.masters = masters;

        if self.mem_check {
            self.check_memory_map()?;
        }

        self.requests = vec![None; self.masters.len()];
        self.next_tick = self.clock + SimTime::RESOLUTION;
        Ok(())
    }

    /// Verifies that no two decoded regions intersect.
    fn check_memory_map(&self) -> std::result::Result<(), ConfigError> {
        let mut ranges: Vec<(u64, u64, usize)> = self
            .decoder
            .regions()
            .map(|(key, r)| {
                let (start, end) = region_range(key, r.mask);
                (start, end, r.slot)
            })
            .collect();
        ranges.sort_unstable();

        for pair in ranges.windows(2) {
            let (last, cur) = (pair[0], pair[1]);
            if last.1 >= cur.0 {
                let first = self.slaves[last.2].name.clone();
                let second = self.slaves[cur.2].name.clone();
                error!(
                    first = %first,
                    first_start = last.0,
                    first_end = last.1,
                    second = %second,
                    second_start = cur.0,
                    second_end = cur.1,
                    "overlap in bus memory map"
                );
                return Err(ConfigError::Overlap {
                    first,
                    first_start: last.0,
                    first_end: last.1,
                    second,
                    second_start: cur.0,
                    second_end: cur.1,
                });
            }
        }
        Ok(())
    }

    /// Registers a snoop listener.
    pub fn add_snoop_listener(&mut self, listener: Box<dyn SnoopListener>) {
        self.listeners.push(listener);
    }

    /// Stores a new transaction with one reference held by the caller.
    pub fn alloc(&mut self, tx: Transaction) -> TxId {
        self.pool.alloc(tx)
    }

    pub fn transaction(&self, id: TxId) -> Option<&Transaction> {
        self.pool.get(id)
    }

    pub fn transaction_mut(&mut self, id: TxId) -> Option<&mut Transaction> {
        self.pool.get_mut(id)
    }

    /// Drops one reference; returns the transaction once the last is gone.
    pub fn release(&mut self, id: TxId) -> Option<Transaction> {
        self.pool.release(id)
    }

    fn record_transfer(&mut self, master: usize, tx: &mut Transaction) {
        tx.master_id = Some(master);
        self.stats.record_transfer(tx);
    }

    /// Split-phase forward path from initiator `master`.
    ///
    /// BEGIN_REQ takes a reference, queues the request for decoding and is
    /// answered `Accepted`. END_RESP queues the release and is answered
    /// `Completed`. Any other phase is a protocol violation.
    pub fn nb_transport_fw(
        &mut self,
        now: SimTime,
        master: usize,
        id: TxId,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> Result<SyncStatus> {
        if master >= self.masters.len() {
            return Err(ProtocolError::UnknownMaster(master).into());
        }

        match *phase {
            Phase::BeginRequest => {
                if let Some(pending) = self.requests[master] {
                    return Err(ProtocolError::RequestOverlap { master, pending }.into());
                }
                if !self.pool.acquire(id) {
                    return Err(ProtocolError::UnknownTransaction(id).into());
                }
                if let Some(tx) = self.pool.get_mut(id) {
                    tx.master_id = Some(master);
                    self.stats.record_transfer(tx);
                    debug!(tx = %id, master, addr = tx.address, lock = tx.lock, "BEGIN_REQ accepted");
                }
                self.connections
                    .insert(id, Connection::new(master, id, now + *delay));
                self.requests[master] = Some(id);
                self.queues.accept.notify(id, now, *delay);
                *delay = SimTime::ZERO;
                Ok(SyncStatus::Accepted)
            }
            Phase::EndResponse => {
                let conn = self
                    .connections
                    .get_mut(&id)
                    .ok_or(ProtocolError::UnknownTransaction(id))?;
                if conn.master != master {
                    return Err(ProtocolError::OutOfOrder {
                        tx: id,
                        phase: *phase,
                        state: "owned by another master",
                    }
                    .into());
                }
                conn.advance(ConnectionState::EndResponding, *phase)?;
                self.queues.end_response.notify(id, now, *delay);
                *delay = SimTime::ZERO;
                Ok(SyncStatus::Completed)
            }
            other => Err(ProtocolError::IllegalForwardPhase {
                master,
                phase: other,
            }
            .into()),
        }
    }

    /// Split-phase backward path from target `slave`.
    ///
    /// END_REQ and BEGIN_RESP are queued for the request and response stages
    /// and answered `Accepted`. Any other phase is a protocol violation.
    pub fn nb_transport_bw(
        &mut self,
        now: SimTime,
        slave: usize,
        id: TxId,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> Result<SyncStatus> {
        let conn = self
            .connections
            .get(&id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;
        if conn.route != pipeline::Route::Target(slave) || conn.state < ConnectionState::Scheduled
        {
            return Err(ProtocolError::OutOfOrder {
                tx: id,
                phase: *phase,
                state: conn.state.as_str(),
            }
            .into());
        }

        match *phase {
            Phase::EndRequest => self.queues.request.notify(id, now, *delay),
            Phase::BeginResponse => self.queues.response.notify(id, now, *delay),
            other => {
                return Err(ProtocolError::IllegalBackwardPhase {
                    slave,
                    phase: other,
                }
                .into())
            }
        }
        *delay = SimTime::ZERO;
        Ok(SyncStatus::Accepted)
    }

    /// Blocking transport from initiator `master`.
    ///
    /// Returns `Contended` without touching anything while the bus is busy
    /// or locked by another master; the caller retries one clock later.
    /// Otherwise the access is serviced inline and `delay` grows by the
    /// access time.
    pub fn b_transport(
        &mut self,
        now: SimTime,
        master: usize,
        tx: &mut Transaction,
        delay: &mut SimTime,
        slaves: &mut [Box<dyn Target>],
    ) -> BlockingStatus {
        if self.busy || now < self.busy_until || !self.lock.admits(master) {
            debug!(
                master,
                busy = self.busy,
                locked = self.lock.locked,
                holder = self.lock.holder,
                "bus contended"
            );
            return BlockingStatus::Contended;
        }

        self.busy = true;
        self.lock.capture(master, tx.lock);
        self.record_transfer(master, tx);
        let address = tx.address;

        if self.config_space.contains(address) {
            self.stats.decode_lookups += 1;
            self.stats.decode_successful += 1;
            if tx.is_read() {
                let words = self.config_space.read_bytes(address, &mut tx.data);
                *delay += self.clock * words;
                tx.response = ResponseStatus::Ok;
            } else {
                error!(
                    addr = address,
                    size = tx.len(),
                    master,
                    "forbidden write to plug & play configuration area"
                );
                tx.response = ResponseStatus::CommandError;
            }
        } else if let Some(slot) = self.decoder.decode(address) {
            debug!(addr = address, master, slave = %self.slaves[slot].name, "blocking request");
            *delay += self.clock;
            slaves[slot].b_transport(tx, delay);
            if tx.is_write() {
                let event = SnoopEvent {
                    master,
                    address,
                    length: tx.len(),
                };
                self.stats.snoops += 1;
                for listener in &mut self.listeners {
                    listener.snoop(&event);
                }
            }
        } else {
            warn!(addr = address, master, "blocking request to unmapped address space");
            tx.response = ResponseStatus::AddressError;
        }

        self.stats.record_response(tx.response);
        self.busy_until = now + *delay;
        self.busy = false;
        BlockingStatus::Completed
    }

    /// Untimed debug access. Bypasses arbitration and locking but still
    /// decodes and still refuses configuration writes.
    ///
    /// # Returns
    ///
    /// The number of bytes transferred.
    pub fn transport_dbg(
        &mut self,
        master: usize,
        tx: &mut Transaction,
        slaves: &mut [Box<dyn Target>],
    ) -> usize {
        tx.master_id = Some(master);
        if self.config_space.contains(tx.address) {
            if tx.is_read() {
                self.config_space.read_bytes(tx.address, &mut tx.data);
                tx.response = ResponseStatus::Ok;
                tx.len()
            } else {
                error!(addr = tx.address, master, "forbidden debug write to plug & play configuration area");
                tx.response = ResponseStatus::CommandError;
                0
            }
        } else if let Some(slot) = self.decoder.lookup(tx.address) {
            slaves[slot].transport_dbg(tx)
        } else {
            warn!(addr = tx.address, master, "debug access to unmapped address space");
            tx.response = ResponseStatus::AddressError;
            0
        }
    }

    /// Earliest due pipeline event, if any.
    pub fn next_event(&self) -> Option<SimTime> {
        self.queues.next_due()
    }

    /// Time of the next arbitration tick.
    pub fn next_arbitration(&self) -> SimTime {
        self.next_tick
    }

    /// Resolves `address` the way the fabric routes it: `None` for the
    /// configuration space and for unmapped addresses.
    pub fn decode(&mut self, address: u32) -> Option<usize> {
        if self.config_space.contains(address) {
            return None;
        }
        self.decoder.decode(address)
    }

    pub fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }

    pub fn config_space(&self) -> &ConfigSpace {
        &self.config_space
    }

    pub fn clock_period(&self) -> SimTime {
        self.clock
    }

    pub fn master_count(&self) -> usize {
        self.masters.len()
    }

    pub fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    pub fn masters(&self) -> &[DeviceInfo] {
        &self.masters
    }

    pub fn slaves(&self) -> &[DeviceInfo] {
        &self.slaves
    }

    /// `true` while a blocking access is being serviced.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn lock_state(&self) -> LockState {
        self.lock
    }

    pub fn address_bus_owner(&self) -> Option<usize> {
        self.address_bus_owner
    }

    pub fn data_bus_state(&self) -> DataBusState {
        self.data_bus
    }

    /// State of an in-flight split transaction; `None` once released.
    pub fn connection_state(&self, id: TxId) -> Option<ConnectionState> {
        self.connections.get(&id).map(|c| c.state)
    }

    /// `true` when no split transaction is in flight.
    pub fn is_idle(&self) -> bool {
        self.connections.is_empty() && self.queues.is_empty()
    }

    /// Number of transactions still held by anyone.
    pub fn live_transactions(&self) -> usize {
        self.pool.live()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> BusStats {
        let mut stats = self.stats.clone();
        stats.decode_lookups += self.decoder.lookups();
        stats.decode_hits += self.decoder.cache_hits();
        stats.decode_successful += self.decoder.successful();
        stats
    }
}

/// Byte range `[start, end]` covered by a segment key and mask.
fn region_range(key: u32, mask: u32) -> (u64, u64) {
    let start = u64::from(key & mask & 0xFFF) << 20;
    let size = u64::from((!mask & 0xFFF) + 1) << 20;
    (start, start + size - 1)
}

fn check_indices(devices: &[DeviceInfo]) -> std::result::Result<(), ConfigError> {
    let mut seen: HashMap<u32, &str> = HashMap::new();
    for dev in devices {
        if dev.bus_index as usize >= MAX_DEVICES {
            return Err(ConfigError::IndexOutOfRange {
                name: dev.name.clone(),
                index: dev.bus_index,
                max: MAX_DEVICES as u32 - 1,
            });
        }
        if let Some(first) = seen.insert(dev.bus_index, dev.name.as_str()) {
            return Err(ConfigError::DuplicateIndex {
                index: dev.bus_index,
                first: first.to_string(),
                second: dev.name.clone(),
            });
        }
    }
    Ok(())
}
