//! Memory Target.
//!
//! A sparse, byte-addressed memory that services all three transport styles.
//! Storage is allocated in 4 KiB pages on first write; unwritten bytes read
//! as zero.
//!
//! Split-phase timing:
//! 1. **BEGIN_REQ:** the access is performed immediately and the request
//!    phase ends after `wait_states` cycles (returned as `Updated`/END_REQ).
//! 2. **BEGIN_RESP:** sent on the backward path `wait_states + latency`
//!    cycles after the request, where the latency comes from the configured
//!    timing model.
//! 3. **END_RESP:** answered `Completed`.

use super::timing::{AccessTiming, FixedLatency, RowBufferLatency, TimingModel};
use crate::common::error::Result;
use crate::common::{
    ConfigError, Phase, ProtocolError, ResponseStatus, SimTime, SyncStatus, Transaction, TxId,
};
use crate::config::{DeviceConfig, FabricConfig};
use crate::sim::peq::PayloadEventQueue;
use crate::soc::interconnect::pnp::{self, Bar, DeviceId, DESCRIPTOR_WORDS};
use crate::soc::traits::{BusDevice, Target, TargetPort};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

const PAGE_SHIFT: u32 = 12;
const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
const PAGE_MASK: u32 = PAGE_SIZE as u32 - 1;

/// Kind-specific keys of a `memory` device.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryParams {
    /// Cycles from BEGIN_REQ to END_REQ.
    #[serde(default)]
    pub wait_states: u64,

    /// Cycles from END_REQ to BEGIN_RESP under the fixed model.
    #[serde(default = "default_latency")]
    pub latency_cycles: u64,

    #[serde(default)]
    pub timing: TimingModel,

    #[serde(default = "default_t_cas")]
    pub t_cas: u64,

    #[serde(default = "default_t_ras")]
    pub t_ras: u64,

    #[serde(default = "default_t_pre")]
    pub t_pre: u64,

    /// log2 of the DRAM row size in bytes.
    #[serde(default = "default_row_shift")]
    pub row_shift: u32,
}

impl Default for MemoryParams {
    fn default() -> Self {
        Self {
            wait_states: 0,
            latency_cycles: default_latency(),
            timing: TimingModel::Fixed,
            t_cas: default_t_cas(),
            t_ras: default_t_ras(),
            t_pre: default_t_pre(),
            row_shift: default_row_shift(),
        }
    }
}

fn default_latency() -> u64 {
    1
}

fn default_t_cas() -> u64 {
    2
}

fn default_t_ras() -> u64 {
    2
}

fn default_t_pre() -> u64 {
    2
}

fn default_row_shift() -> u32 {
    11
}

/// Sparse memory target.
pub struct Memory {
    name: String,
    index: u32,
    words: [u32; DESCRIPTOR_WORDS],
    clock: SimTime,
    wait_states: u64,
    timing: Box<dyn AccessTiming>,
    pages: HashMap<u32, Box<[u8; PAGE_SIZE]>>,
    responses: PayloadEventQueue<TxId>,
    reads: u64,
    writes: u64,
}

impl Memory {
    /// Creates a memory with a fixed latency model.
    ///
    /// # Arguments
    ///
    /// * `name` - Device name for logs and errors.
    /// * `index` - Bus index.
    /// * `bars` - Address regions served; at most four.
    /// * `clock` - Bus clock period.
    /// * `wait_states` - Cycles from BEGIN_REQ to END_REQ.
    /// * `latency` - Cycles from END_REQ to BEGIN_RESP.
    pub fn new(
        name: impl Into<String>,
        index: u32,
        bars: &[Bar],
        clock: SimTime,
        wait_states: u64,
        latency: u64,
    ) -> Self {
        Self::with_timing(
            name,
            index,
            DeviceId::default(),
            bars,
            clock,
            wait_states,
            Box::new(FixedLatency::new(latency)),
        )
    }

    pub fn with_timing(
        name: impl Into<String>,
        index: u32,
        id: DeviceId,
        bars: &[Bar],
        clock: SimTime,
        wait_states: u64,
        timing: Box<dyn AccessTiming>,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            words: pnp::descriptor(id, bars),
            clock,
            wait_states,
            timing,
            pages: HashMap::new(),
            responses: PayloadEventQueue::new("memory.response"),
            reads: 0,
            writes: 0,
        }
    }

    /// Builds a memory from its configuration entry.
    pub fn from_config(
        dev: &DeviceConfig,
        fabric: &FabricConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let bars = dev.bars();
        if bars.len() > 4 {
            return Err(ConfigError::InvalidDevice {
                name: dev.name.clone(),
                reason: format!("{} BARs given, at most 4 fit a descriptor", bars.len()),
            });
        }
        let params: MemoryParams = dev.params()?;
        let timing: Box<dyn AccessTiming> = match params.timing {
            TimingModel::Fixed => Box::new(FixedLatency::new(params.latency_cycles)),
            TimingModel::RowBuffer => Box::new(RowBufferLatency::new(
                params.t_cas,
                params.t_ras,
                params.t_pre,
                params.row_shift,
            )),
        };
        Ok(Self::with_timing(
            dev.name.clone(),
            dev.index,
            dev.device_id(),
            &bars,
            fabric.clock_period(),
            params.wait_states,
            timing,
        ))
    }

    pub fn read_byte(&self, addr: u32) -> u8 {
        self.pages
            .get(&(addr >> PAGE_SHIFT))
            .map_or(0, |page| page[(addr & PAGE_MASK) as usize])
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) {
        let page = self
            .pages
            .entry(addr >> PAGE_SHIFT)
            .or_insert_with(|| Box::new([0; PAGE_SIZE]));
        page[(addr & PAGE_MASK) as usize] = value;
    }

    /// Copies `len` bytes starting at `addr`.
    pub fn read_bytes(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.read_byte(addr.wrapping_add(i as u32)))
            .collect()
    }

    /// Preloads `data` at `addr`.
    pub fn load(&mut self, addr: u32, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(addr.wrapping_add(i as u32), *byte);
        }
    }

    /// Number of read and write accesses serviced so far.
    pub fn access_counts(&self) -> (u64, u64) {
        (self.reads, self.writes)
    }

    fn access(&mut self, tx: &mut Transaction) {
        if tx.is_read() {
            for (i, byte) in tx.data.iter_mut().enumerate() {
                *byte = self.read_byte(tx.address.wrapping_add(i as u32));
            }
            self.reads += 1;
        } else {
            for (i, byte) in tx.data.iter().enumerate() {
                self.write_byte(tx.address.wrapping_add(i as u32), *byte);
            }
            self.writes += 1;
        }
        tx.response = ResponseStatus::Ok;
    }
}

impl BusDevice for Memory {
    fn name(&self) -> &str {
        &self.name
    }

    fn bus_index(&self) -> u32 {
        self.index
    }

    fn descriptor_words(&self) -> [u32; DESCRIPTOR_WORDS] {
        self.words
    }
}

impl Target for Memory {
    fn b_transport(&mut self, tx: &mut Transaction, delay: &mut SimTime) {
        let latency = self.timing.access_latency(tx.address);
        self.access(tx);
        *delay += self.clock * (self.wait_states + latency);
    }

    fn nb_transport_fw(
        &mut self,
        now: SimTime,
        id: TxId,
        tx: &mut Transaction,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> SyncStatus {
        match *phase {
            Phase::BeginRequest => {
                let latency = self.timing.access_latency(tx.address);
                self.access(tx);
                debug!(name = %self.name, tx = %id, addr = tx.address, latency, "memory request");

                let request = self.clock * self.wait_states;
                self.responses
                    .notify(id, now, request + self.clock * latency);
                *phase = Phase::EndRequest;
                *delay = request;
                SyncStatus::Updated
            }
            Phase::EndResponse => SyncStatus::Completed,
            other => {
                warn!(name = %self.name, tx = %id, phase = %other, "unexpected forward phase ignored");
                SyncStatus::Accepted
            }
        }
    }

    fn transport_dbg(&mut self, tx: &mut Transaction) -> usize {
        self.access(tx);
        tx.len()
    }

    fn next_event(&self) -> Option<SimTime> {
        self.responses.next_due()
    }

    fn advance(&mut self, now: SimTime, port: &mut dyn TargetPort) -> Result<()> {
        while let Some(id) = self.responses.pop_due(now) {
            let mut phase = Phase::BeginResponse;
            let mut delay = SimTime::ZERO;
            let status = port.nb_transport_bw(id, &mut phase, &mut delay)?;
            trace!(name = %self.name, tx = %id, ?status, "BEGIN_RESP sent");
            if status != SyncStatus::Accepted {
                return Err(ProtocolError::UnexpectedSync {
                    endpoint: "fabric".to_string(),
                    phase,
                    status,
                }
                .into());
            }
        }
        Ok(())
    }

    fn as_memory(&self) -> Option<&Memory> {
        Some(self)
    }
}
