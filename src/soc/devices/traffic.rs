//! Scripted Traffic Generator.
//!
//! An initiator that plays back a list of bus operations. Each operation
//! names its transport style:
//!
//! * **Split:** four-phase transport. The next operation may start as soon as
//!   END_REQ arrives, so split operations pipeline.
//! * **Blocking:** the whole access in one call; retried one clock later while
//!   the bus is contended.
//! * **Debug:** untimed, bypasses arbitration.
//!
//! Every finished operation is recorded as a `Completion` that tests and the
//! report can inspect.

use crate::common::error::Result;
use crate::common::{
    BlockingStatus, Command, ConfigError, Phase, ProtocolError, ResponseStatus, SimTime,
    SyncStatus, Transaction, TxId,
};
use crate::config::{DeviceConfig, FabricConfig};
use crate::soc::interconnect::pnp::{self, DESCRIPTOR_WORDS};
use crate::soc::traits::{BusDevice, Initiator, InitiatorPort};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Transfer direction in a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Read,
    Write,
}

/// Transport style of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AccessMode {
    #[default]
    Split,
    Blocking,
    Debug,
}

/// How the generator answers BEGIN_RESP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResponseAck {
    /// Answer `Accepted` and send END_RESP on the forward path afterwards.
    Accept,
    /// Answer `Updated` with the phase moved to END_RESP.
    Update,
    /// Answer `Completed`.
    #[default]
    Complete,
}

/// One scripted bus operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrafficOp {
    pub op: OpKind,
    pub addr: u32,

    /// Read length in bytes. Ignored for writes.
    #[serde(default)]
    pub len: usize,

    /// Write payload. Ignored for reads.
    #[serde(default)]
    pub data: Vec<u8>,

    #[serde(default)]
    pub lock: bool,

    #[serde(default)]
    pub mode: AccessMode,

    /// Idle cycles before the operation is issued.
    #[serde(default)]
    pub gap: u64,
}

impl TrafficOp {
    pub fn read(addr: u32, len: usize) -> Self {
        Self {
            op: OpKind::Read,
            addr,
            len,
            data: Vec::new(),
            lock: false,
            mode: AccessMode::Split,
            gap: 0,
        }
    }

    pub fn write(addr: u32, data: &[u8]) -> Self {
        Self {
            op: OpKind::Write,
            addr,
            len: data.len(),
            data: data.to_vec(),
            lock: false,
            mode: AccessMode::Split,
            gap: 0,
        }
    }

    pub fn mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn locked(mut self) -> Self {
        self.lock = true;
        self
    }

    pub fn gap(mut self, cycles: u64) -> Self {
        self.gap = cycles;
        self
    }

    fn transaction(&self) -> Transaction {
        let tx = match self.op {
            OpKind::Read => Transaction::read(self.addr, self.len),
            OpKind::Write => Transaction::write(self.addr, &self.data),
        };
        tx.locked(self.lock)
    }
}

/// Kind-specific keys of a `traffic` device.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafficParams {
    #[serde(default)]
    pub script: Vec<TrafficOp>,

    #[serde(default)]
    pub ack: ResponseAck,

    /// Cycle at which the first operation becomes eligible.
    #[serde(default)]
    pub start_cycle: u64,
}

/// Record of one finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Position in the script.
    pub op: usize,
    pub mode: AccessMode,
    pub command: Command,
    pub address: u32,
    pub data: Vec<u8>,
    pub response: ResponseStatus,
    pub issued: SimTime,
    /// END_REQ arrival; `None` for blocking and debug operations.
    pub end_request: Option<SimTime>,
    pub completed: SimTime,
}

struct InFlight {
    op: usize,
    issued: SimTime,
    end_request: Option<SimTime>,
}

pub struct TrafficGenerator {
    name: String,
    index: u32,
    words: [u32; DESCRIPTOR_WORDS],
    clock: SimTime,
    ack: ResponseAck,

    script: Vec<TrafficOp>,
    cursor: usize,
    wake: Option<SimTime>,
    awaiting_end_request: Option<TxId>,
    in_flight: HashMap<TxId, InFlight>,

    end_responses: Vec<TxId>,
    releases: Vec<TxId>,
    housekeeping_at: Option<SimTime>,

    completions: Vec<Completion>,
    retries: u64,
}

impl TrafficGenerator {
    /// Creates a generator that starts at time zero.
    pub fn new(name: impl Into<String>, index: u32, clock: SimTime, script: Vec<TrafficOp>) -> Self {
        let mut traffic = Self {
            name: name.into(),
            index,
            words: pnp::descriptor(Default::default(), &[]),
            clock,
            ack: ResponseAck::default(),
            script,
            cursor: 0,
            wake: None,
            awaiting_end_request: None,
            in_flight: HashMap::new(),
            end_responses: Vec::new(),
            releases: Vec::new(),
            housekeeping_at: None,
            completions: Vec::new(),
            retries: 0,
        };
        traffic.schedule_next(SimTime::ZERO);
        traffic
    }

    /// Builds a generator from its configuration entry.
    pub fn from_config(
        dev: &DeviceConfig,
        fabric: &FabricConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let params: TrafficParams = dev.params()?;
        for (i, op) in params.script.iter().enumerate() {
            if op.op == OpKind::Write && op.data.is_empty() {
                return Err(ConfigError::InvalidDevice {
                    name: dev.name.clone(),
                    reason: format!("script op {} writes no data", i),
                });
            }
        }

        let clock = fabric.clock_period();
        let mut traffic = Self::new(dev.name.clone(), dev.index, clock, params.script)
            .with_ack(params.ack);
        traffic.words = pnp::descriptor(dev.device_id(), &dev.bars());
        traffic.schedule_next(clock * params.start_cycle);
        Ok(traffic)
    }

    /// Sets how BEGIN_RESP is answered.
    pub fn with_ack(mut self, ack: ResponseAck) -> Self {
        self.ack = ack;
        self
    }

    /// Delays the first operation to `cycle`.
    pub fn starting_at(mut self, cycle: u64) -> Self {
        let start = self.clock * cycle;
        self.schedule_next(start);
        self
    }

    pub fn completions(&self) -> &[Completion] {
        &self.completions
    }

    /// Number of blocking attempts that found the bus contended.
    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn script_len(&self) -> usize {
        self.script.len()
    }

    /// Makes the operation at `cursor` eligible `gap` cycles after `from`.
    fn schedule_next(&mut self, from: SimTime) {
        self.wake = self
            .script
            .get(self.cursor)
            .map(|op| from + self.clock * op.gap);
    }

    fn flush(&mut self, port: &mut dyn InitiatorPort) -> Result<()> {
        for id in std::mem::take(&mut self.end_responses) {
            let mut phase = Phase::EndResponse;
            let mut delay = SimTime::ZERO;
            let status = port.nb_transport_fw(id, &mut phase, &mut delay)?;
            if status != SyncStatus::Completed {
                return Err(ProtocolError::UnexpectedSync {
                    endpoint: "fabric".to_string(),
                    phase,
                    status,
                }
                .into());
            }
            self.releases.push(id);
        }
        for id in std::mem::take(&mut self.releases) {
            trace!(name = %self.name, tx = %id, "initiator releases transaction");
            port.release(id);
        }
        self.housekeeping_at = None;
        Ok(())
    }

    fn issue(&mut self, now: SimTime, port: &mut dyn InitiatorPort) -> Result<()> {
        let index = self.cursor;
        let Some(op) = self.script.get(index) else {
            self.wake = None;
            return Ok(());
        };
        let mode = op.mode;
        let mut tx = op.transaction();

        match mode {
            AccessMode::Split => {
                let id = port.alloc(tx);
                let mut phase = Phase::BeginRequest;
                let mut delay = SimTime::ZERO;
                let status = port.nb_transport_fw(id, &mut phase, &mut delay)?;
                if status != SyncStatus::Accepted {
                    return Err(ProtocolError::UnexpectedSync {
                        endpoint: "fabric".to_string(),
                        phase,
                        status,
                    }
                    .into());
                }
                debug!(name = %self.name, tx = %id, op = index, "split request issued");
                self.in_flight.insert(
                    id,
                    InFlight {
                        op: index,
                        issued: now,
                        end_request: None,
                    },
                );
                self.awaiting_end_request = Some(id);
                self.cursor += 1;
                self.wake = None;
            }
            AccessMode::Blocking => {
                let mut delay = SimTime::ZERO;
                match port.b_transport(&mut tx, &mut delay) {
                    BlockingStatus::Contended => {
                        self.retries += 1;
                        self.wake = Some(now + self.clock);
                    }
                    BlockingStatus::Completed => {
                        let done = now + delay;
                        debug!(name = %self.name, op = index, response = ?tx.response, "blocking access done");
                        self.record(index, mode, tx, now, None, done);
                        self.cursor += 1;
                        self.schedule_next(done);
                    }
                }
            }
            AccessMode::Debug => {
                let moved = port.transport_dbg(&mut tx);
                trace!(name = %self.name, op = index, bytes = moved, "debug access");
                self.record(index, mode, tx, now, None, now);
                self.cursor += 1;
                self.schedule_next(now);
            }
        }
        Ok(())
    }

    fn record(
        &mut self,
        op: usize,
        mode: AccessMode,
        tx: Transaction,
        issued: SimTime,
        end_request: Option<SimTime>,
        completed: SimTime,
    ) {
        self.completions.push(Completion {
            op,
            mode,
            command: tx.command,
            address: tx.address,
            data: tx.data,
            response: tx.response,
            issued,
            end_request,
            completed,
        });
    }
}

impl BusDevice for TrafficGenerator {
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

impl Initiator for TrafficGenerator {
    fn nb_transport_bw(
        &mut self,
        now: SimTime,
        id: TxId,
        tx: &mut Transaction,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> SyncStatus {
        match *phase {
            Phase::EndRequest => {
                if let Some(entry) = self.in_flight.get_mut(&id) {
                    entry.end_request = Some(now);
                }
                if self.awaiting_end_request == Some(id) {
                    self.awaiting_end_request = None;
                    self.schedule_next(now);
                }
                SyncStatus::Accepted
            }
            Phase::BeginResponse => {
                if let Some(entry) = self.in_flight.remove(&id) {
                    self.record(
                        entry.op,
                        AccessMode::Split,
                        tx.clone(),
                        entry.issued,
                        entry.end_request,
                        now,
                    );
                }
                self.housekeeping_at = Some(now);
                match self.ack {
                    ResponseAck::Accept => {
                        self.end_responses.push(id);
                        SyncStatus::Accepted
                    }
                    ResponseAck::Update => {
                        self.releases.push(id);
                        *phase = Phase::EndResponse;
                        *delay = SimTime::ZERO;
                        SyncStatus::Updated
                    }
                    ResponseAck::Complete => {
                        self.releases.push(id);
                        SyncStatus::Completed
                    }
                }
            }
            other => {
                warn!(name = %self.name, tx = %id, phase = %other, "unexpected backward phase");
                SyncStatus::Accepted
            }
        }
    }

    fn next_event(&self) -> Option<SimTime> {
        let wake = if self.awaiting_end_request.is_none() {
            self.wake
        } else {
            None
        };
        match (wake, self.housekeeping_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn advance(&mut self, now: SimTime, port: &mut dyn InitiatorPort) -> Result<()> {
        self.flush(port)?;
        if self.awaiting_end_request.is_none() && self.wake.map_or(false, |t| t <= now) {
            self.issue(now, port)?;
        }
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.cursor >= self.script.len()
            && self.in_flight.is_empty()
            && self.awaiting_end_request.is_none()
            && self.end_responses.is_empty()
            && self.releases.is_empty()
    }

    fn as_traffic(&self) -> Option<&TrafficGenerator> {
        Some(self)
    }
}
