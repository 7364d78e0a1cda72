//! Split-Phase Pipeline.
//!
//! Four payload event queues connect the arbiter, the targets and the
//! initiators:
//!
//! * **Accept** (initiator → fabric): classify and decode a new request.
//! * **Request** (arbiter fast path or target END_REQ): end the address phase.
//! * **Response** (arbiter fast path or target BEGIN_RESP): start the data phase.
//! * **EndResponse** (initiator END_RESP): finish the data phase and release.
//!
//! Each in-flight transaction has a `Connection` whose state only moves
//! forward. A phase that would move it backwards or skip a step is a
//! protocol error.

use super::{Fabric, SnoopEvent};
use crate::common::error::Result;
use crate::common::{Phase, ProtocolError, ResponseStatus, SimTime, SyncStatus, TxId};
use crate::sim::peq::PayloadEventQueue;
use crate::soc::traits::{Initiator, Target};
use tracing::{debug, error, trace, warn};

/// Life cycle of a split-phase transaction inside the fabric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// BEGIN_REQ taken, waiting for the accept stage.
    Accepted,
    /// Decoded, waiting for the arbiter.
    Pending,
    /// Granted the address bus.
    Scheduled,
    /// The target ended the request phase.
    RequestAck,
    /// The fabric synthesised the response itself (configuration space or
    /// default slave).
    ConfigFastpath,
    /// BEGIN_RESP relayed to the initiator.
    Responding,
    /// END_RESP seen, waiting for the release stage.
    EndResponding,
    /// Finished; the fabric's reference is gone.
    Released,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Accepted => "Accepted",
            ConnectionState::Pending => "Pending",
            ConnectionState::Scheduled => "Scheduled",
            ConnectionState::RequestAck => "RequestAck",
            ConnectionState::ConfigFastpath => "ConfigFastpath",
            ConnectionState::Responding => "Responding",
            ConnectionState::EndResponding => "EndResponding",
            ConnectionState::Released => "Released",
        }
    }
}

/// Where a transaction is serviced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Not classified yet.
    Undecided,
    /// A bound target, by slot.
    Target(usize),
    /// The plug & play configuration space.
    ConfigSpace,
    /// No target decodes the address; the default slave answers with an
    /// address error.
    Unmapped,
}

impl Route {
    pub fn is_fastpath(self) -> bool {
        matches!(self, Route::ConfigSpace | Route::Unmapped)
    }
}

/// Fabric-side record of one in-flight split transaction.
#[derive(Clone, Debug)]
pub struct Connection {
    pub master: usize,
    pub route: Route,
    pub state: ConnectionState,
    pub start_time: SimTime,
    pub tx: TxId,
    pub end_request_sent: bool,
}

impl Connection {
    pub fn new(master: usize, tx: TxId, now: SimTime) -> Self {
        Self {
            master,
            route: Route::Undecided,
            state: ConnectionState::Accepted,
            start_time: now,
            tx,
            end_request_sent: false,
        }
    }

    /// Moves to `next`, rejecting anything but the single legal successor.
    pub fn advance(&mut self, next: ConnectionState, phase: Phase) -> Result<()> {
        use ConnectionState::*;
        let legal = matches!(
            (self.state, next),
            (Accepted, Pending)
                | (Pending, Scheduled)
                | (Scheduled, RequestAck)
                | (Scheduled, ConfigFastpath)
                | (RequestAck, Responding)
                | (ConfigFastpath, Responding)
                | (Responding, EndResponding)
                | (EndResponding, Released)
        );
        if !legal {
            return Err(ProtocolError::OutOfOrder {
                tx: self.tx,
                phase,
                state: self.state.as_str(),
            }
            .into());
        }
        trace!(tx = %self.tx, from = self.state.as_str(), to = next.as_str(), "connection state");
        self.state = next;
        Ok(())
    }
}

/// State of the shared data bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DataBusState {
    #[default]
    Idle,
    WaitStates,
    Response,
}

/// The four hand-off queues.
pub struct PipelineQueues {
    pub accept: PayloadEventQueue<TxId>,
    pub request: PayloadEventQueue<TxId>,
    pub response: PayloadEventQueue<TxId>,
    pub end_response: PayloadEventQueue<TxId>,
}

impl PipelineQueues {
    pub fn new() -> Self {
        Self {
            accept: PayloadEventQueue::new("accept"),
            request: PayloadEventQueue::new("request"),
            response: PayloadEventQueue::new("response"),
            end_response: PayloadEventQueue::new("end_response"),
        }
    }

    /// Earliest due time over all four queues.
    pub fn next_due(&self) -> Option<SimTime> {
        [
            self.accept.next_due(),
            self.request.next_due(),
            self.response.next_due(),
            self.end_response.next_due(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn is_empty(&self) -> bool {
        self.accept.is_empty()
            && self.request.is_empty()
            && self.response.is_empty()
            && self.end_response.is_empty()
    }
}

impl Default for PipelineQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay from grant to END_REQ for a response synthesised by the fabric:
/// one clock per data word, one picosecond short of the clock edge.
pub fn fastpath_request_delay(len: usize, clock: SimTime) -> SimTime {
    let cycles = if len > 3 { (len >> 2) as u64 } else { 1 };
    (clock * cycles).saturating_sub(SimTime::RESOLUTION)
}

impl Fabric {
    /// Drains every due event, queue by queue, in protocol order.
    ///
    /// # Returns
    ///
    /// `true` if at least one event was consumed.
    pub fn drain(
        &mut self,
        now: SimTime,
        masters: &mut [Box<dyn Initiator>],
        slaves: &mut [Box<dyn Target>],
    ) -> Result<bool> {
        let mut progressed = false;
        while let Some(id) = self.queues.accept.pop_due(now) {
            self.on_accept(now, id)?;
            progressed = true;
        }
        while let Some(id) = self.queues.request.pop_due(now) {
            self.on_request(now, id, masters)?;
            progressed = true;
        }
        while let Some(id) = self.queues.response.pop_due(now) {
            self.on_response(now, id, masters)?;
            progressed = true;
        }
        while let Some(id) = self.queues.end_response.pop_due(now) {
            self.on_end_response(now, id, slaves)?;
            progressed = true;
        }
        Ok(progressed)
    }

    /// Classifies and decodes a freshly accepted request.
    fn on_accept(&mut self, now: SimTime, id: TxId) -> Result<()> {
        let tx = self
            .pool
            .get(id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;
        let (address, is_write) = (tx.address, tx.is_write());

        let route = if self.config_space.contains(address) {
            self.stats.decode_lookups += 1;
            self.stats.decode_successful += 1;
            if is_write {
                warn!(addr = address, "plug & play area is read-only, write will be rejected");
            }
            Route::ConfigSpace
        } else {
            match self.decoder.decode(address) {
                Some(slot) => Route::Target(slot),
                None => {
                    warn!(addr = address, "request to unmapped address space");
                    Route::Unmapped
                }
            }
        };

        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;
        conn.advance(ConnectionState::Pending, Phase::BeginRequest)?;
        conn.route = route;
        conn.start_time = now;
        debug!(tx = %id, master = conn.master, addr = address, route = ?route, "decoded");
        Ok(())
    }

    /// Runs one arbitration tick if one is due at `now`.
    pub fn arbitrate(&mut self, now: SimTime, slaves: &mut [Box<dyn Target>]) -> Result<()> {
        if now < self.next_tick {
            return Ok(());
        }
        while self.next_tick <= now {
            self.next_tick += self.clock;
        }
        self.stats.cycles += 1;

        let bus_free = self.address_bus_owner.is_none()
            && matches!(self.data_bus, DataBusState::Idle | DataBusState::Response);
        if !bus_free {
            self.stats.idle_cycles += 1;
            return Ok(());
        }

        let pending: Vec<bool> = self
            .requests
            .iter()
            .map(|slot| {
                slot.and_then(|id| self.connections.get(&id))
                    .map_or(false, |c| c.state == ConnectionState::Pending)
            })
            .collect();

        let Some(winner) = self.arbiter.select(&pending, &self.lock) else {
            return Ok(());
        };
        let id = self.requests[winner].ok_or(ProtocolError::UnknownMaster(winner))?;
        self.grant(now, winner, id, slaves)
    }

    fn grant(
        &mut self,
        now: SimTime,
        master: usize,
        id: TxId,
        slaves: &mut [Box<dyn Target>],
    ) -> Result<()> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;
        conn.advance(ConnectionState::Scheduled, Phase::BeginRequest)?;
        let route = conn.route;
        let waited = now.saturating_sub(conn.start_time);

        let tx = self
            .pool
            .get_mut(id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;

        self.address_bus_owner = Some(master);
        self.lock.capture(master, tx.lock);
        self.stats.record_wait(master, waited);
        debug!(tx = %id, master, waited = %waited, lock = tx.lock, "granted address bus");

        match route {
            Route::Target(slot) => {
                let mut phase = Phase::BeginRequest;
                let mut delay = SimTime::ZERO;
                let slave = &mut slaves[slot];
                let status = slave.nb_transport_fw(now, id, tx, &mut phase, &mut delay);
                match (status, phase) {
                    (SyncStatus::Accepted, Phase::BeginRequest) => {}
                    (SyncStatus::Updated, Phase::EndRequest) => {
                        self.queues.request.notify(id, now, delay);
                    }
                    _ => {
                        return Err(ProtocolError::UnexpectedSync {
                            endpoint: slave.name().to_string(),
                            phase,
                            status,
                        }
                        .into())
                    }
                }
            }
            Route::ConfigSpace => {
                if tx.is_read() {
                    self.config_space.read_bytes(tx.address, &mut tx.data);
                    tx.response = ResponseStatus::Ok;
                } else {
                    error!(
                        addr = tx.address,
                        size = tx.len(),
                        master,
                        "forbidden write to plug & play configuration area"
                    );
                    tx.response = ResponseStatus::CommandError;
                }
                self.schedule_fastpath(now, id)?;
            }
            Route::Unmapped => {
                tx.response = ResponseStatus::AddressError;
                self.schedule_fastpath(now, id)?;
            }
            Route::Undecided => {
                return Err(ProtocolError::OutOfOrder {
                    tx: id,
                    phase: Phase::BeginRequest,
                    state: "undecoded",
                }
                .into())
            }
        }
        Ok(())
    }

    fn schedule_fastpath(&mut self, now: SimTime, id: TxId) -> Result<()> {
        let len = self.pool.get(id).map_or(0, |tx| tx.len());
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.advance(ConnectionState::ConfigFastpath, Phase::BeginRequest)?;
        }
        let request_delay = fastpath_request_delay(len, self.clock);
        self.queues.request.notify(id, now, request_delay);
        self.queues.response.notify(id, now, request_delay + self.clock);
        Ok(())
    }

    /// Ends the address phase: frees the address bus and relays END_REQ.
    fn on_request(
        &mut self,
        now: SimTime,
        id: TxId,
        masters: &mut [Box<dyn Initiator>],
    ) -> Result<()> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;
        if conn.end_request_sent {
            return Err(ProtocolError::OutOfOrder {
                tx: id,
                phase: Phase::EndRequest,
                state: "EndRequestSent",
            }
            .into());
        }
        match conn.state {
            ConnectionState::Scheduled => {
                conn.advance(ConnectionState::RequestAck, Phase::EndRequest)?
            }
            ConnectionState::ConfigFastpath => {}
            state => {
                return Err(ProtocolError::OutOfOrder {
                    tx: id,
                    phase: Phase::EndRequest,
                    state: state.as_str(),
                }
                .into())
            }
        }
        conn.end_request_sent = true;
        let master = conn.master;
        if self.requests.get(master).copied().flatten() == Some(id) {
            self.requests[master] = None;
        }

        let tx = self
            .pool
            .get_mut(id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;

        if tx.is_write() {
            let event = SnoopEvent {
                master,
                address: tx.address,
                length: tx.len(),
            };
            self.stats.snoops += 1;
            for listener in &mut self.listeners {
                listener.snoop(&event);
            }
        }

        self.address_bus_owner = None;
        if self.data_bus != DataBusState::Response {
            self.data_bus = DataBusState::WaitStates;
        }

        let mut phase = Phase::EndRequest;
        let mut delay = SimTime::ZERO;
        let initiator = &mut masters[master];
        let status = initiator.nb_transport_bw(now, id, tx, &mut phase, &mut delay);
        if status != SyncStatus::Accepted {
            return Err(ProtocolError::UnexpectedSync {
                endpoint: initiator.name().to_string(),
                phase,
                status,
            }
            .into());
        }
        Ok(())
    }

    /// Starts the data phase: relays BEGIN_RESP to the initiator.
    fn on_response(
        &mut self,
        now: SimTime,
        id: TxId,
        masters: &mut [Box<dyn Initiator>],
    ) -> Result<()> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;
        if !conn.end_request_sent {
            return Err(ProtocolError::OutOfOrder {
                tx: id,
                phase: Phase::BeginResponse,
                state: conn.state.as_str(),
            }
            .into());
        }
        conn.advance(ConnectionState::Responding, Phase::BeginResponse)?;
        let master = conn.master;

        self.data_bus = DataBusState::Response;

        let tx = self
            .pool
            .get_mut(id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;
        let mut phase = Phase::BeginResponse;
        let mut delay = SimTime::ZERO;
        let initiator = &mut masters[master];
        let status = initiator.nb_transport_bw(now, id, tx, &mut phase, &mut delay);

        match (status, phase) {
            (SyncStatus::Accepted, Phase::BeginResponse) => {}
            (SyncStatus::Updated, Phase::EndResponse) | (SyncStatus::Completed, _) => {
                if let Some(conn) = self.connections.get_mut(&id) {
                    conn.advance(ConnectionState::EndResponding, Phase::EndResponse)?;
                }
                self.queues.end_response.notify(id, now, delay);
            }
            _ => {
                return Err(ProtocolError::UnexpectedSync {
                    endpoint: initiator.name().to_string(),
                    phase,
                    status,
                }
                .into())
            }
        }
        Ok(())
    }

    /// Finishes the data phase and drops the fabric's reference.
    fn on_end_response(
        &mut self,
        now: SimTime,
        id: TxId,
        slaves: &mut [Box<dyn Target>],
    ) -> Result<()> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;
        conn.advance(ConnectionState::Released, Phase::EndResponse)?;
        let route = conn.route;

        self.data_bus = DataBusState::Idle;

        let tx = self
            .pool
            .get_mut(id)
            .ok_or(ProtocolError::UnknownTransaction(id))?;

        if let Route::Target(slot) = route {
            let mut phase = Phase::EndResponse;
            let mut delay = SimTime::ZERO;
            let slave = &mut slaves[slot];
            let status = slave.nb_transport_fw(now, id, tx, &mut phase, &mut delay);
            if !matches!(status, SyncStatus::Accepted | SyncStatus::Completed) {
                return Err(ProtocolError::UnexpectedSync {
                    endpoint: slave.name().to_string(),
                    phase,
                    status,
                }
                .into());
            }
        }

        self.stats.record_response(tx.response);
        self.connections.remove(&id);
        trace!(tx = %id, refs = self.pool.ref_count(id), "fabric releases transaction");
        self.pool.release(id);
        Ok(())
    }
}
