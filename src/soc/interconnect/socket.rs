//! Fabric sockets lent to endpoints during `advance`.

use super::Fabric;
use crate::common::error::Result;
use crate::common::{BlockingStatus, Phase, SimTime, SyncStatus, Transaction, TxId};
use crate::soc::traits::{InitiatorPort, Target, TargetPort};

/// Forward-path socket bound to one master.
pub struct InitiatorSocket<'a> {
    fabric: &'a mut Fabric,
    slaves: &'a mut [Box<dyn Target>],
    master: usize,
    now: SimTime,
}

impl<'a> InitiatorSocket<'a> {
    pub fn new(
        fabric: &'a mut Fabric,
        slaves: &'a mut [Box<dyn Target>],
        master: usize,
        now: SimTime,
    ) -> Self {
        Self {
            fabric,
            slaves,
            master,
            now,
        }
    }
}

impl InitiatorPort for InitiatorSocket<'_> {
    fn now(&self) -> SimTime {
        self.now
    }

    fn clock_period(&self) -> SimTime {
        self.fabric.clock_period()
    }

    fn alloc(&mut self, tx: Transaction) -> TxId {
        self.fabric.alloc(tx)
    }

    fn transaction(&self, id: TxId) -> Option<&Transaction> {
        self.fabric.transaction(id)
    }

    fn release(&mut self, id: TxId) -> Option<Transaction> {
        self.fabric.release(id)
    }

    fn nb_transport_fw(
        &mut self,
        id: TxId,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> Result<SyncStatus> {
        self.fabric
            .nb_transport_fw(self.now, self.master, id, phase, delay)
    }

    fn b_transport(&mut self, tx: &mut Transaction, delay: &mut SimTime) -> BlockingStatus {
        self.fabric
            .b_transport(self.now, self.master, tx, delay, self.slaves)
    }

    fn transport_dbg(&mut self, tx: &mut Transaction) -> usize {
        self.fabric.transport_dbg(self.master, tx, self.slaves)
    }
}

/// Backward-path socket bound to one slave.
pub struct TargetSocket<'a> {
    fabric: &'a mut Fabric,
    slave: usize,
    now: SimTime,
}

impl<'a> TargetSocket<'a> {
    pub fn new(fabric: &'a mut Fabric, slave: usize, now: SimTime) -> Self {
        Self { fabric, slave, now }
    }
}

impl TargetPort for TargetSocket<'_> {
    fn now(&self) -> SimTime {
        self.now
    }

    fn transaction(&mut self, id: TxId) -> Option<&mut Transaction> {
        self.fabric.transaction_mut(id)
    }

    fn nb_transport_bw(
        &mut self,
        id: TxId,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> Result<SyncStatus> {
        self.fabric
            .nb_transport_bw(self.now, self.slave, id, phase, delay)
    }
}
