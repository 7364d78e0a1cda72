//! Simulator: owns the fabric and the endpoints side by side.
//!
//! Keeping the endpoints outside the fabric lets the loop lend the fabric to
//! an endpoint (through a socket) and lend the endpoints to the fabric (for
//! phase relays) without any shared ownership.

use crate::common::error::Result;
use crate::common::{ConfigError, SimTime};
use crate::soc::interconnect::socket::{InitiatorSocket, TargetSocket};
use crate::soc::interconnect::{DeviceInfo, Fabric};
use crate::soc::traits::{Initiator, Target};
use tracing::{debug, info};

/// How a bounded run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    /// Simulated time when the run stopped.
    pub time: SimTime,
    /// Whole clock cycles elapsed.
    pub cycles: u64,
    /// `true` if every initiator finished and the fabric drained; `false` if
    /// the cycle limit was hit first.
    pub finished: bool,
}

/// Top-level simulator: fabric plus bound initiators and targets.
pub struct Simulator {
    fabric: Fabric,
    masters: Vec<Box<dyn Initiator>>,
    slaves: Vec<Box<dyn Target>>,
    now: SimTime,
}

impl Simulator {
    /// Binds the endpoints to the fabric and elaborates it.
    pub fn new(
        mut fabric: Fabric,
        masters: Vec<Box<dyn Initiator>>,
        slaves: Vec<Box<dyn Target>>,
    ) -> std::result::Result<Self, ConfigError> {
        let master_info = masters.iter().map(|m| DeviceInfo::of(m.as_ref())).collect();
        let slave_info = slaves.iter().map(|s| DeviceInfo::of(s.as_ref())).collect();
        fabric.elaborate(master_info, slave_info)?;

        Ok(Self {
            fabric,
            masters,
            slaves,
            now: SimTime::ZERO,
        })
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn fabric(&self) -> &Fabric {
        &self.fabric
    }

    pub fn fabric_mut(&mut self) -> &mut Fabric {
        &mut self.fabric
    }

    pub fn master(&self, index: usize) -> Option<&dyn Initiator> {
        self.masters.get(index).map(|m| m.as_ref())
    }

    pub fn slave(&self, index: usize) -> Option<&dyn Target> {
        self.slaves.get(index).map(|s| s.as_ref())
    }

    /// `true` once every initiator is done and no split transaction is in
    /// flight.
    pub fn is_finished(&self) -> bool {
        self.masters.iter().all(|m| m.is_done()) && self.fabric.is_idle()
    }

    /// Earliest time at which anything is scheduled.
    pub fn next_time(&self) -> SimTime {
        let endpoints = self
            .masters
            .iter()
            .filter_map(|m| m.next_event())
            .chain(self.slaves.iter().filter_map(|s| s.next_event()));

        endpoints
            .chain(self.fabric.next_event())
            .chain(std::iter::once(self.fabric.next_arbitration()))
            .min()
            .unwrap_or(self.fabric.next_arbitration())
            .max(self.now)
    }

    /// Advances to the next scheduled instant and runs it to quiescence.
    ///
    /// Within one instant, due initiators run first, then due targets, then
    /// the pipeline queues drain. This repeats until nothing makes progress;
    /// the arbiter then runs if its tick is due, and the loop resumes.
    pub fn step(&mut self) -> Result<()> {
        self.now = self.next_time();
        let now = self.now;

        loop {
            let mut progressed = false;

            for (i, master) in self.masters.iter_mut().enumerate() {
                if master.next_event().map_or(false, |t| t <= now) {
                    let mut socket = InitiatorSocket::new(&mut self.fabric, &mut self.slaves, i, now);
                    master.advance(now, &mut socket)?;
                    progressed = true;
                }
            }

            for (i, slave) in self.slaves.iter_mut().enumerate() {
                if slave.next_event().map_or(false, |t| t <= now) {
                    let mut socket = TargetSocket::new(&mut self.fabric, i, now);
                    slave.advance(now, &mut socket)?;
                    progressed = true;
                }
            }

            progressed |= self
                .fabric
                .drain(now, &mut self.masters, &mut self.slaves)?;

            if progressed {
                continue;
            }
            if self.fabric.next_arbitration() <= now {
                self.fabric.arbitrate(now, &mut self.slaves)?;
                continue;
            }
            break;
        }
        Ok(())
    }

    /// Runs until every initiator is done or `max_cycles` clock cycles have
    /// elapsed.
    pub fn run(&mut self, max_cycles: u64) -> Result<RunOutcome> {
        let clock = self.fabric.clock_period();
        let limit = clock * max_cycles;
        info!(max_cycles, clock = %clock, "simulation start");

        while !self.is_finished() {
            if self.next_time() > limit {
                debug!(now = %self.now, "cycle limit reached");
                return Ok(self.outcome(false));
            }
            self.step()?;
        }

        let outcome = self.outcome(true);
        info!(time = %outcome.time, cycles = outcome.cycles, "simulation finished");
        Ok(outcome)
    }

    fn outcome(&self, finished: bool) -> RunOutcome {
        RunOutcome {
            time: self.now,
            cycles: self.now.cycles(self.fabric.clock_period()),
            finished,
        }
    }
}
