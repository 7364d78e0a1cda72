//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use socbus::common::SimTime;
use socbus::config::{Arbitration, FabricConfig};
use socbus::sim::Simulator;
use socbus::soc::devices::{Completion, Memory, TrafficGenerator, TrafficOp};
use socbus::soc::interconnect::pnp::Bar;
use socbus::soc::interconnect::{DeviceInfo, Fabric};
use socbus::soc::traits::{Initiator, Target};

/// Bus clock used by every fixture (100 MHz).
pub const CLOCK: SimTime = SimTime::from_ns(10);

/// One picosecond, the arbiter phase shift.
pub const PS: SimTime = SimTime::RESOLUTION;

/// Creates a fabric configuration with the reference window layout.
pub fn fabric_config(arbitration: Arbitration) -> FabricConfig {
    FabricConfig {
        arbitration,
        clock_period_ps: CLOCK.as_ps(),
        ..FabricConfig::default()
    }
}

/// Creates a memory target covering the single 1 MiB segment `seg`.
pub fn memory(name: &str, index: u32, seg: u32, wait_states: u64, latency: u64) -> Memory {
    Memory::new(
        name,
        index,
        &[Bar::memory(seg, 0xFFF)],
        CLOCK,
        wait_states,
        latency,
    )
}

pub fn boxed_memory(name: &str, index: u32, seg: u32) -> Box<dyn Target> {
    Box::new(memory(name, index, seg, 0, 1))
}

pub fn traffic(name: &str, index: u32, script: Vec<TrafficOp>) -> TrafficGenerator {
    TrafficGenerator::new(name, index, CLOCK, script)
}

/// Descriptor snapshot of a master without BARs.
pub fn master_info(name: &str, index: u32) -> DeviceInfo {
    DeviceInfo {
        name: name.to_string(),
        bus_index: index,
        words: [0; 8],
    }
}

pub fn infos(targets: &[Box<dyn Target>]) -> Vec<DeviceInfo> {
    targets.iter().map(|t| DeviceInfo::of(t.as_ref())).collect()
}

/// Elaborates a bare fabric with `masters` anonymous masters and `targets`.
pub fn elaborated_fabric(
    config: &FabricConfig,
    masters: usize,
    targets: &[Box<dyn Target>],
) -> Fabric {
    let mut fabric = Fabric::new(config);
    let masters = (0..masters)
        .map(|i| master_info(&format!("m{}", i), i as u32))
        .collect();
    fabric
        .elaborate(masters, infos(targets))
        .expect("elaboration failed");
    fabric
}

/// Builds a simulator from ready-made endpoints.
pub fn simulator(
    arbitration: Arbitration,
    masters: Vec<Box<dyn Initiator>>,
    targets: Vec<Box<dyn Target>>,
) -> Simulator {
    Simulator::new(Fabric::new(&fabric_config(arbitration)), masters, targets)
        .expect("elaboration failed")
}

/// Completions recorded by the traffic generator bound as master `index`.
pub fn completions(sim: &Simulator, index: usize) -> Vec<Completion> {
    sim.master(index)
        .and_then(|m| m.as_traffic())
        .map(|t| t.completions().to_vec())
        .unwrap_or_default()
}
