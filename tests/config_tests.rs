//! Integration tests for configuration parsing and system construction.

use socbus::common::ConfigError;
use socbus::config::{Arbitration, BarType, Config};
use socbus::soc::devices::{AccessMode, OpKind, ResponseAck, TrafficParams};
use socbus::soc::{self, DeviceRegistry};

const SCENARIO: &str = r#"
[fabric]
arbitration = "RoundRobin"
clock_period_ps = 5000

[simulation]
max_cycles = 500

[[targets]]
name = "ram"
kind = "memory"
index = 2
vendor = 0x01
device = 0x00E
wait_states = 1
latency_cycles = 2
bars = [{ addr = 0x400, mask = 0xFF0, kind = "Memory", cacheable = true }]

[[masters]]
name = "cpu"
kind = "traffic"
index = 0
ack = "Update"
script = [
    { op = "write", addr = 0x40000000, data = [1, 2, 3, 4], lock = true },
    { op = "read", addr = 0x40000000, len = 4, mode = "Blocking", gap = 2 },
]
"#;

/// Tests that every section is optional.
#[test]
fn test_empty_config_defaults() {
    let config = Config::from_toml("").expect("empty config parses");
    assert_eq!(config.fabric.io_addr, 0xFFF);
    assert_eq!(config.fabric.io_mask, 0xFFF);
    assert_eq!(config.fabric.cfg_addr, 0xFF0);
    assert_eq!(config.fabric.cfg_mask, 0xFF0);
    assert_eq!(config.fabric.arbitration, Arbitration::FixedPriority);
    assert!(config.fabric.plug_and_play);
    assert!(config.fabric.mem_check);
    assert_eq!(config.fabric.clock_period_ps, 10_000);
    assert_eq!(config.simulation.max_cycles, 100_000);
    assert!(config.simulation.stats_json.is_none());
    assert!(config.masters.is_empty());
    assert!(config.targets.is_empty());
}

/// Tests parsing of fabric, device and kind-specific keys.
#[test]
fn test_parse_scenario() {
    let config = Config::from_toml(SCENARIO).expect("scenario parses");
    assert_eq!(config.fabric.arbitration, Arbitration::RoundRobin);
    assert_eq!(config.fabric.clock_period().as_ps(), 5000);
    assert_eq!(config.simulation.max_cycles, 500);

    let ram = &config.targets[0];
    assert_eq!(ram.index, 2);
    assert_eq!(ram.device_id().device, 0x00E);
    assert_eq!(ram.bars[0].kind, BarType::AhbMemory);
    let bar = ram.bars()[0];
    assert_eq!(bar.mask, 0xFF0);
    assert!(bar.cacheable);
    assert!(!bar.prefetchable);
    assert_eq!(ram.params.get("wait_states").and_then(|v| v.as_integer()), Some(1));

    let params: TrafficParams = config.masters[0].params().expect("traffic params");
    assert_eq!(params.ack, ResponseAck::Update);
    assert_eq!(params.script.len(), 2);
    assert_eq!(params.script[0].op, OpKind::Write);
    assert!(params.script[0].lock);
    assert_eq!(params.script[0].mode, AccessMode::Split);
    assert_eq!(params.script[1].mode, AccessMode::Blocking);
    assert_eq!(params.script[1].gap, 2);
}

/// Tests that malformed TOML is reported as a parse error.
#[test]
fn test_parse_error() {
    assert!(matches!(
        Config::from_toml("[fabric\nclock = 1"),
        Err(ConfigError::Parse(_))
    ));
}

/// Tests that a missing file is reported as an I/O error.
#[test]
fn test_missing_file() {
    assert!(matches!(
        Config::load("/nonexistent/scenario.toml"),
        Err(ConfigError::Io(_))
    ));
}

/// Tests building and running a parsed scenario.
#[test]
fn test_build_and_run_scenario() {
    let config = Config::from_toml(SCENARIO).expect("scenario parses");
    let mut sim = soc::build(&config, &DeviceRegistry::with_defaults()).expect("build");

    assert_eq!(sim.fabric().master_count(), 1);
    assert_eq!(sim.fabric().slave_count(), 1);
    let outcome = sim.run(config.simulation.max_cycles).expect("run");
    assert!(outcome.finished);

    let cpu = sim.master(0).and_then(|m| m.as_traffic()).expect("traffic");
    let done = cpu.completions();
    assert_eq!(done.len(), 2);
    let read = done.iter().find(|c| c.op == 1).expect("read finished");
    assert_eq!(read.mode, AccessMode::Blocking);
    assert_eq!(read.data, vec![1, 2, 3, 4]);
    assert!(!sim.fabric().lock_state().locked);

    let ram = sim.slave(0).and_then(|s| s.as_memory()).expect("memory");
    assert_eq!(ram.read_bytes(0x4000_0000, 4), vec![1, 2, 3, 4]);
    assert_eq!(ram.access_counts(), (1, 1));
}

/// Tests that an unknown device kind is rejected.
#[test]
fn test_unknown_kind() {
    let config = Config::from_toml(
        r#"
        [[targets]]
        name = "uart"
        kind = "uart"
        index = 0
        "#,
    )
    .expect("parses");
    assert!(matches!(
        soc::build(&config, &DeviceRegistry::with_defaults()),
        Err(ConfigError::UnknownKind(kind)) if kind == "uart"
    ));
}

/// Tests that invalid kind-specific keys are rejected.
#[test]
fn test_invalid_device_params() {
    let config = Config::from_toml(
        r#"
        [[targets]]
        name = "ram"
        kind = "memory"
        index = 0
        wait_states = "many"
        "#,
    )
    .expect("parses");
    assert!(matches!(
        soc::build(&config, &DeviceRegistry::with_defaults()),
        Err(ConfigError::InvalidDevice { name, .. }) if name == "ram"
    ));

    let config = Config::from_toml(
        r#"
        [[masters]]
        name = "cpu"
        kind = "traffic"
        index = 0
        script = [{ op = "write", addr = 0 }]
        "#,
    )
    .expect("parses");
    assert!(matches!(
        soc::build(&config, &DeviceRegistry::with_defaults()),
        Err(ConfigError::InvalidDevice { .. })
    ));
}

/// Tests that overlapping configured BARs stop the build.
#[test]
fn test_overlapping_config_rejected() {
    let config = Config::from_toml(
        r#"
        [[targets]]
        name = "a"
        kind = "memory"
        index = 0
        bars = [{ addr = 0x400 }]

        [[targets]]
        name = "b"
        kind = "memory"
        index = 1
        bars = [{ addr = 0x400, mask = 0xF00 }]
        "#,
    )
    .expect("parses");
    assert!(matches!(
        soc::build(&config, &DeviceRegistry::with_defaults()),
        Err(ConfigError::Overlap { .. })
    ));
}

/// Tests custom registrations.
#[test]
fn test_registry_kinds() {
    let mut registry = DeviceRegistry::with_defaults();
    assert_eq!(registry.target_kinds(), vec!["memory"]);
    assert_eq!(registry.initiator_kinds(), vec!["traffic"]);

    registry.register_target("rom", |dev, fabric| {
        Ok(Box::new(socbus::soc::devices::Memory::from_config(
            dev, fabric,
        )?))
    });
    assert_eq!(registry.target_kinds(), vec!["memory", "rom"]);
    assert!(DeviceRegistry::new().target_kinds().is_empty());
}

/// Tests that the shipped scenario builds and runs to completion.
#[test]
fn test_default_scenario() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/default.toml");
    let config = Config::load(path).expect("default scenario parses");
    let mut sim = soc::build(&config, &DeviceRegistry::with_defaults()).expect("build");

    let outcome = sim.run(config.simulation.max_cycles).expect("run");
    assert!(outcome.finished);

    let stats = sim.fabric().stats();
    assert_eq!(stats.address_errors, 1);
    assert_eq!(stats.command_errors, 1);
    assert_eq!(sim.fabric().live_transactions(), 0);
    assert!(stats.to_json().expect("json").contains("\"transactions\""));
}
