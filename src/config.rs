//! Configuration system for the bus simulator.
//!
//! This module defines the structures a scenario file deserializes into. It
//! provides:
//! 1. **Defaults:** Baseline fabric constants (configuration window, clock).
//! 2. **Structures:** Fabric, simulation and per-device settings.
//! 3. **Enums:** Arbitration policy and BAR address space type.
//!
//! Scenario files are TOML. Every section is optional; `Config::default()`
//! describes an empty fabric with the reference window layout.

use crate::common::{ConfigError, SimTime};
use crate::soc::interconnect::pnp::{Bar, BarKind, DeviceId};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default configuration constants.
mod defaults {
    /// MSB address (bits 31..20) of the I/O area.
    pub const IO_ADDR: u32 = 0xFFF;

    /// Address mask of the I/O area.
    pub const IO_MASK: u32 = 0xFFF;

    /// Address (bits 19..8) of the plug & play configuration area.
    pub const CFG_ADDR: u32 = 0xFF0;

    /// Address mask of the configuration area.
    pub const CFG_MASK: u32 = 0xFF0;

    /// Bus clock period in picoseconds (100 MHz).
    pub const CLOCK_PERIOD_PS: u64 = 10_000;

    /// Cycle budget for a run.
    pub const MAX_CYCLES: u64 = 100_000;

    /// BAR mask selecting a single 1 MiB segment.
    pub const BAR_MASK: u32 = 0xFFF;
}

/// Arbitration policy of the split-phase path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Arbitration {
    /// The highest master index always wins.
    #[default]
    FixedPriority,
    /// Grants rotate, starting one past the previous winner.
    RoundRobin,
}

/// Address space type of a configured BAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BarType {
    #[serde(alias = "APB")]
    ApbIo,
    #[default]
    #[serde(alias = "Memory")]
    AhbMemory,
    #[serde(alias = "IO")]
    AhbIo,
}

impl From<BarType> for BarKind {
    fn from(t: BarType) -> Self {
        match t {
            BarType::ApbIo => BarKind::ApbIo,
            BarType::AhbMemory => BarKind::AhbMemory,
            BarType::AhbIo => BarKind::AhbIo,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fabric: FabricConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Initiators, bound in file order.
    #[serde(default)]
    pub masters: Vec<DeviceConfig>,

    /// Targets, bound in file order.
    #[serde(default)]
    pub targets: Vec<DeviceConfig>,
}

impl Config {
    /// Reads and parses a scenario file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Bus fabric settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FabricConfig {
    #[serde(default = "default_io_addr")]
    pub io_addr: u32,

    #[serde(default = "default_io_mask")]
    pub io_mask: u32,

    #[serde(default = "default_cfg_addr")]
    pub cfg_addr: u32,

    #[serde(default = "default_cfg_mask")]
    pub cfg_mask: u32,

    #[serde(default)]
    pub arbitration: Arbitration,

    /// Index of the default master. Only reported.
    #[serde(default)]
    pub default_master: u32,

    /// Enables the plug & play configuration window.
    #[serde(default = "default_true")]
    pub plug_and_play: bool,

    /// Enables the address map overlap check at elaboration.
    #[serde(default = "default_true")]
    pub mem_check: bool,

    #[serde(default = "default_clock_period")]
    pub clock_period_ps: u64,
}

impl FabricConfig {
    pub fn clock_period(&self) -> SimTime {
        SimTime::from_ps(self.clock_period_ps)
    }
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            io_addr: defaults::IO_ADDR,
            io_mask: defaults::IO_MASK,
            cfg_addr: defaults::CFG_ADDR,
            cfg_mask: defaults::CFG_MASK,
            arbitration: Arbitration::default(),
            default_master: 0,
            plug_and_play: true,
            mem_check: true,
            clock_period_ps: defaults::CLOCK_PERIOD_PS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,

    /// Path of the JSON statistics export, if any.
    #[serde(default)]
    pub stats_json: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_cycles: defaults::MAX_CYCLES,
            stats_json: None,
        }
    }
}

/// One device bound to the fabric.
///
/// Keys not listed here are collected into `params` and interpreted by the
/// constructor registered for `kind`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub kind: String,

    /// Bus index (hindex) of the device; selects its plug & play block.
    pub index: u32,

    #[serde(default)]
    pub vendor: u8,

    #[serde(default)]
    pub device: u16,

    #[serde(default)]
    pub version: u8,

    #[serde(default)]
    pub irq: u8,

    #[serde(default)]
    pub bars: Vec<BarConfig>,

    #[serde(flatten)]
    pub params: toml::Table,
}

impl DeviceConfig {
    pub fn device_id(&self) -> DeviceId {
        DeviceId {
            vendor: self.vendor,
            device: self.device,
            version: self.version,
            irq: self.irq,
        }
    }

    pub fn bars(&self) -> Vec<Bar> {
        self.bars.iter().map(BarConfig::to_bar).collect()
    }

    /// Deserializes the kind-specific keys.
    pub fn params<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ConfigError> {
        toml::Value::Table(self.params.clone())
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::InvalidDevice {
                name: self.name.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BarConfig {
    /// 12-bit segment address (bits 31..20 of the region base).
    pub addr: u32,

    #[serde(default = "default_bar_mask")]
    pub mask: u32,

    #[serde(default)]
    pub kind: BarType,

    #[serde(default)]
    pub cacheable: bool,

    #[serde(default)]
    pub prefetchable: bool,
}

impl BarConfig {
    pub fn to_bar(&self) -> Bar {
        Bar {
            addr: self.addr & 0xFFF,
            mask: self.mask & 0xFFF,
            kind: self.kind.into(),
            cacheable: self.cacheable,
            prefetchable: self.prefetchable,
        }
    }
}

fn default_io_addr() -> u32 {
    defaults::IO_ADDR
}

fn default_io_mask() -> u32 {
    defaults::IO_MASK
}

fn default_cfg_addr() -> u32 {
    defaults::CFG_ADDR
}

fn default_cfg_mask() -> u32 {
    defaults::CFG_MASK
}

fn default_clock_period() -> u64 {
    defaults::CLOCK_PERIOD_PS
}

fn default_max_cycles() -> u64 {
    defaults::MAX_CYCLES
}

fn default_bar_mask() -> u32 {
    defaults::BAR_MASK
}

fn default_true() -> bool {
    true
}
