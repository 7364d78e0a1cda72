//! Device Registry.
//!
//! Maps the `kind` string of a configured device to its constructor. The
//! builder looks every device up here, so new endpoint kinds are added by
//! registering a constructor instead of editing the composition root.

use crate::common::ConfigError;
use crate::config::{DeviceConfig, FabricConfig};
use crate::soc::devices::{Memory, TrafficGenerator};
use crate::soc::traits::{Initiator, Target};
use std::collections::HashMap;

/// Builds a target from its configuration entry.
pub type TargetCtor = fn(&DeviceConfig, &FabricConfig) -> Result<Box<dyn Target>, ConfigError>;

/// Builds an initiator from its configuration entry.
pub type InitiatorCtor =
    fn(&DeviceConfig, &FabricConfig) -> Result<Box<dyn Initiator>, ConfigError>;

#[derive(Default)]
pub struct DeviceRegistry {
    targets: HashMap<String, TargetCtor>,
    initiators: HashMap<String, InitiatorCtor>,
}

impl DeviceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `memory` target and `traffic` initiator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_target("memory", |dev, fabric| {
            Ok(Box::new(Memory::from_config(dev, fabric)?))
        });
        registry.register_initiator("traffic", |dev, fabric| {
            Ok(Box::new(TrafficGenerator::from_config(dev, fabric)?))
        });
        registry
    }

    /// Registers `ctor` for target kind `kind`, replacing any earlier one.
    pub fn register_target(&mut self, kind: &str, ctor: TargetCtor) {
        self.targets.insert(kind.to_string(), ctor);
    }

    /// Registers `ctor` for initiator kind `kind`, replacing any earlier one.
    pub fn register_initiator(&mut self, kind: &str, ctor: InitiatorCtor) {
        self.initiators.insert(kind.to_string(), ctor);
    }

    pub fn build_target(
        &self,
        dev: &DeviceConfig,
        fabric: &FabricConfig,
    ) -> Result<Box<dyn Target>, ConfigError> {
        let ctor = self
            .targets
            .get(&dev.kind)
            .ok_or_else(|| ConfigError::UnknownKind(dev.kind.clone()))?;
        ctor(dev, fabric)
    }

    pub fn build_initiator(
        &self,
        dev: &DeviceConfig,
        fabric: &FabricConfig,
    ) -> Result<Box<dyn Initiator>, ConfigError> {
        let ctor = self
            .initiators
            .get(&dev.kind)
            .ok_or_else(|| ConfigError::UnknownKind(dev.kind.clone()))?;
        ctor(dev, fabric)
    }

    /// Registered target kinds, sorted.
    pub fn target_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Registered initiator kinds, sorted.
    pub fn initiator_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.initiators.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
