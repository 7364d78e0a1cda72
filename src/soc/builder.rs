//! System-on-Chip (SoC) Builder.
//!
//! The composition root. It instantiates every configured endpoint through
//! the device registry, creates the fabric and hands everything to the
//! simulator, which binds and elaborates the system.

use crate::common::ConfigError;
use crate::config::Config;
use crate::sim::Simulator;
use crate::soc::interconnect::Fabric;
use crate::soc::registry::DeviceRegistry;
use tracing::info;

/// Builds a ready-to-run simulator from `config`.
///
/// Masters and targets are bound in file order; that order is the master id
/// used for arbitration and the target slot used by the decoder.
///
/// # Arguments
///
/// * `config` - Parsed scenario.
/// * `registry` - Constructors for every device `kind` the scenario names.
///
/// # Returns
///
/// The elaborated simulator, or the first configuration error found.
pub fn build(config: &Config, registry: &DeviceRegistry) -> Result<Simulator, ConfigError> {
    let fabric_config = &config.fabric;

    let masters = config
        .masters
        .iter()
        .map(|dev| {
            info!(name = %dev.name, kind = %dev.kind, index = dev.index, "registering master");
            registry.build_initiator(dev, fabric_config)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let targets = config
        .targets
        .iter()
        .map(|dev| {
            info!(name = %dev.name, kind = %dev.kind, index = dev.index, "registering target");
            registry.build_target(dev, fabric_config)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Simulator::new(Fabric::new(fabric_config), masters, targets)
}
