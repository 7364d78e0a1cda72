//! System-on-Chip components.
//!
//! The bus fabric, the endpoint traits, the reference endpoints and the
//! composition root that wires them together from a configuration.

/// Composition root.
pub mod builder;

/// Reference endpoints (memory, traffic generator).
pub mod devices;

/// Bus fabric: decoder, arbiter, configuration space and pipeline.
pub mod interconnect;

/// Device kind registry.
pub mod registry;

/// Endpoint and socket traits.
pub mod traits;

pub use builder::build;
pub use interconnect::Fabric;
pub use registry::DeviceRegistry;
