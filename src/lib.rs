//! On-Chip Bus Fabric Simulator Library.
//!
//! This crate implements a transaction-level model of an AHB-style system
//! bus controller. Up to 16 initiators and 16 targets are connected through a
//! fabric that decodes addresses, arbitrates contention and carries each
//! transfer through a four-phase split request/response pipeline.
//!
//! # Architecture
//!
//! * **Fabric**: Address decoder with a one-entry cache, fixed-priority or
//!   round-robin arbiter with bus locking, and a read-only plug & play
//!   configuration space synthesised from device descriptors.
//! * **Transport**: Blocking, split-phase and debug access paths.
//! * **Simulation**: Single-threaded discrete-event loop with payload event
//!   queues.
//!
//! # Modules
//!
//! * `common`: Transactions, simulated time and error types.
//! * `config`: Configuration loading and parsing.
//! * `sim`: Event queues and the simulation loop.
//! * `soc`: Fabric, endpoint traits, reference endpoints and builder.
//! * `stats`: Bus statistics collection and reporting.

/// Shared types: transactions, phases, simulated time and errors.
///
/// Provides the transaction pool and the error enums used by every other
/// module.
pub mod common;

/// Configuration system for the fabric, the simulation and its devices.
///
/// Loads and parses TOML scenario files.
pub mod config;

/// Discrete-event substrate and the simulation loop.
pub mod sim;

/// Bus fabric, endpoint traits and reference endpoints.
pub mod soc;

/// Bus statistics collection and reporting.
pub mod stats;
