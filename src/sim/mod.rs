//! Discrete-event substrate.
//!
//! A single-threaded, cooperative event loop. Every component runs to
//! completion for the current instant before time advances, so shared bus
//! state needs no locking.

/// Time-ordered payload queues.
pub mod peq;

/// Event loop hosting the fabric and its endpoints.
pub mod simulator;

pub use peq::PayloadEventQueue;
pub use simulator::{RunOutcome, Simulator};
