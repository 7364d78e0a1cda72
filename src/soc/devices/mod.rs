//! Reference bus endpoints.
//!
//! * `Memory`: sparse memory target with wait states and a latency model.
//! * `TrafficGenerator`: scripted initiator exercising every transport style.

/// Sparse memory target.
pub mod memory;

/// Memory latency models.
pub mod timing;

/// Scripted initiator.
pub mod traffic;

pub use memory::{Memory, MemoryParams};
pub use timing::{AccessTiming, FixedLatency, RowBufferLatency, TimingModel};
pub use traffic::{
    AccessMode, Completion, OpKind, ResponseAck, TrafficGenerator, TrafficOp, TrafficParams,
};
