//! Memory Access Timing.
//!
//! Latency models used by the memory target to decide how long after the
//! request phase its response starts. A fixed model charges the same number
//! of cycles for every access; the row-buffer model tracks the open DRAM row
//! and charges activate and precharge penalties on a row miss.

use serde::Deserialize;

/// Latency model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TimingModel {
    /// Constant latency per access.
    #[default]
    Fixed,
    /// DRAM row buffer with CAS/RAS/precharge timing.
    #[serde(alias = "DRAM")]
    RowBuffer,
}

/// Access latency in bus clock cycles.
pub trait AccessTiming {
    /// # Arguments
    ///
    /// * `addr` - Bus address of the first byte accessed.
    ///
    /// # Returns
    ///
    /// The latency in bus cycles.
    fn access_latency(&mut self, addr: u32) -> u64;
}

pub struct FixedLatency {
    cycles: u64,
}

impl FixedLatency {
    pub fn new(cycles: u64) -> Self {
        Self { cycles }
    }
}

impl AccessTiming for FixedLatency {
    fn access_latency(&mut self, _addr: u32) -> u64 {
        self.cycles
    }
}

/// Open-row DRAM timing.
///
/// * **Row hit:** `t_cas`.
/// * **Row miss, another row open:** `t_pre + t_ras + t_cas`.
/// * **Row miss, bank closed:** `t_ras + t_cas`.
pub struct RowBufferLatency {
    open_row: Option<u32>,
    t_cas: u64,
    t_ras: u64,
    t_pre: u64,
    row_shift: u32,
}

impl RowBufferLatency {
    /// Row size is `1 << row_shift` bytes.
    pub fn new(t_cas: u64, t_ras: u64, t_pre: u64, row_shift: u32) -> Self {
        Self {
            open_row: None,
            t_cas,
            t_ras,
            t_pre,
            row_shift,
        }
    }
}

impl AccessTiming for RowBufferLatency {
    fn access_latency(&mut self, addr: u32) -> u64 {
        let row = addr.checked_shr(self.row_shift).unwrap_or(0);
        match self.open_row.replace(row) {
            Some(open) if open == row => self.t_cas,
            Some(_) => self.t_pre + self.t_ras + self.t_cas,
            None => self.t_ras + self.t_cas,
        }
    }
}
