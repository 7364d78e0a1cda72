//! Bus statistics collection and reporting.
//!
//! Tracks transfer counts, decoder efficiency, arbitration waiting time and
//! bus utilization. The report format follows the simulator's plain-text
//! statistics dump; the same data can be exported as JSON.

use crate::common::{ResponseStatus, SimTime, Transaction};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

/// Bus statistics.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BusStats {
    pub clock_period_ps: u64,

    /// Arbitration ticks elapsed.
    pub cycles: u64,
    /// Ticks on which the arbiter could not run.
    pub idle_cycles: u64,

    pub transactions: u64,
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,

    pub completed_ok: u64,
    pub address_errors: u64,
    pub command_errors: u64,

    pub decode_lookups: u64,
    pub decode_hits: u64,
    pub decode_successful: u64,

    pub arbitrated: u64,
    pub total_wait_ps: u64,
    pub max_wait_ps: u64,
    pub max_wait_master: Option<usize>,

    pub snoops: u64,
}

impl BusStats {
    /// Counts a transfer entering the fabric.
    pub fn record_transfer(&mut self, tx: &Transaction) {
        self.transactions += 1;
        if tx.is_read() {
            self.reads += 1;
            self.bytes_read += tx.len() as u64;
        } else {
            self.writes += 1;
            self.bytes_written += tx.len() as u64;
        }
    }

    /// Counts the final status of a transfer.
    pub fn record_response(&mut self, status: ResponseStatus) {
        match status {
            ResponseStatus::Ok => self.completed_ok += 1,
            ResponseStatus::AddressError => self.address_errors += 1,
            ResponseStatus::CommandError => self.command_errors += 1,
            ResponseStatus::Incomplete => {}
        }
    }

    /// Records how long a granted request waited for the address bus.
    pub fn record_wait(&mut self, master: usize, waited: SimTime) {
        let ps = waited.as_ps();
        if ps > self.max_wait_ps || self.max_wait_master.is_none() {
            self.max_wait_ps = ps;
            self.max_wait_master = Some(master);
        }
        self.total_wait_ps += ps;
        self.arbitrated += 1;
    }

    /// Mean arbitration wait in picoseconds.
    pub fn average_wait_ps(&self) -> f64 {
        if self.arbitrated == 0 {
            0.0
        } else {
            self.total_wait_ps as f64 / self.arbitrated as f64
        }
    }

    /// Fraction of arbitration ticks on which the bus was in use.
    pub fn utilization(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            (self.cycles - self.idle_cycles) as f64 / self.cycles as f64
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes the JSON export to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let json = self.to_json().map_err(io::Error::from)?;
        fs::write(path, json)
    }

    /// Prints a formatted summary of the bus statistics.
    pub fn print(&self) {
        let clock = if self.clock_period_ps == 0 {
            1
        } else {
            self.clock_period_ps
        };
        let lookups = self.decode_lookups.max(1);

        println!("\n==========================================================");
        println!("BUS FABRIC STATISTICS");
        println!("==========================================================");
        println!("sim_cycles               {}", self.cycles);
        println!("idle_cycles              {}", self.idle_cycles);
        println!("bus_utilization          {:.4}", self.utilization());
        println!("----------------------------------------------------------");
        println!("TRANSFERS");
        println!("  transactions           {}", self.transactions);
        println!("  reads                  {} ({} bytes)", self.reads, self.bytes_read);
        println!(
            "  writes                 {} ({} bytes)",
            self.writes, self.bytes_written
        );
        println!("  resp.ok                {}", self.completed_ok);
        println!("  resp.address_error     {}", self.address_errors);
        println!("  resp.command_error     {}", self.command_errors);
        println!("  snoop.broadcasts       {}", self.snoops);
        println!("----------------------------------------------------------");
        println!("DECODER");
        println!("  lookups                {}", self.decode_lookups);
        println!(
            "  successful             {} ({:.2}%)",
            self.decode_successful,
            (self.decode_successful as f64 / lookups as f64) * 100.0
        );
        println!(
            "  cache_hits             {} ({:.2}%)",
            self.decode_hits,
            (self.decode_hits as f64 / lookups as f64) * 100.0
        );
        println!("----------------------------------------------------------");
        println!("ARBITRATION");
        println!("  arbitrated             {}", self.arbitrated);
        println!(
            "  wait.max               {} ps ({} cycles)",
            self.max_wait_ps,
            self.max_wait_ps / clock
        );
        match self.max_wait_master {
            Some(m) => println!("  wait.max_master        {}", m),
            None => println!("  wait.max_master        -"),
        }
        println!(
            "  wait.avg               {:.1} ps ({:.2} cycles)",
            self.average_wait_ps(),
            self.average_wait_ps() / clock as f64
        );
        println!("==========================================================");
    }
}
