//! Bus Fabric Simulator CLI.
//!
//! The main executable for the simulator. It handles command-line argument
//! parsing, logging setup, system construction from a TOML scenario and the
//! simulation run.
//!
//! # Usage
//!
//! ```text
//! socbus-sim --config configs/default.toml [--max-cycles N] [--stats-json out.json] [-v]
//! ```

use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

extern crate socbus;

use socbus::config::Config;
use socbus::sim::Simulator;
use socbus::soc::traits::BusDevice;
use socbus::soc::{self, DeviceRegistry};

/// Command-line arguments for the bus fabric simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "On-Chip Bus Fabric Simulator")]
struct Args {
    #[arg(short, long, default_value = "configs/default.toml")]
    config: String,

    /// Overrides `simulation.max_cycles`.
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Overrides `simulation.stats_json`.
    #[arg(long)]
    stats_json: Option<String>,

    /// Enables debug-level logging unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose || cfg!(feature = "always-trace") {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(config: &Config) {
    let fabric = &config.fabric;
    println!("Global Configuration");
    println!("--------------------");
    println!("Fabric:");
    println!("  Clock Period:       {} ps", fabric.clock_period_ps);
    println!("  Arbitration:        {:?}", fabric.arbitration);
    println!("  Default Master:     {}", fabric.default_master);
    println!(
        "  Plug & Play:        {}",
        if fabric.plug_and_play {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!(
        "  I/O Area:           {:#05x} (mask {:#05x})",
        fabric.io_addr, fabric.io_mask
    );
    println!(
        "  Config Area:        {:#05x} (mask {:#05x})",
        fabric.cfg_addr, fabric.cfg_mask
    );
    println!(
        "  Memory Map Check:   {}",
        if fabric.mem_check {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!("Masters:");
    for dev in &config.masters {
        println!("  [{:>2}] {:<16} {}", dev.index, dev.name, dev.kind);
    }
    println!("Targets:");
    for dev in &config.targets {
        let bars: Vec<String> = dev
            .bars()
            .iter()
            .map(|b| format!("{:#010x}-{:#010x}", b.start(), b.end()))
            .collect();
        println!(
            "  [{:>2}] {:<16} {:<8} {}",
            dev.index,
            dev.name,
            dev.kind,
            bars.join(", ")
        );
    }
    println!("--------------------");
}

fn print_completions(sim: &Simulator) {
    let mut index = 0;
    while let Some(master) = sim.master(index) {
        if let Some(traffic) = master.as_traffic() {
            let done = traffic.completions();
            let ok = done.iter().filter(|c| c.response.is_ok()).count();
            println!(
                "[*] {}: {}/{} operations finished, {} ok, {} failed, {} retries",
                master.name(),
                done.len(),
                traffic.script_len(),
                ok,
                done.len() - ok,
                traffic.retries()
            );
        }
        index += 1;
    }
}

/// Main entry point for the bus fabric simulator.
///
/// # Behavior
///
/// 1. **Configuration**: Parses command-line arguments and loads the scenario.
/// 2. **Initialization**: Builds every endpoint through the device registry
///    and elaborates the fabric.
/// 3. **Simulation**: Runs until every initiator is done and the fabric is
///    idle, or until the cycle limit.
/// 4. **Teardown**: Prints the bus statistics and optionally writes them as
///    JSON.
fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n[!] FATAL: {}: {}", args.config, e);
            process::exit(1);
        }
    };
    print_summary(&config);

    let registry = DeviceRegistry::with_defaults();
    let mut sim = match soc::build(&config, &registry) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("\n[!] FATAL: {}", e);
            process::exit(1);
        }
    };

    let max_cycles = args.max_cycles.unwrap_or(config.simulation.max_cycles);
    let outcome = match sim.run(max_cycles) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("\n[!] FATAL: {} at {}", e, sim.now());
            sim.fabric().stats().print();
            process::exit(1);
        }
    };

    if outcome.finished {
        println!("\n[*] Finished after {} cycles ({})", outcome.cycles, outcome.time);
    } else {
        println!("\n[*] Cycle limit of {} reached at {}", max_cycles, outcome.time);
    }
    print_completions(&sim);

    let stats = sim.fabric().stats();
    stats.print();

    if let Some(path) = args.stats_json.or(config.simulation.stats_json) {
        if let Err(e) = stats.write_json(&path) {
            eprintln!("[!] Failed to write statistics to {}: {}", path, e);
            process::exit(1);
        }
        println!("[*] Statistics written to {}", path);
    }
}
