//! Mechanism for loading and checking the simulator configuration

use clap::Parser;
use eyre::{ensure, Result, WrapErr};
use server_load_sim::{control::clamp_server_count, Float, SimulationParameters};
use std::{path::PathBuf, time::Duration};

/// Real-time queue and server load simulator
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Number of servers in the pool
    #[arg(long, default_value_t = 3)]
    servers: usize,

    /// Mean number of task arrivals per second
    #[arg(long, default_value_t = 2.0)]
    arrival_rate: Float,

    /// Mean service time of a task (seconds)
    #[arg(long, default_value_t = 1.0)]
    processing_time: Float,

    /// Spread of service times around the mean (seconds)
    #[arg(long, default_value_t = 0.3)]
    processing_variance: Float,

    /// Display refresh and simulation step rate (ticks per second)
    #[arg(long, default_value_t = 10.0)]
    tick_rate: Float,

    /// Trailing window over which the displayed throughput is measured (seconds)
    #[arg(long, default_value_t = 5.0)]
    stats_window: Float,

    /// Write logs to this file (otherwise, logs go to stderr if RUST_LOG is set)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Start right away instead of waiting for Enter
    #[arg(long)]
    no_wait: bool,
}

/// Simulator configuration
#[derive(Debug)]
pub struct Configuration {
    /// Initial number of servers
    pub servers: usize,

    /// Initial simulation parameters
    pub params: SimulationParameters,

    /// Wall-clock duration of one tick
    pub tick_period: Duration,

    /// Throughput window of the live display (seconds)
    pub stats_window: Float,

    /// Where logs should go, if not to stderr
    pub log_file: Option<PathBuf>,

    /// Whether to wait for Enter before the first tick
    pub wait_for_start: bool,
}
//
impl Configuration {
    /// Load the configuration from the command line and check it
    pub fn load() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Check parsed command line arguments and turn them into a configuration
    pub fn from_args(args: Args) -> Result<Self> {
        // The tick rate sets the wall-clock pacing, so it must be usable as
        // a duration
        ensure!(
            args.tick_rate.is_finite() && args.tick_rate > 0.,
            "The tick rate must be a positive number (got {})",
            args.tick_rate
        );
        ensure!(
            args.tick_rate <= 1000.,
            "Ticking faster than 1000 times per second is not supported"
        );
        ensure!(
            args.stats_window.is_finite() && args.stats_window > 0.,
            "The statistics window must be a positive duration (got {})",
            args.stats_window
        );

        // Simulation parameters are clamped to their floors, as they would be
        // if they were typed in at run time
        let params = SimulationParameters::new(
            args.arrival_rate,
            args.processing_time,
            args.processing_variance,
        )
        .wrap_err("Invalid simulation parameters")?;

        Ok(Configuration {
            servers: clamp_server_count(args.servers).applied,
            params,
            tick_period: Duration::from_secs_f64(1. / f64::from(args.tick_rate)),
            stats_window: args.stats_window,
            log_file: args.log_file,
            wait_for_start: !args.no_wait,
        })
    }

    /// Display the configuration
    pub fn print(&self) {
        println!("Servers             : {}", self.servers);
        println!("Arrival rate        : {}/s", self.params.arrival_rate);
        println!("Processing time     : {}s", self.params.mean_processing_time);
        println!("Processing variance : {}s", self.params.processing_variance);
        println!("Tick period         : {:?}", self.tick_period);
        println!("Statistics window   : {}s", self.stats_window);
        if let Some(path) = &self.log_file {
            println!("Log file            : {}", path.display());
        }
    }
}
