//! Server load simulator: live terminal front-end
//!
//!
//! # Usage
//!
//! The simulator starts with the pool size and parameters given on the
//! command line (see `--help`), then refreshes a live view of the server
//! queues and statistics several times per second. Commands are typed at the
//! prompt and applied between two simulation steps:
//!
//! * `s <n>` / `servers <n>`: rebuild the pool with n servers
//! * `r <rate>` / `rate <rate>`: change the arrival rate (tasks/s)
//! * `p <time>` / `processing <time>`: change the mean processing time (s)
//! * `v <spread>` / `variance <spread>`: change the processing time spread (s)
//! * `stats`: show or hide per-server statistics
//! * `reset`: drop all work and restart the clock
//! * `q` / `quit` (or Esc, Ctrl-C): leave
//!
//! Logs go to `--log-file` if given, otherwise to stderr when `RUST_LOG` is
//! set.

#![warn(missing_docs)]

mod command;
mod config;
mod display;
mod input;
mod logging;
mod output;
mod scheduling;

use crate::{
    command::Command,
    config::Configuration,
    display::{Display, Frame, TerminalGuard},
    input::{InputEvent, LineEditor},
    output::RunReport,
    scheduling::{Ticker, Wakeup},
};
use eyre::{Result, WrapErr};
use server_load_sim::{Float, MetricsHistory, SimulationEngine};
use std::{io, panic, time::Instant};
use tracing::{error, info, warn};

fn main() -> Result<()> {
    // ### CONFIGURATION ###

    let cfg = Configuration::load().wrap_err("Failed to load the configuration")?;
    logging::init(cfg.log_file.as_deref())?;
    cfg.print();

    // ### SIMULATION INITIALIZATION ###

    let mut engine = SimulationEngine::default();
    engine.init(cfg.params)?;
    engine
        .create_pool(cfg.servers)
        .wrap_err("Failed to create the server pool")?;

    if cfg.wait_for_start {
        println!("Press Enter to begin, then use commands to control the simulation.");
        io::stdin().read_line(&mut String::new())?;
    }

    // ### LIVE SIMULATION ###

    // A panic must not leave the terminal in raw mode
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        display::restore_terminal();
        default_hook(info);
    }));

    // The terminal guard must be gone before anything else is printed
    let started = Instant::now();
    let outcome = {
        let _terminal = TerminalGuard::enter().wrap_err("Failed to set up the terminal")?;
        run(&mut engine, &cfg)
    };
    let wall_time = started.elapsed();

    // Servers and their queues are released whatever happened
    engine.free_pool();
    let report = outcome.map_err(|err| {
        error!("simulation stopped: {err:#}");
        err
    })?;

    // ### RESULTS ###

    info!(completed = report.snapshot.completed_tasks, "simulation finished");
    output::dump_summary(&mut io::stdout(), &report, wall_time)
        .wrap_err("Failed to output the summary")?;
    Ok(())
}

/// Drive the engine until the user quits, returning its final state
fn run(engine: &mut SimulationEngine, cfg: &Configuration) -> Result<RunReport> {
    let mut display = Display::new(io::stdout());
    let mut editor = LineEditor::new();
    let mut ticker = Ticker::new(cfg.tick_period, Instant::now());
    let mut history =
        MetricsHistory::new(cfg.stats_window).wrap_err("Invalid statistics window")?;
    let mut show_details = false;
    let mut status: Option<String> = None;

    loop {
        match ticker.wait(&mut editor)? {
            // Advance the simulation and show where it stands. A tick that
            // cannot be simulated (e.g. after the process was suspended for
            // too long) is skipped.
            Wakeup::Tick(delta) => {
                let outcome = match engine.step(delta.as_secs_f64() as Float) {
                    Ok(outcome) => outcome,
                    Err(err) if err.is_recoverable() => {
                        warn!(%err, "simulation step skipped");
                        status = Some(format!("Error: {err}"));
                        continue;
                    }
                    Err(err) => return Err(err).wrap_err("Simulation step failed"),
                };
                let snapshot = engine.snapshot(cfg.stats_window)?;
                let generation = engine.pool()?.generation();
                history.record(engine.clock().elapsed(), &outcome, &snapshot, generation);
                let frame = Frame {
                    params: engine.parameters().unwrap_or_default(),
                    elapsed: engine.clock().elapsed(),
                    servers: engine.server_states()?,
                    snapshot,
                    history: history.summary(),
                    show_details,
                    status: status.as_deref(),
                    prompt: editor.buffer(),
                };
                display.render(&frame)?;
            }

            // Leave on Esc or Ctrl-C
            Wakeup::Input(InputEvent::Interrupt) => break,

            // Act on a submitted line, before the next step
            Wakeup::Input(InputEvent::Submitted(line)) => match command::parse(&line) {
                None => {}
                Some(Err(err)) => status = Some(err.to_string()),
                Some(Ok(Command::Quit)) => break,
                Some(Ok(Command::ShowStats)) => show_details = !show_details,
                Some(Ok(Command::Control(control))) => match engine.apply(control) {
                    Ok(applied) => status = Some(command::describe(&applied)),
                    Err(err) if err.is_recoverable() => status = Some(format!("Error: {err}")),
                    Err(err) => return Err(err).wrap_err("Failed to apply a command"),
                },
            },
        }
    }

    RunReport::capture(engine, history.summary(), cfg.stats_window)
        .wrap_err("Failed to capture the final state")
}
