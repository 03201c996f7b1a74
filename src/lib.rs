//! Server load simulator: a stepped multi-server queueing station
//!
//!
//! # Overview
//!
//! Tasks arrive at a station of identical servers following a Poisson
//! process. Each arrival joins the server with the fewest outstanding tasks
//! (ties going to the lowest server id), waits in that server's FIFO queue,
//! and is then served for a randomly drawn duration.
//!
//! The simulation is advanced in discrete steps by `SimulationEngine::step`,
//! which takes the simulated time that elapsed since the previous step. The
//! binary drives it from wall-clock ticks, but nothing in the library depends
//! on real time: tests step it with arbitrary intervals and scripted draws.
//!
//! Between steps, the state of the pool can be read through
//! `SimulationEngine::snapshot` (aggregate statistics) and
//! `SimulationEngine::server_states` (per-server view). Parameters and pool
//! size can be changed through the engine's control surface, or through an
//! `EngineControl` handle whose commands are applied at the next step.
//!
//!
//! # Crate features
//!
//! - `f32`: use single precision instead of double precision for times,
//!   rates and statistics.

#![warn(missing_docs)]

pub mod control;
pub mod engine;
pub mod error;
pub mod numeric;
pub mod pool;
pub mod random;
pub mod server;
pub mod stats;

pub use crate::{
    control::{Adjusted, ControlCommand},
    engine::{
        Applied, EngineControl, SimulationClock, SimulationEngine, SimulationParameters,
        StepOutcome,
    },
    error::{Result, SimError},
    numeric::Float,
    pool::{ServerPool, ServerStatus},
    random::{DistributionSource, ScriptedSource, StandardSource},
    stats::{HistorySummary, MetricSummary, MetricsHistory, RunningStats, StatisticsSnapshot},
};
