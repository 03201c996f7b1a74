//! Random number generation module
//!
//! The engine never talks to a random number generator directly. It asks a
//! `DistributionSource` for the two quantities it needs, so that tests (or a
//! reproducible driver) can substitute forced sequences for the real draws.

mod scripted;
mod standard;

pub use self::scripted::ScriptedSource;
pub use self::standard::StandardSource;

use crate::numeric::Float;

/// Supplier of the stochastic quantities used by the simulation
///
/// Each method is a "next value given parameters" operation: the engine
/// passes the current parameters on every call, so implementations hold no
/// copy of the simulation parameters and rate changes are picked up on the
/// very next draw.
pub trait DistributionSource {
    /// Number of tasks arriving during an interval, given the expected count
    /// (arrival rate times interval duration) of a Poisson process
    ///
    /// An expected count of zero must produce zero arrivals.
    fn arrivals(&mut self, expected: Float) -> u64;

    /// Service duration of a task that is about to start service
    ///
    /// The engine clamps the result to a strictly positive minimum, but a
    /// non-finite result is treated as a bug in the source.
    fn service_time(&mut self, mean: Float, variance: Float) -> Float;
}

impl<S: DistributionSource + ?Sized> DistributionSource for Box<S> {
    fn arrivals(&mut self, expected: Float) -> u64 {
        (**self).arrivals(expected)
    }

    fn service_time(&mut self, mean: Float, variance: Float) -> Float {
        (**self).service_time(mean, variance)
    }
}
