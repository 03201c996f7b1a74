//! Typed control commands and the validation of user-supplied parameters
//!
//! Values typed by the user are not trusted: rates, processing times and
//! server counts outside of their allowed range are clamped to the nearest
//! bound instead of being rejected. Only values which cannot be meaningfully
//! clamped (NaN, infinities) are errors.

use crate::{
    error::{Result, SimError},
    numeric::Float,
};
use tracing::warn;

/// Smallest accepted arrival rate (tasks per second)
pub const MIN_ARRIVAL_RATE: Float = 0.1;

/// Smallest accepted mean processing time (seconds)
pub const MIN_PROCESSING_TIME: Float = 0.1;

/// Smallest accepted processing variance (seconds)
pub const MIN_PROCESSING_VARIANCE: Float = 0.;

/// Smallest accepted number of servers
pub const MIN_SERVERS: usize = 1;

/// Largest accepted arrival rate (tasks per second)
pub const MAX_ARRIVAL_RATE: Float = 10_000.;

/// Largest accepted mean processing time (seconds)
pub const MAX_PROCESSING_TIME: Float = 3_600.;

/// Largest accepted processing variance (seconds)
pub const MAX_PROCESSING_VARIANCE: Float = 3_600.;

/// Largest accepted number of servers
pub const MAX_SERVERS: usize = 10_000;

/// Command that changes the simulation between two steps
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlCommand {
    /// Rebuild the pool with a new number of servers
    Resize(usize),

    /// Change the mean arrival rate (tasks per second)
    SetArrivalRate(Float),

    /// Change the mean processing time (seconds)
    SetProcessingTime(Float),

    /// Change the spread of processing times (seconds)
    SetProcessingVariance(Float),

    /// Drop all work in progress and restart the clock
    Reset,
}

/// A requested value, and the value that was actually applied
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adjusted<T> {
    /// What the caller asked for
    pub requested: T,

    /// What was installed
    pub applied: T,
}
//
impl<T: PartialEq + Copy> Adjusted<T> {
    /// Whether the requested value had to be changed
    pub fn was_clamped(&self) -> bool {
        self.requested != self.applied
    }
}

/// Value that a parameter would get, or None if it cannot be clamped
pub fn bounded(value: Float, min: Float, max: Float) -> Option<Float> {
    value.is_finite().then(|| value.clamp(min, max))
}

/// Clamp a floating-point parameter to its allowed range
pub fn clamp_parameter(
    name: &'static str,
    value: Float,
    min: Float,
    max: Float,
) -> Result<Adjusted<Float>> {
    let applied = bounded(value, min, max).ok_or(SimError::InvalidParameter { name, value })?;
    let adjusted = Adjusted {
        requested: value,
        applied,
    };
    if adjusted.was_clamped() {
        warn!(
            parameter = name,
            requested = value,
            applied,
            "parameter clamped to its allowed range"
        );
    }
    Ok(adjusted)
}

/// Clamp a server count to its allowed range
pub fn clamp_server_count(count: usize) -> Adjusted<usize> {
    let adjusted = Adjusted {
        requested: count,
        applied: count.clamp(MIN_SERVERS, MAX_SERVERS),
    };
    if adjusted.was_clamped() {
        warn!(
            requested = count,
            applied = adjusted.applied,
            "server count clamped to its allowed range"
        );
    }
    adjusted
}
