//! Deterministic distribution source fed with forced values

use super::DistributionSource;
use crate::numeric::Float;
use std::collections::VecDeque;

/// Source that replays forced arrival counts and service times
///
/// Once a script runs dry, the source falls back to its deterministic
/// defaults: no arrivals, and service times equal to the requested mean.
/// Every request is logged so that callers can check which parameters the
/// engine asked for.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    /// Forced arrival counts, consumed one per arrival draw
    arrivals: VecDeque<u64>,

    /// Forced service times, consumed one per service start
    service_times: VecDeque<Float>,

    /// Expected arrival counts that were requested, in order
    expected_log: Vec<Float>,

    /// Service time (mean, variance) pairs that were requested, in order
    service_log: Vec<(Float, Float)>,
}
//
impl ScriptedSource {
    /// Build a source with empty scripts
    pub fn new() -> Self {
        Self::default()
    }

    /// Append forced arrival counts to the script
    pub fn with_arrivals(mut self, counts: impl IntoIterator<Item = u64>) -> Self {
        self.push_arrivals(counts);
        self
    }

    /// Append forced service times to the script
    pub fn with_service_times(mut self, times: impl IntoIterator<Item = Float>) -> Self {
        self.push_service_times(times);
        self
    }

    /// Append forced arrival counts to a source that is already in use
    pub fn push_arrivals(&mut self, counts: impl IntoIterator<Item = u64>) {
        self.arrivals.extend(counts);
    }

    /// Append forced service times to a source that is already in use
    pub fn push_service_times(&mut self, times: impl IntoIterator<Item = Float>) {
        self.service_times.extend(times);
    }

    /// Expected arrival counts requested so far
    pub fn expected_log(&self) -> &[Float] {
        &self.expected_log
    }

    /// Service time parameters requested so far
    pub fn service_log(&self) -> &[(Float, Float)] {
        &self.service_log
    }
}

impl DistributionSource for ScriptedSource {
    fn arrivals(&mut self, expected: Float) -> u64 {
        self.expected_log.push(expected);
        self.arrivals.pop_front().unwrap_or(0)
    }

    fn service_time(&mut self, mean: Float, variance: Float) -> Float {
        self.service_log.push((mean, variance));
        self.service_times.pop_front().unwrap_or(mean)
    }
}
