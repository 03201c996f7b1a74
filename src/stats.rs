//! This module derives aggregate statistics from the state of the server pool
//!
//! Three layers live here:
//!
//! * `RunningStats`, a numerically stable running mean/variance accumulator
//!   which servers use to integrate the waiting time of each task that
//!   starts service, and which can be merged across servers.
//! * `StatisticsSnapshot`, the point-in-time aggregate read of a pool.
//! * `MetricsHistory`, which follows snapshots across ticks to provide the
//!   "now", "average" and "peak" columns of the live display.

use crate::{
    engine::StepOutcome,
    error::{Result, SimError},
    numeric::{count_to_float, Float},
    pool::ServerPool,
};
use std::collections::VecDeque;

/// Running mean and variance, using Welford's algorithm
///
/// Accumulating `x - mean` deltas instead of raw sums keeps the accumulator
/// from growing much larger than the accumulated values, which would
/// otherwise blow up rounding errors over long runs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningStats {
    /// Number of integrated samples
    count: u64,

    /// Mean of the integrated samples
    mean: Float,

    /// Sum of squared deviations from the mean
    m2: Float,

    /// Largest integrated sample
    max: Float,
}
//
impl RunningStats {
    /// Prepare for sample integration
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate one sample
    pub fn push(&mut self, sample: Float) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / count_to_float(self.count);
        self.m2 += delta * (sample - self.mean);
        self.max = if self.count == 1 {
            sample
        } else {
            self.max.max(sample)
        };
    }

    /// Integrate the samples from another accumulator
    ///
    /// This is Chan et al's pairwise update, so merging per-server waits
    /// gives the same result as integrating every sample in one place.
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let count = self.count + other.count;
        let (n_a, n_b, n) = (
            count_to_float(self.count),
            count_to_float(other.count),
            count_to_float(count),
        );
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.max = self.max.max(other.max);
        self.count = count;
    }

    /// Number of integrated samples
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the samples, or zero if there are none
    pub fn mean(&self) -> Float {
        self.mean
    }

    /// Population variance of the samples, or zero if there are fewer than two
    pub fn variance(&self) -> Float {
        if self.count < 2 {
            0.
        } else {
            (self.m2 / count_to_float(self.count)).max(0.)
        }
    }

    /// Standard deviation of the samples
    pub fn std_dev(&self) -> Float {
        self.variance().sqrt()
    }

    /// Largest sample, or zero if there are none
    pub fn max(&self) -> Float {
        self.max
    }
}

/// Point-in-time aggregate statistics of a server pool
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatisticsSnapshot {
    /// Completed tasks per second since the pool generation began
    pub current_throughput: Float,

    /// Mean time between arrival and service start (seconds)
    pub average_wait_time: Float,

    /// Percentage of busy servers (0 to 100)
    pub server_utilization: Float,

    /// Tasks in the pool, including those being served
    pub total_queue_length: usize,

    /// Tasks completed since the pool generation began
    pub completed_tasks: u64,
}
//
impl StatisticsSnapshot {
    /// Aggregate the current state of a pool
    ///
    /// `elapsed` is the simulated time since the pool generation began.
    /// Nothing is mutated, so this can be called at any cadence.
    pub fn from_pool(pool: &ServerPool, elapsed: Float) -> Self {
        let servers = pool.servers();

        // Queue lengths and completions are exact sums over the servers
        let total_queue_length = servers.iter().map(|s| s.queue_length()).sum();
        let completed_tasks = servers.iter().map(|s| s.total_processed()).sum();

        // Utilization is the instantaneous fraction of busy servers
        let busy = servers.iter().filter(|s| s.is_busy()).count();
        let server_utilization = if servers.is_empty() {
            0.
        } else {
            100. * busy as Float / servers.len() as Float
        };

        // Throughput is cumulative over the generation
        let current_throughput = if elapsed > 0. {
            count_to_float(completed_tasks) / elapsed
        } else {
            0.
        };

        // Wait times are merged from every server's accumulator
        let mut waits = RunningStats::new();
        servers.iter().for_each(|s| waits.merge(s.wait_stats()));
        let average_wait_time = waits.mean();
        assert!(
            average_wait_time >= 0.,
            "Waiting times cannot be negative (got {average_wait_time})"
        );

        StatisticsSnapshot {
            current_throughput,
            average_wait_time,
            server_utilization,
            total_queue_length,
            completed_tasks,
        }
    }
}

/// Now / average / peak view of one metric
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricSummary {
    /// Latest value
    pub now: Float,

    /// Mean of every recorded value
    pub avg: Float,

    /// Largest recorded value
    pub peak: Float,
}

/// Summary of every tracked metric, as shown by the live display
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HistorySummary {
    /// Completed tasks per second over the trailing window
    pub throughput: MetricSummary,

    /// Average wait time (seconds)
    pub wait_time: MetricSummary,

    /// Server utilization (percent)
    pub utilization: MetricSummary,

    /// Total queue length
    pub queue_length: MetricSummary,
}

/// Tracker of one metric across ticks
#[derive(Clone, Copy, Debug, Default)]
struct MetricTrack {
    now: Float,
    stats: RunningStats,
}
//
impl MetricTrack {
    fn record(&mut self, value: Float) {
        self.now = value;
        self.stats.push(value);
    }

    fn summary(&self) -> MetricSummary {
        MetricSummary {
            now: self.now,
            avg: self.stats.mean(),
            peak: self.stats.max(),
        }
    }
}

/// History of the pool statistics across ticks
///
/// Throughput is measured over a trailing time window from the per-step
/// completion counts, the other metrics are taken from the snapshots. The
/// history starts over whenever the pool is rebuilt.
#[derive(Clone, Debug)]
pub struct MetricsHistory {
    /// Duration of the trailing throughput window (seconds)
    window: Float,

    /// Pool generation which the recorded values belong to
    generation: Option<u64>,

    /// Time at which recording started for this generation
    origin: Float,

    /// Completion counts of recent steps, tagged with their end time
    recent: VecDeque<(Float, u64)>,

    throughput: MetricTrack,
    wait_time: MetricTrack,
    utilization: MetricTrack,
    queue_length: MetricTrack,
}
//
impl MetricsHistory {
    /// Set up a history with a given throughput window (seconds)
    ///
    /// The window must be positive and finite.
    pub fn new(window: Float) -> Result<Self> {
        if !(window > 0. && window.is_finite()) {
            return Err(SimError::InvalidInterval { value: window });
        }
        Ok(Self::empty(window))
    }

    fn empty(window: Float) -> Self {
        Self {
            window,
            generation: None,
            origin: 0.,
            recent: VecDeque::new(),
            throughput: MetricTrack::default(),
            wait_time: MetricTrack::default(),
            utilization: MetricTrack::default(),
            queue_length: MetricTrack::default(),
        }
    }

    /// Duration of the trailing throughput window
    pub fn window(&self) -> Float {
        self.window
    }

    /// Forget everything that was recorded
    pub fn clear(&mut self) {
        *self = Self::empty(self.window);
    }

    /// Record the outcome of a step that ended at simulated time `now`
    pub fn record(
        &mut self,
        now: Float,
        outcome: &StepOutcome,
        snapshot: &StatisticsSnapshot,
        generation: u64,
    ) {
        // A rebuilt pool (or a clock that went back after a reset) starts a
        // fresh history
        let stale_clock = self.recent.back().is_some_and(|&(t, _)| t > now);
        if self.generation != Some(generation) || stale_clock {
            self.clear();
            self.generation = Some(generation);
            self.origin = now;
        }

        // Slide the throughput window
        self.recent.push_back((now, outcome.completed_tasks_count));
        let horizon = now - self.window;
        while self.recent.front().is_some_and(|&(t, _)| t <= horizon) {
            self.recent.pop_front();
        }
        let span = (now - self.origin).min(self.window);
        let windowed_completions: u64 = self.recent.iter().map(|&(_, c)| c).sum();
        let throughput = if span > 0. {
            count_to_float(windowed_completions) / span
        } else {
            0.
        };

        // Integrate this tick's values
        self.throughput.record(throughput);
        self.wait_time.record(snapshot.average_wait_time);
        self.utilization.record(snapshot.server_utilization);
        self.queue_length.record(snapshot.total_queue_length as Float);
    }

    /// Now / average / peak values of every tracked metric
    pub fn summary(&self) -> HistorySummary {
        HistorySummary {
            throughput: self.throughput.summary(),
            wait_time: self.wait_time.summary(),
            utilization: self.utilization.summary(),
            queue_length: self.queue_length.summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Float, b: Float) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn welford_matches_textbook_formulas() {
        let samples = [2., 4., 4., 4., 5., 5., 7., 9.];
        let mut stats = RunningStats::new();
        samples.iter().for_each(|&x| stats.push(x));
        assert_eq!(stats.count(), 8);
        assert!(close(stats.mean(), 5.));
        assert!(close(stats.variance(), 4.));
        assert!(close(stats.std_dev(), 2.));
        assert_eq!(stats.max(), 9.);
    }

    #[test]
    fn merge_equals_sequential_accumulation() {
        let samples: Vec<Float> = (0..50).map(|i| (i as Float * 0.37).sin() + 1.5).collect();
        let mut whole = RunningStats::new();
        samples.iter().for_each(|&x| whole.push(x));

        let (left, right) = samples.split_at(17);
        let mut merged = RunningStats::new();
        left.iter().for_each(|&x| merged.push(x));
        let mut other = RunningStats::new();
        right.iter().for_each(|&x| other.push(x));
        merged.merge(&other);

        assert_eq!(merged.count(), whole.count());
        assert!(close(merged.mean(), whole.mean()));
        assert!(close(merged.variance(), whole.variance()));
        assert_eq!(merged.max(), whole.max());
    }

    #[test]
    fn merging_empty_accumulators_is_neutral() {
        let mut stats = RunningStats::new();
        stats.merge(&RunningStats::new());
        assert_eq!(stats, RunningStats::new());

        let mut filled = RunningStats::new();
        filled.push(3.);
        stats.merge(&filled);
        assert_eq!(stats, filled);
        assert_eq!(stats.mean(), 3.);
        assert_eq!(stats.variance(), 0.);
    }

    fn outcome(completed: u64) -> StepOutcome {
        StepOutcome {
            completed_tasks_count: completed,
            new_tasks_count: 0,
        }
    }

    #[test]
    fn throughput_is_measured_over_the_trailing_window() {
        let mut history = MetricsHistory::new(2.).unwrap();
        let snapshot = StatisticsSnapshot::default();

        // Generation starts at t=0 with an empty step
        history.record(0., &outcome(0), &snapshot, 0);
        assert_eq!(history.summary().throughput.now, 0.);

        // 4 completions in the first second
        history.record(1., &outcome(4), &snapshot, 0);
        assert!(close(history.summary().throughput.now, 4.));

        // 2 more in the next second: 6 over a full 2s window
        history.record(2., &outcome(2), &snapshot, 0);
        assert!(close(history.summary().throughput.now, 3.));

        // The first second slides out of the window
        history.record(3., &outcome(0), &snapshot, 0);
        assert!(close(history.summary().throughput.now, 1.));

        let summary = history.summary().throughput;
        assert!(close(summary.peak, 4.));
        assert!(close(summary.avg, (0. + 4. + 3. + 1.) / 4.));
    }

    #[test]
    fn snapshot_metrics_track_now_avg_and_peak() {
        let mut history = MetricsHistory::new(1.).unwrap();
        for (t, queue) in [(0.1, 2usize), (0.2, 6), (0.3, 4)] {
            let snapshot = StatisticsSnapshot {
                total_queue_length: queue,
                server_utilization: 50.,
                ..Default::default()
            };
            history.record(t, &outcome(0), &snapshot, 3);
        }
        let summary = history.summary();
        assert_eq!(summary.queue_length.now, 4.);
        assert!(close(summary.queue_length.avg, 4.));
        assert_eq!(summary.queue_length.peak, 6.);
        assert_eq!(summary.utilization.peak, 50.);
    }

    #[test]
    fn a_new_generation_clears_the_history() {
        let mut history = MetricsHistory::new(1.).unwrap();
        let busy = StatisticsSnapshot {
            total_queue_length: 10,
            ..Default::default()
        };
        history.record(0.5, &outcome(3), &busy, 0);
        history.record(0.6, &outcome(0), &StatisticsSnapshot::default(), 1);
        let summary = history.summary();
        assert_eq!(summary.queue_length.peak, 0.);
        assert_eq!(summary.throughput.peak, 0.);
        assert_eq!(history.window(), 1.);
    }

    #[test]
    fn windows_must_be_positive_durations() {
        for window in [0., -1., Float::NAN, Float::INFINITY] {
            assert!(matches!(
                MetricsHistory::new(window),
                Err(SimError::InvalidInterval { .. })
            ));
        }
        assert!(MetricsHistory::new(Float::MIN_POSITIVE).is_ok());
    }
}
