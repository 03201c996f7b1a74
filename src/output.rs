//! This module is in charge of reporting on a finished run

use server_load_sim::{
    Float, HistorySummary, SimulationEngine, SimulationParameters, StatisticsSnapshot,
};
use std::{
    io::{Result, Write},
    time::Duration,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Final state of a run, captured before the pool is released
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Parameters in effect at the end
    pub params: SimulationParameters,

    /// Number of servers at the end
    pub servers: usize,

    /// Simulated time (seconds)
    pub simulated_time: Float,

    /// Statistics of the last pool generation
    pub snapshot: StatisticsSnapshot,

    /// Now / Avg / Peak columns at the end
    pub history: HistorySummary,
}
//
impl RunReport {
    /// Capture the final state of an engine
    pub fn capture(
        engine: &SimulationEngine,
        history: HistorySummary,
        window: Float,
    ) -> server_load_sim::Result<Self> {
        Ok(Self {
            params: engine
                .parameters()
                .ok_or(server_load_sim::SimError::EngineNotInitialized)?,
            servers: engine.pool()?.len(),
            simulated_time: engine.clock().elapsed(),
            snapshot: engine.snapshot(window)?,
            history,
        })
    }
}

/// Write the end-of-run summary
pub fn dump_summary(out: &mut impl Write, report: &RunReport, wall_time: Duration) -> Result<()> {
    // Timestamp of when the run ended
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown time".to_owned());

    let snapshot = &report.snapshot;
    let history = &report.history;
    writeln!(out, "Run finished at {timestamp}")?;
    writeln!(out, "---------------------------------------------")?;
    writeln!(out, "{:<31}: {:.1}s", "Wall-clock time", wall_time.as_secs_f64())?;
    writeln!(out, "{:<31}: {:.1}s", "Simulated time", report.simulated_time)?;
    writeln!(out, "{:<31}: {}", "Servers", report.servers)?;
    writeln!(out, "{:<31}: {}/s", "Arrival rate", report.params.arrival_rate)?;
    writeln!(
        out,
        "{:<31}: {}s ± {}s",
        "Processing time", report.params.mean_processing_time, report.params.processing_variance
    )?;
    writeln!(out, "---------------------------------------------")?;
    writeln!(out, "{:<31}: {}", "Completed tasks", snapshot.completed_tasks)?;
    writeln!(out, "{:<31}: {}", "Tasks left in queues", snapshot.total_queue_length)?;
    writeln!(out, "{:<31}: {:.2}/s", "Throughput", snapshot.current_throughput)?;
    writeln!(out, "{:<31}: {:.0}ms", "Average wait", snapshot.average_wait_time * 1000.)?;
    writeln!(out, "{:<31}: {:.0}%", "Peak utilization", history.utilization.peak)?;
    writeln!(out, "{:<31}: {:.0}", "Peak queue length", history.queue_length.peak)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_the_final_statistics() {
        let report = RunReport {
            params: SimulationParameters::default(),
            servers: 4,
            simulated_time: 60.,
            snapshot: StatisticsSnapshot {
                completed_tasks: 118,
                current_throughput: 118. / 60.,
                average_wait_time: 0.25,
                ..Default::default()
            },
            history: HistorySummary::default(),
        };
        let mut out = Vec::new();
        dump_summary(&mut out, &report, Duration::from_secs(61)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Run finished at "));
        assert!(text.contains("Completed tasks                : 118"));
        assert!(text.contains("Throughput                     : 1.97/s"));
        assert!(text.contains("Average wait                   : 250ms"));
        assert!(text.contains("Servers                        : 4"));
    }

    #[test]
    fn reports_are_captured_from_the_engine() {
        let mut engine = SimulationEngine::default();
        assert!(RunReport::capture(&engine, HistorySummary::default(), 1.).is_err());
        engine.init(SimulationParameters::default()).unwrap();
        engine.create_pool(2).unwrap();
        engine.step(0.5).unwrap();
        let report = RunReport::capture(&engine, HistorySummary::default(), 1.).unwrap();
        assert_eq!(report.servers, 2);
        assert_eq!(report.simulated_time, 0.5);
    }
}
