//! The simulation engine, which advances the queueing station step by step
//!
//! Each call to `step` turns an interval of elapsed time into Poisson
//! arrivals, routes them to the server pool, and lets every server make
//! progress on its work. The engine owns the pool, the clock, and the
//! simulation parameters. Everything else observes it through snapshots.

use crate::{
    control::{
        bounded, clamp_parameter, clamp_server_count, Adjusted, ControlCommand,
        MAX_ARRIVAL_RATE, MAX_PROCESSING_TIME, MAX_PROCESSING_VARIANCE, MIN_ARRIVAL_RATE,
        MIN_PROCESSING_TIME, MIN_PROCESSING_VARIANCE,
    },
    error::{Result, SimError},
    numeric::Float,
    pool::{ServerPool, ServerStatus},
    random::{DistributionSource, StandardSource},
    server::{Server, Task},
    stats::StatisticsSnapshot,
};
use std::{
    collections::VecDeque,
    sync::mpsc::{self, Receiver, Sender},
};
use tracing::{debug, info, trace, warn};

/// Shortest service time that a task can be given (seconds)
///
/// Sampled service times below this are clamped up to it.
pub const MIN_SERVICE_TIME: Float = 1e-3;

/// Most arrivals that a single step may expect on average
///
/// Longer intervals must be split into several steps.
pub const MAX_EXPECTED_ARRIVALS: Float = 1e6;

/// Global parameters of the simulation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationParameters {
    /// Mean number of arrivals per second
    pub arrival_rate: Float,

    /// Mean service time of a task (seconds)
    pub mean_processing_time: Float,

    /// Spread of service times around the mean (seconds)
    pub processing_variance: Float,
}
//
impl SimulationParameters {
    /// Build a parameter set, clamping each value to its allowed range
    pub fn new(
        arrival_rate: Float,
        mean_processing_time: Float,
        processing_variance: Float,
    ) -> Result<Self> {
        Ok(Self {
            arrival_rate: clamp_parameter(
                "arrival_rate",
                arrival_rate,
                MIN_ARRIVAL_RATE,
                MAX_ARRIVAL_RATE,
            )?
            .applied,
            mean_processing_time: clamp_parameter(
                "processing_time",
                mean_processing_time,
                MIN_PROCESSING_TIME,
                MAX_PROCESSING_TIME,
            )?
            .applied,
            processing_variance: clamp_parameter(
                "processing_variance",
                processing_variance,
                MIN_PROCESSING_VARIANCE,
                MAX_PROCESSING_VARIANCE,
            )?
            .applied,
        })
    }
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            arrival_rate: 2.0,
            mean_processing_time: 1.0,
            processing_variance: 0.3,
        }
    }
}

/// Simulated time, advanced only by the engine's steps
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimulationClock {
    elapsed: Float,
}
//
impl SimulationClock {
    /// Simulated seconds since the clock was last reset
    pub fn elapsed(&self) -> Float {
        self.elapsed
    }

    fn advance(&mut self, delta_time: Float) {
        assert!(delta_time >= 0., "The clock cannot go backwards");
        self.elapsed += delta_time;
    }

    fn reset(&mut self) {
        self.elapsed = 0.;
    }
}

/// What happened during one step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Tasks that completed service during the step
    pub completed_tasks_count: u64,

    /// Tasks that arrived and were admitted to a server during the step
    pub new_tasks_count: u64,
}

/// Effect of an applied control command
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Applied {
    /// The pool was rebuilt with a new server count
    Resized(Adjusted<usize>),

    /// A new arrival rate was installed
    ArrivalRate(Adjusted<Float>),

    /// A new mean processing time was installed
    ProcessingTime(Adjusted<Float>),

    /// A new processing variance was installed
    ProcessingVariance(Adjusted<Float>),

    /// The simulation was reset
    Reset,
}

/// Handle for queueing control commands from outside the driver loop
///
/// Commands sent through a handle are applied at the beginning of the next
/// `step` call, never while a step is in progress. A step that is rejected
/// leaves them queued for the following one.
#[derive(Clone, Debug)]
pub struct EngineControl {
    sender: Sender<ControlCommand>,
}
//
impl EngineControl {
    /// Queue a command, returning false if the engine no longer exists
    pub fn send(&self, command: ControlCommand) -> bool {
        self.sender.send(command).is_ok()
    }

    /// Queue an arrival rate change
    pub fn update_arrival_rate(&self, rate: Float) -> bool {
        self.send(ControlCommand::SetArrivalRate(rate))
    }
}

/// Stepped simulation of a multi-server queueing station
///
/// The engine starts uninitialized: `init` must install parameters and
/// `create_pool` must build servers before it can `step`.
pub struct SimulationEngine<S = StandardSource> {
    /// Supplier of arrival counts and service times
    source: S,

    /// Parameters, installed by init
    params: Option<SimulationParameters>,

    /// Simulated time
    clock: SimulationClock,

    /// Servers of the current generation
    pool: Option<ServerPool>,

    /// Generation number that the next pool will get
    next_generation: u64,

    /// Commands queued by EngineControl handles
    commands: Receiver<ControlCommand>,

    /// Commands received from handles but not applied yet
    pending: VecDeque<ControlCommand>,

    /// Sender side of the command queue, cloned into handles
    control: Sender<ControlCommand>,
}
//
impl<S: DistributionSource> SimulationEngine<S> {
    // ### CONSTRUCTION ###

    /// Build an uninitialized engine around a distribution source
    pub fn new(source: S) -> Self {
        let (control, commands) = mpsc::channel();
        Self {
            source,
            params: None,
            clock: SimulationClock::default(),
            pool: None,
            next_generation: 0,
            commands,
            pending: VecDeque::new(),
            control,
        }
    }

    /// Install simulation parameters and restart the clock at zero
    ///
    /// An existing pool is rebuilt with the same number of servers, since the
    /// tasks it holds were timestamped against the previous clock.
    pub fn init(&mut self, params: SimulationParameters) -> Result<()> {
        if let Some(count) = self.pool.as_ref().map(ServerPool::len) {
            let pool = self.build_pool(count, 0.)?;
            self.pool = Some(pool);
        }
        self.params = Some(params);
        self.clock.reset();
        info!(?params, "simulation initialized");
        Ok(())
    }

    /// Build a new pool generation with `server_count` idle servers
    pub fn create_pool(&mut self, server_count: usize) -> Result<Adjusted<usize>> {
        let count = clamp_server_count(server_count);
        let pool = self.build_pool(count.applied, self.clock.elapsed())?;
        info!(
            servers = count.applied,
            generation = pool.generation(),
            "server pool created"
        );
        self.pool = Some(pool);
        Ok(count)
    }

    /// Release every server and the tasks they hold
    pub fn free_pool(&mut self) {
        if let Some(pool) = self.pool.take() {
            info!(
                servers = pool.len(),
                generation = pool.generation(),
                "server pool released"
            );
        }
    }

    // ### STATE QUERIES ###

    /// Installed parameters, if init was called
    pub fn parameters(&self) -> Option<SimulationParameters> {
        self.params
    }

    /// Simulated time
    pub fn clock(&self) -> SimulationClock {
        self.clock
    }

    /// Current server pool
    pub fn pool(&self) -> Result<&ServerPool> {
        self.pool.as_ref().ok_or(SimError::EngineNotInitialized)
    }

    /// Whether both parameters and a pool are in place
    pub fn is_ready(&self) -> bool {
        self.params.is_some() && self.pool.is_some()
    }

    /// Copy of the state of every server, for rendering
    pub fn server_states(&self) -> Result<Vec<ServerStatus>> {
        Ok(self.pool()?.statuses())
    }

    /// Aggregate statistics of the current pool generation
    ///
    /// The statistics are cumulative since the generation began, `window`
    /// must nonetheless be a positive duration.
    pub fn snapshot(&self, window: Float) -> Result<StatisticsSnapshot> {
        let pool = self.pool()?;
        if !(window > 0. && window.is_finite()) {
            return Err(SimError::InvalidInterval { value: window });
        }
        let elapsed = self.clock.elapsed() - pool.started_at();
        Ok(StatisticsSnapshot::from_pool(pool, elapsed))
    }

    /// Distribution source in use
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the distribution source (e.g. to feed a script)
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    // ### SIMULATION ###

    /// Advance the simulation by `delta_time` seconds
    pub fn step(&mut self, delta_time: Float) -> Result<StepOutcome> {
        // Check that the engine can run and that the interval makes sense
        if !self.is_ready() {
            return Err(SimError::EngineNotInitialized);
        }
        if !(delta_time >= 0. && delta_time.is_finite()) {
            return Err(SimError::InvalidInterval { value: delta_time });
        }

        // An empty interval changes nothing
        if delta_time == 0. {
            return Ok(StepOutcome::default());
        }

        // Commands queued since the last step take effect now, provided that
        // the interval is also valid under the arrival rate they install
        self.receive_queued();
        let expected_arrivals = self.staged_arrival_rate() * delta_time;
        if !(expected_arrivals.is_finite() && expected_arrivals <= MAX_EXPECTED_ARRIVALS) {
            return Err(SimError::InvalidInterval { value: delta_time });
        }
        self.apply_queued()?;

        // Split the borrows of the engine's state
        let Self {
            source,
            params,
            clock,
            pool,
            ..
        } = self;
        let (Some(params), Some(pool)) = (params.as_ref(), pool.as_mut()) else {
            return Err(SimError::EngineNotInitialized);
        };
        debug_assert_eq!(expected_arrivals, params.arrival_rate * delta_time);
        let now = clock.elapsed();

        // Draw the arrivals of this interval. They are timestamped at the
        // start of the interval and served during it.
        let new_tasks_count = if pool.is_empty() {
            0
        } else {
            source.arrivals(expected_arrivals)
        };

        // Route them, starting service on idle servers
        let mut sample = || sample_service_time(&mut *source, params);
        for _ in 0..new_tasks_count {
            pool.dispatch(Task::new(now), now, &mut sample)?;
        }

        // Let every server make progress
        let completed_tasks_count = pool.advance(now, delta_time, &mut sample);
        clock.advance(delta_time);

        // Every admitted task is either done or still in the pool
        debug_assert_eq!(
            pool.admitted(),
            pool.servers()
                .iter()
                .map(|s| s.total_processed() + s.queue_length() as u64)
                .sum::<u64>(),
            "Task conservation was violated"
        );

        trace!(
            now = clock.elapsed(),
            new_tasks_count,
            completed_tasks_count,
            "simulation step"
        );
        Ok(StepOutcome {
            completed_tasks_count,
            new_tasks_count,
        })
    }

    /// Advance the simulation up to a cumulative elapsed time
    pub fn advance_to(&mut self, elapsed_time: Float) -> Result<StepOutcome> {
        if !self.is_ready() {
            return Err(SimError::EngineNotInitialized);
        }
        let delta_time = elapsed_time - self.clock.elapsed();
        if !(delta_time >= 0.) {
            return Err(SimError::InvalidInterval { value: delta_time });
        }
        self.step(delta_time)
    }

    // ### CONTROL SURFACE ###

    /// Handle for queueing commands from elsewhere
    pub fn control_handle(&self) -> EngineControl {
        EngineControl {
            sender: self.control.clone(),
        }
    }

    /// Apply a control command right away
    pub fn apply(&mut self, command: ControlCommand) -> Result<Applied> {
        match command {
            ControlCommand::Resize(count) => self.resize(count).map(Applied::Resized),
            ControlCommand::SetArrivalRate(rate) => {
                self.update_arrival_rate(rate).map(Applied::ArrivalRate)
            }
            ControlCommand::SetProcessingTime(time) => {
                self.update_processing_time(time).map(Applied::ProcessingTime)
            }
            ControlCommand::SetProcessingVariance(variance) => self
                .update_processing_variance(variance)
                .map(Applied::ProcessingVariance),
            ControlCommand::Reset => self.reset().map(|()| Applied::Reset),
        }
    }

    /// Change the arrival rate used by the next steps
    pub fn update_arrival_rate(&mut self, rate: Float) -> Result<Adjusted<Float>> {
        let params = self.params.as_mut().ok_or(SimError::EngineNotInitialized)?;
        let adjusted = clamp_parameter("arrival_rate", rate, MIN_ARRIVAL_RATE, MAX_ARRIVAL_RATE)?;
        params.arrival_rate = adjusted.applied;
        debug!(rate = adjusted.applied, "arrival rate updated");
        Ok(adjusted)
    }

    /// Change the mean service time of tasks that start service from now on
    pub fn update_processing_time(&mut self, time: Float) -> Result<Adjusted<Float>> {
        let params = self.params.as_mut().ok_or(SimError::EngineNotInitialized)?;
        let adjusted =
            clamp_parameter("processing_time", time, MIN_PROCESSING_TIME, MAX_PROCESSING_TIME)?;
        params.mean_processing_time = adjusted.applied;
        debug!(time = adjusted.applied, "processing time updated");
        Ok(adjusted)
    }

    /// Change the spread of service times of tasks that start from now on
    pub fn update_processing_variance(&mut self, variance: Float) -> Result<Adjusted<Float>> {
        let params = self.params.as_mut().ok_or(SimError::EngineNotInitialized)?;
        let adjusted = clamp_parameter(
            "processing_variance",
            variance,
            MIN_PROCESSING_VARIANCE,
            MAX_PROCESSING_VARIANCE,
        )?;
        params.processing_variance = adjusted.applied;
        debug!(variance = adjusted.applied, "processing variance updated");
        Ok(adjusted)
    }

    /// Rebuild the pool with a new number of servers
    ///
    /// Work in progress is discarded, the clock keeps running.
    pub fn resize(&mut self, new_count: usize) -> Result<Adjusted<usize>> {
        let discarded = self.pool()?.servers().iter().map(Server::queue_length).sum::<usize>();
        let count = clamp_server_count(new_count);
        let pool = self.build_pool(count.applied, self.clock.elapsed())?;
        info!(
            servers = count.applied,
            generation = pool.generation(),
            discarded,
            "server pool resized"
        );
        self.pool = Some(pool);
        Ok(count)
    }

    /// Drop all work in progress, zero every counter and restart the clock
    pub fn reset(&mut self) -> Result<()> {
        let count = self.pool()?.len();
        let pool = self.build_pool(count, 0.)?;
        info!(generation = pool.generation(), "simulation reset");
        self.pool = Some(pool);
        self.clock.reset();
        Ok(())
    }

    // ### INTERNALS ###

    /// Build the next pool generation, without installing it
    fn build_pool(&mut self, server_count: usize, started_at: Float) -> Result<ServerPool> {
        let pool = ServerPool::new(server_count, self.next_generation, started_at)?;
        self.next_generation += 1;
        Ok(pool)
    }

    /// Move the commands sent by control handles to the pending list
    fn receive_queued(&mut self) {
        self.pending.extend(self.commands.try_iter());
    }

    /// Arrival rate in effect once the pending commands are applied
    fn staged_arrival_rate(&self) -> Float {
        let current = self.params.map_or(MIN_ARRIVAL_RATE, |p| p.arrival_rate);
        self.pending.iter().fold(current, |rate, command| match command {
            ControlCommand::SetArrivalRate(requested) => {
                bounded(*requested, MIN_ARRIVAL_RATE, MAX_ARRIVAL_RATE).unwrap_or(rate)
            }
            _ => rate,
        })
    }

    /// Apply the pending commands, in the order they were sent
    fn apply_queued(&mut self) -> Result<()> {
        while let Some(command) = self.pending.pop_front() {
            match self.apply(command) {
                Ok(applied) => debug!(?applied, "queued command applied"),
                Err(err) if err.is_recoverable() => {
                    warn!(%err, ?command, "queued command ignored")
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

impl Default for SimulationEngine<StandardSource> {
    fn default() -> Self {
        Self::new(StandardSource::new())
    }
}

/// Sample the service time of a task that starts service
fn sample_service_time(
    source: &mut impl DistributionSource,
    params: &SimulationParameters,
) -> Float {
    let draw = source.service_time(params.mean_processing_time, params.processing_variance);
    assert!(
        draw.is_finite(),
        "Distribution source produced a non-finite service time"
    );
    draw.max(MIN_SERVICE_TIME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedSource;

    fn engine(servers: usize) -> SimulationEngine<ScriptedSource> {
        let mut engine = SimulationEngine::new(ScriptedSource::new());
        engine
            .init(SimulationParameters::new(2.0, 1.0, 0.0).unwrap())
            .unwrap();
        engine.create_pool(servers).unwrap();
        engine
    }

    #[test]
    fn stepping_requires_init_and_pool() {
        let mut engine = SimulationEngine::new(ScriptedSource::new());
        assert_eq!(engine.step(0.1), Err(SimError::EngineNotInitialized));
        engine.create_pool(2).unwrap();
        assert_eq!(engine.step(0.1), Err(SimError::EngineNotInitialized));
        engine.init(SimulationParameters::default()).unwrap();
        assert!(engine.step(0.1).is_ok());
    }

    #[test]
    fn invalid_intervals_are_rejected_without_side_effects() {
        let mut engine = engine(1);
        engine.source_mut().push_arrivals([3]);
        for delta in [-0.1, Float::NAN, Float::INFINITY] {
            assert!(matches!(
                engine.step(delta),
                Err(SimError::InvalidInterval { .. })
            ));
        }
        assert_eq!(engine.clock().elapsed(), 0.);
        assert!(engine.source().expected_log().is_empty());
    }

    #[test]
    fn expected_arrivals_follow_rate_and_interval() {
        let mut engine = engine(1);
        engine.step(0.5).unwrap();
        engine.update_arrival_rate(4.0).unwrap();
        engine.step(0.25).unwrap();
        assert_eq!(engine.source().expected_log(), &[1.0, 1.0]);
    }

    #[test]
    fn tiny_service_draws_are_clamped() {
        let mut engine = engine(1);
        engine.source_mut().push_arrivals([1]);
        engine.source_mut().push_service_times([-3.0]);
        engine.step(MIN_SERVICE_TIME / 2.).unwrap();
        let pool = engine.pool().unwrap();
        let task = pool.servers()[0].in_service().unwrap();
        assert!((task.remaining_service_time - MIN_SERVICE_TIME / 2.).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "non-finite service time")]
    fn non_finite_service_draws_are_bugs() {
        let mut engine = engine(1);
        engine.source_mut().push_arrivals([1]);
        engine.source_mut().push_service_times([Float::NAN]);
        let _ = engine.step(0.1);
    }

    #[test]
    fn init_restarts_clock_and_pool() {
        let mut engine = engine(2);
        engine.source_mut().push_arrivals([4]);
        engine.step(0.5).unwrap();
        let generation = engine.pool().unwrap().generation();

        engine.init(SimulationParameters::default()).unwrap();
        assert_eq!(engine.clock().elapsed(), 0.);
        let pool = engine.pool().unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.admitted(), 0);
        assert!(pool.generation() > generation);
    }

    #[test]
    fn applied_commands_report_their_effect() {
        let mut engine = engine(3);
        let applied = engine.apply(ControlCommand::SetArrivalRate(0.)).unwrap();
        assert_eq!(
            applied,
            Applied::ArrivalRate(Adjusted {
                requested: 0.,
                applied: MIN_ARRIVAL_RATE
            })
        );
        let applied = engine.apply(ControlCommand::Resize(5)).unwrap();
        assert!(matches!(applied, Applied::Resized(Adjusted { applied: 5, .. })));
        assert_eq!(engine.pool().unwrap().len(), 5);
        assert_eq!(engine.apply(ControlCommand::Reset).unwrap(), Applied::Reset);
        let params = engine.parameters().unwrap();
        engine
            .apply(ControlCommand::SetProcessingVariance(0.5))
            .unwrap();
        assert_eq!(engine.parameters().unwrap().processing_variance, 0.5);
        assert_eq!(
            engine.parameters().unwrap().mean_processing_time,
            params.mean_processing_time
        );
    }

    #[test]
    fn rejected_steps_leave_queued_commands_pending() {
        let mut engine = engine(2);
        let handle = engine.control_handle();
        assert!(handle.send(ControlCommand::SetProcessingTime(3.0)));
        assert!(handle.send(ControlCommand::Resize(4)));
        let generation = engine.pool().unwrap().generation();

        // Finite interval, but too many arrivals to expect from it
        assert!(matches!(
            engine.step(Float::MAX),
            Err(SimError::InvalidInterval { .. })
        ));
        assert_eq!(engine.parameters().unwrap().mean_processing_time, 1.0);
        assert_eq!(engine.pool().unwrap().len(), 2);
        assert_eq!(engine.pool().unwrap().generation(), generation);
        assert_eq!(engine.clock().elapsed(), 0.);
        assert!(engine.source().expected_log().is_empty());

        // The next valid step applies them, in order
        engine.step(0.1).unwrap();
        assert_eq!(engine.parameters().unwrap().mean_processing_time, 3.0);
        assert_eq!(engine.pool().unwrap().len(), 4);
    }

    #[test]
    fn intervals_are_checked_against_the_queued_arrival_rate() {
        let mut engine = engine(1);
        let handle = engine.control_handle();
        assert!(handle.update_arrival_rate(MAX_ARRIVAL_RATE));

        // Fine at the current rate, too long at the queued one
        let delta = 2. * MAX_EXPECTED_ARRIVALS / MAX_ARRIVAL_RATE;
        assert!(2.0 * delta <= MAX_EXPECTED_ARRIVALS);
        assert!(matches!(
            engine.step(delta),
            Err(SimError::InvalidInterval { .. })
        ));
        assert_eq!(engine.parameters().unwrap().arrival_rate, 2.0);

        engine.step(0.5).unwrap();
        assert_eq!(engine.parameters().unwrap().arrival_rate, MAX_ARRIVAL_RATE);
        assert_eq!(engine.source().expected_log(), &[0.5 * MAX_ARRIVAL_RATE]);
    }

    #[test]
    fn huge_parameters_are_lowered_before_sampling() {
        let mut engine = SimulationEngine::new(StandardSource::seeded(7));
        engine.init(SimulationParameters::default()).unwrap();
        engine.create_pool(2).unwrap();

        let variance = engine.update_processing_variance(1e30).unwrap();
        assert_eq!(variance.applied, MAX_PROCESSING_VARIANCE);
        assert!(variance.was_clamped());
        let rate = engine.update_arrival_rate(1e30).unwrap();
        assert_eq!(rate.applied, MAX_ARRIVAL_RATE);
        let time = engine.update_processing_time(1e30).unwrap();
        assert_eq!(time.applied, MAX_PROCESSING_TIME);

        let outcome = engine.step(0.1).unwrap();
        assert!(outcome.new_tasks_count > 0);
        let params = SimulationParameters::new(1e30, 1e30, 1e30).unwrap();
        assert_eq!(params.processing_variance, MAX_PROCESSING_VARIANCE);
    }

    #[test]
    fn queued_commands_with_bad_values_are_skipped() {
        let mut engine = engine(1);
        let handle = engine.control_handle();
        assert!(handle.update_arrival_rate(Float::NAN));
        assert!(handle.send(ControlCommand::SetProcessingTime(3.0)));
        engine.step(0.1).unwrap();
        let params = engine.parameters().unwrap();
        assert_eq!(params.arrival_rate, 2.0);
        assert_eq!(params.mean_processing_time, 3.0);
    }
}
