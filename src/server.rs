//! Servers, the tasks they hold, and how service advances on one server

use crate::{
    error::{Result, SimError},
    numeric::Float,
    stats::RunningStats,
};
use std::collections::VecDeque;

/// A unit of work waiting for or receiving service
///
/// Tasks carry no identity: they are owned by exactly one server, move by
/// value from its queue into service, and are dropped on completion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Task {
    /// Simulated time at which the task arrived
    pub arrival_time: Float,

    /// Service time left, only meaningful once service has started
    pub remaining_service_time: Float,
}
//
impl Task {
    /// Create a task that arrived at a given simulated time
    pub fn new(arrival_time: Float) -> Self {
        Self {
            arrival_time,
            remaining_service_time: 0.,
        }
    }
}

/// One server with its FIFO queue
#[derive(Clone, Debug)]
pub struct Server {
    /// Identifier, unique within a pool generation
    id: usize,

    /// Tasks waiting for service, oldest first
    queue: VecDeque<Task>,

    /// Task currently being served, if any
    in_service: Option<Task>,

    /// Number of completed tasks
    total_processed: u64,

    /// Number of tasks ever admitted
    admitted: u64,

    /// Waiting times (service start - arrival) of every task that started
    wait: RunningStats,
}
//
impl Server {
    // ### CONSTRUCTION ###

    /// Create an idle server with an empty queue
    pub fn new(id: usize) -> Self {
        Self {
            id,
            queue: VecDeque::new(),
            in_service: None,
            total_processed: 0,
            admitted: 0,
            wait: RunningStats::new(),
        }
    }

    // ### STATE QUERIES ###

    /// Identifier of this server
    pub fn id(&self) -> usize {
        self.id
    }

    /// Outstanding tasks, including the one being served
    pub fn queue_length(&self) -> usize {
        self.queue.len() + usize::from(self.in_service.is_some())
    }

    /// Tasks waiting behind the one being served
    pub fn waiting(&self) -> usize {
        self.queue.len()
    }

    /// Whether a task is being served
    pub fn is_busy(&self) -> bool {
        self.in_service.is_some()
    }

    /// Task being served, if any
    pub fn in_service(&self) -> Option<&Task> {
        self.in_service.as_ref()
    }

    /// Number of completed tasks
    pub fn total_processed(&self) -> u64 {
        self.total_processed
    }

    /// Number of tasks ever admitted to this server
    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    /// Waiting time statistics of the tasks that started service here
    pub fn wait_stats(&self) -> &RunningStats {
        &self.wait
    }

    // ### SERVICE ###

    /// Admit a task that arrived at `now`
    ///
    /// If the server is idle, the task enters service immediately, with a
    /// service time obtained from `sample_service_time`. Otherwise, it joins
    /// the back of the queue.
    pub fn admit(
        &mut self,
        task: Task,
        now: Float,
        sample_service_time: &mut impl FnMut() -> Float,
    ) -> Result<()> {
        if self.in_service.is_none() {
            // A server never idles while tasks are waiting
            debug_assert!(self.queue.is_empty(), "Idle server with a backlog");
            self.start_service(task, now, sample_service_time());
        } else {
            self.queue
                .try_reserve(1)
                .map_err(|_| SimError::ResourceExhaustion { what: "task queue" })?;
            self.queue.push_back(task);
        }
        self.admitted += 1;
        Ok(())
    }

    /// Let `delta_time` of simulated time elapse from `start`
    ///
    /// Completed tasks hand the rest of the interval over to the next queued
    /// task, whose service starts at the completion instant. Returns the
    /// number of completed tasks.
    pub fn advance(
        &mut self,
        start: Float,
        delta_time: Float,
        sample_service_time: &mut impl FnMut() -> Float,
    ) -> u64 {
        assert!(delta_time >= 0., "Time cannot flow backwards");
        let mut budget = delta_time;
        let mut completed = 0;
        while let Some(task) = self.in_service.as_mut() {
            // The task survives this interval
            if task.remaining_service_time > budget {
                task.remaining_service_time -= budget;
                break;
            }

            // The task completes within this interval
            budget -= task.remaining_service_time;
            self.in_service = None;
            self.total_processed += 1;
            completed += 1;

            // The next task in line starts service right away
            if let Some(next) = self.queue.pop_front() {
                let now = start + (delta_time - budget);
                self.start_service(next, now, sample_service_time());
            }
        }
        completed
    }

    /// Put a task into service at time `now`
    fn start_service(&mut self, mut task: Task, now: Float, service_time: Float) {
        assert!(
            service_time > 0.,
            "Service times must be strictly positive (got {service_time})"
        );
        let wait = now - task.arrival_time;
        assert!(wait >= 0., "Task started service {wait}s before arriving");
        self.wait.push(wait);
        task.remaining_service_time = service_time;
        self.in_service = Some(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(value: Float) -> impl FnMut() -> Float {
        move || value
    }

    #[test]
    fn idle_server_starts_service_on_admission() {
        let mut server = Server::new(0);
        server.admit(Task::new(0.), 0., &mut fixed(1.)).unwrap();
        assert!(server.is_busy());
        assert_eq!(server.waiting(), 0);
        assert_eq!(server.queue_length(), 1);
        assert_eq!(server.in_service().unwrap().remaining_service_time, 1.);
    }

    #[test]
    fn busy_server_queues_arrivals_in_order() {
        let mut server = Server::new(0);
        for t in [0., 0.1, 0.2] {
            server.admit(Task::new(t), t, &mut fixed(10.)).unwrap();
        }
        assert_eq!(server.queue_length(), 3);
        assert_eq!(server.waiting(), 2);
        assert_eq!(server.admitted(), 3);

        // The oldest waiting task is next in line
        server.advance(0.2, 10., &mut fixed(10.));
        assert_eq!(server.in_service().unwrap().arrival_time, 0.1);
    }

    #[test]
    fn completion_hands_leftover_time_to_the_next_task() {
        let mut server = Server::new(0);
        for _ in 0..5 {
            server.admit(Task::new(0.), 0., &mut fixed(0.25)).unwrap();
        }
        let completed = server.advance(0., 1., &mut fixed(0.25));
        assert_eq!(completed, 4);
        assert_eq!(server.total_processed(), 4);

        // The fifth task started at t=1.0 and has not been served yet
        assert_eq!(server.queue_length(), 1);
        assert_eq!(server.in_service().unwrap().remaining_service_time, 0.25);

        // Waits were 0, 0.25, 0.5, 0.75 and 1.0
        assert_eq!(server.wait_stats().count(), 5);
        assert!((server.wait_stats().mean() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn partial_progress_is_kept() {
        let mut server = Server::new(0);
        server.admit(Task::new(0.), 0., &mut fixed(1.)).unwrap();
        assert_eq!(server.advance(0., 0.4, &mut fixed(1.)), 0);
        let remaining = server.in_service().unwrap().remaining_service_time;
        assert!((remaining - 0.6).abs() < 1e-9);
        assert_eq!(server.advance(0.4, 0.7, &mut fixed(1.)), 1);
        assert!(!server.is_busy());
    }

    #[test]
    fn conservation_holds_on_one_server() {
        let mut server = Server::new(0);
        let mut t = 0.;
        for step in 0..40 {
            for _ in 0..(step % 3) {
                server.admit(Task::new(t), t, &mut fixed(0.3)).unwrap();
            }
            server.advance(t, 0.1, &mut fixed(0.3));
            t += 0.1;
            let outstanding = server.queue_length() as u64;
            assert_eq!(server.total_processed() + outstanding, server.admitted());
        }
    }

    #[test]
    #[should_panic(expected = "strictly positive")]
    fn zero_service_time_is_a_bug() {
        let mut server = Server::new(0);
        let _ = server.admit(Task::new(0.), 0., &mut fixed(0.));
    }
}
