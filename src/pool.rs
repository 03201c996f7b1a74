//! The fixed-size collection of servers of one pool generation

use crate::{
    error::{Result, SimError},
    numeric::Float,
    server::{Server, Task},
    stats::RunningStats,
};

/// Servers of one pool generation
///
/// Membership never changes once the pool is built: resizing means building
/// a new pool, so server ids always run from 0 to `len() - 1`.
#[derive(Clone, Debug)]
pub struct ServerPool {
    /// Servers, ordered by id
    servers: Vec<Server>,

    /// Counter distinguishing successive pools of an engine
    generation: u64,

    /// Simulated time at which this generation started
    started_at: Float,
}
//
impl ServerPool {
    /// Build a pool of idle servers with ids `0..server_count`
    pub fn new(server_count: usize, generation: u64, started_at: Float) -> Result<Self> {
        let mut servers = Vec::new();
        servers
            .try_reserve_exact(server_count)
            .map_err(|_| SimError::ResourceExhaustion { what: "server pool" })?;
        servers.extend((0..server_count).map(Server::new));
        Ok(Self {
            servers,
            generation,
            started_at,
        })
    }

    /// Servers of the pool, ordered by id
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// Number of servers
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Truth that the pool has no server
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Generation counter of this pool
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Simulated time at which this generation started
    pub fn started_at(&self) -> Float {
        self.started_at
    }

    /// Tasks admitted since this generation started
    pub fn admitted(&self) -> u64 {
        self.servers.iter().map(Server::admitted).sum()
    }

    /// Pick the server that should receive the next arrival
    ///
    /// Join-shortest-queue on outstanding tasks (the one in service
    /// included), ties going to the lowest id. Returns None for an empty
    /// pool.
    pub fn route(&self) -> Option<usize> {
        self.servers
            .iter()
            .min_by_key(|server| (server.queue_length(), server.id()))
            .map(Server::id)
    }

    /// Route a task that arrived at `now` and admit it to its server
    ///
    /// Returns the id of the chosen server, or None if the pool is empty.
    pub fn dispatch(
        &mut self,
        task: Task,
        now: Float,
        sample_service_time: &mut impl FnMut() -> Float,
    ) -> Result<Option<usize>> {
        let Some(id) = self.route() else {
            return Ok(None);
        };
        self.servers[id].admit(task, now, &mut *sample_service_time)?;
        Ok(Some(id))
    }

    /// Advance service on every server, returning the number of completions
    pub fn advance(
        &mut self,
        start: Float,
        delta_time: Float,
        sample_service_time: &mut impl FnMut() -> Float,
    ) -> u64 {
        let mut completed = 0;
        for server in &mut self.servers {
            completed += server.advance(start, delta_time, &mut *sample_service_time);
        }
        completed
    }

    /// Copy out the state of every server, for rendering
    pub fn statuses(&self) -> Vec<ServerStatus> {
        self.servers.iter().map(ServerStatus::from).collect()
    }
}

/// Read-only copy of the state of one server
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServerStatus {
    /// Server identifier
    pub id: usize,

    /// Outstanding tasks, including the one being served
    pub queue_length: usize,

    /// Tasks waiting behind the one being served
    pub waiting: usize,

    /// Whether a task is being served
    pub is_busy: bool,

    /// Completed tasks
    pub total_processed: u64,

    /// Waiting times of the tasks that started service on this server
    pub wait: RunningStats,
}

impl From<&Server> for ServerStatus {
    fn from(server: &Server) -> Self {
        Self {
            id: server.id(),
            queue_length: server.queue_length(),
            waiting: server.waiting(),
            is_busy: server.is_busy(),
            total_processed: server.total_processed(),
            wait: *server.wait_stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(value: Float) -> impl FnMut() -> Float {
        move || value
    }

    fn routed_ids(pool: &mut ServerPool, arrivals: usize) -> Vec<usize> {
        (0..arrivals)
            .map(|_| {
                pool.dispatch(Task::new(0.), 0., &mut fixed(5.))
                    .unwrap()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn ids_follow_creation_order() {
        let pool = ServerPool::new(4, 7, 1.5).unwrap();
        let ids: Vec<usize> = pool.servers().iter().map(Server::id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(pool.generation(), 7);
        assert_eq!(pool.started_at(), 1.5);
    }

    #[test]
    fn shortest_queue_wins_and_ties_go_to_lowest_id() {
        let mut pool = ServerPool::new(3, 0, 0.).unwrap();
        assert_eq!(routed_ids(&mut pool, 7), vec![0, 1, 2, 0, 1, 2, 0]);
        let lengths: Vec<usize> = pool.servers().iter().map(Server::queue_length).collect();
        assert_eq!(lengths, vec![3, 2, 2]);
    }

    #[test]
    fn routing_is_deterministic() {
        let mut first = ServerPool::new(5, 0, 0.).unwrap();
        let mut second = first.clone();
        assert_eq!(routed_ids(&mut first, 23), routed_ids(&mut second, 23));
    }

    #[test]
    fn empty_pool_routes_nowhere() {
        let mut pool = ServerPool::new(0, 0, 0.).unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.route(), None);
        let routed = pool.dispatch(Task::new(0.), 0., &mut fixed(1.)).unwrap();
        assert_eq!(routed, None);
        assert_eq!(pool.admitted(), 0);
    }

    #[test]
    fn statuses_mirror_servers() {
        let mut pool = ServerPool::new(2, 0, 0.).unwrap();
        routed_ids(&mut pool, 3);
        let statuses = pool.statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].queue_length, 2);
        assert_eq!(statuses[0].waiting, 1);
        assert!(statuses[1].is_busy);
        assert_eq!(statuses[1].wait.count(), 1);
    }
}
