//! Sticky routing with pluggable balancing strategies.

use crate::error::RouterError;
use dashmap::DashMap;
use pulse_common::config::BalancingStrategy;
use pulse_core::WorkerId;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Routes logical connections to worker processes.
///
/// A connection's first request picks a worker by the configured strategy;
/// every later request with the same affinity key lands on that worker
/// until the connection closes or the worker dies.
pub struct StickyRouter {
    strategy: BalancingStrategy,
    /// Live workers in registration order, consulted by round-robin
    workers: RwLock<Vec<WorkerId>>,
    /// Routed connection count per live worker
    counts: DashMap<WorkerId, usize>,
    /// Affinity key -> pinned worker
    affinity: DashMap<String, WorkerId>,
    /// Round-robin cursor
    cursor: AtomicUsize,
}

impl StickyRouter {
    pub fn new(strategy: BalancingStrategy, workers: impl IntoIterator<Item = WorkerId>) -> Self {
        let workers: Vec<WorkerId> = workers.into_iter().collect();
        let counts = DashMap::new();
        for worker in &workers {
            counts.insert(*worker, 0);
        }

        Self {
            strategy,
            workers: RwLock::new(workers),
            counts,
            affinity: DashMap::new(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Route a connection to a worker.
    ///
    /// Deterministic for the lifetime of one logical connection: repeated
    /// calls with the same key return the pinned worker until
    /// [`connection_closed`](Self::connection_closed) or worker death.
    pub fn route(&self, key: &str) -> Result<WorkerId, RouterError> {
        if let Some(pinned) = self.affinity.get(key) {
            return Ok(*pinned);
        }

        let worker = self.pick()?;

        // Another request for the same key may have raced us; the first
        // pin wins and the count follows it.
        match self.affinity.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => Ok(*existing.get()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(worker);
                self.counts.entry(worker).and_modify(|c| *c += 1);
                tracing::debug!(key = %key, worker = %worker, "Routed connection");
                Ok(worker)
            }
        }
    }

    /// Release a connection's affinity when it terminates
    pub fn connection_closed(&self, key: &str) {
        if let Some((_, worker)) = self.affinity.remove(key) {
            self.counts
                .entry(worker)
                .and_modify(|c| *c = c.saturating_sub(1));
            tracing::debug!(key = %key, worker = %worker, "Released connection affinity");
        }
    }

    /// Register a worker (initial pool, or a replacement after a death)
    pub fn add_worker(&self, worker: WorkerId) {
        let mut workers = match self.workers.write() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !workers.contains(&worker) {
            workers.push(worker);
            self.counts.insert(worker, 0);
            tracing::info!(worker = %worker, "Worker joined routing pool");
        }
    }

    /// Remove a dead worker from the pool.
    ///
    /// Returns the affinity keys that were pinned to it; those connections
    /// are lost and must go through regular disconnect detection.
    pub fn worker_died(&self, worker: WorkerId) -> Vec<String> {
        {
            let mut workers = match self.workers.write() {
                Ok(w) => w,
                Err(poisoned) => poisoned.into_inner(),
            };
            workers.retain(|w| *w != worker);
        }
        self.counts.remove(&worker);

        let lost: Vec<String> = self
            .affinity
            .iter()
            .filter(|entry| *entry.value() == worker)
            .map(|entry| entry.key().clone())
            .collect();
        for key in &lost {
            self.affinity.remove(key);
        }

        tracing::warn!(worker = %worker, lost = lost.len(), "Worker removed from routing pool");
        lost
    }

    /// Currently live workers
    pub fn live_workers(&self) -> Vec<WorkerId> {
        match self.workers.read() {
            Ok(w) => w.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Routed connection count for a worker
    #[must_use]
    pub fn connection_count(&self, worker: WorkerId) -> usize {
        self.counts.get(&worker).map_or(0, |c| *c)
    }

    fn pick(&self) -> Result<WorkerId, RouterError> {
        let workers = match self.workers.read() {
            Ok(w) => w.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if workers.is_empty() {
            return Err(RouterError::NoWorkers);
        }

        let worker = match self.strategy {
            BalancingStrategy::Random => {
                let idx = rand::thread_rng().gen_range(0..workers.len());
                workers[idx]
            }
            BalancingStrategy::RoundRobin => {
                let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % workers.len();
                workers[idx]
            }
            BalancingStrategy::LeastConnection => workers
                .iter()
                .copied()
                .min_by_key(|w| self.connection_count(*w))
                .ok_or(RouterError::NoWorkers)?,
        };

        Ok(worker)
    }
}
