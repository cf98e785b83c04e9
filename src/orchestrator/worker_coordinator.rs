//! Worker pool membership, task assignment and queueing, heartbeat-based
//! health detection, and elastic scaling.
//!
//! All pool state — the worker map, registration order, FIFO backlog, and
//! the task-assignment map — lives behind one `RwLock` so that
//! find-idle-then-assign and sweep-then-requeue sequences are atomic under
//! true parallelism. Worker selection scans in registration order, which
//! keeps assignment deterministic and reproducible.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::task::{ActiveAssignment, QueuedTask};
use crate::models::worker::{Worker, WorkerStatus};
use crate::{AppError, Result};

/// Tunables for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Enforced ceiling on pool size; registration past it fails.
    pub max_workers: usize,
    /// Heartbeat staleness threshold for the health sweep.
    pub heartbeat_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            heartbeat_timeout: Duration::from_secs(30),
        }
    }
}

/// Aggregate pool utilization and queue depth for the reporting interface.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LoadDistribution {
    /// Workers currently registered, regardless of status.
    pub total_workers: usize,
    /// Workers available for assignment.
    pub idle: usize,
    /// Workers holding a task.
    pub busy: usize,
    /// Workers demoted by the health sweep.
    pub offline: usize,
    /// Tasks waiting in the FIFO backlog.
    pub queued_tasks: usize,
    /// Sum of per-worker completed-task counters.
    pub total_completed: u64,
    /// Sum of per-worker failed-task counters.
    pub total_failed: u64,
    /// `busy / total * 100`; zero for an empty pool.
    pub utilization_percent: f64,
}

/// Cumulative throughput counters not carried by [`LoadDistribution`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CoordinatorStats {
    /// Tasks completed successfully across all workers.
    pub tasks_completed: u64,
    /// Tasks reported failed across all workers.
    pub tasks_failed: u64,
    /// `completed / (completed + failed) * 100`; 100 when nothing ran yet.
    pub success_rate_percent: f64,
    /// Tasks waiting in the FIFO backlog.
    pub queued_tasks: usize,
    /// In-flight assignments currently held by workers.
    pub active_assignments: usize,
}

struct CoordinatorState {
    workers: HashMap<String, Worker>,
    /// Worker ids in registration order; drives deterministic idle scans.
    order: Vec<String>,
    queue: VecDeque<QueuedTask>,
    assignments: HashMap<String, ActiveAssignment>,
}

/// Owns the worker pool and task queue.
///
/// Process-lifetime state only; nothing here is persisted.
pub struct WorkerCoordinator {
    state: RwLock<CoordinatorState>,
    config: CoordinatorConfig,
}

impl WorkerCoordinator {
    /// Create an empty coordinator with the given tunables.
    #[must_use]
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            state: RwLock::new(CoordinatorState {
                workers: HashMap::new(),
                order: Vec::new(),
                queue: VecDeque::new(),
                assignments: HashMap::new(),
            }),
            config,
        }
    }

    /// Register a new idle worker.
    ///
    /// # Errors
    ///
    /// Returns `AppError::PoolExhausted` when the pool is already at
    /// `max_workers`.
    pub async fn register_worker(
        &self,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Worker> {
        let mut state = self.state.write().await;
        if state.workers.len() >= self.config.max_workers {
            return Err(AppError::PoolExhausted(format!(
                "worker pool is at its ceiling of {}",
                self.config.max_workers
            )));
        }

        let worker = Worker::new(metadata);
        let registered = worker.clone();
        state.order.push(worker.id.clone());
        state.workers.insert(worker.id.clone(), worker);

        info!(worker_id = %registered.id, pool = state.workers.len(), "worker registered");
        Ok(registered)
    }

    /// Remove a worker from the pool.
    ///
    /// An in-flight task is returned to the tail of the queue with its
    /// retained payload and session id before the worker is dropped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown worker id.
    pub async fn unregister_worker(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(worker) = state.workers.get(id) else {
            return Err(AppError::NotFound(format!("worker {id} not found")));
        };

        if let Some(task_id) = worker.current_task_id.clone() {
            requeue_task(&mut state, &task_id);
            info!(worker_id = %id, task_id = %task_id, "in-flight task requeued");
        }

        state.workers.remove(id);
        state.order.retain(|w| w != id);
        info!(worker_id = %id, pool = state.workers.len(), "worker unregistered");
        Ok(())
    }

    /// Assign a task to the first idle worker in registration order.
    ///
    /// Returns the chosen worker's id, or `None` after appending the task
    /// to the queue when no worker is idle. There is no blocking or
    /// callback mechanism — callers poll for a free worker.
    pub async fn assign_task(
        &self,
        task_id: &str,
        payload: serde_json::Value,
        session_id: Option<&str>,
    ) -> Option<String> {
        let mut state = self.state.write().await;

        let chosen = state
            .order
            .iter()
            .find(|wid| {
                state
                    .workers
                    .get(*wid)
                    .is_some_and(|w| w.status == WorkerStatus::Idle)
            })
            .cloned();

        let Some(worker_id) = chosen else {
            state.queue.push_back(QueuedTask::new(
                task_id.to_owned(),
                payload,
                session_id.map(str::to_owned),
            ));
            info!(task_id = %task_id, depth = state.queue.len(), "no idle worker; task queued");
            return None;
        };

        occupy(
            &mut state,
            &worker_id,
            task_id,
            payload,
            session_id.map(str::to_owned),
        );
        info!(task_id = %task_id, worker_id = %worker_id, "task assigned");
        Some(worker_id)
    }

    /// Report completion of a task and free its worker.
    ///
    /// Unknown worker ids are benign no-ops — the worker may already have
    /// been unregistered while its completion report was in flight. After
    /// freeing the worker, the head of the queue (if any) is popped onto
    /// it directly rather than rescanning the pool.
    pub async fn complete_task(&self, worker_id: &str, task_id: &str, success: bool) {
        let mut state = self.state.write().await;
        let Some(worker) = state.workers.get_mut(worker_id) else {
            debug!(worker_id = %worker_id, task_id = %task_id, "completion for unknown worker ignored");
            return;
        };

        if success {
            worker.tasks_completed += 1;
        } else {
            worker.tasks_failed += 1;
        }
        worker.release(WorkerStatus::Idle);
        state.assignments.remove(task_id);
        info!(worker_id = %worker_id, task_id = %task_id, success, "task completed");

        // Greedy local reassignment: hand the queue head to the worker
        // that just went idle.
        if let Some(next) = state.queue.pop_front() {
            let QueuedTask {
                task_id: next_id,
                payload,
                session_id,
                ..
            } = next;
            occupy(&mut state, worker_id, &next_id, payload, session_id);
            info!(
                worker_id = %worker_id,
                task_id = %next_id,
                depth = state.queue.len(),
                "queued task assigned"
            );
        }
    }

    /// Record a liveness signal from a worker.
    ///
    /// Unknown worker ids are benign no-ops. An `Offline` worker flips
    /// straight back to `Idle`; its previous task was already requeued by
    /// the health sweep.
    pub async fn heartbeat(&self, worker_id: &str) {
        let mut state = self.state.write().await;
        let Some(worker) = state.workers.get_mut(worker_id) else {
            debug!(worker_id = %worker_id, "heartbeat for unknown worker ignored");
            return;
        };

        worker.last_heartbeat = Some(Utc::now());
        if worker.status == WorkerStatus::Offline {
            worker.status = WorkerStatus::Idle;
            info!(worker_id = %worker_id, "offline worker revived by heartbeat");
        }
    }

    /// Sweep the pool for workers whose heartbeat is stale.
    ///
    /// Each stale worker not already `Offline` is demoted, its in-flight
    /// task (if any) is returned to the queue, and its task fields are
    /// cleared. Returns the demoted worker ids. The sweep has no
    /// scheduling of its own — a periodic driver invokes it.
    pub async fn check_worker_health(&self) -> Vec<String> {
        let timeout =
            chrono::Duration::from_std(self.config.heartbeat_timeout).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut demoted = Vec::new();

        let mut state = self.state.write().await;
        let order = state.order.clone();
        for worker_id in order {
            let Some(worker) = state.workers.get(&worker_id) else {
                continue;
            };
            if worker.status == WorkerStatus::Offline {
                continue;
            }
            let stale = worker.last_heartbeat.is_none_or(|at| now - at > timeout);
            if !stale {
                continue;
            }

            let held_task = worker.current_task_id.clone();
            if let Some(task_id) = held_task {
                requeue_task(&mut state, &task_id);
                warn!(worker_id = %worker_id, task_id = %task_id, "stale worker's task requeued");
            }
            if let Some(worker) = state.workers.get_mut(&worker_id) {
                worker.release(WorkerStatus::Offline);
            }
            warn!(worker_id = %worker_id, "worker marked offline: heartbeat stale");
            demoted.push(worker_id);
        }

        demoted
    }

    /// Grow or shrink the pool toward `target`.
    ///
    /// Growth is clamped to `max_workers`. Shrinking removes `Idle`
    /// workers only, so the pool never drops below its busy count and may
    /// settle above `target`. Returns the resulting pool size.
    pub async fn scale_workers(&self, target: usize) -> usize {
        let mut state = self.state.write().await;
        let current = state.workers.len();

        if target > current {
            let ceiling = target.min(self.config.max_workers);
            for _ in current..ceiling {
                let worker = Worker::new(serde_json::Map::new());
                state.order.push(worker.id.clone());
                state.workers.insert(worker.id.clone(), worker);
            }
            info!(target, pool = state.workers.len(), "pool scaled up");
        } else if target < current {
            let idle_ids: Vec<String> = state
                .order
                .iter()
                .filter(|wid| {
                    state
                        .workers
                        .get(*wid)
                        .is_some_and(|w| w.status == WorkerStatus::Idle)
                })
                .cloned()
                .collect();
            for worker_id in idle_ids {
                if state.workers.len() <= target {
                    break;
                }
                state.workers.remove(&worker_id);
                state.order.retain(|w| w != &worker_id);
            }
            info!(target, pool = state.workers.len(), "pool scaled down");
        }

        state.workers.len()
    }

    /// Fetch a worker by id.
    pub async fn get_worker(&self, id: &str) -> Option<Worker> {
        self.state.read().await.workers.get(id).cloned()
    }

    /// List workers in registration order, optionally filtered by status.
    pub async fn list_workers(&self, status: Option<WorkerStatus>) -> Vec<Worker> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|wid| state.workers.get(wid))
            .filter(|w| status.is_none_or(|wanted| w.status == wanted))
            .cloned()
            .collect()
    }

    /// Worker currently holding the given task, if any.
    pub async fn get_assigned_worker(&self, task_id: &str) -> Option<String> {
        self.state
            .read()
            .await
            .assignments
            .get(task_id)
            .map(|a| a.worker_id.clone())
    }

    /// Number of tasks waiting in the backlog.
    pub async fn queue_depth(&self) -> usize {
        self.state.read().await.queue.len()
    }

    /// Aggregate pool utilization and queue depth.
    #[allow(clippy::cast_precision_loss)] // Pool sizes are far below 2^52.
    pub async fn get_load_distribution(&self) -> LoadDistribution {
        let state = self.state.read().await;
        let mut dist = LoadDistribution {
            total_workers: state.workers.len(),
            idle: 0,
            busy: 0,
            offline: 0,
            queued_tasks: state.queue.len(),
            total_completed: 0,
            total_failed: 0,
            utilization_percent: 0.0,
        };
        for worker in state.workers.values() {
            match worker.status {
                WorkerStatus::Idle => dist.idle += 1,
                WorkerStatus::Busy => dist.busy += 1,
                WorkerStatus::Offline => dist.offline += 1,
                WorkerStatus::Error => {}
            }
            dist.total_completed += worker.tasks_completed;
            dist.total_failed += worker.tasks_failed;
        }
        if dist.total_workers > 0 {
            dist.utilization_percent = dist.busy as f64 / dist.total_workers as f64 * 100.0;
        }
        dist
    }

    /// Cumulative throughput counters.
    #[allow(clippy::cast_precision_loss)] // Counter magnitudes are far below 2^52.
    pub async fn get_statistics(&self) -> CoordinatorStats {
        let state = self.state.read().await;
        let completed: u64 = state.workers.values().map(|w| w.tasks_completed).sum();
        let failed: u64 = state.workers.values().map(|w| w.tasks_failed).sum();
        let ran = completed + failed;
        CoordinatorStats {
            tasks_completed: completed,
            tasks_failed: failed,
            success_rate_percent: if ran == 0 {
                100.0
            } else {
                completed as f64 / ran as f64 * 100.0
            },
            queued_tasks: state.queue.len(),
            active_assignments: state.assignments.len(),
        }
    }
}

/// Mark a worker busy with the given task and record the assignment.
fn occupy(
    state: &mut CoordinatorState,
    worker_id: &str,
    task_id: &str,
    payload: serde_json::Value,
    session_id: Option<String>,
) {
    state.assignments.insert(
        task_id.to_owned(),
        ActiveAssignment {
            worker_id: worker_id.to_owned(),
            payload,
            session_id: session_id.clone(),
        },
    );
    if let Some(worker) = state.workers.get_mut(worker_id) {
        worker.status = WorkerStatus::Busy;
        worker.current_task_id = Some(task_id.to_owned());
        worker.current_session_id = session_id;
    }
}

/// Move an in-flight task from the assignment map back to the queue tail.
///
/// The retained assignment record supplies the original payload and
/// session id, so nothing is lost on requeue.
fn requeue_task(state: &mut CoordinatorState, task_id: &str) {
    let (payload, session_id) = state
        .assignments
        .remove(task_id)
        .map_or((serde_json::Value::Null, None), |a| {
            (a.payload, a.session_id)
        });
    state
        .queue
        .push_back(QueuedTask::new(task_id.to_owned(), payload, session_id));
}
