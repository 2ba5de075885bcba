//! Worker pool supervisor
//!
//! Workers pull from a shared bounded FIFO queue, so any idle worker may
//! pick up the oldest task. Each worker slot lives in a slab arena; a slot
//! whose task times out or whose backend invocation fails abnormally is
//! retired and a fresh slot takes its place, bounded only by the configured
//! worker count. Shutdown is terminal: queued tasks are drained and failed,
//! in-flight tasks are cut off, and later submits are rejected.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use contracts::{ContractError, RenderBackend, RenderRequest};
use metrics::{counter, gauge, histogram};
use slab::Slab;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RenderPoolConfig;
use crate::task::{RenderHandle, RenderTask};

/// Lifecycle of one worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned, not yet polling the queue
    Starting,
    /// Waiting on the queue
    Idle,
    /// Bound to a task
    Busy { task_id: u64 },
}

struct WorkerSlot {
    state: WorkerState,
    handle: Option<JoinHandle<()>>,
}

struct PoolInner<B> {
    backend: Arc<B>,
    config: RenderPoolConfig,
    queue_tx: async_channel::Sender<RenderTask>,
    queue_rx: async_channel::Receiver<RenderTask>,
    workers: Mutex<Slab<WorkerSlot>>,
    shutdown: AtomicBool,
    next_task_id: AtomicU64,
}

/// Supervised pool of rendering workers.
///
/// Cheap to clone; all clones share the same queue and worker set.
pub struct RenderPool<B> {
    inner: Arc<PoolInner<B>>,
}

impl<B> Clone for RenderPool<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> std::fmt::Debug for RenderPool<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPool")
            .field("workers", &self.inner.workers.lock().unwrap().len())
            .field("queued", &self.inner.queue_tx.len())
            .field("shutdown", &self.inner.shutdown.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<B: RenderBackend + Sync + 'static> RenderPool<B> {
    /// Probe the backend once, then bring up the configured worker count.
    ///
    /// # Errors
    /// Returns the probe failure without spawning anything; a pool whose
    /// backend cannot run at all never accepts tasks.
    pub async fn start(backend: B, config: RenderPoolConfig) -> Result<Self, ContractError> {
        backend.probe().await?;

        let workers = if config.workers == 0 {
            RenderPoolConfig::default_worker_count()
        } else {
            config.workers
        };

        let (queue_tx, queue_rx) = async_channel::bounded(config.queue_capacity.max(1));
        let inner = Arc::new(PoolInner {
            backend: Arc::new(backend),
            config: RenderPoolConfig { workers, ..config },
            queue_tx,
            queue_rx,
            workers: Mutex::new(Slab::with_capacity(workers)),
            shutdown: AtomicBool::new(false),
            next_task_id: AtomicU64::new(1),
        });

        let pool = Self { inner };
        for _ in 0..workers {
            pool.spawn_worker();
        }

        info!(workers, "render pool started");
        Ok(pool)
    }

    fn spawn_worker(&self) {
        let key = {
            let mut slots = self.inner.workers.lock().unwrap();
            slots.insert(WorkerSlot {
                state: WorkerState::Starting,
                handle: None,
            })
        };

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(worker_loop(inner, key));

        let mut slots = self.inner.workers.lock().unwrap();
        if let Some(slot) = slots.get_mut(key) {
            slot.handle = Some(handle);
        } else {
            // shutdown cleared the slab between insert and spawn
            handle.abort();
        }
    }

    /// Queue a rendering job, backpressuring when the queue is full.
    ///
    /// # Errors
    /// `PoolShutdown` once `shutdown` has run.
    pub async fn submit(&self, request: RenderRequest) -> Result<RenderHandle, ContractError> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(ContractError::PoolShutdown);
        }

        let id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        let (task, handle) = RenderTask::new(id, request);

        self.inner
            .queue_tx
            .send(task)
            .await
            .map_err(|_| ContractError::PoolShutdown)?;

        gauge!("mailflow_render_queue_depth").set(self.inner.queue_tx.len() as f64);
        Ok(handle)
    }

    /// Tear the pool down. Idempotent and terminal.
    ///
    /// Queued tasks fail with `PoolShutdown`; in-flight tasks are cut off
    /// and their handles resolve the same way.
    pub fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("render pool shutting down");
        self.inner.queue_tx.close();

        let mut drained = 0usize;
        while let Ok(task) = self.inner.queue_rx.try_recv() {
            task.complete(Err(ContractError::PoolShutdown));
            drained += 1;
        }
        if drained > 0 {
            warn!(drained, "failed queued render tasks on shutdown");
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut slots = self.inner.workers.lock().unwrap();
            slots.drain().filter_map(|slot| slot.handle).collect()
        };
        for handle in &handles {
            handle.abort();
        }

        gauge!("mailflow_render_workers_idle").set(0.0);
        gauge!("mailflow_render_queue_depth").set(0.0);
    }

    /// Number of workers currently waiting on the queue.
    pub fn idle_workers(&self) -> usize {
        let slots = self.inner.workers.lock().unwrap();
        slots
            .iter()
            .filter(|(_, slot)| slot.state == WorkerState::Idle)
            .count()
    }

    /// Snapshot of every live worker slot.
    pub fn worker_states(&self) -> Vec<WorkerState> {
        let slots = self.inner.workers.lock().unwrap();
        slots.iter().map(|(_, slot)| slot.state).collect()
    }

    /// Tasks waiting in the queue.
    pub fn queued_tasks(&self) -> usize {
        self.inner.queue_tx.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }
}

impl<B> Drop for PoolInner<B> {
    fn drop(&mut self) {
        self.queue_tx.close();
        if let Ok(mut slots) = self.workers.lock() {
            for slot in slots.drain() {
                if let Some(handle) = slot.handle {
                    handle.abort();
                }
            }
        }
    }
}

fn set_state<B>(inner: &PoolInner<B>, key: usize, state: WorkerState) {
    let mut slots = inner.workers.lock().unwrap();
    if let Some(slot) = slots.get_mut(key) {
        slot.state = state;
    }
    let idle = slots
        .iter()
        .filter(|(_, slot)| slot.state == WorkerState::Idle)
        .count();
    gauge!("mailflow_render_workers_idle").set(idle as f64);
}

/// Retire a slot after an abnormal task outcome and bring up a replacement,
/// unless shutdown already started.
fn replace_worker<B: RenderBackend + Sync + 'static>(inner: &Arc<PoolInner<B>>, key: usize) {
    {
        let mut slots = inner.workers.lock().unwrap();
        if slots.contains(key) {
            slots.remove(key);
        }
    }
    counter!("mailflow_render_workers_replaced_total").increment(1);

    if !inner.shutdown.load(Ordering::Acquire) {
        let pool = RenderPool {
            inner: Arc::clone(inner),
        };
        pool.spawn_worker();
    }
}

async fn worker_loop<B: RenderBackend + Sync + 'static>(inner: Arc<PoolInner<B>>, key: usize) {
    loop {
        set_state(&inner, key, WorkerState::Idle);

        let task = match inner.queue_rx.recv().await {
            Ok(task) => task,
            // queue closed: terminal shutdown
            Err(_) => return,
        };

        if inner.shutdown.load(Ordering::Acquire) {
            task.complete(Err(ContractError::PoolShutdown));
            return;
        }

        let task_id = task.id;
        set_state(&inner, key, WorkerState::Busy { task_id });
        debug!(task_id, worker = key, "render task picked up");

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            inner.config.task_timeout,
            inner.backend.render(&task.request),
        )
        .await;

        let elapsed = started.elapsed();
        histogram!("mailflow_render_duration_ms").record(elapsed.as_secs_f64() * 1000.0);

        match outcome {
            Ok(Ok(bytes)) => {
                counter!("mailflow_render_tasks_total", "outcome" => "success").increment(1);
                task.complete(Ok(bytes));
            }
            Ok(Err(err)) => {
                warn!(task_id, worker = key, error = %err, "render task failed, replacing worker");
                counter!("mailflow_render_tasks_total", "outcome" => "crashed").increment(1);
                task.complete(Err(ContractError::WorkerCrashed {
                    task_id,
                    message: err.to_string(),
                }));
                replace_worker(&inner, key);
                return;
            }
            Err(_elapsed) => {
                let timeout_ms = inner.config.task_timeout.as_millis() as u64;
                warn!(task_id, worker = key, timeout_ms, "render task timed out, replacing worker");
                counter!("mailflow_render_tasks_total", "outcome" => "timeout").increment(1);
                task.complete(Err(ContractError::RenderTimeout { task_id, timeout_ms }));
                replace_worker(&inner, key);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use contracts::RenderFormat;
    use std::time::Duration;

    fn request(html: &str) -> RenderRequest {
        RenderRequest {
            html: html.to_string(),
            format: RenderFormat::Pdf,
        }
    }

    fn config(workers: usize, timeout: Duration) -> RenderPoolConfig {
        RenderPoolConfig {
            workers,
            task_timeout: timeout,
            queue_capacity: 64,
        }
    }

    #[tokio::test]
    async fn test_renders_through_pool() {
        let pool = RenderPool::start(MockBackend::new(), config(2, Duration::from_secs(5)))
            .await
            .unwrap();

        let handle = pool.submit(request("<p>a</p>")).await.unwrap();
        let bytes = handle.await_result().await.unwrap();
        assert!(!bytes.is_empty());

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_probe_failure_aborts_startup() {
        let backend = MockBackend::new().with_failing_probe("binary not found");
        let err = RenderPool::start(backend, config(2, Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::RenderBackend { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_task_and_recovers_worker() {
        let backend = MockBackend::new().with_hang_on("<hang>");
        let observed = backend.observer();
        let pool = RenderPool::start(backend, config(1, Duration::from_millis(200)))
            .await
            .unwrap();

        let stuck = pool.submit(request("<hang>")).await.unwrap();
        let err = stuck.await_result().await.unwrap_err();
        assert!(matches!(
            err,
            ContractError::RenderTimeout { timeout_ms: 200, .. }
        ));

        // the replacement slot keeps draining the queue
        let next = pool.submit(request("<p>ok</p>")).await.unwrap();
        next.await_result().await.unwrap();
        assert_eq!(observed.rendered(), vec!["<p>ok</p>".to_string()]);

        // the idle count recovers to the configured worker count
        while pool.idle_workers() < 1 {
            tokio::task::yield_now().await;
        }
        assert_eq!(pool.idle_workers(), 1);

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_crash_replaces_worker() {
        let backend = MockBackend::new().with_crash_on("<boom>");
        let pool = RenderPool::start(backend, config(1, Duration::from_secs(5)))
            .await
            .unwrap();

        let crashed = pool.submit(request("<boom>")).await.unwrap();
        let err = crashed.await_result().await.unwrap_err();
        assert!(matches!(err, ContractError::WorkerCrashed { .. }));

        let next = pool.submit(request("<p>fine</p>")).await.unwrap();
        next.await_result().await.unwrap();

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_fifo_order_single_worker() {
        let backend = MockBackend::new().with_delay(Duration::from_millis(10));
        let observed = backend.observer();
        let pool = RenderPool::start(backend, config(1, Duration::from_secs(5)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            handles.push(pool.submit(request(&format!("<p>{i}</p>"))).await.unwrap());
        }
        for handle in handles {
            handle.await_result().await.unwrap();
        }

        let order = observed.rendered();
        assert_eq!(
            order,
            vec!["<p>0</p>", "<p>1</p>", "<p>2</p>", "<p>3</p>"]
        );

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_fails_queued_and_rejects_new() {
        let backend = MockBackend::new().with_delay(Duration::from_secs(60));
        let pool = RenderPool::start(backend, config(1, Duration::from_secs(120)))
            .await
            .unwrap();

        let in_flight = pool.submit(request("<p>busy</p>")).await.unwrap();
        // give the single worker time to bind to the first task
        tokio::time::sleep(Duration::from_millis(50)).await;
        let queued = pool.submit(request("<p>queued</p>")).await.unwrap();

        pool.shutdown();

        assert!(matches!(
            queued.await_result().await.unwrap_err(),
            ContractError::PoolShutdown
        ));
        assert!(matches!(
            in_flight.await_result().await.unwrap_err(),
            ContractError::PoolShutdown
        ));
        assert!(matches!(
            pool.submit(request("<p>late</p>")).await.unwrap_err(),
            ContractError::PoolShutdown
        ));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let pool = RenderPool::start(MockBackend::new(), config(2, Duration::from_secs(5)))
            .await
            .unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert_eq!(pool.worker_states().len(), 0);
    }

    #[tokio::test]
    async fn test_zero_workers_falls_back_to_auto() {
        let pool = RenderPool::start(MockBackend::new(), config(0, Duration::from_secs(5)))
            .await
            .unwrap();
        let n = pool.worker_states().len();
        assert!((2..=8).contains(&n));
        pool.shutdown();
    }
}
