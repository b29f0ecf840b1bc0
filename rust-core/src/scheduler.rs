//! Job scheduler: a fixed worker pool running persistent per-instance jobs
//!
//! Queueing a job never blocks the caller. A job queued while it is
//! already pending is coalesced; a job queued while it is running is
//! marked for one rerun, which the worker finishing the current run puts
//! back on the queue. Executions of the same job never overlap, and no
//! worker ever waits on a job another worker is running.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

type Task = dyn Fn() + Send + Sync;

#[derive(Debug, Default, Clone, Copy)]
struct JobStatus {
    /// On the queue, not yet picked up by a worker
    queued: bool,
    /// A worker is executing the task
    running: bool,
    /// Queued again while running
    rerun: bool,
}

struct JobState {
    name: String,
    task: Box<Task>,
    status: Mutex<JobStatus>,
    queue: Weak<Queue>,
    runs: AtomicU64,
}

struct Queue {
    tx: flume::Sender<Arc<JobState>>,
}

/// Fixed pool of worker threads
pub struct JobScheduler {
    /// Sole strong reference; dropping it disconnects the workers
    queue: Option<Arc<Queue>>,
    workers: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    /// Start `workers` named worker threads (at least one)
    pub fn new(workers: usize, thread_name: &str) -> Result<Self> {
        let (tx, rx) = flume::unbounded::<Arc<JobState>>();
        let count = workers.max(1);

        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", thread_name, i))
                .spawn(move || worker_loop(rx))
                .map_err(EngineError::WorkerSpawn)?;
            handles.push(handle);
        }

        log::info!("Started job scheduler with {} workers", count);

        Ok(Self {
            queue: Some(Arc::new(Queue { tx })),
            workers: handles,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(config.workers, &config.thread_name)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Create a persistent job running `task` on the pool
    pub fn create_job<F>(&self, name: impl Into<String>, task: F) -> Job
    where
        F: Fn() + Send + Sync + 'static,
    {
        Job {
            state: Arc::new(JobState {
                name: name.into(),
                task: Box::new(task),
                status: Mutex::new(JobStatus::default()),
                queue: self.queue.as_ref().map_or_else(Weak::new, Arc::downgrade),
                runs: AtomicU64::new(0),
            }),
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        // Workers finish queued jobs, then see the disconnect and exit
        self.queue = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Job scheduler worker panicked");
            }
        }
    }
}

fn worker_loop(rx: flume::Receiver<Arc<JobState>>) {
    while let Ok(job) = rx.recv() {
        {
            let mut status = job.status.lock();
            status.queued = false;
            status.running = true;
        }

        log::debug!("Running job {}", job.name);
        if catch_unwind(AssertUnwindSafe(|| (job.task)())).is_err() {
            log::error!("Job {} panicked", job.name);
        }
        job.runs.fetch_add(1, Ordering::Relaxed);

        let mut status = job.status.lock();
        status.running = false;
        if status.rerun {
            status.rerun = false;
            match job.queue.upgrade() {
                Some(queue) if queue.tx.send(Arc::clone(&job)).is_ok() => status.queued = true,
                _ => log::debug!("Dropping rerun of job {}: scheduler closed", job.name),
            }
        }
    }
}

/// Handle to a persistent job on a [`JobScheduler`]
pub struct Job {
    state: Arc<JobState>,
}

impl Job {
    /// Queue the job for execution
    ///
    /// # Returns
    /// `true` if queued (or marked for a rerun after the current
    /// execution), `false` if it was already pending (coalesced)
    ///
    /// # Errors
    /// `SchedulerClosed` if the scheduler has been dropped
    pub fn queue(&self) -> Result<bool> {
        let queue = self
            .state
            .queue
            .upgrade()
            .ok_or(EngineError::SchedulerClosed)?;

        let mut status = self.state.status.lock();
        if status.queued || status.rerun {
            return Ok(false);
        }
        if status.running {
            status.rerun = true;
            return Ok(true);
        }

        queue
            .tx
            .send(Arc::clone(&self.state))
            .map_err(|_| EngineError::SchedulerClosed)?;
        status.queued = true;
        Ok(true)
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Queued, or due to run again after the current execution
    pub fn is_pending(&self) -> bool {
        let status = self.state.status.lock();
        status.queued || status.rerun
    }

    /// Number of completed executions
    pub fn runs(&self) -> u64 {
        self.state.runs.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_job_runs_on_worker() {
        let scheduler = JobScheduler::new(2, "test-worker").unwrap();
        let (tx, rx) = flume::unbounded();
        let job = scheduler.create_job("name-probe", move || {
            let name = thread::current().name().unwrap_or_default().to_string();
            let _ = tx.send(name);
        });

        assert!(job.queue().unwrap());
        let worker = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(worker.starts_with("test-worker-"));
    }

    #[test]
    fn test_requeue_while_pending_coalesces() {
        let scheduler = JobScheduler::new(1, "coalesce").unwrap();
        let (started_tx, started_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded::<()>();
        let (done_tx, done_rx) = flume::unbounded();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        let job = scheduler.create_job("blocking", move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv_timeout(TIMEOUT);
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = done_tx.send(());
        });

        assert!(job.queue().unwrap());
        started_rx.recv_timeout(TIMEOUT).unwrap();

        // First run in progress: one rerun queued, the rest coalesced
        assert!(job.queue().unwrap());
        assert!(!job.queue().unwrap());
        assert!(!job.queue().unwrap());

        release_tx.send(()).unwrap();
        done_rx.recv_timeout(TIMEOUT).unwrap();
        started_rx.recv_timeout(TIMEOUT).unwrap();
        release_tx.send(()).unwrap();
        done_rx.recv_timeout(TIMEOUT).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_runs_never_overlap() {
        let scheduler = JobScheduler::new(4, "overlap").unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        let (a, o) = (Arc::clone(&active), Arc::clone(&overlapped));
        let job = scheduler.create_job("exclusive", move || {
            if a.fetch_add(1, Ordering::SeqCst) > 0 {
                o.store(true, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(2));
            a.fetch_sub(1, Ordering::SeqCst);
        });

        for _ in 0..50 {
            job.queue().unwrap();
            thread::sleep(Duration::from_micros(500));
        }
        drop(scheduler);

        assert!(!overlapped.load(Ordering::SeqCst));
        assert!(job.runs() >= 1);
    }

    #[test]
    fn test_rerun_does_not_park_idle_worker() {
        let scheduler = JobScheduler::new(2, "rerun").unwrap();
        let (started_tx, started_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded::<()>();
        let slow = scheduler.create_job("slow", move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv_timeout(TIMEOUT);
        });

        let (quick_tx, quick_rx) = flume::unbounded();
        let quick = scheduler.create_job("quick", move || {
            let _ = quick_tx.send(());
        });

        assert!(slow.queue().unwrap());
        started_rx.recv_timeout(TIMEOUT).unwrap();
        assert!(slow.queue().unwrap());
        assert!(slow.is_pending());

        // The second worker stays free while the slow job is still running
        quick.queue().unwrap();
        quick_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(slow.runs(), 0);

        // Finishing the first run puts the rerun back on the queue
        release_tx.send(()).unwrap();
        started_rx.recv_timeout(TIMEOUT).unwrap();
        release_tx.send(()).unwrap();
        drop(scheduler);
        assert_eq!(slow.runs(), 2);
        assert!(!slow.is_pending());
    }

    #[test]
    fn test_queue_after_shutdown() {
        let scheduler = JobScheduler::new(1, "closed").unwrap();
        let job = scheduler.create_job("orphan", || {});
        drop(scheduler);

        assert!(matches!(job.queue(), Err(EngineError::SchedulerClosed)));
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let scheduler = JobScheduler::new(1, "panic").unwrap();
        let bad = scheduler.create_job("bad", || panic!("boom"));
        let (tx, rx) = flume::unbounded();
        let good = scheduler.create_job("good", move || {
            let _ = tx.send(());
        });

        bad.queue().unwrap();
        good.queue().unwrap();
        rx.recv_timeout(TIMEOUT).unwrap();
    }
}
