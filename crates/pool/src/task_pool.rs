use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use tracing::debug;

use crate::error::PoolError;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolQueue {
    jobs: VecDeque<Job>,
    stop: bool,
}

struct PoolShared {
    queue: Mutex<PoolQueue>,
    available: Condvar,
}

/// Handle to a submitted job. [`JobHandle::join`] blocks until the job
/// has run and yields its return value.
pub struct JobHandle<T> {
    result: mpsc::Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Wait for the job to finish.
    ///
    /// Returns [`PoolError::JobFailed`] if the job panicked or was
    /// rejected because the pool had started shutting down.
    pub fn join(self) -> Result<T, PoolError> {
        self.result.recv().map_err(|_| PoolError::JobFailed)
    }
}

/// A fixed-size pool of persistent worker threads sharing a FIFO queue.
///
/// Workers never submit sub-jobs; submission and joining both happen on
/// the coordinating thread. Dropping the pool signals the workers to
/// stop, drains every job already queued, and joins each thread.
pub struct TaskPool {
    shared: Arc<PoolShared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl TaskPool {
    /// Spawn `count` worker threads.
    ///
    /// Fails only if the runtime cannot create a thread; workers spawned
    /// before the failure are shut down again.
    pub fn new(count: usize) -> Result<Self, PoolError> {
        assert!(count > 0, "task pool needs at least one worker");

        let shared = Arc::new(PoolShared {
            queue: Mutex::new(PoolQueue {
                jobs: VecDeque::new(),
                stop: false,
            }),
            available: Condvar::new(),
        });

        let mut pool = Self {
            shared: Arc::clone(&shared),
            workers: Vec::with_capacity(count),
        };
        for i in 0..count {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("corral-worker-{i}"))
                .spawn(move || worker_loop(shared))?;
            pool.workers.push(handle);
        }
        debug!("Task pool started with {} workers", count);
        Ok(pool)
    }

    /// Number of worker threads. Callers use this to size batches.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue a job and wake one idle worker.
    ///
    /// The job's return value is delivered through the handle. If the
    /// pool is already shutting down the job is discarded and the handle
    /// reports [`PoolError::JobFailed`].
    pub fn submit<T, F>(&self, work: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let job: Job = Box::new(move || {
            // A panicking job must not take its worker down with it; the
            // dropped sender fails the handle instead.
            if let Ok(value) = catch_unwind(AssertUnwindSafe(work)) {
                let _ = sender.send(value);
            }
        });

        {
            let mut queue = self
                .shared
                .queue
                .lock()
                .expect("task pool queue mutex poisoned");
            if !queue.stop {
                queue.jobs.push_back(job);
            }
        }
        self.shared.available.notify_one();

        JobHandle { result: receiver }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        {
            let mut queue = self
                .shared
                .queue
                .lock()
                .expect("task pool queue mutex poisoned");
            queue.stop = true;
        }
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("Task pool shut down");
    }
}

fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let job = {
            let mut queue = shared
                .queue
                .lock()
                .expect("task pool queue mutex poisoned");
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break Some(job);
                }
                // Stop only once the queue has drained.
                if queue.stop {
                    break None;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .expect("task pool queue mutex poisoned");
            }
        };

        match job {
            Some(job) => job(),
            None => return,
        }
    }
}
