use crate::server::connection::panic_message;
use crossbeam::channel::{self, Sender};
use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle},
};

/// Unit of work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs connection phases off the event loop thread.
///
/// The loop hands over a job that owns the connection; the job sends the
/// connection back and wakes the loop when the phase is done. An executor
/// only has to run every job it accepts, in any order, on any thread.
///
/// Implemented by [`WorkerPool`] and by [`tokio::runtime::Handle`]
/// (jobs go to the blocking pool).
///
/// # Examples
///
/// ```
/// use purr_http::{Executor, Job};
///
/// /// Runs every job on a new thread.
/// struct ThreadPerJob;
///
/// impl Executor for ThreadPerJob {
///     fn execute(&self, job: Job) {
///         std::thread::spawn(job);
///     }
/// }
/// ```
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, job: Job);
}

impl Executor for tokio::runtime::Handle {
    #[inline]
    fn execute(&self, job: Job) {
        // The returned `JoinHandle` is dropped; the job reports back itself.
        self.spawn_blocking(job);
    }
}

/// Fixed set of threads fed from one unbounded crossbeam channel.
///
/// Dropping the pool closes the channel, lets the workers finish the jobs
/// already queued and joins them.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = channel::unbounded::<Job>();

        let workers = (0..size.max(1))
            .map(|id| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("purr-worker-{id}"))
                    .spawn(move || {
                        for job in receiver.iter() {
                            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                                tracing::error!(
                                    worker = id,
                                    panic = panic_message(payload.as_ref()),
                                    "job panicked"
                                );
                            }
                        }
                        tracing::trace!(worker = id, "worker stopped");
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(err) => {
                    tracing::error!(%err, "failed to spawn worker thread");
                    None
                }
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Number of running worker threads.
    #[inline]
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) {
        let Some(sender) = &self.sender else {
            return;
        };

        if sender.send(job).is_err() {
            tracing::error!("worker pool is shut down, job dropped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.workers.len())
            .finish()
    }
}
