use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool for per-event work that must not run on the receive path
///
/// Jobs are queued on an unbounded crossbeam channel. A panicking job is
/// logged and the worker keeps going.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let workers = (0..threads.max(1))
            .filter_map(|index| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("bitfinex-worker-{}", index))
                    .spawn(move || worker_loop(index, receiver))
                    .map_err(|e| error!("[Pool] Failed to spawn worker {}: {}", index, e))
                    .ok()
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Queue `job`; returns `false` once the pool has been shut down
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Stop accepting jobs, drain the queue and join every worker
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());

        let current = std::thread::current().id();
        for handle in self.workers.lock().drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("[Pool] Worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(index: usize, receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("[Pool] Job panicked on worker {}", index);
        }
    }
    debug!("[Pool] Worker {} exiting", index);
}
