use log::{debug, error, info};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::DispatchError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A deferred handler invocation. The completion signal lives inside the job.
struct WorkItem {
    job: Job,
}

/// Fixed-size worker pool fed by one bounded FIFO queue.
///
/// Every [`submit`](Dispatcher::submit) enqueues a closure and waits for it to finish,
/// so at most `worker_count` closures run at once no matter how many callers are
/// waiting. When the queue is full, `submit` waits for a free slot.
pub struct Dispatcher {
    sender: Mutex<Option<mpsc::Sender<WorkItem>>>,
    workers: AsyncMutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    queue_capacity: usize,
}

impl Dispatcher {
    /// Spawns the workers onto the current tokio runtime.
    pub fn start(worker_count: usize, queue_capacity: usize) -> Result<Self, DispatchError> {
        if worker_count == 0 {
            return Err(DispatchError::InvalidConfig(
                "worker_count must be greater than 0".into(),
            ));
        }
        if queue_capacity == 0 {
            return Err(DispatchError::InvalidConfig(
                "queue_capacity must be greater than 0".into(),
            ));
        }

        let (sender, receiver) = mpsc::channel(queue_capacity);
        let queue = Arc::new(AsyncMutex::new(receiver));

        let workers = (1..=worker_count)
            .map(|id| tokio::spawn(run_worker(id, Arc::clone(&queue))))
            .collect();

        info!(
            "Dispatcher started with {} workers (queue capacity {})",
            worker_count, queue_capacity
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: AsyncMutex::new(workers),
            worker_count,
            queue_capacity,
        })
    }

    /// Runs `work` on the pool and waits for its result.
    ///
    /// Fails with [`DispatchError::ShuttingDown`] once [`shutdown`](Self::shutdown) has
    /// begun, and with [`DispatchError::Panicked`] if `work` panics. A panic never takes
    /// the worker down.
    pub async fn submit<F, T>(&self, work: F) -> Result<T, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DispatchError::ShuttingDown)?;

        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(work)).map_err(panic_message);
            let _ = done_tx.send(outcome);
        });

        sender
            .send(WorkItem { job })
            .await
            .map_err(|_| DispatchError::ShuttingDown)?;
        drop(sender);

        match done_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => {
                error!("Work item panicked: {}", message);
                Err(DispatchError::Panicked(message))
            }
            Err(_) => Err(DispatchError::WorkerLost),
        }
    }

    /// Stops accepting work, lets the workers drain everything already queued, then
    /// waits for them to exit.
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            debug!("Dispatcher already shut down");
        }
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().await);
        info!("Draining dispatcher queue ({} workers)", workers.len());
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker task failed: {}", e);
            }
        }
        info!("Dispatcher stopped");
    }

    pub fn is_accepting(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of items waiting in the queue (not counting those being executed).
    pub fn queued(&self) -> usize {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.max_capacity() - s.capacity())
            .unwrap_or(0)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

async fn run_worker(id: usize, queue: Arc<AsyncMutex<mpsc::Receiver<WorkItem>>>) {
    info!("Worker {} started", id);
    loop {
        let item = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(item) = item else { break };

        // Filesystem work blocks; keep it off the async worker threads.
        if let Err(e) = tokio::task::spawn_blocking(item.job).await {
            error!("Worker {} lost a work item: {}", id, e);
        }
    }
    info!("Worker {} stopped", id);
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
