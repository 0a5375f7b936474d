//! Single-thread execution queue for conversion work.
//!
//! The office automation resource tolerates one session at a time and its
//! handles must stay on the thread that created them. Every conversion is
//! therefore funnelled through one long-lived thread that runs submitted
//! items one by one, in submission order.

use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use thiserror::Error;

const WORKER_THREAD_NAME: &str = "conversion-worker";

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Longest idle wait before the loop re-checks for a stop request.
    pub poll_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Why a submitted task produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

struct WorkItem {
    seq: u64,
    run: Box<dyn FnOnce() + Send + 'static>,
}

struct Shared {
    queue: Mutex<VecDeque<WorkItem>>,
    available: Condvar,
    /// Held while an item runs. A loop that outlived a timed-out `stop` and a
    /// freshly started one can never execute at the same time.
    exec_lock: Mutex<()>,
    next_seq: AtomicU64,
}

struct Running {
    stop: Arc<AtomicBool>,
    exited_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Runs submitted tasks on one dedicated thread, strictly one at a time.
///
/// `Stopped -> Running -> Stopped`. Items submitted while stopped stay queued
/// until the next `start`.
pub struct SerializedWorker {
    settings: WorkerSettings,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl SerializedWorker {
    pub fn new(settings: WorkerSettings) -> Self {
        Self {
            settings,
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
                exec_lock: Mutex::new(()),
                next_seq: AtomicU64::new(1),
            }),
            running: Mutex::new(None),
        }
    }

    /// Spawns the worker thread. Calling this while running is a logged no-op.
    pub fn start(&self) -> Result<(), WorkerError> {
        let mut running = lock(&self.running);
        if running.is_some() {
            engine_warn!("Worker already running");
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (exited_tx, exited_rx) = mpsc::channel();
        let shared = self.shared.clone();
        let loop_stop = stop.clone();
        let poll_interval = self.settings.poll_interval;

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                worker_loop(&shared, &loop_stop, poll_interval);
                let _ = exited_tx.send(());
            })?;

        *running = Some(Running {
            stop,
            exited_rx,
            handle,
        });
        engine_info!("Conversion worker started");
        Ok(())
    }

    /// Asks the loop to exit and waits up to `timeout` for it.
    ///
    /// An item already executing is not interrupted, but nothing new starts
    /// after it. If the timeout elapses the thread is detached and exits on its
    /// own once its current item completes.
    pub fn stop(&self, timeout: Duration) {
        let Some(running) = lock(&self.running).take() else {
            return;
        };

        running.stop.store(true, Ordering::SeqCst);
        {
            let _queue = lock(&self.shared.queue);
            self.shared.available.notify_all();
        }

        match running.exited_rx.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if running.handle.join().is_err() {
                    engine_error!("Worker thread terminated abnormally");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                engine_warn!(
                    "Worker did not stop within {:?}; detaching it until its current task ends",
                    timeout
                );
            }
        }
        engine_info!("Conversion worker stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Items queued but not yet started.
    pub fn pending(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    /// Queues `task` without a completion callback. A panic is logged.
    pub fn submit<T, F>(&self, task: F)
    where
        T: 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.submit_with_callback(task, |_outcome: Result<T, TaskFailure>| {});
    }

    /// Queues `task`; `callback` receives its value, or the failure if it
    /// panicked, on the worker thread before the next item starts.
    pub fn submit_with_callback<T, F, C>(&self, task: F, callback: C)
    where
        T: 'static,
        F: FnOnce() -> T + Send + 'static,
        C: FnOnce(Result<T, TaskFailure>) + Send + 'static,
    {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let run = Box::new(move || {
            let outcome = run_task(seq, task);
            callback(outcome);
        });
        self.enqueue(WorkItem { seq, run });
    }

    /// Queues `task` and hands back a channel that yields its outcome.
    pub fn submit_with_receiver<T, F>(&self, task: F) -> mpsc::Receiver<Result<T, TaskFailure>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.submit_with_callback(task, move |outcome| {
            let _ = tx.send(outcome);
        });
        rx
    }

    fn enqueue(&self, item: WorkItem) {
        let seq = item.seq;
        let queued = {
            let mut queue = lock(&self.shared.queue);
            queue.push_back(item);
            queue.len()
        };
        self.shared.available.notify_one();
        engine_debug!("Task #{} submitted to worker queue (queue size: {})", seq, queued);
    }
}

impl Default for SerializedWorker {
    fn default() -> Self {
        Self::new(WorkerSettings::default())
    }
}

impl Drop for SerializedWorker {
    fn drop(&mut self) {
        // Signal only; never block the dropping thread on a long conversion.
        if let Some(running) = lock(&self.running).take() {
            running.stop.store(true, Ordering::SeqCst);
            self.shared.available.notify_all();
        }
    }
}

fn worker_loop(shared: &Shared, stop: &AtomicBool, poll_interval: Duration) {
    engine_debug!("Worker loop started");
    while !stop.load(Ordering::SeqCst) {
        let Some(item) = next_item(shared, stop, poll_interval) else {
            continue;
        };

        let _exec = lock(&shared.exec_lock);
        engine_debug!("Executing task #{}", item.seq);
        let seq = item.seq;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(item.run)) {
            engine_error!(
                "Callback for task #{} panicked: {}",
                seq,
                panic_message(payload.as_ref())
            );
        }
    }
    engine_debug!("Worker loop exited");
}

fn next_item(shared: &Shared, stop: &AtomicBool, poll_interval: Duration) -> Option<WorkItem> {
    let mut queue = lock(&shared.queue);
    if queue.is_empty() {
        queue = match shared.available.wait_timeout(queue, poll_interval) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        };
    }
    if stop.load(Ordering::SeqCst) {
        return None;
    }
    queue.pop_front()
}

fn run_task<T, F>(seq: u64, task: F) -> Result<T, TaskFailure>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(task)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        engine_error!("Task #{} execution failed: {}", seq, message);
        TaskFailure::Panicked(message)
    })
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// Queue state is consistent between operations, so a poisoned lock is usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
