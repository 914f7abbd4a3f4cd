//! Background task dispatcher.
//!
//! A single worker thread, started when the dispatcher is built, drains a FIFO
//! queue. Each submitted task carries its own id and callbacks; exactly one of
//! them fires. Callbacks run on the worker thread, so owners of shared state
//! hand results back through a channel of their own.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Identifier handed out per `submit()` call, unique for the dispatcher's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Submission was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatcher is closed; task was not accepted")]
    Closed,
}

/// Why a task ended in its error callback
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{0:#}")]
    Failed(anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task discarded: dispatcher shut down before it ran")]
    Discarded,
}

/// Type-erased queued task
trait Job: Send {
    fn id(&self) -> TaskId;
    fn execute(self: Box<Self>);
    fn discard(self: Box<Self>);
}

struct Task<T, W, S, E> {
    id: TaskId,
    work: W,
    on_success: S,
    on_error: Option<E>,
    _result: PhantomData<fn() -> T>,
}

impl<T, W, S, E> Job for Task<T, W, S, E>
where
    T: Send + 'static,
    W: FnOnce() -> anyhow::Result<T> + Send + 'static,
    S: FnOnce(T) + Send + 'static,
    E: FnOnce(TaskError) + Send + 'static,
{
    fn id(&self) -> TaskId {
        self.id
    }

    fn execute(self: Box<Self>) {
        let Task {
            id,
            work,
            on_success,
            on_error,
            ..
        } = *self;

        let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(TaskError::Failed(err)),
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        };

        match outcome {
            Ok(value) => {
                debug!(task = %id, "Task succeeded");
                invoke_callback(id, "on_success", move || on_success(value));
            }
            Err(err) => deliver_error(id, on_error, err),
        }
    }

    fn discard(self: Box<Self>) {
        let Task { id, on_error, .. } = *self;
        deliver_error(id, on_error, TaskError::Discarded);
    }
}

fn deliver_error<E>(id: TaskId, on_error: Option<E>, err: TaskError)
where
    E: FnOnce(TaskError) + Send + 'static,
{
    match on_error {
        Some(callback) => {
            debug!(task = %id, error = %err, "Task failed");
            invoke_callback(id, "on_error", move || callback(err));
        }
        None => {
            warn!(task = %id, error = %err, "Task failed with no error callback");
        }
    }
}

/// Run a callback without letting its panic reach the worker loop
fn invoke_callback(id: TaskId, which: &str, callback: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
        error!(
            task = %id,
            callback = which,
            panic = %panic_message(payload.as_ref()),
            "Task callback panicked"
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

struct Worker {
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

/// Runs submitted work on one persistent background thread, in submission order
pub struct TaskDispatcher {
    sender: Mutex<Option<Sender<Box<dyn Job>>>>,
    stopping: Arc<AtomicBool>,
    next_id: AtomicU64,
    worker: Mutex<Option<Worker>>,
    poll_interval: Duration,
}

impl TaskDispatcher {
    /// Start the dispatcher and its worker. `poll_interval` bounds how long the
    /// worker waits on an empty queue before checking for shutdown.
    pub fn new(poll_interval: Duration) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Box<dyn Job>>();
        let (exited_tx, exited_rx) = mpsc::channel::<()>();
        let stopping = Arc::new(AtomicBool::new(false));

        let worker_stopping = Arc::clone(&stopping);
        let handle = thread::Builder::new()
            .name("tm-setter-worker".to_string())
            .spawn(move || {
                worker_loop(&receiver, &worker_stopping, poll_interval);
                let _ = exited_tx.send(());
            })?;

        info!(poll_ms = poll_interval.as_millis() as u64, "Task dispatcher started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            stopping,
            next_id: AtomicU64::new(1),
            worker: Mutex::new(Some(Worker {
                handle,
                exited: exited_rx,
            })),
            poll_interval,
        })
    }

    /// Queue `work` for the worker. Returns immediately.
    ///
    /// `on_success` receives the work's value; `on_error` receives its error or
    /// panic. Without `on_error`, failures are logged and dropped.
    pub fn submit<T, W, S, E>(
        &self,
        work: W,
        on_success: S,
        on_error: Option<E>,
    ) -> Result<TaskId, DispatchError>
    where
        T: Send + 'static,
        W: FnOnce() -> anyhow::Result<T> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(TaskError) + Send + 'static,
    {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(DispatchError::Closed)?;

        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let task: Box<dyn Job> = Box::new(Task {
            id,
            work,
            on_success,
            on_error,
            _result: PhantomData,
        });

        // The worker only drops its receiver after the sender is gone
        sender.send(task).map_err(|_| DispatchError::Closed)?;
        debug!(task = %id, "Task queued");
        Ok(id)
    }

    /// Submit work whose failures only need to be logged
    pub fn submit_detached<T, W, S>(&self, work: W, on_success: S) -> Result<TaskId, DispatchError>
    where
        T: Send + 'static,
        W: FnOnce() -> anyhow::Result<T> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
    {
        self.submit(work, on_success, None::<fn(TaskError)>)
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting work, let the in-flight task finish (up to `timeout`),
    /// and stop the worker. Tasks still queued get `TaskError::Discarded`.
    ///
    /// Returns true when the worker exited within the timeout. Safe to call
    /// repeatedly.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let stopped = self.stop(timeout);
        if !stopped {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "In-flight task still running at shutdown; detaching worker"
            );
        }
        stopped
    }

    fn stop(&self, timeout: Duration) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.stopping.store(true, Ordering::SeqCst);
        drop(sender);

        let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return true;
        };

        // A callback may drop the last handle from the worker thread itself
        if worker.handle.thread().id() == thread::current().id() {
            debug!("Dispatcher shut down from its own worker");
            return true;
        }

        match worker.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    error!("Dispatcher worker panicked");
                }
                info!("Task dispatcher stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

impl Drop for TaskDispatcher {
    fn drop(&mut self) {
        // An idle worker notices the closed queue at once; a busy one is left to finish
        if !self.stop(self.poll_interval) {
            debug!("Dropped dispatcher with a task still running");
        }
    }
}

fn worker_loop(receiver: &Receiver<Box<dyn Job>>, stopping: &AtomicBool, poll_interval: Duration) {
    loop {
        match receiver.recv_timeout(poll_interval) {
            Ok(job) => {
                if stopping.load(Ordering::SeqCst) {
                    debug!(task = %job.id(), "Discarding queued task at shutdown");
                    job.discard();
                } else {
                    debug!(task = %job.id(), "Task started");
                    job.execute();
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Dispatcher worker exiting");
}
