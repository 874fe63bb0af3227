//! Hierarchical bounded-concurrency task pool.
//!
//! A [`TaskPool`] owns a bounded queue and a fixed set of worker threads. Pools
//! nest: every pool can lazily create named subgroups, each with its own buffer,
//! concurrency limit and wait boundary. Cancellation flows from a pool to all
//! of its descendants through a shared [`CancelToken`].
//!
//! ```text
//! main (root, N workers)
//! ├── download_next (buffer = batch size)
//! ├── delete_prev   (1 worker)
//! └── bloom         (cache pre-population)
//! ```

mod cancel;
mod error;
mod in_flight;
mod worker;

pub use cancel::CancelToken;
pub use error::PoolError;

use crossbeam_channel::{select, Receiver, Sender};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

use in_flight::InFlight;

/// A unit of work. Captures everything it needs by value.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Name used when a pool is created with an empty name.
pub const DEFAULT_POOL_NAME: &str = "main";

/// State shared between a pool handle and its workers.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) tasks: Receiver<Task>,
    pub(crate) cancel: CancelToken,
    pub(crate) in_flight: InFlight,
}

impl Shared {
    /// Drop every queued task that never started and release its in-flight slot.
    fn abandon_pending(&self) {
        let n = self.tasks.try_iter().count();
        if n > 0 {
            tracing::debug!(pool = %self.name, abandoned = n, "dropped queued tasks on cancel");
        }
        self.in_flight.done_n(n);
    }
}

fn normalize_name(name: &str) -> &str {
    if name.is_empty() {
        DEFAULT_POOL_NAME
    } else {
        name
    }
}

/// Named worker group with a bounded queue and optional child pools.
pub struct TaskPool {
    name: String,
    buffer_size: usize,
    concurrency: usize,
    shared: Arc<Shared>,
    /// Dropped on close so workers exit once the backlog is drained.
    sender: Mutex<Option<Sender<Task>>>,
    closed: AtomicBool,
    subgroups: RwLock<HashMap<String, Arc<TaskPool>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPool {
    /// Create a pool and start `concurrency` workers.
    ///
    /// Zero `buffer_size` or `concurrency` is treated as 1. When `parent` is given,
    /// the pool's token is derived from it and fires whenever the parent's does.
    pub fn new(
        name: &str,
        buffer_size: usize,
        concurrency: usize,
        parent: Option<&CancelToken>,
    ) -> Result<Self, PoolError> {
        let name = normalize_name(name).to_string();
        let buffer_size = buffer_size.max(1);
        let concurrency = concurrency.max(1);
        let cancel = parent.map(CancelToken::child).unwrap_or_default();
        let (sender, tasks) = crossbeam_channel::bounded(buffer_size);

        let shared = Arc::new(Shared {
            name: name.clone(),
            tasks,
            cancel,
            in_flight: InFlight::default(),
        });

        let workers = match worker::spawn_workers(&shared, concurrency) {
            Ok(workers) => workers,
            Err(source) => {
                // Workers that did start exit on the fired token.
                shared.cancel.cancel();
                return Err(PoolError::Spawn { pool: name, source });
            }
        };

        tracing::debug!(pool = %name, buffer_size, concurrency, "pool started");

        Ok(Self {
            name,
            buffer_size,
            concurrency,
            shared,
            sender: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
            subgroups: RwLock::new(HashMap::new()),
            workers: Mutex::new(workers),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// True once the pool stopped accepting tasks: closed, cancelled, or its
    /// token fired through an ancestor or directly.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Token of this pool; firing it cancels the pool and its whole subtree.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.shared.cancel
    }

    /// Tasks accepted by this pool that have not finished or been abandoned.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.get()
    }

    /// Tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.tasks.len()
    }

    fn sender(&self) -> Option<Sender<Task>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn drop_sender(&self) {
        drop(self.sender.lock().unwrap_or_else(PoisonError::into_inner).take());
    }

    /// Submit a task. Blocks while the queue is full.
    ///
    /// Returns `false` (and drops the task) if the pool is closed, or if it gets
    /// cancelled while the call is waiting for room.
    pub fn add_task<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = match self.sender() {
            Some(sender) if !self.is_closed() => sender,
            _ => {
                tracing::debug!(pool = %self.name, "task dropped: pool closed");
                return false;
            }
        };

        self.shared.in_flight.add();
        let task: Task = Box::new(task);
        let sent = select! {
            send(sender, task) -> res => res.is_ok(),
            recv(self.shared.cancel.signal()) -> _ => false,
        };
        if !sent {
            tracing::debug!(pool = %self.name, "task dropped: pool cancelled");
            self.shared.in_flight.done();
            return false;
        }
        // Workers may have drained and exited between the send and now.
        if self.is_cancelled() {
            self.shared.abandon_pending();
        }
        true
    }

    /// Return the live child `name`, creating it if missing or closed.
    pub fn get_or_create_subgroup(
        &self,
        name: &str,
        buffer_size: usize,
        concurrency: usize,
    ) -> Result<Arc<TaskPool>, PoolError> {
        let name = normalize_name(name);
        let mut subgroups = self
            .subgroups
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = subgroups.get(name) {
            if !existing.is_closed() {
                return Ok(Arc::clone(existing));
            }
        }

        let child = Arc::new(TaskPool::new(
            name,
            buffer_size,
            concurrency,
            Some(&self.shared.cancel),
        )?);
        subgroups.insert(name.to_string(), Arc::clone(&child));
        tracing::info!(
            parent = %self.name,
            subgroup = %name,
            buffer_size = child.buffer_size,
            concurrency = child.concurrency,
            "subgroup created"
        );
        Ok(child)
    }

    /// Direct child by name.
    pub fn child(&self, name: &str) -> Option<Arc<TaskPool>> {
        self.subgroups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Resolve a path of names below this pool. An empty path yields the pool itself.
    pub fn subgroup<S: AsRef<str>>(self: &Arc<Self>, path: &[S]) -> Option<Arc<TaskPool>> {
        let mut current = Arc::clone(self);
        for segment in path {
            let next = current.child(segment.as_ref())?;
            current = next;
        }
        Some(current)
    }

    /// Resolve a dotted path such as `"download_next.retry"`.
    pub fn require_subgroup(self: &Arc<Self>, dotted: &str) -> Result<Arc<TaskPool>, PoolError> {
        let segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
        self.subgroup(&segments)
            .ok_or_else(|| PoolError::SubgroupNotFound {
                pool: self.name.clone(),
                path: dotted.to_string(),
            })
    }

    /// Names of the direct children, sorted.
    pub fn subgroup_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .subgroups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn snapshot_subgroups(&self) -> Vec<Arc<TaskPool>> {
        self.subgroups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Block until every task added to this pool (not its children) is done.
    ///
    /// Must not be called from one of this pool's own tasks.
    pub fn wait(&self) {
        self.shared.in_flight.wait();
    }

    /// Wait until this pool and every descendant are idle at once.
    ///
    /// Passes repeat while a task finishing in one pool has submitted work into
    /// another pool of the tree.
    pub fn wait_all(&self) {
        loop {
            self.wait_tree();
            if self.tree_idle() {
                return;
            }
        }
    }

    fn wait_tree(&self) {
        for child in self.snapshot_subgroups() {
            child.wait_tree();
        }
        self.wait();
    }

    /// Parents are read before children: a parent task submits before it finishes.
    fn tree_idle(&self) -> bool {
        self.in_flight() == 0 && self.snapshot_subgroups().iter().all(|c| c.tree_idle())
    }

    /// Stop accepting tasks, let the queue drain, and wait for it. Idempotent.
    /// Children are left running.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.drop_sender();
        self.wait();
        self.join_workers();
        tracing::debug!(pool = %self.name, "pool closed");
    }

    /// Close every descendant, then this pool.
    pub fn close_all(&self) {
        for child in self.snapshot_subgroups() {
            child.close_all();
        }
        self.close();
    }

    /// Fire the cancellation signal, drop queued tasks, and wait for the ones
    /// already running. Idempotent.
    pub fn cancel(&self) {
        self.closed.store(true, Ordering::Release);
        let fired = self.shared.cancel.cancel();
        self.drop_sender();
        self.shared.abandon_pending();
        self.wait();
        self.join_workers();
        if fired {
            tracing::info!(pool = %self.name, "pool cancelled");
        }
    }

    /// Detach and cancel every descendant, then cancel this pool.
    pub fn cancel_all(&self) {
        let children: Vec<Arc<TaskPool>> = self
            .subgroups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, child)| child)
            .collect();
        for child in children {
            child.cancel_all();
        }
        self.cancel();
    }

    fn join_workers(&self) {
        let handles = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        let current = std::thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!(pool = %self.name, "worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        // Let detached workers finish the backlog and exit.
        self.drop_sender();
    }
}

impl fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPool")
            .field("name", &self.name)
            .field("buffer_size", &self.buffer_size)
            .field("concurrency", &self.concurrency)
            .field("closed", &self.is_closed())
            .field("cancelled", &self.is_cancelled())
            .field("in_flight", &self.in_flight())
            .field("subgroups", &self.subgroup_names())
            .finish()
    }
}
