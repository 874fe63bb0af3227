//! Worker threads that drain a pool's task channel.

use crossbeam_channel::select;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::in_flight::CompletionGuard;
use super::{Shared, Task};

/// Spawn `count` workers for the pool behind `shared`.
pub(super) fn spawn_workers(shared: &Arc<Shared>, count: usize) -> io::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(count);
    for index in 0..count {
        let shared = Arc::clone(shared);
        let handle = thread::Builder::new()
            .name(format!("pool-{}-{}", shared.name, index))
            .spawn(move || run_worker(&shared, index))?;
        handles.push(handle);
    }
    Ok(handles)
}

fn run_worker(shared: &Shared, index: usize) {
    let cancelled = shared.cancel.signal();
    loop {
        // select! picks among ready operations at random; a fired token wins.
        if shared.cancel.is_cancelled() {
            break;
        }
        select! {
            recv(cancelled) -> _ => break,
            recv(shared.tasks) -> task => match task {
                Ok(task) => run_task(shared, index, task),
                // Closed and drained.
                Err(_) => {
                    tracing::trace!(pool = %shared.name, worker = index, "worker exiting");
                    return;
                }
            },
        }
    }
    shared.abandon_pending();
    tracing::trace!(pool = %shared.name, worker = index, "worker exiting on cancel");
}

fn run_task(shared: &Shared, index: usize, task: Task) {
    let _done = CompletionGuard::new(&shared.in_flight);
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        tracing::warn!(
            pool = %shared.name,
            worker = index,
            "task panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
