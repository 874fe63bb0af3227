//! Owner of the root task pool.
//!
//! Built once at startup from [`SeriesConfig`] and handed by reference to every
//! collaborator that submits work. Phases of work hang off the root as named
//! subgroups.

use std::sync::Arc;

use crate::config::SeriesConfig;
use crate::pool::{PoolError, TaskPool, DEFAULT_POOL_NAME};

#[derive(Debug)]
pub struct Scheduler {
    root: Arc<TaskPool>,
}

impl Scheduler {
    /// Root pool with `max_concurrent` workers and an equally sized queue.
    pub fn new(max_concurrent: usize) -> Result<Self, PoolError> {
        let root = TaskPool::new(DEFAULT_POOL_NAME, max_concurrent, max_concurrent, None)?;
        tracing::info!(workers = root.concurrency(), "scheduler started");
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn from_config(cfg: &SeriesConfig) -> Result<Self, PoolError> {
        Self::new(cfg.max_concurrent_downloads)
    }

    pub fn root(&self) -> &Arc<TaskPool> {
        &self.root
    }

    pub fn add_task<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.root.add_task(task)
    }

    /// Named phase directly under the root.
    pub fn subgroup(
        &self,
        name: &str,
        buffer_size: usize,
        concurrency: usize,
    ) -> Result<Arc<TaskPool>, PoolError> {
        self.root.get_or_create_subgroup(name, buffer_size, concurrency)
    }

    pub fn wait_all(&self) {
        self.root.wait_all();
    }

    pub fn close_all(&self) {
        self.root.close_all();
    }

    pub fn cancel_all(&self) {
        self.root.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn root_sized_from_config() {
        let mut cfg = SeriesConfig::default();
        cfg.max_concurrent_downloads = 3;
        let s = Scheduler::from_config(&cfg).unwrap();
        assert_eq!(s.root().name(), DEFAULT_POOL_NAME);
        assert_eq!(s.root().concurrency(), 3);
        assert_eq!(s.root().buffer_size(), 3);
        s.close_all();
    }

    #[test]
    fn zero_max_concurrent_still_runs_tasks() {
        let s = Scheduler::new(0).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        s.add_task(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        s.wait_all();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        s.close_all();
        assert!(s.root().is_closed());
    }

    #[test]
    fn phases_share_the_root() {
        let s = Scheduler::new(2).unwrap();
        let a = s.subgroup("download_next", 4, 2).unwrap();
        let b = s.subgroup("delete_prev", 4, 1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for group in [&a, &b] {
            for _ in 0..4 {
                let d = Arc::clone(&done);
                group.add_task(move || {
                    d.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        s.wait_all();
        assert_eq!(done.load(Ordering::SeqCst), 8);

        s.cancel_all();
        assert!(s.root().subgroup_names().is_empty());
        assert!(!s.add_task(|| {}));
    }
}
