//! In-flight task accounting (a wait group).

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Count of tasks that were accepted and have not finished or been abandoned.
#[derive(Default)]
pub(crate) struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(&self) {
        *self.lock() += 1;
    }

    pub(crate) fn done(&self) {
        self.done_n(1);
    }

    /// Saturates at zero.
    pub(crate) fn done_n(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut count = self.lock();
        *count = count.saturating_sub(n);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    pub(crate) fn get(&self) -> usize {
        *self.lock()
    }

    /// Block until the count reaches zero.
    pub(crate) fn wait(&self) {
        let mut count = self.lock();
        while *count > 0 {
            count = self.idle.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Marks one task as finished when dropped, including during unwinding.
pub(crate) struct CompletionGuard<'a> {
    in_flight: &'a InFlight,
}

impl<'a> CompletionGuard<'a> {
    pub(crate) fn new(in_flight: &'a InFlight) -> Self {
        Self { in_flight }
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_returns_immediately_when_idle() {
        let f = InFlight::default();
        f.wait();
        assert_eq!(f.get(), 0);
    }

    #[test]
    fn done_never_goes_negative() {
        let f = InFlight::default();
        f.add();
        f.done_n(5);
        assert_eq!(f.get(), 0);
    }

    #[test]
    fn guard_releases_on_drop() {
        let f = Arc::new(InFlight::default());
        f.add();
        f.add();
        let f2 = Arc::clone(&f);
        let h = thread::spawn(move || {
            let _a = CompletionGuard::new(&f2);
            let _b = CompletionGuard::new(&f2);
        });
        f.wait();
        h.join().unwrap();
        assert_eq!(f.get(), 0);
    }
}
