//! Hierarchical cancellation token.
//!
//! A token created with [`CancelToken::child`] is cancelled whenever its parent
//! is, including when the parent was already cancelled at creation time.

use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

struct Inner {
    cancelled: AtomicBool,
    /// Never sent on; dropping it disconnects `signal`.
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new() -> Self {
        let (trigger, signal) = crossbeam_channel::bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            signal,
            children: Mutex::new(Vec::new()),
        }
    }

    /// Fires this token and every live descendant. Returns false if it was already fired.
    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        drop(self.trigger.lock().unwrap_or_else(PoisonError::into_inner).take());

        let children: Vec<Arc<Inner>> = self
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .filter_map(|weak| weak.upgrade())
            .collect();
        for child in children {
            child.cancel();
        }
        true
    }
}

/// Cooperative cancellation signal shared by a pool and its descendants.
///
/// Cloning yields a handle to the same signal.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a token that fires when `self` fires (or immediately, if it already has).
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        let mut children = self
            .inner
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Checked under the children lock so a concurrent cancel() either sees
        // the registration or we see its flag.
        if self.is_cancelled() {
            child.inner.cancel();
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Fire the signal. Returns true only for the call that actually fired it.
    pub fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    /// Receiver that disconnects once the token fires, for use in `select!`.
    /// Nothing is ever sent on it.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
