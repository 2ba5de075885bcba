//! Bounded concurrency gate
//!
//! Counting admission primitive with strict FIFO wakeup: `acquire` blocks
//! (cooperatively) until fewer than `limit` permits are held, and releases
//! admit the longest-waiting caller first. The limit may be adjusted at
//! runtime; lowering it never evicts current holders, it only throttles
//! future admissions. Acquisition cannot fail, only wait.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

struct GateState {
    limit: usize,
    active: usize,
    waiters: VecDeque<oneshot::Sender<GatePermit>>,
}

/// Bounded concurrency gate, cheap to clone.
#[derive(Clone)]
pub struct Gate {
    inner: Arc<Mutex<GateState>>,
}

/// One admission slot; returned to the gate on drop.
///
/// The state reference is `Option` so the gate can disarm a permit that a
/// cancelled waiter never received and return its slot by hand.
pub struct GatePermit {
    inner: Option<Arc<Mutex<GateState>>>,
}

impl Gate {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GateState {
                limit: limit.max(1),
                active: 0,
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Wait until a slot is free, then take it.
    pub async fn acquire(&self) -> GatePermit {
        let rx = {
            let mut state = self.inner.lock().unwrap();
            // the fast path also requires an empty queue so a release in
            // progress on another thread cannot be overtaken
            if state.waiters.is_empty() && state.active < state.limit {
                state.active += 1;
                return GatePermit {
                    inner: Some(Arc::clone(&self.inner)),
                };
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        match rx.await {
            Ok(permit) => permit,
            // Queued senders are only dropped with the whole gate state,
            // which the awaiting caller keeps alive; grab a slot directly.
            Err(_) => {
                self.inner.lock().unwrap().active += 1;
                GatePermit {
                    inner: Some(Arc::clone(&self.inner)),
                }
            }
        }
    }

    /// Adjust the limit. Raising it admits waiters immediately; lowering it
    /// only throttles future admissions.
    pub fn set_limit(&self, limit: usize) {
        self.inner.lock().unwrap().limit = limit.max(1);
        admit_waiters(&self.inner);
    }

    pub fn limit(&self) -> usize {
        self.inner.lock().unwrap().limit
    }

    /// Permits currently held.
    pub fn active(&self) -> usize {
        self.inner.lock().unwrap().active
    }

    /// Callers parked in the wait queue.
    pub fn waiting(&self) -> usize {
        self.inner.lock().unwrap().waiters.len()
    }
}

/// Hand free slots to waiters in FIFO order until the limit is reached or
/// the queue empties. Cancelled waiters (dropped receivers) give their slot
/// straight back.
fn admit_waiters(inner: &Arc<Mutex<GateState>>) {
    loop {
        let tx = {
            let mut state = inner.lock().unwrap();
            if state.active >= state.limit {
                return;
            }
            match state.waiters.pop_front() {
                Some(tx) => {
                    state.active += 1;
                    tx
                }
                None => return,
            }
        };

        let permit = GatePermit {
            inner: Some(Arc::clone(inner)),
        };
        if let Err(mut rejected) = tx.send(permit) {
            // Disarm the rejected permit so its drop does not re-enter this
            // function; the slot is returned by hand instead.
            rejected.inner.take();
            inner.lock().unwrap().active -= 1;
        }
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.lock().unwrap().active -= 1;
            admit_waiters(&inner);
        }
    }
}
