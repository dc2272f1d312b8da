use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::status::Status;

/// A resettable one-shot gate that lets one thread block until another signals completion.
///
/// [`close()`][Self::close] arms the gate, [`release()`][Self::release] opens it and wakes every
/// waiter, and [`block()`][Self::block] waits for it to open. A release that happens between
/// `close()` and `block()` is never lost: the released state stays set until the next `close()`.
#[derive(Debug)]
pub struct OutcomeGate {
    state: Mutex<GateState>,
    released_cond: Condvar,
}

#[derive(Debug, Clone, Copy)]
struct GateState {
    released: bool,
    status: Status,
}

impl Default for OutcomeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeGate {
    /// Creates an open gate.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                released: true,
                status: Status::SUCCESS,
            }),
            released_cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms the gate so that subsequent calls to [`block()`][Self::block] wait.
    ///
    /// Idempotent. Clears the status recorded by a previous release.
    pub fn close(&self) {
        let mut state = self.lock();
        state.released = false;
        state.status = Status::SUCCESS;
    }

    /// Records `status` and opens the gate, waking all current waiters.
    ///
    /// Waiters arriving later return immediately until the gate is closed again.
    pub fn release(&self, status: Status) {
        let mut state = self.lock();
        state.status = status;
        state.released = true;
        self.released_cond.notify_all();
    }

    /// Blocks until the gate is released or `timeout` elapses.
    ///
    /// A zero `timeout` waits without bound. Returns whether the gate was released.
    pub fn block(&self, timeout: Duration) -> bool {
        let mut state = self.lock();
        if timeout.is_zero() {
            while !state.released {
                state = self
                    .released_cond
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            return true;
        }

        let deadline = Instant::now() + timeout;
        while !state.released {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .released_cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// The status recorded by the most recent release.
    pub fn status(&self) -> Status {
        self.lock().status
    }

    /// Whether the gate is open, either fresh or released since the last `close()`.
    pub fn is_released(&self) -> bool {
        self.lock().released
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn new_gate_is_open() {
        let gate = OutcomeGate::new();
        assert!(gate.is_released());
        assert!(gate.block(Duration::from_millis(1)));
    }

    #[test]
    fn closed_gate_times_out() {
        let gate = OutcomeGate::new();
        gate.close();
        let start = Instant::now();
        assert!(!gate.block(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn release_before_block_is_not_lost() {
        let gate = OutcomeGate::new();
        gate.close();
        gate.release(Status::GATT_ERROR);
        assert!(gate.block(Duration::from_millis(1)));
        assert_eq!(gate.status(), Status::GATT_ERROR);
    }

    #[test]
    fn close_clears_previous_release() {
        let gate = OutcomeGate::new();
        gate.close();
        gate.release(Status::TIMEOUT);
        gate.close();
        gate.close();
        assert!(!gate.is_released());
        assert_eq!(gate.status(), Status::SUCCESS);
        assert!(!gate.block(Duration::from_millis(5)));
    }

    #[test]
    fn release_wakes_all_waiters() {
        let gate = Arc::new(OutcomeGate::new());
        gate.close();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || gate.block(Duration::ZERO))
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        gate.release(Status::SUCCESS);
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }
}
