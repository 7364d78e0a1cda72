//! Bus Arbiter.
//!
//! Picks at most one winner per bus tick among the masters whose request is
//! waiting for the address bus. Two policies are supported:
//!
//! 1. **Fixed priority:** the highest master index wins.
//! 2. **Round robin:** the scan starts one past the previous grant and wraps.
//!
//! A granted locked transaction pins the bus to its master: until that master
//! is granted an unlocked transaction, no other master can win, regardless of
//! policy. Masters starve while the lock is held and, under fixed priority,
//! whenever a higher index is always pending.

use crate::config::Arbitration;

/// Bus lock state, shared by the blocking and the split-phase paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockState {
    pub locked: bool,
    pub holder: usize,
}

impl LockState {
    /// Returns `true` if `master` may use the bus under the current lock.
    pub fn admits(&self, master: usize) -> bool {
        !self.locked || self.holder == master
    }

    /// Captures the lock attribute of a transaction granted to `master`.
    pub fn capture(&mut self, master: usize, lock: bool) {
        self.locked = lock;
        self.holder = master;
    }
}

/// Arbitration policy state.
pub struct Arbiter {
    policy: Arbitration,
    robin: usize,
}

impl Arbiter {
    pub fn new(policy: Arbitration) -> Self {
        Self { policy, robin: 0 }
    }

    pub fn policy(&self) -> Arbitration {
        self.policy
    }

    /// Selects the winner of one tick.
    ///
    /// # Arguments
    ///
    /// * `pending` - One flag per bound master, `true` if that master has a
    ///   request waiting for the address bus.
    /// * `lock` - Current bus lock.
    ///
    /// # Returns
    ///
    /// The granted master index, or `None` if nobody may win this tick.
    pub fn select(&mut self, pending: &[bool], lock: &LockState) -> Option<usize> {
        if lock.locked {
            return pending
                .get(lock.holder)
                .copied()
                .unwrap_or(false)
                .then_some(lock.holder);
        }

        match self.policy {
            Arbitration::FixedPriority => pending.iter().rposition(|&p| p),
            Arbitration::RoundRobin => {
                let n = pending.len();
                for _ in 0..n {
                    self.robin = (self.robin + 1) % n;
                    if pending[self.robin] {
                        return Some(self.robin);
                    }
                }
                None
            }
        }
    }
}
