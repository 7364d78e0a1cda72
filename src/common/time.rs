//! Simulated time.
//!
//! Time is kept as an integer number of picoseconds so that the fabric's
//! one-picosecond arbitration phase shift is exact.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

/// A point in (or span of) simulated time, in picoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    /// Smallest representable step; used for the arbiter phase shift.
    pub const RESOLUTION: SimTime = SimTime(1);

    /// Latest representable time. Addition and scaling saturate here.
    pub const MAX: SimTime = SimTime(u64::MAX);

    pub const fn from_ps(ps: u64) -> Self {
        SimTime(ps)
    }

    pub const fn from_ns(ns: u64) -> Self {
        SimTime(ns * 1000)
    }

    pub const fn as_ps(self) -> u64 {
        self.0
    }

    /// Number of whole periods of `clock` contained in `self`.
    pub fn cycles(self, clock: SimTime) -> u64 {
        if clock.0 == 0 {
            0
        } else {
            self.0 / clock.0
        }
    }

    pub fn saturating_sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl Mul<u64> for SimTime {
    type Output = SimTime;

    fn mul(self, rhs: u64) -> SimTime {
        SimTime(self.0.saturating_mul(rhs))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{} ns", self.0 / 1000)
        } else {
            write!(f, "{} ps", self.0)
        }
    }
}
