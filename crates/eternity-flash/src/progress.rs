//! Progress reporting for long-running operations
//!
//! Operations call the observer synchronously after every sector or page.
//! Rendering is left entirely to the implementor.

use core::fmt;
use std::time::Duration;

/// Which loop an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Sector erase loop
    Erase,
    /// Page write loop
    Write,
    /// Page read loop
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Erase => "Erasing",
            Phase::Write => "Writing",
            Phase::Read => "Reading",
        })
    }
}

/// Trait for observing operation progress
pub trait Progress {
    /// Called before the first unit of a phase
    fn begin(&mut self, _phase: Phase, _units_total: usize) {}

    /// Called after each completed unit
    ///
    /// `throughput` is the instantaneous rate of the last unit in bytes per
    /// second: the unit size over the time its command took.
    fn on_progress(
        &mut self,
        phase: Phase,
        units_done: usize,
        units_total: usize,
        throughput: f64,
    );

    /// Called after the last unit of a phase completed
    fn finish(&mut self, _phase: Phase) {}
}

impl<P: Progress + ?Sized> Progress for &mut P {
    fn begin(&mut self, phase: Phase, units_total: usize) {
        (**self).begin(phase, units_total)
    }

    fn on_progress(
        &mut self,
        phase: Phase,
        units_done: usize,
        units_total: usize,
        throughput: f64,
    ) {
        (**self).on_progress(phase, units_done, units_total, throughput)
    }

    fn finish(&mut self, phase: Phase) {
        (**self).finish(phase)
    }
}

/// A no-op progress reporter
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_progress(&mut self, _: Phase, _: usize, _: usize, _: f64) {}
}

/// Bytes per second for `bytes` transferred in `elapsed`
pub fn throughput(bytes: usize, elapsed: Duration) -> f64 {
    // Clamp so a sub-resolution transfer does not divide by zero
    bytes as f64 / elapsed.as_secs_f64().max(1e-6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        assert!((throughput(256, Duration::from_millis(1)) - 256_000.0).abs() < 1e-3);
        assert_eq!(throughput(1024, Duration::from_secs(2)), 512.0);
        assert!(throughput(256, Duration::ZERO).is_finite());
    }
}
