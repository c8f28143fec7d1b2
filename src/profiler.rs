//! Per-slave cumulative wall-clock and real-time-ratio tracking (spec.md §2,
//! §4.7).
use std::time::{Duration, Instant};

/// Accumulated wall-clock cost of a single slave's `DoStep` calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct Profile {
    cumulative: Duration,
    last_step: Duration,
    steps: u64,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time a single `DoStep` call and record it.
    pub fn tic_toc<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();
        self.last_step = elapsed;
        self.cumulative += elapsed;
        self.steps += 1;
        result
    }

    pub fn last_step_secs(&self) -> f64 {
        self.last_step.as_secs_f64()
    }

    pub fn cumulative_secs(&self) -> f64 {
        self.cumulative.as_secs_f64()
    }

    /// Ratio of wall-clock time spent to simulated time advanced. Values
    /// below 1.0 mean the slave runs faster than real time.
    pub fn real_time_ratio(&self, simulated_step: f64) -> f64 {
        if simulated_step <= 0.0 {
            0.0
        } else {
            self.last_step.as_secs_f64() / simulated_step
        }
    }
}
