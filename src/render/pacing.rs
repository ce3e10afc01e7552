use std::f64::consts::PI;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Mechanical parameters that fix how long one column stays in front of the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnTiming {
    pub rpm: f64,
    pub diameter_mm: f64,
    pub pixel_pitch_mm: f64,
    /// LED arms sharing the rotation; each sweeps a third of the period on the stock build.
    pub arms: u32,
}

impl Default for ColumnTiming {
    fn default() -> Self {
        Self {
            rpm: 7200.0,
            diameter_mm: 100.0,
            pixel_pitch_mm: 1.0,
            arms: 3,
        }
    }
}

impl ColumnTiming {
    /// Columns passing a fixed point per second, per arm.
    pub fn columns_per_second(&self) -> f64 {
        (self.rpm / 60.0) * (PI * self.diameter_mm) / self.pixel_pitch_mm
    }

    pub fn interval(&self) -> Duration {
        let per_arm = 1.0 / self.columns_per_second();
        Duration::from_secs_f64(per_arm / self.arms.max(1) as f64)
    }
}

/// Holds the column cadence. Timing drift is not an error, it only smears the picture.
pub trait Pacer {
    fn start_frame(&mut self);

    fn wait_column(&mut self);
}

/// Busy-waits against absolute deadlines so one slow column does not push
/// every later one back.
#[derive(Debug)]
pub struct SpinPacer {
    interval: Duration,
    next: Instant,
}

impl SpinPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Pacer for SpinPacer {
    fn start_frame(&mut self) {
        self.next = Instant::now() + self.interval;
    }

    fn wait_column(&mut self) {
        while Instant::now() < self.next {
            std::hint::spin_loop();
        }
        self.next += self.interval;
    }
}

/// Emits columns back to back; for bring-up and tests.
#[derive(Debug, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn start_frame(&mut self) {}

    fn wait_column(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_cylinder_interval() {
        let interval = ColumnTiming::default().interval();
        // 7200 rpm, 10 cm, 1 mm pitch, three arms: about 8.842 us per column
        let us = interval.as_secs_f64() * 1e6;
        assert!((us - 8.84194).abs() < 1e-3, "{us}");
    }

    #[test]
    fn more_arms_shorten_the_interval() {
        let one = ColumnTiming {
            arms: 1,
            ..Default::default()
        };
        let three = ColumnTiming::default();
        assert!(one.interval() > three.interval());
    }

    #[test]
    fn spin_pacer_waits_at_least_one_interval_per_column() {
        let mut pacer = SpinPacer::new(Duration::from_micros(200));
        let start = Instant::now();
        pacer.start_frame();
        for _ in 0..5 {
            pacer.wait_column();
        }
        assert!(start.elapsed() >= Duration::from_micros(1000));
    }
}
