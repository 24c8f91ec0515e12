//! Timing of queue drains on the engine thread

use super::ring_buffer::RingBuffer;
use std::time::{Duration, Instant};

pub struct DrainTimer {
    drain_start: Instant,
    durations: RingBuffer<Duration>,
    task_counts: RingBuffer<usize>,
}

impl DrainTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            drain_start: Instant::now(),
            durations: RingBuffer::new(capacity),
            task_counts: RingBuffer::new(capacity),
        }
    }

    pub fn begin(&mut self) {
        self.drain_start = Instant::now();
    }

    pub fn end(&mut self, tasks: usize) {
        self.durations.push(self.drain_start.elapsed());
        self.task_counts.push(tasks);
    }

    pub fn drain_time_ms(&self) -> f64 {
        self.durations.average().as_secs_f64() * 1000.0
    }

    /// The most recent drain, 0 before the first one.
    pub fn last_drain_ms(&self) -> f64 {
        self.durations
            .latest()
            .map_or(0.0, |duration| duration.as_secs_f64() * 1000.0)
    }

    pub fn worst_drain_ms(&self) -> f64 {
        self.durations.max().as_secs_f64() * 1000.0
    }

    pub fn tasks_per_drain(&self) -> f64 {
        self.task_counts.average()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_statistics() {
        let mut timer = DrainTimer::new(4);
        assert_eq!(timer.last_drain_ms(), 0.0);

        timer.begin();
        timer.end(2);
        timer.begin();
        timer.end(6);

        assert_eq!(timer.tasks_per_drain(), 4.0);
        assert!(timer.worst_drain_ms() >= timer.last_drain_ms());
        assert!(timer.worst_drain_ms() >= timer.drain_time_ms());
    }
}
