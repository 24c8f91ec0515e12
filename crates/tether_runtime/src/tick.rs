//! Fixed-rate tick clock driving queue drains

use std::time::{Duration, Instant};

pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

pub struct TickClock {
    tick_duration: Duration,
    tick_count: u64,
    next_tick: Instant,
}

impl TickClock {
    /// A rate of zero falls back to the default rate.
    pub fn from_rate(hz: u32) -> Self {
        let hz = if hz == 0 { DEFAULT_TICK_RATE_HZ } else { hz };
        let tick_duration = Duration::from_secs(1) / hz;
        Self {
            tick_duration,
            tick_count: 0,
            next_tick: Instant::now() + tick_duration,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Sleep until the next tick is due. A late tick does not try to
    /// catch up.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if self.next_tick > now {
            std::thread::sleep(self.next_tick - now);
        }
        self.tick_count += 1;
        self.next_tick = Instant::now().max(self.next_tick) + self.tick_duration;
    }
}
