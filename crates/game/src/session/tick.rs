use std::time::Duration;

/// Frame-time accumulator driving the fixed network tick.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    dt: Duration,
    accumulator: Duration,
}

impl FixedTimestep {
    /// A stalled frame never schedules more than this much catch-up.
    const MAX_FRAME: Duration = Duration::from_millis(250);

    pub fn new(tick_rate: u32) -> Self {
        Self {
            dt: Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64),
            accumulator: Duration::ZERO,
        }
    }

    pub fn accumulate(&mut self, delta: Duration) {
        self.accumulator += delta.min(Self::MAX_FRAME);
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            true
        } else {
            false
        }
    }

    /// Consumes every due tick and reports how many there were. State
    /// replication only ever needs the latest value, so callers send once.
    pub fn drain_ticks(&mut self) -> u32 {
        let mut ticks = 0;
        while self.consume_tick() {
            ticks += 1;
        }
        ticks
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}
