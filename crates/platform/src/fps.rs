use std::time::{Duration, Instant};

/// Counts presented frames and reports a rate once per interval.
#[derive(Debug)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
    interval: Duration,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            interval: Duration::from_secs(1),
        }
    }

    /// Record one frame; returns frames per second when an interval closes.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_second() {
        let t0 = Instant::now();
        let mut fps = FpsCounter::new(t0);
        for i in 1..60 {
            assert_eq!(fps.tick(t0 + Duration::from_millis(i * 16)), None);
        }
        let rate = fps.tick(t0 + Duration::from_secs(1)).unwrap();
        assert!((rate - 60.0).abs() < 1e-3, "{rate}");
        assert_eq!(fps.tick(t0 + Duration::from_millis(1016)), None);
    }
}
