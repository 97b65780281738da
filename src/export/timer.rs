use std::time::{Duration, Instant};

use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};

/// How a [`FrameTimer`] spaces its ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Ticks advance a virtual clock by exactly one interval and return immediately.
    #[default]
    Virtual,
    /// Ticks sleep until the next wall-clock deadline and report real elapsed time.
    RealTime,
}

/// Fixed-interval ticker driving export. It never waits on a display.
#[derive(Debug)]
pub struct FrameTimer {
    interval: Duration,
    pacing: Pacing,
    ticks: u64,
    origin: Option<Instant>,
    cancelled: bool,
}

impl FrameTimer {
    /// Timer with an explicit interval.
    pub fn new(interval: Duration, pacing: Pacing) -> ReelResult<Self> {
        if interval.is_zero() {
            return Err(ReelError::validation("frame timer interval must be > 0"));
        }
        Ok(Self {
            interval,
            pacing,
            ticks: 0,
            origin: None,
            cancelled: false,
        })
    }

    /// Timer ticking once per frame at `fps`.
    pub fn from_fps(fps: Fps, pacing: Pacing) -> ReelResult<Self> {
        Self::new(Duration::from_secs_f64(fps.frame_duration_secs()), pacing)
    }

    /// Tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Whether [`FrameTimer::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Wait for the next tick and return the time since the first one.
    ///
    /// The first tick fires immediately at zero. Returns `None` once cancelled.
    pub fn next_tick(&mut self) -> Option<Duration> {
        if self.cancelled {
            return None;
        }
        let n = u32::try_from(self.ticks).ok()?;
        let scheduled = self.interval.checked_mul(n)?;
        self.ticks += 1;
        match self.pacing {
            Pacing::Virtual => Some(scheduled),
            Pacing::RealTime => {
                let origin = *self.origin.get_or_insert_with(Instant::now);
                let now = Instant::now();
                let deadline = origin + scheduled;
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
                Some(origin.elapsed())
            }
        }
    }

    /// Stop ticking. Idempotent.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            tracing::debug!(ticks = self.ticks, "frame timer cancelled");
        }
        self.cancelled = true;
    }
}
