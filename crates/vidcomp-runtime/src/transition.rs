//! Transition progress ramp.
//!
//! Progress is derived from wall time elapsed since `start`, so it does not depend on frame rate
//! or on how often the render thread ticks. The ramp never runs on its own: the owner calls
//! `tick` once per rendered frame.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct TransitionRamp {
    duration: Duration,
    started_at: Option<Instant>,
    progress: f32,
}

impl TransitionRamp {
    /// Non-finite or negative durations are treated as zero (instant completion).
    pub fn from_secs(secs: f32) -> Self {
        let secs = if secs.is_finite() { secs.clamp(0.0, 1.0e9) } else { 0.0 };
        Self::new(Duration::from_secs_f32(secs))
    }

    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started_at: None,
            progress: 0.0,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Restart the ramp at 0 from `now`.
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.progress = 0.0;
    }

    /// Freeze the ramp at its current progress.
    pub fn stop(&mut self) {
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Advance to `now` and return the new progress.
    ///
    /// Progress is clamped to [0, 1] and never decreases while running, even if `now` goes
    /// backwards relative to a previous tick.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let Some(start) = self.started_at else {
            return self.progress;
        };

        let p = if self.duration.is_zero() {
            1.0
        } else {
            let elapsed = now.saturating_duration_since(start);
            (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
        };

        self.progress = self.progress.max(p);
        if self.progress >= 1.0 {
            self.started_at = None;
        }
        self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_ramp_stays_at_zero() {
        let mut r = TransitionRamp::from_secs(2.0);
        assert_eq!(r.tick(Instant::now()), 0.0);
        assert!(!r.is_running());
    }

    #[test]
    fn progress_is_linear_and_clamped() {
        let t0 = Instant::now();
        let mut r = TransitionRamp::from_secs(2.0);
        r.start(t0);

        let half = r.tick(t0 + Duration::from_secs(1));
        assert!((half - 0.5).abs() < 1e-4, "{half}");

        assert_eq!(r.tick(t0 + Duration::from_secs(10)), 1.0);
        assert!(r.is_complete());
        assert!(!r.is_running());
    }

    #[test]
    fn progress_never_decreases() {
        let t0 = Instant::now();
        let mut r = TransitionRamp::from_secs(4.0);
        r.start(t0);
        let later = r.tick(t0 + Duration::from_secs(3));
        let earlier = r.tick(t0 + Duration::from_secs(1));
        assert_eq!(later, earlier);
    }

    #[test]
    fn zero_and_nan_durations_complete_immediately() {
        for secs in [0.0, -3.0, f32::NAN] {
            let t0 = Instant::now();
            let mut r = TransitionRamp::from_secs(secs);
            r.start(t0);
            assert_eq!(r.tick(t0), 1.0, "duration {secs}");
        }
    }

    #[test]
    fn restart_resets_progress() {
        let t0 = Instant::now();
        let mut r = TransitionRamp::from_secs(1.0);
        r.start(t0);
        r.tick(t0 + Duration::from_secs(5));
        r.start(t0 + Duration::from_secs(5));
        assert_eq!(r.progress(), 0.0);
        assert!(r.is_running());
    }
}
