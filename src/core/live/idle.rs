//! Caller silence detection.
//!
//! The detector decides when exactly one stream-end marker is owed upstream.
//! It starts `Quiescent` since there is nothing to end before the first chunk.

use std::time::Duration;
use tokio::time::Instant;

/// Detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdleState {
    /// Audio has arrived since the last stream-end.
    Active { last_audio: Instant },
    /// No audio pending an end marker.
    Quiescent,
}

#[derive(Debug, Clone)]
pub struct IdleDetector {
    window: Duration,
    state: IdleState,
}

impl IdleDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: IdleState::Quiescent,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, IdleState::Active { .. })
    }

    /// How long to wait for audio before the next tick is due.
    ///
    /// While quiescent there is nothing to end, so a full window is returned.
    pub fn time_until_due(&self, now: Instant) -> Duration {
        match self.state {
            IdleState::Active { last_audio } => {
                (last_audio + self.window).saturating_duration_since(now)
            }
            IdleState::Quiescent => self.window,
        }
    }

    /// Record an inbound chunk.
    pub fn on_audio(&mut self, now: Instant) {
        self.state = IdleState::Active { last_audio: now };
    }

    /// Returns `true` exactly once per silence period, when the window has
    /// elapsed since the last chunk.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        match self.state {
            IdleState::Active { last_audio }
                if now.saturating_duration_since(last_audio) >= self.window =>
            {
                self.state = IdleState::Quiescent;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(1000);

    #[test]
    fn test_time_until_due() {
        let start = Instant::now();
        let mut detector = IdleDetector::new(WINDOW);
        assert_eq!(detector.time_until_due(start), WINDOW);

        detector.on_audio(start);
        assert_eq!(
            detector.time_until_due(start + Duration::from_millis(400)),
            Duration::from_millis(600)
        );
        assert_eq!(
            detector.time_until_due(start + Duration::from_secs(3)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_starts_quiescent_and_never_fires_without_audio() {
        let start = Instant::now();
        let mut detector = IdleDetector::new(WINDOW);
        assert!(!detector.is_active());
        assert!(!detector.on_tick(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_fires_once_after_window() {
        let start = Instant::now();
        let mut detector = IdleDetector::new(WINDOW);

        detector.on_audio(start);
        detector.on_audio(start + Duration::from_millis(300));

        assert!(!detector.on_tick(start + Duration::from_millis(1000)));
        assert!(!detector.on_tick(start + Duration::from_millis(1299)));
        assert!(detector.on_tick(start + Duration::from_millis(1300)));
        assert!(!detector.is_active());

        assert!(!detector.on_tick(start + Duration::from_millis(2300)));
        assert!(!detector.on_tick(start + Duration::from_millis(5000)));
    }

    #[test]
    fn test_new_audio_rearms() {
        let start = Instant::now();
        let mut detector = IdleDetector::new(WINDOW);

        detector.on_audio(start);
        assert!(detector.on_tick(start + WINDOW));

        detector.on_audio(start + Duration::from_millis(3000));
        assert!(detector.is_active());
        assert!(detector.on_tick(start + Duration::from_millis(4000)));
    }
}
