use heapless::Vec;

use crate::tca9548a::{Channel, CHANNEL_COUNT};

/// Default distance under which the object counts as on the goal line.
pub const DEFAULT_THRESHOLD_CM: f32 = 2.0;

/// Emitted once when a latch goes from clear to detected.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GoalEvent {
    pub channel: Channel,
    pub distance_cm: f32,
}

/// Hysteresis latch: set when the distance drops under the threshold, cleared
/// only once it is back at or above it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoalLatch {
    detected: bool,
}

impl GoalLatch {
    pub fn is_detected(&self) -> bool {
        self.detected
    }

    /// Returns `true` only on the clear -> detected edge.
    pub fn update(&mut self, distance_cm: f32, threshold_cm: f32) -> bool {
        if distance_cm < threshold_cm {
            let rising = !self.detected;
            self.detected = true;
            rising
        } else {
            // NaN compares false both ways and leaves the latch as it was
            if distance_cm >= threshold_cm {
                self.detected = false;
            }
            false
        }
    }
}

/// One latch per detection channel.
#[derive(Debug, Clone)]
pub struct GoalDetector {
    threshold_cm: f32,
    latches: Vec<(Channel, GoalLatch), CHANNEL_COUNT>,
}

impl GoalDetector {
    pub fn new(channels: &[Channel], threshold_cm: f32) -> Self {
        let mut latches: Vec<(Channel, GoalLatch), CHANNEL_COUNT> = Vec::new();
        for &channel in channels {
            if latches.iter().any(|(c, _)| *c == channel) {
                continue;
            }
            // At most CHANNEL_COUNT distinct channels exist, so this cannot overflow.
            let _ = latches.push((channel, GoalLatch::default()));
        }
        GoalDetector {
            threshold_cm,
            latches,
        }
    }

    pub fn threshold_cm(&self) -> f32 {
        self.threshold_cm
    }

    /// `None` when `channel` is not a detection channel.
    pub fn is_detected(&self, channel: Channel) -> Option<bool> {
        self.latches
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, latch)| latch.is_detected())
    }

    /// Feeds one distance reading. Non-detection channels are ignored.
    pub fn observe(&mut self, channel: Channel, distance_cm: f32) -> Option<GoalEvent> {
        let threshold = self.threshold_cm;
        let (_, latch) = self.latches.iter_mut().find(|(c, _)| *c == channel)?;
        latch
            .update(distance_cm, threshold)
            .then_some(GoalEvent {
                channel,
                distance_cm,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: u8) -> Channel {
        Channel::new(id).unwrap()
    }

    #[test]
    fn latch_fires_once_while_close() {
        let mut latch = GoalLatch::default();
        assert!(latch.update(1.0, 2.0));
        assert!(!latch.update(0.5, 2.0));
        assert!(!latch.update(1.9, 2.0));
        assert!(latch.is_detected());
    }

    #[test]
    fn latch_resets_silently_at_threshold() {
        let mut latch = GoalLatch::default();
        assert!(latch.update(1.0, 2.0));
        assert!(!latch.update(2.0, 2.0));
        assert!(!latch.is_detected());
        assert!(latch.update(1.5, 2.0));
    }

    #[test]
    fn infinite_distance_clears() {
        let mut latch = GoalLatch::default();
        latch.update(0.1, 2.0);
        assert!(!latch.update(f32::INFINITY, 2.0));
        assert!(!latch.is_detected());
    }

    #[test]
    fn detector_only_tracks_goal_channels() {
        let mut detector = GoalDetector::new(&[ch(5)], DEFAULT_THRESHOLD_CM);
        assert_eq!(detector.observe(ch(1), 0.5), None);
        assert_eq!(detector.is_detected(ch(1)), None);

        let event = detector.observe(ch(5), 0.5);
        assert_eq!(
            event,
            Some(GoalEvent {
                channel: ch(5),
                distance_cm: 0.5
            })
        );
        assert_eq!(detector.is_detected(ch(5)), Some(true));
        assert_eq!(detector.observe(ch(5), 0.7), None);
    }

    #[test]
    fn detector_latches_are_independent() {
        let mut detector = GoalDetector::new(&[ch(4), ch(5), ch(5)], 3.0);
        assert!(detector.observe(ch(4), 1.0).is_some());
        assert_eq!(detector.is_detected(ch(5)), Some(false));
        assert!(detector.observe(ch(5), 1.0).is_some());
        detector.observe(ch(4), 10.0);
        assert_eq!(detector.is_detected(ch(4)), Some(false));
        assert_eq!(detector.is_detected(ch(5)), Some(true));
    }
}
