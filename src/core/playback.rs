//! Generic player autoplay recovery
//!
//! A blocked autoplay is retried once with the player muted. Any further
//! failure leaves the player waiting for a click.

use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackFailure {
    /// Browser refused unmuted autoplay
    AutoplayBlocked,
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackDecision {
    /// Try `play()` again with the given mute state
    Retry { muted: bool },
    /// Give up; show the click-to-play affordance
    AwaitUserGesture,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackAttempt {
    pub muted: bool,
    retried: bool,
    pub playing: bool,
}

impl PlaybackAttempt {
    pub fn new(muted: bool) -> Self {
        Self {
            muted,
            retried: false,
            playing: false,
        }
    }

    pub fn on_playing(&mut self) {
        self.playing = true;
    }

    pub fn on_failure(&mut self, failure: PlaybackFailure) -> PlaybackDecision {
        self.playing = false;
        match failure {
            PlaybackFailure::AutoplayBlocked if !self.retried => {
                debug!("Autoplay blocked, retrying muted");
                self.retried = true;
                self.muted = true;
                PlaybackDecision::Retry { muted: true }
            }
            PlaybackFailure::AutoplayBlocked => PlaybackDecision::AwaitUserGesture,
            PlaybackFailure::Other(reason) => {
                warn!(reason = %reason, "Playback failed");
                PlaybackDecision::AwaitUserGesture
            }
        }
    }

    /// Explicit click: unmuted playback is allowed from here on
    pub fn on_user_gesture(&mut self) -> PlaybackDecision {
        self.retried = false;
        PlaybackDecision::Retry { muted: self.muted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autoplay_block_retries_muted_once() {
        let mut p = PlaybackAttempt::new(false);
        assert_eq!(
            p.on_failure(PlaybackFailure::AutoplayBlocked),
            PlaybackDecision::Retry { muted: true }
        );
        assert!(p.muted);
        assert_eq!(
            p.on_failure(PlaybackFailure::AutoplayBlocked),
            PlaybackDecision::AwaitUserGesture
        );
    }

    #[test]
    fn test_other_failure_waits_for_click() {
        let mut p = PlaybackAttempt::new(false);
        assert_eq!(
            p.on_failure(PlaybackFailure::Other("decode".into())),
            PlaybackDecision::AwaitUserGesture
        );
        assert!(!p.muted);
    }

    #[test]
    fn test_gesture_resets_retry() {
        let mut p = PlaybackAttempt::new(false);
        p.on_failure(PlaybackFailure::AutoplayBlocked);
        p.on_failure(PlaybackFailure::AutoplayBlocked);
        assert_eq!(p.on_user_gesture(), PlaybackDecision::Retry { muted: true });
        p.on_playing();
        assert!(p.playing);
    }
}
