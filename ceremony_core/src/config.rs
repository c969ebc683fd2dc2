//! Ceremony tuning.

use std::time::Duration;

use crate::error::{CeremonyError, CeremonyResult};
use crate::mapper::ViewportRect;

/// How close the moving lamp must get to the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProximityThreshold {
    /// Fixed radius in scene pixels.
    Pixels(f32),
    /// Radius as a fraction of the viewport's shorter side.
    ViewportFraction(f32),
}

impl ProximityThreshold {
    /// Radius in pixels for the given viewport.
    pub fn resolve(&self, viewport: &ViewportRect) -> f32 {
        match *self {
            ProximityThreshold::Pixels(px) => px,
            ProximityThreshold::ViewportFraction(f) => f * viewport.min_side(),
        }
    }
}

impl Default for ProximityThreshold {
    fn default() -> Self {
        ProximityThreshold::ViewportFraction(CeremonyConfig::DEFAULT_THRESHOLD_FRACTION)
    }
}

/// What a frame without a detected hand does to an approach in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandLossPolicy {
    /// Keep the moving lamp where it was until the hand returns.
    Freeze,
    /// Treat the lost hand as a release and return to idle.
    Drop,
}

/// Tunables for the state machine, sequencer and classifier front.
#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyConfig {
    pub proximity_threshold: ProximityThreshold,
    /// Delay between lighting the lamp and revealing the blessing.
    pub blessing_delay: Duration,
    /// Distance of the spawn point above the viewport's bottom edge.
    pub start_margin: f32,
    /// Consecutive frames a gesture change must persist; 1 disables smoothing.
    pub debounce_frames: usize,
    pub hand_loss_policy: HandLossPolicy,
}

impl CeremonyConfig {
    pub const DEFAULT_THRESHOLD_FRACTION: f32 = 0.28;
    pub const DEFAULT_BLESSING_DELAY: Duration = Duration::from_millis(1500);
    pub const DEFAULT_START_MARGIN: f32 = 100.0;
    pub const MAX_DEBOUNCE_FRAMES: usize = 30;

    pub fn validate(&self) -> CeremonyResult<()> {
        match self.proximity_threshold {
            ProximityThreshold::Pixels(px) if !(px.is_finite() && px > 0.0) => {
                return Err(CeremonyError::InvalidConfig(format!(
                    "proximity threshold must be a positive pixel radius, got {px}"
                )));
            }
            ProximityThreshold::ViewportFraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(CeremonyError::InvalidConfig(format!(
                    "proximity fraction must be in (0, 1], got {f}"
                )));
            }
            _ => {}
        }
        if self.blessing_delay.is_zero() {
            return Err(CeremonyError::InvalidConfig(
                "blessing delay must be non-zero".to_string(),
            ));
        }
        if !(self.start_margin.is_finite() && self.start_margin >= 0.0) {
            return Err(CeremonyError::InvalidConfig(format!(
                "start margin must be >= 0, got {}",
                self.start_margin
            )));
        }
        if self.debounce_frames == 0 || self.debounce_frames > Self::MAX_DEBOUNCE_FRAMES {
            return Err(CeremonyError::InvalidConfig(format!(
                "debounce window must be 1..={}, got {}",
                Self::MAX_DEBOUNCE_FRAMES,
                self.debounce_frames
            )));
        }
        Ok(())
    }
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        CeremonyConfig {
            proximity_threshold: ProximityThreshold::default(),
            blessing_delay: Self::DEFAULT_BLESSING_DELAY,
            start_margin: Self::DEFAULT_START_MARGIN,
            debounce_frames: 1,
            hand_loss_policy: HandLossPolicy::Freeze,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(CeremonyConfig::default().validate().is_ok());
    }

    #[test]
    fn relative_threshold_scales_with_viewport() {
        let t = ProximityThreshold::ViewportFraction(0.25);
        assert_eq!(t.resolve(&ViewportRect::sized(1280.0, 720.0)), 180.0);
        assert_eq!(t.resolve(&ViewportRect::sized(400.0, 800.0)), 100.0);
        assert_eq!(ProximityThreshold::Pixels(80.0).resolve(&ViewportRect::sized(1.0, 1.0)), 80.0);
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = CeremonyConfig::default();
        cfg.proximity_threshold = ProximityThreshold::Pixels(-5.0);
        assert!(matches!(cfg.validate(), Err(CeremonyError::InvalidConfig(_))));

        let mut cfg = CeremonyConfig::default();
        cfg.proximity_threshold = ProximityThreshold::ViewportFraction(1.5);
        assert!(cfg.validate().is_err());

        let mut cfg = CeremonyConfig::default();
        cfg.blessing_delay = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = CeremonyConfig::default();
        cfg.debounce_frames = 0;
        assert!(cfg.validate().is_err());
    }
}
