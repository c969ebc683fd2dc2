//! Hand landmark model.
//!
//! A detected hand is 21 normalized keypoints in the standard anatomical
//! order (wrist, then four joints for each digit from thumb to pinky).
//! `x` and `y` are fractions of the sensor frame; `y` grows downward.

use crate::error::{CeremonyError, CeremonyResult};

// ════════════════════════════════════════════════════════════════════════════
// Landmark indices
// ════════════════════════════════════════════════════════════════════════════

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Landmark used as the hand's reference position (middle-finger MCP).
pub const PALM_CENTER: usize = MIDDLE_MCP;

// ════════════════════════════════════════════════════════════════════════════
// Points and frames
// ════════════════════════════════════════════════════════════════════════════

/// One normalized keypoint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Sensor frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSize {
    pub width: f32,
    pub height: f32,
}

impl FrameSize {
    /// Validated constructor; both sides must be finite and positive.
    pub fn new(width: f32, height: f32) -> CeremonyResult<Self> {
        let ok = |v: f32| v.is_finite() && v > 0.0;
        if ok(width) && ok(height) {
            Ok(Self { width, height })
        } else {
            Err(CeremonyError::InvalidFrame { width, height })
        }
    }
}

/// A point in sensor-frame pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPoint {
    pub x: f32,
    pub y: f32,
}

// ════════════════════════════════════════════════════════════════════════════
// HandLandmarks
// ════════════════════════════════════════════════════════════════════════════

/// A validated set of exactly 21 landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    points: [LandmarkPoint; LANDMARK_COUNT],
}

impl HandLandmarks {
    /// Build from a fixed-size array, rejecting non-finite coordinates.
    pub fn new(points: [LandmarkPoint; LANDMARK_COUNT]) -> CeremonyResult<Self> {
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(CeremonyError::NonFiniteLandmark { index });
        }
        Ok(Self { points })
    }

    /// Build from a slice of any length; anything but 21 points is rejected.
    pub fn from_slice(points: &[LandmarkPoint]) -> CeremonyResult<Self> {
        let array: [LandmarkPoint; LANDMARK_COUNT] =
            points.try_into().map_err(|_| CeremonyError::WrongLandmarkCount {
                expected: LANDMARK_COUNT,
                actual: points.len(),
            })?;
        Self::new(array)
    }

    pub fn point(&self, index: usize) -> LandmarkPoint {
        self.points[index]
    }

    pub fn points(&self) -> &[LandmarkPoint; LANDMARK_COUNT] {
        &self.points
    }

    /// The palm-centre landmark projected into sensor pixel space.
    pub fn hand_position(&self, frame: FrameSize) -> SensorPoint {
        let p = self.points[PALM_CENTER];
        SensorPoint {
            x: p.x * frame.width,
            y: p.y * frame.height,
        }
    }
}

impl TryFrom<&[LandmarkPoint]> for HandLandmarks {
    type Error = CeremonyError;

    fn try_from(points: &[LandmarkPoint]) -> CeremonyResult<Self> {
        Self::from_slice(points)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
