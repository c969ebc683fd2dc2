//! Sensor space → scene space.
//!
//! The sensor feed is mirrored relative to the user, so the horizontal axis
//! is flipped; the vertical axis is scaled only. The mapper keeps no state:
//! the current viewport is passed on every call, so a resize takes effect on
//! the very next frame.

use crate::error::{CeremonyError, CeremonyResult};
use crate::landmark::{FrameSize, SensorPoint};

/// A point in rendering-surface pixels, relative to the viewport origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScenePoint {
    pub x: f32,
    pub y: f32,
}

impl ScenePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance_to(&self, other: &ScenePoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Rendering surface geometry in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Viewport anchored at the origin.
    pub const fn sized(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// True when the rect has a finite, positive extent.
    pub fn is_usable(&self) -> bool {
        let ok = |v: f32| v.is_finite() && v > 0.0;
        ok(self.width) && ok(self.height)
    }

    /// Centre of the viewport in viewport-local coordinates.
    pub fn center(&self) -> ScenePoint {
        ScenePoint::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

/// Map a sensor-space point onto the viewport.
///
/// Fails with [`CeremonyError::LayoutUnready`] when no usable viewport is
/// available, and with an invalid-frame error when the frame has no extent.
pub fn map_to_scene(
    point: SensorPoint,
    frame: FrameSize,
    viewport: Option<&ViewportRect>,
) -> CeremonyResult<ScenePoint> {
    let viewport = match viewport {
        Some(v) if v.is_usable() => v,
        _ => return Err(CeremonyError::LayoutUnready),
    };
    // FrameSize::new already validates, but the fields are public.
    let frame = FrameSize::new(frame.width, frame.height)?;

    Ok(ScenePoint {
        x: viewport.width - (point.x / frame.width) * viewport.width,
        y: (point.y / frame.height) * viewport.height,
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame() -> FrameSize {
        FrameSize::new(800.0, 600.0).unwrap()
    }

    #[test]
    fn horizontal_axis_is_mirrored() {
        let vp = ViewportRect::sized(1280.0, 720.0);
        let left = map_to_scene(SensorPoint { x: 0.0, y: 0.0 }, frame(), Some(&vp)).unwrap();
        let right = map_to_scene(SensorPoint { x: 800.0, y: 600.0 }, frame(), Some(&vp)).unwrap();
        assert_eq!(left, ScenePoint::new(1280.0, 0.0));
        assert_eq!(right, ScenePoint::new(0.0, 720.0));
    }

    #[test]
    fn sensor_center_maps_to_viewport_center() {
        let vp = ViewportRect::sized(1280.0, 720.0);
        let p = map_to_scene(SensorPoint { x: 400.0, y: 300.0 }, frame(), Some(&vp)).unwrap();
        assert_eq!(p, vp.center());
    }

    #[test]
    fn missing_viewport_is_layout_unready() {
        let err = map_to_scene(SensorPoint { x: 1.0, y: 1.0 }, frame(), None).unwrap_err();
        assert_eq!(err, CeremonyError::LayoutUnready);

        let zero = ViewportRect::sized(0.0, 720.0);
        let err = map_to_scene(SensorPoint { x: 1.0, y: 1.0 }, frame(), Some(&zero)).unwrap_err();
        assert_eq!(err, CeremonyError::LayoutUnready);
    }

    #[test]
    fn zero_frame_is_invalid_input() {
        let vp = ViewportRect::sized(100.0, 100.0);
        let bad = FrameSize { width: 0.0, height: 600.0 };
        let err = map_to_scene(SensorPoint { x: 1.0, y: 1.0 }, bad, Some(&vp)).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn mapping_follows_resize() {
        let p = SensorPoint { x: 200.0, y: 150.0 };
        let small = map_to_scene(p, frame(), Some(&ViewportRect::sized(400.0, 300.0))).unwrap();
        let large = map_to_scene(p, frame(), Some(&ViewportRect::sized(1600.0, 1200.0))).unwrap();
        assert_eq!(small, ScenePoint::new(300.0, 75.0));
        assert_eq!(large, ScenePoint::new(1200.0, 300.0));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = ScenePoint::new(0.0, 0.0);
        let b = ScenePoint::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }

    proptest! {
        #[test]
        fn mirroring_is_symmetric_about_midline(
            dx in 0.0f32..400.0,
            y in 0.0f32..600.0,
            w in 100.0f32..4000.0,
            h in 100.0f32..4000.0,
        ) {
            let vp = ViewportRect::sized(w, h);
            let a = map_to_scene(SensorPoint { x: 400.0 - dx, y }, frame(), Some(&vp)).unwrap();
            let b = map_to_scene(SensorPoint { x: 400.0 + dx, y }, frame(), Some(&vp)).unwrap();
            let mid = w / 2.0;
            prop_assert!(((a.x - mid) + (b.x - mid)).abs() < 1e-2);
            prop_assert!((a.y - b.y).abs() < 1e-3);
        }
    }
}
