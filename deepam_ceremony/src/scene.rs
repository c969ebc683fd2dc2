//! Scene animation state.
//!
//! Everything here is decoration: twinkling stars, the main lamp's bob and
//! glow, flame flicker and the blessing fade-in. It reads the ceremony
//! snapshot each frame but never feeds anything back into it.

use ceremony_core::CeremonySnapshot;
use rand::Rng;

// ════════════════════════════════════════════════════════════════════════════
// Color helpers
// ════════════════════════════════════════════════════════════════════════════

/// Convert HSV → packed ARGB (0xAARRGGBB, A=0xFF).
pub fn hsv_to_argb(h: f32, s: f32, v: f32) -> u32 {
    let h = h.rem_euclid(360.0);
    let hi = (h / 60.0) as u32;
    let f = h / 60.0 - hi as f32;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match hi {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let ri = (r.clamp(0.0, 1.0) * 255.0) as u32;
    let gi = (g.clamp(0.0, 1.0) * 255.0) as u32;
    let bi = (b.clamp(0.0, 1.0) * 255.0) as u32;
    0xFF000000 | (ri << 16) | (gi << 8) | bi
}

/// Flame colour; `heat` 0.0 is the deep orange edge, 1.0 the pale core.
pub fn flame_color(heat: f32) -> u32 {
    let heat = heat.clamp(0.0, 1.0);
    hsv_to_argb(22.0 + 32.0 * heat, 0.95 - 0.7 * heat, 1.0)
}

// ════════════════════════════════════════════════════════════════════════════
// Star
// ════════════════════════════════════════════════════════════════════════════

/// A background star at a normalized position.
#[derive(Clone, Debug, PartialEq)]
pub struct Star {
    pub x: f32,
    pub y: f32,
    /// Twinkle phase offset, radians.
    pub phase: f32,
    /// Twinkle period, seconds.
    pub period: f32,
}

impl Star {
    /// Brightness in 0.3–1.0 at scene time `t`.
    pub fn brightness(&self, t: f32) -> f32 {
        let w = std::f32::consts::TAU * t / self.period + self.phase;
        0.65 + 0.35 * w.sin()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SceneState
// ════════════════════════════════════════════════════════════════════════════

pub const STAR_COUNT: usize = 50;

/// Seconds for the main lamp's glow to reach full size.
const GLOW_RISE_SECS: f32 = 2.0;
/// Seconds for the blessing panel to fade in.
const BLESSING_FADE_SECS: f32 = 1.0;
/// Period of the main lamp's float, seconds.
const BOB_PERIOD: f32 = 4.0;
/// Float amplitude, pixels.
const BOB_AMPLITUDE: f32 = 10.0;

#[derive(Debug)]
pub struct SceneState {
    pub stars: Vec<Star>,
    /// Seconds since the scene started.
    pub time: f32,
    /// Main lamp glow, 0.0 (dark) – 1.0 (full).
    pub glow: f32,
    /// Blessing panel opacity, 0.0 – 1.0.
    pub blessing: f32,
}

impl SceneState {
    pub fn new<R: Rng>(star_count: usize, rng: &mut R) -> Self {
        let stars = (0..star_count)
            .map(|_| Star {
                x: rng.gen_range(0.0..1.0),
                y: rng.gen_range(0.0..1.0),
                phase: rng.gen_range(0.0..std::f32::consts::TAU),
                period: rng.gen_range(2.0..5.0),
            })
            .collect();
        SceneState { stars, time: 0.0, glow: 0.0, blessing: 0.0 }
    }

    /// Advance by `dt` seconds toward what `snap` shows.
    pub fn tick(&mut self, dt: f32, snap: &CeremonySnapshot) {
        let dt = dt.max(0.0);
        self.time += dt;

        self.glow = if snap.activated {
            (self.glow + dt / GLOW_RISE_SECS).min(1.0)
        } else {
            // Snuffed quickly on reset.
            (self.glow - dt * 4.0).max(0.0)
        };

        self.blessing = if snap.blessing_visible {
            (self.blessing + dt / BLESSING_FADE_SECS).min(1.0)
        } else {
            0.0
        };
    }

    /// Vertical offset of the main lamp, pixels (negative is up).
    pub fn bob(&self) -> f32 {
        let w = std::f32::consts::TAU * self.time / BOB_PERIOD;
        -BOB_AMPLITUDE * (0.5 - 0.5 * w.cos())
    }

    /// Flame height multiplier around 1.0.
    pub fn flicker(&self) -> f32 {
        1.0 + 0.08 * (self.time * 17.0).sin() + 0.05 * (self.time * 29.0 + 1.3).sin()
    }

    /// Eased glow for rendering (ease-out).
    pub fn glow_eased(&self) -> f32 {
        1.0 - (1.0 - self.glow).powi(3)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
