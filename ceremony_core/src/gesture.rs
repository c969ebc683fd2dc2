//! Gesture classification: 21 landmarks → clenched / open.
//!
//! # Algorithm
//!
//! * **Fingers** (index, middle, ring, pinky): curled when the tip sits below
//!   its PIP joint in image space (`tip.y > pip.y`).
//! * **Thumb**: curled when the tip has folded inward past the IP joint
//!   (`tip.x < ip.x`). The thumb flexes across the palm rather than toward it,
//!   so it is tested on the other axis.
//! * **Fist**: at least [`CLENCH_MIN_CURLED`] of the five digits curled.
//!
//! [`classify`] is pure. [`GestureDebouncer`] is an opt-in extension that
//! holds the reported signal until a change has persisted for a number of
//! frames; with a window of one frame it reports the raw signal unchanged.

use crate::error::CeremonyResult;
use crate::landmark::{
    HandLandmarks, LandmarkPoint, INDEX_PIP, INDEX_TIP, MIDDLE_PIP, MIDDLE_TIP, PINKY_PIP,
    PINKY_TIP, RING_PIP, RING_TIP, THUMB_IP, THUMB_TIP,
};

/// Minimum number of curled digits for a fist.
pub const CLENCH_MIN_CURLED: usize = 3;

/// (tip, pip) pairs for the four non-thumb fingers.
const FINGER_JOINTS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

// ════════════════════════════════════════════════════════════════════════════
// GestureSignal
// ════════════════════════════════════════════════════════════════════════════

/// Per-frame binary gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureSignal {
    Clenched,
    Open,
}

impl GestureSignal {
    pub fn is_clenched(self) -> bool {
        self == GestureSignal::Clenched
    }

    pub fn name(self) -> &'static str {
        match self {
            GestureSignal::Clenched => "clenched",
            GestureSignal::Open => "open",
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Classifier
// ════════════════════════════════════════════════════════════════════════════

/// Curl state of each digit: thumb, index, middle, ring, pinky.
pub fn digit_curls(hand: &HandLandmarks) -> [bool; 5] {
    let thumb_tip = hand.point(THUMB_TIP);
    let thumb_ip = hand.point(THUMB_IP);

    let mut curls = [false; 5];
    curls[0] = thumb_tip.x < thumb_ip.x;
    for (slot, &(tip, pip)) in curls[1..].iter_mut().zip(FINGER_JOINTS.iter()) {
        *slot = hand.point(tip).y > hand.point(pip).y;
    }
    curls
}

pub fn curled_count(hand: &HandLandmarks) -> usize {
    digit_curls(hand).iter().filter(|&&c| c).count()
}

/// Classify one frame's landmarks.
pub fn classify(hand: &HandLandmarks) -> GestureSignal {
    if curled_count(hand) >= CLENCH_MIN_CURLED {
        GestureSignal::Clenched
    } else {
        GestureSignal::Open
    }
}

/// Validate a raw point slice and classify it.
///
/// Fails with an invalid-input error if the slice is not a usable 21-point
/// hand; callers treat that as "no gesture", never as [`GestureSignal::Open`].
pub fn classify_points(points: &[LandmarkPoint]) -> CeremonyResult<GestureSignal> {
    HandLandmarks::from_slice(points).map(|hand| classify(&hand))
}

// ════════════════════════════════════════════════════════════════════════════
// GestureDebouncer
// ════════════════════════════════════════════════════════════════════════════

/// Hysteresis over the raw per-frame signal.
///
/// The reported signal only flips once the opposite raw signal has been seen
/// on `window` consecutive frames. The first frame ever observed is reported
/// as-is.
#[derive(Debug, Clone)]
pub struct GestureDebouncer {
    window: usize,
    stable: Option<GestureSignal>,
    candidate: Option<GestureSignal>,
    streak: usize,
}

impl GestureDebouncer {
    /// `window` of 0 is treated as 1 (pass-through).
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            stable: None,
            candidate: None,
            streak: 0,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Feed one raw frame signal, get the debounced one.
    pub fn update(&mut self, raw: GestureSignal) -> GestureSignal {
        let stable = match self.stable {
            None => {
                self.stable = Some(raw);
                return raw;
            }
            Some(s) => s,
        };

        if raw == stable {
            self.candidate = None;
            self.streak = 0;
            return stable;
        }

        if self.candidate == Some(raw) {
            self.streak += 1;
        } else {
            self.candidate = Some(raw);
            self.streak = 1;
        }

        if self.streak >= self.window {
            self.stable = Some(raw);
            self.candidate = None;
            self.streak = 0;
            raw
        } else {
            stable
        }
    }

    pub fn reset(&mut self) {
        self.stable = None;
        self.candidate = None;
        self.streak = 0;
    }
}

impl Default for GestureDebouncer {
    fn default() -> Self {
        Self::new(1)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
