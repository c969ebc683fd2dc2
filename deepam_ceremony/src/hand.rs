//! Landmark sources: LeapMotion hardware and mouse/keyboard simulation.
//!
//! The public interface is [`SourceEvent`] delivered over a `mpsc` channel.
//! Consumers don't need to know whether a hand came from real hardware or
//! was synthesized from the pointer; either way it arrives as 21 normalized
//! landmarks and goes through the same classifier.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use ceremony_core::landmark::*;
use ceremony_core::LandmarkPoint;

/// Dimensions of the virtual sensor frame landmarks are reported against.
pub const SENSOR_WIDTH: f32 = 640.0;
pub const SENSOR_HEIGHT: f32 = 480.0;

// ════════════════════════════════════════════════════════════════════════════
// SourceEvent
// ════════════════════════════════════════════════════════════════════════════

/// One tracker frame: the landmarks of the first detected hand, or nothing.
#[derive(Clone, Debug, PartialEq)]
pub struct HandFrame {
    pub landmarks: Option<Vec<LandmarkPoint>>,
    pub frame_width: f32,
    pub frame_height: f32,
}

impl HandFrame {
    pub fn hand(landmarks: Vec<LandmarkPoint>) -> Self {
        HandFrame { landmarks: Some(landmarks), frame_width: SENSOR_WIDTH, frame_height: SENSOR_HEIGHT }
    }

    pub fn empty() -> Self {
        HandFrame { landmarks: None, frame_width: SENSOR_WIDTH, frame_height: SENSOR_HEIGHT }
    }
}

/// Event emitted by a landmark source.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    Frame(HandFrame),
    /// Return the ceremony to idle.
    Reset,
    /// Quit the application.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource trait: unified interface for hw and sim
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`SourceEvent`]s over a channel.
pub trait LandmarkSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>);
}

// ════════════════════════════════════════════════════════════════════════════
// Spawn helpers
// ════════════════════════════════════════════════════════════════════════════

/// Spawn a landmark source on its own thread and return the receiving end.
pub fn spawn_landmark_source<S: LandmarkSource>(source: S) -> Receiver<SourceEvent> {
    let (tx, rx) = mpsc::channel();
    spawn_into(source, tx);
    rx
}

/// Spawn a source that feeds an existing channel, so several sources can
/// share one receiver.
pub fn spawn_into<S: LandmarkSource>(source: S, tx: Sender<SourceEvent>) -> JoinHandle<()> {
    thread::spawn(move || Box::new(source).run(tx))
}

// ════════════════════════════════════════════════════════════════════════════
// Synthetic hand geometry
// ════════════════════════════════════════════════════════════════════════════

/// Half-width of the synthetic hand in normalized units.
const HAND_SCALE: f32 = 0.06;

/// Horizontal offsets of the four finger columns from the palm centre, in
/// hand-scale units (index, middle, ring, pinky).
const FINGER_COLUMNS: [(usize, f32); 4] = [(INDEX_MCP, 0.45), (MIDDLE_MCP, 0.0), (RING_MCP, -0.4), (PINKY_MCP, -0.75)];

/// Build a 21-point hand whose palm centre sits at normalized (`nx`, `ny`).
///
/// Open: fingers point up and the thumb reaches outward. Clenched: every
/// fingertip folds below its PIP joint and the thumb tucks across the palm.
pub fn synthesize_hand(nx: f32, ny: f32, clenched: bool) -> Vec<LandmarkPoint> {
    let s = HAND_SCALE;
    let at = |dx: f32, dy: f32| LandmarkPoint::new(nx + dx * s, ny + dy * s);
    let mut pts = vec![LandmarkPoint::default(); LANDMARK_COUNT];

    pts[WRIST] = at(0.0, 1.3);

    pts[THUMB_CMC] = at(0.4, 0.9);
    pts[THUMB_MCP] = at(0.7, 0.55);
    pts[THUMB_IP] = at(0.95, 0.25);
    pts[THUMB_TIP] = if clenched { at(0.5, 0.1) } else { at(1.25, 0.0) };

    // MCP, PIP, DIP, TIP are consecutive indices for every finger.
    for &(mcp, dx) in &FINGER_COLUMNS {
        pts[mcp] = at(dx, 0.0);
        pts[mcp + 1] = at(dx, -0.6);
        if clenched {
            pts[mcp + 2] = at(dx, -0.35);
            pts[mcp + 3] = at(dx, -0.15);
        } else {
            pts[mcp + 2] = at(dx, -1.0);
            pts[mcp + 3] = at(dx, -1.35);
        }
    }
    pts
}

/// Convert a window pointer position to the normalized camera coordinate
/// that maps back onto it.
///
/// The mapper mirrors horizontally, as a selfie camera does, so the
/// simulated camera sees the pointer flipped.
pub fn pointer_to_normalized(x: f32, y: f32, width: f32, height: f32) -> (f32, f32) {
    let w = width.max(1.0);
    let h = height.max(1.0);
    ((1.0 - x / w).clamp(0.0, 1.0), (y / h).clamp(0.0, 1.0))
}

// ════════════════════════════════════════════════════════════════════════════
// LeapHandSource: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Horizontal half-range of the tracked volume, mm.
const LEAP_X_RANGE: f32 = 200.0;
/// Depth half-range of the tracked volume, mm.
const LEAP_Z_RANGE: f32 = 150.0;

/// Project a LeapMotion joint onto the virtual camera.
///
/// The camera looks down on the device: x runs across, z (toward the user)
/// runs down the frame. Extended fingers point away from the user, so their
/// tips sit above their PIP joints exactly as they do in a camera image.
/// The x axis is flipped to cancel the mapper's mirror.
pub fn project_leap_joint(x: f32, z: f32) -> LandmarkPoint {
    LandmarkPoint::new(
        1.0 - (x + LEAP_X_RANGE) / (2.0 * LEAP_X_RANGE),
        (z + LEAP_Z_RANGE) / (2.0 * LEAP_Z_RANGE),
    )
}

/// Landmark source backed by a real LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Each tracking frame's first hand is converted joint by joint into the
/// 21-point scheme; frames with no hand are forwarded as empty.
#[cfg(feature = "leap")]
#[derive(Default)]
pub struct LeapHandSource;

#[cfg(feature = "leap")]
impl LandmarkSource for LeapHandSource {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>) {
        use leaprs::*;
        use tracing::{error, info};

        let mut connection = match Connection::create(ConnectionConfig::default()) {
            Ok(c) => c,
            Err(e) => {
                error!(error = ?e, "failed to create LeapC connection");
                return;
            }
        };
        if let Err(e) = connection.open() {
            error!(error = ?e, "failed to open LeapMotion device");
            return;
        }
        info!("LeapMotion connection open");

        loop {
            let msg = match connection.poll(100) {
                Ok(m) => m,
                Err(_) => continue,
            };

            if let Event::Tracking(frame) = msg.event() {
                let out = match frame.hands().next() {
                    Some(hand) => HandFrame::hand(leap_landmarks(&hand)),
                    None => HandFrame::empty(),
                };
                if tx.send(SourceEvent::Frame(out)).is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(feature = "leap")]
fn leap_landmarks(hand: &leaprs::Hand) -> Vec<LandmarkPoint> {
    let mut pts = vec![LandmarkPoint::default(); LANDMARK_COUNT];
    // Digits arrive thumb first; first landmark index of each chain.
    const CHAIN_START: [usize; 5] = [THUMB_CMC, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

    for (digit, &start) in hand.digits().zip(CHAIN_START.iter()) {
        let joints = [
            digit.proximal().prev_joint(),
            digit.intermediate().prev_joint(),
            digit.distal().prev_joint(),
            digit.distal().next_joint(),
        ];
        for (k, j) in joints.iter().enumerate() {
            pts[start + k] = project_leap_joint(j.x, j.z);
        }
        if start == MIDDLE_MCP {
            let base = digit.metacarpal().prev_joint();
            pts[WRIST] = project_leap_joint(base.x, base.z);
        }
    }
    pts
}

// ════════════════════════════════════════════════════════════════════════════
// SimHandSource: mouse/keyboard simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    /// Pointer position inside a window of the given size.
    Pointer { x: f32, y: f32, width: f32, height: f32 },
    /// Pointer left the window: the hand is out of view.
    PointerLost,
    /// Space held (`true`) or released.
    Grip(bool),
    Reset,
    Quit,
}

/// Landmark source driven by [`SimInput`] events (from the visualizer's
/// window).
///
/// Every pointer update becomes a synthesized hand at the pointer, clenched
/// while the grip is held. With `track_pointer` off only the reset and quit
/// keys are forwarded, which lets the keyboard ride alongside a hardware
/// source.
pub struct SimHandSource {
    pub rx: Receiver<SimInput>,
    pub track_pointer: bool,
}

impl SimHandSource {
    pub fn new(rx: Receiver<SimInput>) -> Self {
        SimHandSource { rx, track_pointer: true }
    }

    pub fn keys_only(rx: Receiver<SimInput>) -> Self {
        SimHandSource { rx, track_pointer: false }
    }
}

impl LandmarkSource for SimHandSource {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>) {
        let SimHandSource { rx, track_pointer } = *self;
        let mut grip = false;
        let mut pointer: Option<(f32, f32)> = None;

        for input in rx {
            let event = match input {
                SimInput::Reset => SourceEvent::Reset,
                SimInput::Quit => {
                    let _ = tx.send(SourceEvent::Quit);
                    return;
                }
                _ if !track_pointer => continue,
                SimInput::Pointer { x, y, width, height } => {
                    pointer = Some(pointer_to_normalized(x, y, width, height));
                    sim_frame(pointer, grip)
                }
                SimInput::PointerLost => {
                    pointer = None;
                    sim_frame(pointer, grip)
                }
                SimInput::Grip(held) => {
                    if held == grip {
                        continue;
                    }
                    grip = held;
                    sim_frame(pointer, grip)
                }
            };
            if tx.send(event).is_err() {
                return;
            }
        }
    }
}

fn sim_frame(pointer: Option<(f32, f32)>, grip: bool) -> SourceEvent {
    let frame = match pointer {
        Some((nx, ny)) => HandFrame::hand(synthesize_hand(nx, ny, grip)),
        None => HandFrame::empty(),
    };
    SourceEvent::Frame(frame)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
