//! # ceremony_core
//!
//! The logic behind the virtual deepam lighting ceremony. A hand tracker
//! reports 21 landmarks per frame; a clenched fist picks up a small lamp,
//! the lamp follows the hand, and bringing it to the main lamp kindles the
//! flame and, after a short pause, reveals the blessing.
//!
//! ## Pipeline
//!
//! ```text
//! landmarks ─▶ gesture::classify ─▶ mapper::map_to_scene ─▶ machine::transition ─▶ sequencer
//!                    (clenched?)          (mirror + scale)       (phase, guard)        (lit → blessing)
//! ```
//!
//! [`session::CeremonySession`] owns the whole pipeline and is the only type
//! a front end needs.
//!
//! ## Phases
//!
//! | Phase | Entered when | Leaves on |
//! |---|---|---|
//! | `idle` | start, release, reset | fist |
//! | `approaching` | fist while idle | open hand → idle, target reached → lit |
//! | `lit` | lamp within the proximity threshold | blessing delay → blessing, reset |
//! | `blessing` | delay elapsed | reset |
//!
//! ## Quick start
//!
//! ```rust
//! use ceremony_core::{CeremonyConfig, CeremonySession, ViewportRect, CeremonyPhase};
//!
//! let mut session = CeremonySession::new(CeremonyConfig::default()).unwrap();
//! session.on_layout(ViewportRect::sized(1280.0, 720.0), None).unwrap();
//!
//! // No hand in view: nothing happens.
//! assert!(session.on_landmarks(None, 800.0, 600.0).is_empty());
//! assert_eq!(session.phase(), CeremonyPhase::Idle);
//! ```

pub mod config;
pub mod error;
pub mod gesture;
pub mod landmark;
pub mod machine;
pub mod mapper;
pub mod phase;
pub mod sequencer;
pub mod session;

pub use config::{CeremonyConfig, HandLossPolicy, ProximityThreshold};
pub use error::{CeremonyError, CeremonyResult};
pub use gesture::{classify, classify_points, GestureDebouncer, GestureSignal};
pub use landmark::{FrameSize, HandLandmarks, LandmarkPoint, SensorPoint, LANDMARK_COUNT};
pub use machine::{
    transition, CeremonyEvent, CeremonyMachine, CeremonySnapshot, CeremonyState, Effect,
    MovingObjectState, Transition,
};
pub use mapper::{map_to_scene, ScenePoint, ViewportRect};
pub use phase::{CeremonyPhase, PhaseNotice};
pub use sequencer::PhaseSequencer;
pub use session::CeremonySession;
