//! # deepam_ceremony
//!
//! Reference front end for [`ceremony_core`]: a software-rendered window,
//! a hand source, and temple bells over MIDI.
//!
//! ## Ceremony
//!
//! | Hand | Phase | What you see | What you hear |
//! |---|---|---|---|
//! | Fist | idle → approaching | A small lamp appears near the bottom | |
//! | Fist, moving | approaching | The small lamp follows the hand | |
//! | Fist near the main lamp | approaching → lit | The main lamp kindles and glows | Bell arpeggio |
//! | (1.5 s later) | lit → blessing | Blessing panel fades in | Held chord |
//! | Open hand | approaching → idle | The small lamp vanishes | |
//! | `R` | any → idle | Scene returns to dark | Silence |
//!
//! ## Feature flags
//!
//! * (default): **Simulation mode**: the mouse is the hand; a 21-point hand
//!   is synthesized under the pointer and classified like a camera frame.
//! * `leap`: **Hardware mode**: polls a real LeapMotion controller via LeapC
//!   and projects its joints onto the same 21-point scheme.
//!
//! ### Simulation controls
//!
//! | Input | Gesture |
//! |---|---|
//! | Mouse | Hand position |
//! | `Space` / left button held | Fist |
//! | Pointer outside the window | No hand in view |
//! | `R` | Reset the ceremony |
//! | `Q` / `Escape` | Quit |

pub mod app;
pub mod chime;
pub mod cli;
pub mod error;
pub mod hand;
pub mod scene;
pub mod visualizer;

pub use app::{run, App, AppConfig};
pub use error::{AppError, AppResult};
