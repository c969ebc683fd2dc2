//! Top-level application state.
//!
//! `App` owns the `CeremonySession`, the decorative `SceneState` and the
//! `Chime`. It turns landmark-source events into session calls, carries
//! phase notices out to the bells, and hands the renderer a view each frame.

use std::sync::mpsc::{self, TryRecvError};
use std::time::Instant;

use ceremony_core::{CeremonyConfig, CeremonyPhase, CeremonySession, PhaseNotice, ViewportRect};
use tracing::{debug, info};

use crate::chime::{Chime, ChimeConfig, TUBULAR_BELLS};
use crate::error::{AppError, AppResult};
use crate::hand::{spawn_into, SimHandSource, SimInput, SourceEvent};
use crate::scene::{SceneState, STAR_COUNT};
use crate::visualizer::{RenderView, Visualizer};

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub ceremony: CeremonyConfig,
    pub window_width: usize,
    pub window_height: usize,
    pub instrument: u8,
    pub velocity: u8,
    pub channel: u8,
    /// Skip MIDI entirely.
    pub mute: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            ceremony: CeremonyConfig::default(),
            window_width: 1280,
            window_height: 720,
            instrument: TUBULAR_BELLS,
            velocity: 96,
            channel: 0,
            mute: false,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(AppError::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        if self.instrument > 127 || self.velocity > 127 {
            return Err(AppError::Config("instrument and velocity must be 0–127".to_string()));
        }
        if self.channel > 15 {
            return Err(AppError::Config(format!("MIDI channel must be 0–15, got {}", self.channel)));
        }
        self.ceremony.validate()?;
        Ok(())
    }

    pub fn chime(&self) -> ChimeConfig {
        ChimeConfig { instrument: self.instrument, velocity: self.velocity, channel: self.channel }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// App
// ════════════════════════════════════════════════════════════════════════════

pub struct App {
    session: CeremonySession,
    scene: SceneState,
    chime: Option<Chime>,

    /// Window size the session's layout was last built from.
    layout: Option<(usize, usize)>,
    last_tick: Option<Instant>,

    pub status: String,
}

impl App {
    pub fn new(ceremony: CeremonyConfig, chime: Option<Chime>) -> AppResult<Self> {
        Ok(App {
            session: CeremonySession::new(ceremony)?,
            scene: SceneState::new(STAR_COUNT, &mut rand::thread_rng()),
            chime,
            layout: None,
            last_tick: None,
            status: "Ready".to_string(),
        })
    }

    // ── layout ───────────────────────────────────────────────────────────

    /// Rebuild the layout if the window size changed. The main lamp sits at
    /// the centre of the window.
    pub fn resize(&mut self, width: usize, height: usize) -> AppResult<()> {
        if self.layout == Some((width, height)) {
            return Ok(());
        }
        self.session.on_layout(ViewportRect::sized(width as f32, height as f32), None)?;
        info!(width, height, "layout");
        self.layout = Some((width, height));
        Ok(())
    }

    // ── process one SourceEvent ──────────────────────────────────────────

    /// Returns false when the application should quit.
    pub fn handle_source(&mut self, event: SourceEvent, now: Instant) -> bool {
        let notices = match event {
            SourceEvent::Frame(frame) => {
                self.session
                    .on_landmarks_at(frame.landmarks.as_deref(), frame.frame_width, frame.frame_height, now)
            }
            SourceEvent::Reset => {
                info!("reset requested");
                self.session.reset_ceremony_at(now)
            }
            SourceEvent::Quit => return false,
        };
        self.announce(&notices);
        true
    }

    // ── per-frame tick ───────────────────────────────────────────────────

    pub fn tick(&mut self, now: Instant) {
        let notices = self.session.tick_at(now);
        self.announce(&notices);

        let dt = self.last_tick.map_or(0.0, |t| now.saturating_duration_since(t).as_secs_f32());
        self.last_tick = Some(now);
        self.scene.tick(dt, &self.session.snapshot());

        self.status = self.status_line(now);
    }

    fn announce(&mut self, notices: &[PhaseNotice]) {
        for &notice in notices {
            debug!(?notice, "phase notice");
            if let Some(chime) = &self.chime {
                chime.notify(notice);
            }
        }
    }

    fn status_line(&self, now: Instant) -> String {
        let snap = self.session.snapshot();
        match snap.phase {
            CeremonyPhase::Idle => match snap.hand {
                Some(_) => "Hand in view".to_string(),
                None => "Waiting for a hand".to_string(),
            },
            CeremonyPhase::Approaching => match snap.target {
                Some(target) => {
                    let d = snap.moving.position.distance_to(&target);
                    let r = self.threshold().unwrap_or(0.0);
                    format!("Carrying the flame: {d:.0} px to the lamp (within {r:.0} lights it)")
                }
                None => "Carrying the flame".to_string(),
            },
            CeremonyPhase::Lit => match self.session.blessing_time_remaining(now) {
                Some(left) => format!("Lamp lit: blessing in {:.1} s", left.as_secs_f32()),
                None => "Lamp lit".to_string(),
            },
            CeremonyPhase::Blessing => format!("Blessing shown (ceremony {})", snap.episode),
        }
    }

    // ── accessors for the render loop ────────────────────────────────────

    pub fn phase(&self) -> CeremonyPhase {
        self.session.phase()
    }

    pub fn session(&self) -> &CeremonySession {
        &self.session
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    /// Proximity radius in pixels for the current layout.
    pub fn threshold(&self) -> Option<f32> {
        let viewport = self.session.snapshot().viewport?;
        Some(self.session.config().proximity_threshold.resolve(&viewport))
    }

    pub fn hint(&self) -> &'static str {
        match self.phase() {
            CeremonyPhase::Idle => "Position your hand in front of the camera and clench your fist",
            CeremonyPhase::Approaching => "Keep your fist closed and bring the flame to the ring",
            CeremonyPhase::Lit | CeremonyPhase::Blessing => "Press R to begin again",
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// This is the entry point called from `main.rs`. It creates the visualizer,
/// the landmark source (simulation by default, hardware with `--features
/// leap`), the chime, and drives the event/render loop at ~60 fps.
pub fn run(cfg: AppConfig) -> AppResult<()> {
    cfg.validate()?;

    // ── Landmark sources ─────────────────────────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let (source_tx, source_rx) = mpsc::channel::<SourceEvent>();

    #[cfg(not(feature = "leap"))]
    spawn_into(SimHandSource::new(sim_rx), source_tx);

    #[cfg(feature = "leap")]
    {
        spawn_into(SimHandSource::keys_only(sim_rx), source_tx.clone());
        spawn_into(crate::hand::LeapHandSource, source_tx);
    }

    // ── Visualizer (owns the window and the sim input sender) ────────────
    let mut vis = Visualizer::new(cfg.window_width, cfg.window_height, sim_tx)?;

    // ── App state ─────────────────────────────────────────────────────────
    let chime = (!cfg.mute).then(|| Chime::spawn(cfg.chime()));
    let mut app = App::new(cfg.ceremony.clone(), chime)?;

    // ── Main loop ─────────────────────────────────────────────────────────
    while vis.is_open() {
        // 1. Follow window resizes
        let (w, h) = vis.size();
        app.resize(w, h)?;

        // 2. Poll window input → SimInput
        if !vis.poll_input() {
            break;
        }

        // 3. Drain landmark events
        let now = Instant::now();
        loop {
            match source_rx.try_recv() {
                Ok(event) => {
                    if !app.handle_source(event, now) {
                        return Ok(());
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        // 4. Per-frame logic
        app.tick(now);

        // 5. Render
        let snapshot = app.session().snapshot();
        vis.render(&RenderView {
            snapshot: &snapshot,
            scene: app.scene(),
            prompt: app.session().prompt(),
            hint: app.hint(),
            status: &app.status,
            threshold: app.threshold(),
        });
    }

    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{pointer_to_normalized, synthesize_hand, HandFrame};
    use std::time::Duration;

    const W: usize = 1280;
    const H: usize = 720;

    fn make_app() -> App {
        let mut app = App::new(CeremonyConfig::default(), None).unwrap();
        app.resize(W, H).unwrap();
        app
    }

    /// A sim frame with the hand under window pixel (`x`, `y`).
    fn at(x: f32, y: f32, fist: bool) -> SourceEvent {
        let (nx, ny) = pointer_to_normalized(x, y, W as f32, H as f32);
        SourceEvent::Frame(HandFrame::hand(synthesize_hand(nx, ny, fist)))
    }

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_options_are_rejected() {
        let cfg = AppConfig { channel: 16, ..AppConfig::default() };
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));

        let cfg = AppConfig { window_width: 0, ..AppConfig::default() };
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));

        let mut cfg = AppConfig::default();
        cfg.ceremony.debounce_frames = 0;
        assert!(matches!(cfg.validate(), Err(AppError::Core(_))));
    }

    #[test]
    fn fist_then_centre_lights_the_lamp() {
        let t0 = Instant::now();
        let mut app = make_app();
        assert!(app.handle_source(at(100.0, 600.0, true), t0));
        assert_eq!(app.phase(), CeremonyPhase::Approaching);
        app.handle_source(at(640.0, 360.0, true), t0);
        assert_eq!(app.phase(), CeremonyPhase::Lit);
    }

    #[test]
    fn blessing_after_delay_via_tick() {
        let t0 = Instant::now();
        let mut app = make_app();
        app.handle_source(at(100.0, 600.0, true), t0);
        app.handle_source(at(640.0, 360.0, true), t0);

        app.tick(t0 + Duration::from_millis(500));
        assert_eq!(app.phase(), CeremonyPhase::Lit);
        assert!(app.status.starts_with("Lamp lit: blessing in 1.0"), "{}", app.status);

        app.tick(t0 + CeremonyConfig::DEFAULT_BLESSING_DELAY);
        assert_eq!(app.phase(), CeremonyPhase::Blessing);
        assert_eq!(app.hint(), "Press R to begin again");
    }

    #[test]
    fn open_hand_cancels_approach() {
        let t0 = Instant::now();
        let mut app = make_app();
        app.handle_source(at(100.0, 600.0, true), t0);
        app.handle_source(at(100.0, 600.0, false), t0);
        assert_eq!(app.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn reset_and_quit_events() {
        let t0 = Instant::now();
        let mut app = make_app();
        app.handle_source(at(100.0, 600.0, true), t0);
        app.handle_source(at(640.0, 360.0, true), t0);
        assert!(app.handle_source(SourceEvent::Reset, t0));
        assert_eq!(app.phase(), CeremonyPhase::Idle);

        // Cancelled timer never fires.
        app.tick(t0 + Duration::from_secs(5));
        assert_eq!(app.phase(), CeremonyPhase::Idle);

        assert!(!app.handle_source(SourceEvent::Quit, t0));
    }

    #[test]
    fn resize_moves_target_and_threshold() {
        let mut app = make_app();
        let before = app.threshold().unwrap();
        app.resize(800, 600).unwrap();
        let snap = app.session().snapshot();
        assert_eq!(snap.target.map(|p| (p.x, p.y)), Some((400.0, 300.0)));
        assert!(app.threshold().unwrap() < before);
    }

    #[test]
    fn frames_before_first_resize_do_nothing() {
        let mut app = App::new(CeremonyConfig::default(), None).unwrap();
        app.handle_source(at(640.0, 360.0, true), Instant::now());
        assert_eq!(app.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn empty_frame_keeps_approach_frozen() {
        let t0 = Instant::now();
        let mut app = make_app();
        app.handle_source(at(100.0, 600.0, true), t0);
        app.handle_source(SourceEvent::Frame(HandFrame::empty()), t0);
        assert_eq!(app.phase(), CeremonyPhase::Approaching);
        app.tick(t0);
        assert!(app.status.starts_with("Carrying the flame"), "{}", app.status);
    }

    #[test]
    fn scene_glow_follows_lamp() {
        let t0 = Instant::now();
        let mut app = make_app();
        app.tick(t0);
        app.handle_source(at(100.0, 600.0, true), t0);
        app.handle_source(at(640.0, 360.0, true), t0);
        app.tick(t0 + Duration::from_millis(1000));
        assert!(app.scene().glow > 0.4);
    }
}
