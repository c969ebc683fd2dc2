//! Session driver: the core's external surface.
//!
//! `CeremonySession` wires the classifier, mapper, state machine and
//! sequencer together. It consumes raw landmark frames, layout updates,
//! clock ticks and reset commands, carries out the machine's effects, and
//! hands phase-entry notices back to the caller for audio/visual effects.
//!
//! Every entry point has an `_at` variant taking the current [`Instant`] so
//! tests can drive time deterministically.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::CeremonyConfig;
use crate::error::{CeremonyError, CeremonyResult};
use crate::gesture::{classify, GestureDebouncer};
use crate::landmark::{FrameSize, HandLandmarks, LandmarkPoint};
use crate::machine::{CeremonyEvent, CeremonyMachine, CeremonySnapshot, Effect};
use crate::mapper::{map_to_scene, ScenePoint, ViewportRect};
use crate::phase::{CeremonyPhase, PhaseNotice};
use crate::sequencer::PhaseSequencer;

pub struct CeremonySession {
    machine: CeremonyMachine,
    sequencer: PhaseSequencer,
    debouncer: GestureDebouncer,
}

impl CeremonySession {
    pub fn new(config: CeremonyConfig) -> CeremonyResult<Self> {
        config.validate()?;
        let session = Self {
            sequencer: PhaseSequencer::new(config.blessing_delay),
            debouncer: GestureDebouncer::new(config.debounce_frames),
            machine: CeremonyMachine::new(config),
        };
        debug!(
            debounce_frames = session.debouncer.window(),
            blessing_delay_ms = session.sequencer.delay().as_millis() as u64,
            "ceremony session created"
        );
        Ok(session)
    }

    // ── inbound: layout ──────────────────────────────────────────────────

    /// Supply the viewport and target; `None` places the target at the
    /// viewport centre. An unusable rect is rejected and the previous layout
    /// kept.
    pub fn on_layout(&mut self, viewport: ViewportRect, target: Option<ScenePoint>) -> CeremonyResult<()> {
        if !viewport.is_usable() {
            return Err(CeremonyError::LayoutUnready);
        }
        let target = target.unwrap_or_else(|| viewport.center());
        debug!(
            width = viewport.width,
            height = viewport.height,
            target_x = target.x,
            target_y = target.y,
            "layout updated"
        );
        self.machine.handle(CeremonyEvent::Layout { viewport, target });
        Ok(())
    }

    // ── inbound: landmarks ───────────────────────────────────────────────

    pub fn on_landmarks(
        &mut self,
        landmarks: Option<&[LandmarkPoint]>,
        frame_width: f32,
        frame_height: f32,
    ) -> Vec<PhaseNotice> {
        self.on_landmarks_at(landmarks, frame_width, frame_height, Instant::now())
    }

    /// Process one tracker frame. `None` (or an empty set) means no hand.
    ///
    /// Malformed landmark sets are logged and count as "no hand"; frames that
    /// arrive before a usable layout are dropped entirely.
    pub fn on_landmarks_at(
        &mut self,
        landmarks: Option<&[LandmarkPoint]>,
        frame_width: f32,
        frame_height: f32,
        now: Instant,
    ) -> Vec<PhaseNotice> {
        let event = match self.frame_event(landmarks, frame_width, frame_height) {
            Ok(event) => event,
            Err(CeremonyError::LayoutUnready) => {
                debug!("landmark frame suppressed: layout not ready");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "invalid landmark frame treated as no hand");
                CeremonyEvent::HandLost
            }
        };
        self.dispatch(event, now)
    }

    fn frame_event(
        &mut self,
        landmarks: Option<&[LandmarkPoint]>,
        frame_width: f32,
        frame_height: f32,
    ) -> CeremonyResult<CeremonyEvent> {
        let points = match landmarks {
            Some(points) if !points.is_empty() => points,
            _ => return Ok(CeremonyEvent::HandLost),
        };
        let hand = HandLandmarks::from_slice(points)?;
        let frame = FrameSize::new(frame_width, frame_height)?;
        let viewport = self.machine.state().viewport();
        let position = map_to_scene(hand.hand_position(frame), frame, viewport.as_ref())?;
        let raw = classify(&hand);
        let signal = self.debouncer.update(raw);
        if signal != raw {
            debug!(raw = raw.name(), reported = signal.name(), "gesture held by debounce");
        }
        Ok(CeremonyEvent::Hand { position, signal })
    }

    // ── inbound: clock ───────────────────────────────────────────────────

    pub fn tick(&mut self) -> Vec<PhaseNotice> {
        self.tick_at(Instant::now())
    }

    /// Fire the blessing timer if it is due.
    pub fn tick_at(&mut self, now: Instant) -> Vec<PhaseNotice> {
        match self.sequencer.poll(now) {
            Some(episode) => self.dispatch(CeremonyEvent::BlessingDue { episode }, now),
            None => Vec::new(),
        }
    }

    // ── command surface ──────────────────────────────────────────────────

    pub fn reset_ceremony(&mut self) -> Vec<PhaseNotice> {
        self.reset_ceremony_at(Instant::now())
    }

    /// Return to idle from any phase. Always succeeds.
    pub fn reset_ceremony_at(&mut self, now: Instant) -> Vec<PhaseNotice> {
        self.dispatch(CeremonyEvent::Reset, now)
    }

    // ── outbound ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> CeremonySnapshot {
        self.machine.snapshot()
    }

    pub fn phase(&self) -> CeremonyPhase {
        self.machine.phase()
    }

    pub fn prompt(&self) -> &'static str {
        self.machine.phase().prompt()
    }

    pub fn config(&self) -> &CeremonyConfig {
        self.machine.config()
    }

    /// Time left before the blessing is revealed, while one is pending.
    pub fn blessing_time_remaining(&self, now: Instant) -> Option<Duration> {
        self.sequencer.time_remaining(now)
    }

    // ── effects ──────────────────────────────────────────────────────────

    fn dispatch(&mut self, event: CeremonyEvent, now: Instant) -> Vec<PhaseNotice> {
        let mut notices = Vec::new();
        for effect in self.machine.handle(event) {
            match effect {
                Effect::Notify(n) => {
                    // A fresh episode must not inherit the last one's gesture.
                    if n == PhaseNotice::EnteredIdle {
                        self.debouncer.reset();
                    }
                    notices.push(n);
                }
                Effect::ScheduleBlessing { episode } => {
                    self.sequencer.schedule(episode, now);
                }
                Effect::CancelBlessing => {
                    self.sequencer.cancel();
                }
            }
        }
        notices
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandLossPolicy;
    use crate::landmark::{
        LANDMARK_COUNT, THUMB_IP, THUMB_TIP, INDEX_PIP, INDEX_TIP, MIDDLE_PIP, MIDDLE_TIP,
        RING_PIP, RING_TIP, PINKY_PIP, PINKY_TIP,
    };

    const FW: f32 = 800.0;
    const FH: f32 = 600.0;
    const DELAY: Duration = CeremonyConfig::DEFAULT_BLESSING_DELAY;

    /// A hand with its palm centre at normalized (`nx`, `ny`); `curled`
    /// of the four fingers fold, and the thumb folds when `thumb` is set.
    fn hand(nx: f32, ny: f32, curled: usize, thumb: bool) -> Vec<LandmarkPoint> {
        let mut pts = vec![LandmarkPoint::new(nx, ny); LANDMARK_COUNT];
        pts[THUMB_IP] = LandmarkPoint::new(nx - 0.03, ny);
        pts[THUMB_TIP] = LandmarkPoint::new(if thumb { nx - 0.06 } else { nx }, ny);
        let fingers = [
            (INDEX_TIP, INDEX_PIP),
            (MIDDLE_TIP, MIDDLE_PIP),
            (RING_TIP, RING_PIP),
            (PINKY_TIP, PINKY_PIP),
        ];
        for (i, &(tip, pip)) in fingers.iter().enumerate() {
            pts[pip] = LandmarkPoint::new(nx, ny - 0.05);
            let tip_y = if i < curled { ny - 0.02 } else { ny - 0.12 };
            pts[tip] = LandmarkPoint::new(nx, tip_y);
        }
        pts
    }

    fn fist(nx: f32, ny: f32) -> Vec<LandmarkPoint> {
        hand(nx, ny, 4, false)
    }

    fn palm(nx: f32, ny: f32) -> Vec<LandmarkPoint> {
        hand(nx, ny, 0, false)
    }

    fn session() -> CeremonySession {
        let mut s = CeremonySession::new(CeremonyConfig::default()).unwrap();
        s.on_layout(ViewportRect::sized(1280.0, 720.0), None).unwrap();
        s
    }

    /// Drive a session into `lit` at `t0`.
    fn lit_session(t0: Instant) -> CeremonySession {
        let mut s = session();
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t0);
        let notices = s.on_landmarks_at(Some(&fist(0.5, 0.5)[..]), FW, FH, t0);
        assert_eq!(notices, vec![PhaseNotice::EnteredLit]);
        s
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = CeremonyConfig::default();
        cfg.debounce_frames = 0;
        assert!(CeremonySession::new(cfg).is_err());
    }

    #[test]
    fn four_of_five_curled_in_idle_starts_approach() {
        let t0 = Instant::now();
        let mut s = session();
        let notices = s.on_landmarks_at(Some(&hand(0.2, 0.3, 4, false)[..]), FW, FH, t0);
        assert_eq!(notices, vec![PhaseNotice::EnteredApproaching]);
        let snap = s.snapshot();
        assert_eq!(snap.phase, CeremonyPhase::Approaching);
        assert!(snap.moving.visible);
        assert_eq!(snap.moving.position, ScenePoint::new(640.0, 620.0));
    }

    #[test]
    fn open_hand_in_idle_stays_idle() {
        let mut s = session();
        assert!(s.on_landmarks(Some(&palm(0.5, 0.5)[..]), FW, FH).is_empty());
        assert_eq!(s.phase(), CeremonyPhase::Idle);
        assert_eq!(s.prompt(), "Make a fist to light the sacred deepam");
    }

    #[test]
    fn lamp_follows_mirrored_hand() {
        let t0 = Instant::now();
        let mut s = session();
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t0);
        s.on_landmarks_at(Some(&fist(0.75, 0.25)[..]), FW, FH, t0);
        let snap = s.snapshot();
        assert_eq!(snap.moving.position, ScenePoint::new(320.0, 180.0));
        assert_eq!(snap.hand, Some(ScenePoint::new(320.0, 180.0)));
    }

    #[test]
    fn blessing_follows_after_delay() {
        let t0 = Instant::now();
        let mut s = lit_session(t0);
        assert_eq!(s.blessing_time_remaining(t0), Some(DELAY));

        assert!(s.tick_at(t0 + DELAY - Duration::from_millis(1)).is_empty());
        assert_eq!(s.phase(), CeremonyPhase::Lit);

        assert_eq!(s.tick_at(t0 + DELAY), vec![PhaseNotice::EnteredBlessing]);
        let snap = s.snapshot();
        assert_eq!(snap.phase, CeremonyPhase::Blessing);
        assert!(snap.blessing_visible);
        assert!(snap.activated);
        assert_eq!(s.prompt(), "May the divine light bless you");
    }

    #[test]
    fn lingering_at_target_does_not_restart_timer() {
        let t0 = Instant::now();
        let mut s = lit_session(t0);
        for i in 1..=10u64 {
            let t = t0 + Duration::from_millis(100 * i);
            assert!(s.on_landmarks_at(Some(&fist(0.5, 0.5)[..]), FW, FH, t).is_empty());
        }
        // Still due at the original deadline.
        assert_eq!(s.tick_at(t0 + DELAY), vec![PhaseNotice::EnteredBlessing]);
        assert!(s.tick_at(t0 + DELAY * 3).is_empty());
    }

    #[test]
    fn release_before_target_returns_to_idle() {
        let t0 = Instant::now();
        let mut s = session();
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t0);
        s.on_landmarks_at(Some(&fist(0.9, 0.2)[..]), FW, FH, t0);
        let notices = s.on_landmarks_at(Some(&palm(0.9, 0.2)[..]), FW, FH, t0);
        assert_eq!(notices, vec![PhaseNotice::EnteredIdle]);
        assert!(!s.snapshot().moving.visible);
    }

    #[test]
    fn reset_cancels_pending_blessing() {
        let t0 = Instant::now();
        let mut s = lit_session(t0);
        let notices = s.reset_ceremony_at(t0 + Duration::from_millis(500));
        assert_eq!(notices, vec![PhaseNotice::EnteredIdle]);
        assert_eq!(s.blessing_time_remaining(t0), None);

        let before = s.snapshot();
        assert!(s.tick_at(t0 + DELAY * 2).is_empty());
        assert_eq!(s.snapshot(), before);
        assert_eq!(before.phase, CeremonyPhase::Idle);
        assert!(!before.moving.visible);
        assert!(!before.activated);
    }

    #[test]
    fn reset_from_blessing_and_light_again() {
        let t0 = Instant::now();
        let mut s = lit_session(t0);
        s.tick_at(t0 + DELAY);
        assert_eq!(s.reset_ceremony_at(t0 + DELAY), vec![PhaseNotice::EnteredIdle]);
        assert!(!s.snapshot().blessing_visible);

        let t1 = t0 + DELAY * 2;
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t1);
        assert_eq!(s.on_landmarks_at(Some(&fist(0.5, 0.5)[..]), FW, FH, t1), vec![PhaseNotice::EnteredLit]);
        assert_eq!(s.snapshot().episode, 2);
        assert_eq!(s.tick_at(t1 + DELAY), vec![PhaseNotice::EnteredBlessing]);
    }

    #[test]
    fn reset_in_idle_is_harmless() {
        let mut s = session();
        assert!(s.reset_ceremony().is_empty());
        assert_eq!(s.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn malformed_landmarks_count_as_no_hand() {
        let t0 = Instant::now();
        let mut cfg = CeremonyConfig::default();
        cfg.hand_loss_policy = HandLossPolicy::Drop;
        let mut s = CeremonySession::new(cfg).unwrap();
        s.on_layout(ViewportRect::sized(1280.0, 720.0), None).unwrap();
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t0);

        let full = fist(0.5, 0.5);
        let short = &full[..12];
        let notices = s.on_landmarks_at(Some(short), FW, FH, t0);
        assert_eq!(notices, vec![PhaseNotice::EnteredIdle]);
    }

    #[test]
    fn missing_hand_freezes_approach() {
        let t0 = Instant::now();
        let mut s = session();
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t0);
        s.on_landmarks_at(Some(&fist(0.9, 0.2)[..]), FW, FH, t0);
        let pos = s.snapshot().moving.position;
        assert!(s.on_landmarks_at(None, FW, FH, t0).is_empty());
        assert!(s.on_landmarks_at(Some(Vec::new().as_slice()), FW, FH, t0).is_empty());
        assert_eq!(s.phase(), CeremonyPhase::Approaching);
        assert_eq!(s.snapshot().moving.position, pos);
        assert_eq!(s.snapshot().hand, None);
    }

    #[test]
    fn frames_before_layout_are_suppressed() {
        let mut s = CeremonySession::new(CeremonyConfig::default()).unwrap();
        assert!(s.on_landmarks(Some(&fist(0.5, 0.5)[..]), FW, FH).is_empty());
        assert_eq!(s.snapshot().hand, None);
        assert_eq!(s.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn unusable_layout_is_rejected_and_previous_kept() {
        let mut s = session();
        let err = s.on_layout(ViewportRect::sized(0.0, 0.0), None).unwrap_err();
        assert_eq!(err, CeremonyError::LayoutUnready);
        assert_eq!(s.snapshot().target, Some(ScenePoint::new(640.0, 360.0)));
    }

    #[test]
    fn resize_re_resolves_target() {
        let t0 = Instant::now();
        let mut s = session();
        s.on_layout(ViewportRect::sized(800.0, 600.0), None).unwrap();
        assert_eq!(s.snapshot().target, Some(ScenePoint::new(400.0, 300.0)));
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t0);
        assert_eq!(s.on_landmarks_at(Some(&fist(0.5, 0.5)[..]), FW, FH, t0), vec![PhaseNotice::EnteredLit]);
    }

    #[test]
    fn debounce_absorbs_single_open_frame() {
        let t0 = Instant::now();
        let mut cfg = CeremonyConfig::default();
        cfg.debounce_frames = 3;
        let mut s = CeremonySession::new(cfg).unwrap();
        s.on_layout(ViewportRect::sized(1280.0, 720.0), None).unwrap();
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t0);
        assert_eq!(s.phase(), CeremonyPhase::Approaching);

        s.on_landmarks_at(Some(&palm(0.9, 0.8)[..]), FW, FH, t0);
        assert_eq!(s.phase(), CeremonyPhase::Approaching);
        s.on_landmarks_at(Some(&palm(0.9, 0.8)[..]), FW, FH, t0);
        s.on_landmarks_at(Some(&palm(0.9, 0.8)[..]), FW, FH, t0);
        assert_eq!(s.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn dropped_hand_returning_open_stays_idle() {
        let t0 = Instant::now();
        let mut cfg = CeremonyConfig::default();
        cfg.debounce_frames = 3;
        cfg.hand_loss_policy = HandLossPolicy::Drop;
        let mut s = CeremonySession::new(cfg).unwrap();
        s.on_layout(ViewportRect::sized(1280.0, 720.0), None).unwrap();
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t0);
        assert_eq!(s.phase(), CeremonyPhase::Approaching);

        assert_eq!(s.on_landmarks_at(None, FW, FH, t0), vec![PhaseNotice::EnteredIdle]);
        assert!(s.on_landmarks_at(Some(&palm(0.9, 0.8)[..]), FW, FH, t0).is_empty());
        assert_eq!(s.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn reset_clears_held_fist_from_debounce() {
        let t0 = Instant::now();
        let mut cfg = CeremonyConfig::default();
        cfg.debounce_frames = 3;
        let mut s = CeremonySession::new(cfg).unwrap();
        s.on_layout(ViewportRect::sized(1280.0, 720.0), None).unwrap();
        s.on_landmarks_at(Some(&fist(0.9, 0.9)[..]), FW, FH, t0);
        s.reset_ceremony_at(t0);
        assert!(s.on_landmarks_at(Some(&palm(0.9, 0.8)[..]), FW, FH, t0).is_empty());
        assert_eq!(s.phase(), CeremonyPhase::Idle);
    }
}
