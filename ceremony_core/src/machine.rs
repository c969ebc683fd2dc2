//! Ceremony state machine.
//!
//! All ceremony state lives in one [`CeremonyState`] value. Events are applied
//! by the pure function [`transition`], which returns the next state together
//! with the [`Effect`]s the caller must carry out (arming or cancelling the
//! blessing timer, notifying effect collaborators). [`CeremonyMachine`] is the
//! thin owner that stores the state between events.
//!
//! | Current | Event | Next |
//! |---|---|---|
//! | idle | hand, clenched | approaching (lamp spawns at the start point) |
//! | approaching | hand, clenched | approaching (lamp follows), or lit when within the threshold |
//! | approaching | hand, open | idle |
//! | lit | blessing due (same episode) | blessing |
//! | any | reset | idle |

use tracing::{debug, info};

use crate::config::{CeremonyConfig, HandLossPolicy};
use crate::gesture::GestureSignal;
use crate::mapper::{ScenePoint, ViewportRect};
use crate::phase::{CeremonyPhase, PhaseNotice};

// ════════════════════════════════════════════════════════════════════════════
// State
// ════════════════════════════════════════════════════════════════════════════

/// The hand-carried lamp.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovingObjectState {
    pub position: ScenePoint,
    pub visible: bool,
}

/// Everything the ceremony knows between events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CeremonyState {
    phase: CeremonyPhase,
    moving: MovingObjectState,
    /// Last mapped hand position; `None` while no hand is tracked.
    hand: Option<ScenePoint>,
    viewport: Option<ViewportRect>,
    target: Option<ScenePoint>,
    /// Trigger guard: latched when the lamp is lit, cleared on return to idle.
    guard_latched: bool,
    /// Main lamp flame on.
    activated: bool,
    blessing_visible: bool,
    /// Incremented on every idle → approaching entry.
    episode: u64,
}

impl CeremonyState {
    pub fn phase(&self) -> CeremonyPhase {
        self.phase
    }
    pub fn moving(&self) -> MovingObjectState {
        self.moving
    }
    pub fn hand(&self) -> Option<ScenePoint> {
        self.hand
    }
    pub fn viewport(&self) -> Option<ViewportRect> {
        self.viewport
    }
    pub fn target(&self) -> Option<ScenePoint> {
        self.target
    }
    pub fn is_guard_latched(&self) -> bool {
        self.guard_latched
    }
    pub fn is_activated(&self) -> bool {
        self.activated
    }
    pub fn is_blessing_visible(&self) -> bool {
        self.blessing_visible
    }
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Where a new moving lamp appears: bottom centre, `margin` px up.
    pub fn start_position(&self, margin: f32) -> Option<ScenePoint> {
        self.viewport
            .map(|vp| ScenePoint::new(vp.width / 2.0, (vp.height - margin).max(0.0)))
    }

    /// Structural invariants tying the derived flags to the phase.
    pub fn invariants_hold(&self) -> bool {
        let lit_or_later = matches!(self.phase, CeremonyPhase::Lit | CeremonyPhase::Blessing);
        self.moving.visible == (self.phase == CeremonyPhase::Approaching)
            && self.guard_latched == lit_or_later
            && self.activated == lit_or_later
            && self.blessing_visible == (self.phase == CeremonyPhase::Blessing)
            && (self.phase != CeremonyPhase::Approaching || self.target.is_some())
    }

    pub fn snapshot(&self) -> CeremonySnapshot {
        CeremonySnapshot {
            phase: self.phase,
            moving: self.moving,
            activated: self.activated,
            blessing_visible: self.blessing_visible,
            hand: self.hand,
            target: self.target,
            viewport: self.viewport,
            episode: self.episode,
        }
    }
}

/// Read-only view handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CeremonySnapshot {
    pub phase: CeremonyPhase,
    pub moving: MovingObjectState,
    pub activated: bool,
    pub blessing_visible: bool,
    pub hand: Option<ScenePoint>,
    pub target: Option<ScenePoint>,
    pub viewport: Option<ViewportRect>,
    pub episode: u64,
}

// ════════════════════════════════════════════════════════════════════════════
// Events and effects
// ════════════════════════════════════════════════════════════════════════════

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CeremonyEvent {
    /// Viewport geometry and resolved target, on init and every resize.
    Layout {
        viewport: ViewportRect,
        target: ScenePoint,
    },
    /// One mapped frame from the hand tracker.
    Hand {
        position: ScenePoint,
        signal: GestureSignal,
    },
    /// A frame with no usable hand.
    HandLost,
    /// The sequencer's blessing timer for `episode` has elapsed.
    BlessingDue { episode: u64 },
    /// Explicit reset command.
    Reset,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Notify(PhaseNotice),
    ScheduleBlessing { episode: u64 },
    CancelBlessing,
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: CeremonyState,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn notices(&self) -> impl Iterator<Item = PhaseNotice> + '_ {
        self.effects.iter().filter_map(|e| match e {
            Effect::Notify(n) => Some(*n),
            _ => None,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// transition()
// ════════════════════════════════════════════════════════════════════════════

/// Apply `event` to `state`. Never fails; events that do not apply to the
/// current phase leave it unchanged. At most one phase change per call.
pub fn transition(
    state: &CeremonyState,
    event: CeremonyEvent,
    config: &CeremonyConfig,
) -> Transition {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        CeremonyEvent::Layout { viewport, target } => {
            next.viewport = Some(viewport);
            next.target = Some(target);
        }

        CeremonyEvent::Hand { position, signal } => {
            next.hand = Some(position);
            on_hand(&mut next, &mut effects, position, signal, config);
        }

        CeremonyEvent::HandLost => {
            next.hand = None;
            if next.phase == CeremonyPhase::Approaching {
                match config.hand_loss_policy {
                    HandLossPolicy::Freeze => {
                        debug!(episode = next.episode, "hand lost; moving lamp frozen");
                    }
                    HandLossPolicy::Drop => {
                        release(&mut next, &mut effects);
                    }
                }
            }
        }

        CeremonyEvent::BlessingDue { episode } => {
            if next.phase == CeremonyPhase::Lit && episode == next.episode {
                next.blessing_visible = true;
                enter(&mut next, &mut effects, CeremonyPhase::Blessing);
            } else {
                debug!(
                    episode,
                    current = next.episode,
                    phase = %next.phase,
                    "stale blessing timer discarded"
                );
            }
        }

        CeremonyEvent::Reset => {
            let margin = config.start_margin;
            next.moving = MovingObjectState {
                position: next.start_position(margin).unwrap_or_default(),
                visible: false,
            };
            next.guard_latched = false;
            next.activated = false;
            next.blessing_visible = false;
            effects.push(Effect::CancelBlessing);
            if next.phase != CeremonyPhase::Idle {
                enter(&mut next, &mut effects, CeremonyPhase::Idle);
            }
        }
    }

    Transition { state: next, effects }
}

fn on_hand(
    next: &mut CeremonyState,
    effects: &mut Vec<Effect>,
    position: ScenePoint,
    signal: GestureSignal,
    config: &CeremonyConfig,
) {
    match (next.phase, signal) {
        (CeremonyPhase::Idle, GestureSignal::Clenched) => {
            let start = match (next.start_position(config.start_margin), next.target) {
                (Some(start), Some(_)) => start,
                _ => {
                    debug!("clench ignored: layout not ready");
                    return;
                }
            };
            next.episode += 1;
            next.guard_latched = false;
            next.moving = MovingObjectState { position: start, visible: true };
            enter(next, effects, CeremonyPhase::Approaching);
        }

        (CeremonyPhase::Approaching, GestureSignal::Clenched) => {
            next.moving.position = position;
            check_proximity(next, effects, config);
        }

        (CeremonyPhase::Approaching, GestureSignal::Open) => {
            release(next, effects);
        }

        // Idle with an open hand, or anything after the lamp is lit:
        // only the hand cursor moves.
        _ => {}
    }
}

fn check_proximity(next: &mut CeremonyState, effects: &mut Vec<Effect>, config: &CeremonyConfig) {
    let (target, viewport) = match (next.target, next.viewport) {
        (Some(t), Some(v)) => (t, v),
        _ => {
            debug!("proximity check skipped: no target");
            return;
        }
    };
    if next.guard_latched {
        debug!(episode = next.episode, "trigger guard already latched");
        return;
    }

    let distance = next.moving.position.distance_to(&target);
    let threshold = config.proximity_threshold.resolve(&viewport);
    if distance < threshold {
        info!(episode = next.episode, distance, threshold, "lamp reached target");
        next.guard_latched = true;
        next.moving.visible = false;
        next.activated = true;
        effects.push(Effect::ScheduleBlessing { episode: next.episode });
        enter(next, effects, CeremonyPhase::Lit);
    }
}

fn release(next: &mut CeremonyState, effects: &mut Vec<Effect>) {
    next.moving.visible = false;
    next.guard_latched = false;
    enter(next, effects, CeremonyPhase::Idle);
}

fn enter(next: &mut CeremonyState, effects: &mut Vec<Effect>, phase: CeremonyPhase) {
    debug_assert!(
        next.phase.can_transition_to(phase),
        "illegal transition {} -> {}",
        next.phase,
        phase
    );
    info!(from = %next.phase, to = %phase, episode = next.episode, "ceremony phase transition");
    next.phase = phase;
    effects.push(Effect::Notify(PhaseNotice::for_phase(phase)));
}

// ════════════════════════════════════════════════════════════════════════════
// CeremonyMachine
// ════════════════════════════════════════════════════════════════════════════

/// Sole owner and writer of the ceremony state.
#[derive(Debug, Clone, Default)]
pub struct CeremonyMachine {
    state: CeremonyState,
    config: CeremonyConfig,
}

impl CeremonyMachine {
    pub fn new(config: CeremonyConfig) -> Self {
        Self { state: CeremonyState::default(), config }
    }

    /// Apply one event and return the effects the caller must carry out.
    pub fn handle(&mut self, event: CeremonyEvent) -> Vec<Effect> {
        let Transition { state, effects } = transition(&self.state, event, &self.config);
        debug_assert!(state.invariants_hold(), "invariants broken: {state:?}");
        self.state = state;
        effects
    }

    pub fn state(&self) -> &CeremonyState {
        &self.state
    }

    pub fn config(&self) -> &CeremonyConfig {
        &self.config
    }

    pub fn phase(&self) -> CeremonyPhase {
        self.state.phase
    }

    pub fn snapshot(&self) -> CeremonySnapshot {
        self.state.snapshot()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProximityThreshold;
    use proptest::prelude::*;

    const VP: ViewportRect = ViewportRect::sized(1280.0, 720.0);
    const TARGET: ScenePoint = ScenePoint::new(640.0, 360.0);
    const FAR: ScenePoint = ScenePoint::new(100.0, 100.0);

    fn machine() -> CeremonyMachine {
        let mut m = CeremonyMachine::new(CeremonyConfig::default());
        m.handle(CeremonyEvent::Layout { viewport: VP, target: TARGET });
        m
    }

    fn clench(at: ScenePoint) -> CeremonyEvent {
        CeremonyEvent::Hand { position: at, signal: GestureSignal::Clenched }
    }

    fn open(at: ScenePoint) -> CeremonyEvent {
        CeremonyEvent::Hand { position: at, signal: GestureSignal::Open }
    }

    fn lit_machine() -> CeremonyMachine {
        let mut m = machine();
        m.handle(clench(FAR));
        m.handle(clench(TARGET));
        assert_eq!(m.phase(), CeremonyPhase::Lit);
        m
    }

    #[test]
    fn starts_idle_and_hidden() {
        let m = CeremonyMachine::default();
        assert_eq!(m.phase(), CeremonyPhase::Idle);
        assert!(!m.state().moving().visible);
        assert!(m.state().invariants_hold());
    }

    #[test]
    fn clench_in_idle_spawns_lamp_at_start() {
        let mut m = machine();
        let effects = m.handle(clench(FAR));
        assert_eq!(m.phase(), CeremonyPhase::Approaching);
        let moving = m.state().moving();
        assert!(moving.visible);
        assert_eq!(moving.position, ScenePoint::new(640.0, 620.0));
        assert_eq!(effects, vec![Effect::Notify(PhaseNotice::EnteredApproaching)]);
        assert_eq!(m.state().episode(), 1);
    }

    #[test]
    fn clench_before_layout_is_ignored() {
        let mut m = CeremonyMachine::default();
        let effects = m.handle(clench(FAR));
        assert!(effects.is_empty());
        assert_eq!(m.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn open_hand_in_idle_only_moves_cursor() {
        let mut m = machine();
        assert!(m.handle(open(FAR)).is_empty());
        assert_eq!(m.phase(), CeremonyPhase::Idle);
        assert_eq!(m.state().hand(), Some(FAR));
    }

    #[test]
    fn lamp_follows_clenched_hand() {
        let mut m = machine();
        m.handle(clench(FAR));
        m.handle(clench(ScenePoint::new(200.0, 150.0)));
        assert_eq!(m.phase(), CeremonyPhase::Approaching);
        assert_eq!(m.state().moving().position, ScenePoint::new(200.0, 150.0));
    }

    #[test]
    fn reaching_target_lights_exactly_once() {
        let mut m = machine();
        m.handle(clench(FAR));
        let effects = m.handle(clench(TARGET));
        assert_eq!(m.phase(), CeremonyPhase::Lit);
        assert_eq!(
            effects,
            vec![
                Effect::ScheduleBlessing { episode: 1 },
                Effect::Notify(PhaseNotice::EnteredLit),
            ]
        );
        assert!(m.state().is_activated());
        assert!(!m.state().moving().visible);

        // Lingering at the target does not fire again.
        for _ in 0..10 {
            assert!(m.handle(clench(TARGET)).is_empty());
        }
        assert_eq!(m.phase(), CeremonyPhase::Lit);
    }

    #[test]
    fn threshold_is_strict() {
        let mut cfg = CeremonyConfig::default();
        cfg.proximity_threshold = ProximityThreshold::Pixels(100.0);
        let mut m = CeremonyMachine::new(cfg);
        m.handle(CeremonyEvent::Layout { viewport: VP, target: TARGET });
        m.handle(clench(FAR));
        m.handle(clench(ScenePoint::new(740.0, 360.0)));
        assert_eq!(m.phase(), CeremonyPhase::Approaching);
        m.handle(clench(ScenePoint::new(739.0, 360.0)));
        assert_eq!(m.phase(), CeremonyPhase::Lit);
    }

    #[test]
    fn spawn_frame_does_not_trigger() {
        // Threshold so large the spawn point is already inside it.
        let mut cfg = CeremonyConfig::default();
        cfg.proximity_threshold = ProximityThreshold::ViewportFraction(1.0);
        let mut m = CeremonyMachine::new(cfg);
        m.handle(CeremonyEvent::Layout { viewport: VP, target: TARGET });
        m.handle(clench(TARGET));
        assert_eq!(m.phase(), CeremonyPhase::Approaching);
        m.handle(clench(TARGET));
        assert_eq!(m.phase(), CeremonyPhase::Lit);
    }

    #[test]
    fn release_far_from_target_returns_to_idle() {
        let mut m = machine();
        m.handle(clench(FAR));
        m.handle(clench(ScenePoint::new(300.0, 300.0)));
        let effects = m.handle(open(ScenePoint::new(300.0, 300.0)));
        assert_eq!(m.phase(), CeremonyPhase::Idle);
        assert!(!m.state().moving().visible);
        assert!(!m.state().is_guard_latched());
        assert_eq!(effects, vec![Effect::Notify(PhaseNotice::EnteredIdle)]);
    }

    #[test]
    fn release_then_new_episode_can_light_again() {
        let mut m = machine();
        m.handle(clench(FAR));
        m.handle(open(FAR));
        m.handle(clench(FAR));
        assert_eq!(m.state().episode(), 2);
        m.handle(clench(TARGET));
        assert_eq!(m.phase(), CeremonyPhase::Lit);
    }

    #[test]
    fn blessing_due_for_current_episode_reveals_blessing() {
        let mut m = lit_machine();
        let effects = m.handle(CeremonyEvent::BlessingDue { episode: 1 });
        assert_eq!(m.phase(), CeremonyPhase::Blessing);
        assert!(m.state().is_blessing_visible());
        assert_eq!(effects, vec![Effect::Notify(PhaseNotice::EnteredBlessing)]);
    }

    #[test]
    fn stale_blessing_due_is_discarded() {
        let mut m = lit_machine();
        assert!(m.handle(CeremonyEvent::BlessingDue { episode: 0 }).is_empty());
        assert_eq!(m.phase(), CeremonyPhase::Lit);

        m.handle(CeremonyEvent::Reset);
        assert!(m.handle(CeremonyEvent::BlessingDue { episode: 1 }).is_empty());
        assert_eq!(m.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn reset_from_every_phase_yields_clean_idle() {
        let setups: [fn() -> CeremonyMachine; 4] = [
            machine,
            || {
                let mut m = machine();
                m.handle(clench(FAR));
                m
            },
            lit_machine,
            || {
                let mut m = lit_machine();
                m.handle(CeremonyEvent::BlessingDue { episode: 1 });
                m
            },
        ];
        for setup in setups {
            let mut m = setup();
            let was_idle = m.phase() == CeremonyPhase::Idle;
            let effects = m.handle(CeremonyEvent::Reset);
            assert_eq!(m.phase(), CeremonyPhase::Idle);
            assert!(!m.state().moving().visible);
            assert!(!m.state().is_activated());
            assert!(!m.state().is_blessing_visible());
            assert!(!m.state().is_guard_latched());
            assert!(effects.contains(&Effect::CancelBlessing));
            assert_eq!(
                effects.contains(&Effect::Notify(PhaseNotice::EnteredIdle)),
                !was_idle
            );
            assert!(m.state().invariants_hold());
        }
    }

    #[test]
    fn hand_lost_freezes_by_default() {
        let mut m = machine();
        m.handle(clench(FAR));
        m.handle(clench(ScenePoint::new(300.0, 500.0)));
        m.handle(CeremonyEvent::HandLost);
        assert_eq!(m.phase(), CeremonyPhase::Approaching);
        assert_eq!(m.state().moving().position, ScenePoint::new(300.0, 500.0));
        assert_eq!(m.state().hand(), None);
    }

    #[test]
    fn hand_lost_drops_when_configured() {
        let mut cfg = CeremonyConfig::default();
        cfg.hand_loss_policy = HandLossPolicy::Drop;
        let mut m = CeremonyMachine::new(cfg);
        m.handle(CeremonyEvent::Layout { viewport: VP, target: TARGET });
        m.handle(clench(FAR));
        m.handle(CeremonyEvent::HandLost);
        assert_eq!(m.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn layout_change_moves_target() {
        let mut m = machine();
        let vp = ViewportRect::sized(800.0, 600.0);
        m.handle(CeremonyEvent::Layout { viewport: vp, target: vp.center() });
        assert_eq!(m.state().target(), Some(ScenePoint::new(400.0, 300.0)));
        m.handle(clench(FAR));
        assert_eq!(m.state().moving().position, ScenePoint::new(400.0, 500.0));
    }

    #[test]
    fn transition_is_pure() {
        let m = machine();
        let before = m.state().clone();
        let t = transition(&before, clench(FAR), m.config());
        assert_eq!(m.state(), &before);
        assert_eq!(t.state.phase(), CeremonyPhase::Approaching);
        assert_eq!(t.notices().collect::<Vec<_>>(), vec![PhaseNotice::EnteredApproaching]);
    }

    fn any_event() -> impl Strategy<Value = CeremonyEvent> {
        let point = (0.0f32..1280.0, 0.0f32..720.0).prop_map(|(x, y)| ScenePoint::new(x, y));
        prop_oneof![
            (200.0f32..2000.0, 200.0f32..2000.0).prop_map(|(w, h)| {
                let viewport = ViewportRect::sized(w, h);
                CeremonyEvent::Layout { viewport, target: viewport.center() }
            }),
            (point, any::<bool>()).prop_map(|(position, fist)| CeremonyEvent::Hand {
                position,
                signal: if fist { GestureSignal::Clenched } else { GestureSignal::Open },
            }),
            Just(TARGET).prop_map(clench),
            Just(CeremonyEvent::HandLost),
            (0u64..4).prop_map(|episode| CeremonyEvent::BlessingDue { episode }),
            Just(CeremonyEvent::Reset),
        ]
    }

    proptest! {
        #[test]
        fn random_streams_keep_invariants(
            events in prop::collection::vec(any_event(), 1..64),
            drop_on_loss in any::<bool>(),
        ) {
            let mut cfg = CeremonyConfig::default();
            if drop_on_loss {
                cfg.hand_loss_policy = HandLossPolicy::Drop;
            }
            let mut m = CeremonyMachine::new(cfg);
            for event in events {
                let before = m.phase();
                m.handle(event);
                let after = m.phase();
                prop_assert!(m.state().invariants_hold(), "{:?}", m.state());
                prop_assert!(before == after || before.can_transition_to(after),
                    "{before} -> {after} on {event:?}");
            }
        }
    }
}
