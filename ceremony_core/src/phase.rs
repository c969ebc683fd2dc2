//! Ceremony phases and the legal edges between them.

/// The single active phase of the ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CeremonyPhase {
    /// Waiting for a fist.
    #[default]
    Idle,
    /// A moving lamp is following the clenched hand.
    Approaching,
    /// The main lamp has been kindled; the blessing is pending.
    Lit,
    /// Blessing revealed.
    Blessing,
}

impl CeremonyPhase {
    pub fn name(self) -> &'static str {
        match self {
            CeremonyPhase::Idle => "idle",
            CeremonyPhase::Approaching => "approaching",
            CeremonyPhase::Lit => "lit",
            CeremonyPhase::Blessing => "blessing",
        }
    }

    /// On-screen instruction for this phase.
    pub fn prompt(self) -> &'static str {
        match self {
            CeremonyPhase::Idle => "Make a fist to light the sacred deepam",
            CeremonyPhase::Approaching => "Move your hand toward the main lamp",
            CeremonyPhase::Lit => "The sacred light has been kindled",
            CeremonyPhase::Blessing => "May the divine light bless you",
        }
    }

    /// Whether `self -> next` is an edge of the ceremony graph.
    ///
    /// Forward: idle → approaching → lit → blessing. Back to idle from any
    /// other phase (cancel or reset).
    pub fn can_transition_to(self, next: CeremonyPhase) -> bool {
        use CeremonyPhase::*;
        matches!(
            (self, next),
            (Idle, Approaching)
                | (Approaching, Lit)
                | (Lit, Blessing)
                | (Approaching, Idle)
                | (Lit, Idle)
                | (Blessing, Idle)
        )
    }
}

impl std::fmt::Display for CeremonyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One-shot phase-entry signal for effect collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseNotice {
    EnteredIdle,
    EnteredApproaching,
    EnteredLit,
    EnteredBlessing,
}

impl PhaseNotice {
    pub fn for_phase(phase: CeremonyPhase) -> Self {
        match phase {
            CeremonyPhase::Idle => PhaseNotice::EnteredIdle,
            CeremonyPhase::Approaching => PhaseNotice::EnteredApproaching,
            CeremonyPhase::Lit => PhaseNotice::EnteredLit,
            CeremonyPhase::Blessing => PhaseNotice::EnteredBlessing,
        }
    }
}
