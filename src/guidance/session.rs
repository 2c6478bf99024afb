use std::sync::{Arc, Mutex};

use crate::detect::{DetectedObject, Label, LabelCounts};
use crate::geometry::{best_by_label, check_dangling, check_tray_vertical};

use super::cue::{self, Cue};
use super::state::GuidanceState;

/// Confidence a `clamped` detection must exceed to finish the task.
pub const CLAMPED_MIN_CONFIDENCE: f32 = 0.9;

/// Session handle shared by every connection of the server.
///
/// Frames from different connections are serialized by the lock but are not
/// isolated from each other: they all drive the same assembly.
pub type SharedSession = Arc<Mutex<GuidanceSession>>;

/// What one processed frame did to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Moved to the next state; `cue` is the instruction for it.
    Advanced {
        from: GuidanceState,
        to: GuidanceState,
        cue: Cue,
    },
    /// Stayed put but has something to say (corrective or re-prompt).
    Reissued { state: GuidanceState, cue: Cue },
    /// Nothing new.
    Unchanged { state: GuidanceState },
}

impl StepOutcome {
    pub fn cue(&self) -> Option<&Cue> {
        match self {
            StepOutcome::Advanced { cue, .. } | StepOutcome::Reissued { cue, .. } => Some(cue),
            StepOutcome::Unchanged { .. } => None,
        }
    }

    /// State of the session after the step.
    pub fn state(&self) -> GuidanceState {
        match self {
            StepOutcome::Advanced { to, .. } => *to,
            StepOutcome::Reissued { state, .. } | StepOutcome::Unchanged { state } => *state,
        }
    }
}

/// Progress through one physical assembly.
///
/// `counters[label]` is the number of consecutive non-empty frames, up to the
/// latest one, in which `label` appeared at least once.
#[derive(Clone, Debug)]
pub struct GuidanceSession {
    state: GuidanceState,
    counters: LabelCounts,
}

impl Default for GuidanceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GuidanceSession {
    pub fn new() -> Self {
        Self::resume_at(GuidanceState::Start)
    }

    /// A session already at `state`, with all counters at zero.
    pub fn resume_at(state: GuidanceState) -> Self {
        Self {
            state,
            counters: LabelCounts::default(),
        }
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> GuidanceState {
        self.state
    }

    pub fn counter(&self, label: Label) -> u32 {
        self.counters[label]
    }

    pub fn counters(&self) -> &LabelCounts {
        &self.counters
    }

    /// Feed one frame's detections and return what changed.
    pub fn step(&mut self, objects: &[DetectedObject]) -> StepOutcome {
        if self.state == GuidanceState::Start {
            return self.advance(cue::PUT_TRAY);
        }

        if objects.is_empty() {
            self.counters.reset();
            return self.unchanged();
        }

        let counts = LabelCounts::tally(objects);
        for (label, count) in counts.iter() {
            if count > 0 {
                self.counters[label] = self.counters[label].saturating_add(1);
            } else {
                self.counters[label] = 0;
            }
        }

        match self.state {
            GuidanceState::Nothing if self.counters[Label::Tray] == self.state.debounce() => {
                self.advance(cue::SHOW_LEVER)
            }
            GuidanceState::Lever if self.counters[Label::Lever] == self.state.debounce() => {
                self.advance(cue::ATTACH_LEVER)
            }
            GuidanceState::Dangling => self.step_dangling(objects, &counts),
            GuidanceState::Cap if counts[Label::Arc] == 1 && counts[Label::Pin] == 1 => {
                self.advance(cue::ASSEMBLE_CAP)
            }
            GuidanceState::Assembled if counts[Label::Assembled] == 1 => {
                self.advance(cue::CHECK_PIN)
            }
            GuidanceState::Pin => self.step_pin(),
            GuidanceState::Clamped
                if best_by_label(objects, Label::Clamped)
                    .is_some_and(|obj| obj.confidence > CLAMPED_MIN_CONFIDENCE) =>
            {
                self.advance(cue::FINISHED)
            }
            _ => self.unchanged(),
        }
    }

    /// A frame that could not be decoded: seen as an empty view, but it never
    /// starts the session.
    pub fn step_unreadable(&mut self) -> StepOutcome {
        if self.state == GuidanceState::Start {
            return self.unchanged();
        }
        self.step(&[])
    }

    fn step_dangling(&mut self, objects: &[DetectedObject], counts: &LabelCounts) -> StepOutcome {
        if counts[Label::Tray] != 1 {
            return self.unchanged();
        }
        match check_tray_vertical(objects) {
            Ok(true) => {}
            Ok(false) => return self.unchanged(),
            Err(err) => {
                log::debug!("tray verticality not evaluated: {}", err);
                return self.unchanged();
            }
        }
        if counts[Label::Lever] != 1 && counts[Label::LeverSide] != 1 {
            return self.unchanged();
        }
        match check_dangling(objects) {
            Ok(true) => self.advance(cue::FIND_CAP),
            Ok(false) => {
                log::info!("lever misplaced, repeating dangling guidance");
                StepOutcome::Reissued {
                    state: self.state,
                    cue: cue::LEVER_MISPLACED,
                }
            }
            Err(err) => {
                log::debug!("dangling check not evaluated: {}", err);
                self.unchanged()
            }
        }
    }

    /// Slotpin is checked first so a frame that satisfies both advances.
    fn step_pin(&mut self) -> StepOutcome {
        if self.counters[Label::SlotPin] == self.state.debounce() {
            return self.advance(cue::CLOSE_LEVER);
        }
        if self.counters[Label::Pin] == self.state.debounce() {
            return StepOutcome::Reissued {
                state: self.state,
                cue: cue::PLACE_PIN,
            };
        }
        self.unchanged()
    }

    fn advance(&mut self, cue: Cue) -> StepOutcome {
        let from = self.state;
        let Some(to) = from.next() else {
            return self.unchanged();
        };
        self.state = to;
        log::info!("guidance state {} -> {}", from, to);
        StepOutcome::Advanced { from, to, cue }
    }

    fn unchanged(&self) -> StepOutcome {
        StepOutcome::Unchanged { state: self.state }
    }
}
