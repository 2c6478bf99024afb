//! Guidance state machine for the disk tray assembly.
//!
//! A `GuidanceSession` walks a fixed sequence of states. Each processed frame
//! updates per-label consecutive-frame counters, then the current state's
//! condition decides whether to advance and which `Cue` to hand back.

pub mod cue;
mod instruction;
mod session;
mod state;

pub use cue::Cue;
pub use instruction::{Instruction, Status};
pub use session::{GuidanceSession, SharedSession, StepOutcome, CLAMPED_MIN_CONFIDENCE};
pub use state::GuidanceState;
