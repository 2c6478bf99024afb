use std::fmt;

use serde::{Deserialize, Serialize};

/// Steps of the disk tray assembly, in the only order they can be visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceState {
    Start,
    Nothing,
    Lever,
    Dangling,
    Cap,
    Assembled,
    Pin,
    Clamped,
    Finished,
}

impl GuidanceState {
    pub const ORDER: [GuidanceState; 9] = [
        GuidanceState::Start,
        GuidanceState::Nothing,
        GuidanceState::Lever,
        GuidanceState::Dangling,
        GuidanceState::Cap,
        GuidanceState::Assembled,
        GuidanceState::Pin,
        GuidanceState::Clamped,
        GuidanceState::Finished,
    ];

    /// The state that follows this one, `None` once finished.
    pub fn next(self) -> Option<GuidanceState> {
        let idx = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    /// Consecutive frames the advance condition has to hold.
    pub fn debounce(self) -> u32 {
        match self {
            GuidanceState::Nothing | GuidanceState::Lever => 3,
            GuidanceState::Pin => 2,
            GuidanceState::Finished => 0,
            _ => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GuidanceState::Start => "start",
            GuidanceState::Nothing => "nothing",
            GuidanceState::Lever => "lever",
            GuidanceState::Dangling => "dangling",
            GuidanceState::Cap => "cap",
            GuidanceState::Assembled => "assembled",
            GuidanceState::Pin => "pin",
            GuidanceState::Clamped => "clamped",
            GuidanceState::Finished => "finished",
        }
    }
}

impl fmt::Display for GuidanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
