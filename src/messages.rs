// Message types exchanged with the panel

use serde::{Deserialize, Serialize};

// Configuration change from panel -> runtime, applied at the start of the next cycle
// Tagged by "op", e.g. {"op":"nudge_target","index":1,"direction":"up"}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ConfigCommand {
    TogglePower { index: usize },
    ToggleLeadership { index: usize },
    ToggleReversed { index: usize },
    CycleGearset { index: usize },
    NudgeTarget { index: usize, direction: NudgeDirection },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NudgeDirection {
    Up,
    Down,
}

impl NudgeDirection {
    pub const fn sign(self) -> i32 {
        match self {
            NudgeDirection::Up => 1,
            NudgeDirection::Down => -1,
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    NoMotors,
}
