// Gearset tiers: each cartridge bounds the maximum speed and sets the manual step size

use serde::{Deserialize, Serialize};

/// Discrete gear ratio class of a motor cartridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GearsetTier {
    /// 36:1
    Low,
    /// 18:1
    Medium,
    /// 6:1
    #[default]
    High,
}

impl GearsetTier {
    /// Maximum speed in RPM
    pub const fn max_speed(self) -> i32 {
        match self {
            GearsetTier::Low => 100,
            GearsetTier::Medium => 200,
            GearsetTier::High => 600,
        }
    }

    /// Target increment for one nudge, in RPM
    pub const fn step_size(self) -> i32 {
        match self {
            GearsetTier::Low | GearsetTier::Medium => 5,
            GearsetTier::High => 10,
        }
    }

    /// Next tier, rolling over from High back to Low
    pub const fn next(self) -> Self {
        match self {
            GearsetTier::Low => GearsetTier::Medium,
            GearsetTier::Medium => GearsetTier::High,
            GearsetTier::High => GearsetTier::Low,
        }
    }

    pub fn clamp_target(self, target: i32) -> i32 {
        target.clamp(0, self.max_speed())
    }

    /// Ratio label as shown on the panel
    pub const fn label(self) -> &'static str {
        match self {
            GearsetTier::Low => "36:1",
            GearsetTier::Medium => "18:1",
            GearsetTier::High => " 6:1",
        }
    }
}
