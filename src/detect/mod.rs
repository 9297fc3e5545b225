//! Hysteresis event detectors advanced once per control cycle.
//!
//! Each motor carries three independent detectors:
//! - [`SpinupDetector`]: time and energy to reach 66/95/99% of target after power-on
//! - [`ShotDetector`]: a sudden load while at speed, until speed recovers
//! - [`RunEnergyAccumulator`]: average power over each 5 s of continuous running
//!
//! Detectors push [`DetectorEvent`]s; the control loop turns them into report lines.

mod run_energy;
mod shot;
mod spinup;

pub use run_energy::RunEnergyAccumulator;
pub use shot::{ShotDetector, ShotState};
pub use spinup::{SpinupDetector, SpinupState};

/// One cycle's worth of inputs, shared by all detectors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorInput {
    /// Effective power state (leader's for followers)
    pub powered: bool,
    /// Effective target, RPM
    pub target: f64,
    /// Direction-corrected speed, RPM
    pub speed: f64,
    /// Unfiltered acceleration, RPM/s
    pub acceleration: f64,
    /// W
    pub power: f64,
    /// s
    pub dt: f64,
}

/// Something a detector noticed this cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorEvent {
    /// Spin-up measurement (re)started
    SpinupArmed,
    /// Motor stopped before the last spin-up reached 99%
    SpinupIncomplete { speed_max: f64 },
    /// Speed crossed a fraction of target for the first time since power-on
    SpinupReached { percent: u32, time: f64, energy: f64 },
    /// Sudden deceleration while at speed
    ShotStarted { speed: f64 },
    /// Speed recovered after a shot
    ShotComplete {
        time: f64,
        energy: f64,
        min_speed: f64,
        min_percent: f64,
    },
    /// Average power over the last run period
    RunAverage { average_power: f64, time: f64 },
}

impl DetectorEvent {
    /// Report line for the panel, if this event is reported
    pub fn report(&self, name: char) -> Option<String> {
        match *self {
            DetectorEvent::SpinupArmed | DetectorEvent::ShotStarted { .. } => None,
            DetectorEvent::SpinupIncomplete { speed_max } => Some(format!(
                "{} spin-up incomplete, max {:.0} RPM",
                name, speed_max
            )),
            DetectorEvent::SpinupReached {
                percent,
                time,
                energy,
            } => Some(format!(
                "{} spin-up {}% {:.2}s {:.1}J",
                name, percent, time, energy
            )),
            DetectorEvent::ShotComplete {
                time,
                energy,
                min_speed,
                min_percent,
            } => Some(format!(
                "{} shot {:.2}s {:.1}J min {:.0} ({:.0}%)",
                name, time, energy, min_speed, min_percent
            )),
            DetectorEvent::RunAverage {
                average_power,
                time,
            } => Some(format!(
                "{} avg power {:.1}W over {:.1}s",
                name, average_power, time
            )),
        }
    }
}
