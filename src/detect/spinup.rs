// Spin-up detection: measures how long and how much energy it takes to reach target

use super::{DetectorEvent, DetectorInput};
use crate::config::{SPINUP_FRACTIONS, SPINUP_REARM_SPEED};

/// Fraction of target at which a spin-up counts as complete
const COMPLETE_FRACTION: f64 = SPINUP_FRACTIONS[SPINUP_FRACTIONS.len() - 1];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpinupState {
    #[default]
    Disarmed,
    /// Waiting for or accumulating a spin-up
    Armed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpinupDetector {
    state: SpinupState,
    energy: f64,
    time: f64,
    speed_max: f64,
}

impl SpinupDetector {
    pub fn state(&self) -> SpinupState {
        self.state
    }

    /// Highest speed seen since arming
    pub fn speed_max(&self) -> f64 {
        self.speed_max
    }

    pub fn advance(&mut self, input: &DetectorInput, events: &mut Vec<DetectorEvent>) {
        if !input.powered {
            if input.speed.abs() <= SPINUP_REARM_SPEED {
                let incomplete = self.state == SpinupState::Armed && self.speed_max > 0.0;
                if incomplete {
                    events.push(DetectorEvent::SpinupIncomplete {
                        speed_max: self.speed_max,
                    });
                }
                let stale = self.state == SpinupState::Armed && (self.time > 0.0 || self.energy > 0.0);
                if self.state == SpinupState::Disarmed || incomplete {
                    self.rearm();
                    events.push(DetectorEvent::SpinupArmed);
                } else if stale {
                    // Powered without ever moving: start the next attempt from zero
                    self.rearm();
                }
            }
            return;
        }

        if self.state != SpinupState::Armed {
            return;
        }

        self.energy += input.dt * input.power;
        self.time += input.dt;

        for fraction in SPINUP_FRACTIONS {
            let threshold = input.target * fraction;
            if self.speed_max < threshold && input.speed >= threshold {
                events.push(DetectorEvent::SpinupReached {
                    percent: (fraction * 100.0).round() as u32,
                    time: self.time,
                    energy: self.energy,
                });
            }
        }
        self.speed_max = self.speed_max.max(input.speed);

        // Done; the next measurement arms once the motor is off and slow again
        if input.target > 0.0 && input.speed >= input.target * COMPLETE_FRACTION {
            self.state = SpinupState::Disarmed;
        }
    }

    fn rearm(&mut self) {
        *self = Self {
            state: SpinupState::Armed,
            ..Self::default()
        };
    }
}
