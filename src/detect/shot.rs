// Shot detection: a sharp deceleration while at speed, measured until speed recovers

use super::{DetectorEvent, DetectorInput};
use crate::config::{SHOT_ARM_FRACTION, SHOT_DECEL_THRESHOLD};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShotState {
    #[default]
    Disarmed,
    /// At speed, waiting for a load
    Armed,
    /// Loaded, waiting for speed to recover
    InProgress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShotDetector {
    state: ShotState,
    energy: f64,
    time: f64,
    min_speed: f64,
}

impl ShotDetector {
    pub fn state(&self) -> ShotState {
        self.state
    }

    pub fn advance(&mut self, input: &DetectorInput, events: &mut Vec<DetectorEvent>) {
        if !input.powered {
            self.state = ShotState::Disarmed;
            return;
        }

        let at_speed = input.speed >= input.target * SHOT_ARM_FRACTION;
        match self.state {
            ShotState::Disarmed => {
                if at_speed {
                    *self = Self {
                        state: ShotState::Armed,
                        energy: 0.0,
                        time: 0.0,
                        min_speed: input.target,
                    };
                }
            }
            ShotState::Armed => {
                if input.acceleration < SHOT_DECEL_THRESHOLD {
                    self.state = ShotState::InProgress;
                    events.push(DetectorEvent::ShotStarted { speed: input.speed });
                    self.accumulate(input);
                }
            }
            ShotState::InProgress => {
                if at_speed {
                    let min_percent = if input.target > 0.0 {
                        self.min_speed / input.target * 100.0
                    } else {
                        0.0
                    };
                    events.push(DetectorEvent::ShotComplete {
                        time: self.time,
                        energy: self.energy,
                        min_speed: self.min_speed,
                        min_percent,
                    });
                    // Re-arms on the next cycle if still at speed
                    self.state = ShotState::Disarmed;
                } else {
                    self.accumulate(input);
                }
            }
        }
    }

    fn accumulate(&mut self, input: &DetectorInput) {
        self.energy += input.power * input.dt;
        self.time += input.dt;
        self.min_speed = self.min_speed.min(input.speed);
    }
}
