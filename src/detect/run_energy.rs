// Running energy: average power reported every few seconds of continuous running

use super::{DetectorEvent, DetectorInput};
use crate::config::RUN_REPORT_PERIOD;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunEnergyAccumulator {
    energy: f64,
    time: f64,
}

impl RunEnergyAccumulator {
    /// Seconds accumulated since the last report or power-on
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn advance(&mut self, input: &DetectorInput, events: &mut Vec<DetectorEvent>) {
        if !input.powered {
            *self = Self::default();
            return;
        }

        self.energy += input.power * input.dt;
        self.time += input.dt;
        if self.time > RUN_REPORT_PERIOD {
            events.push(DetectorEvent::RunAverage {
                average_power: self.energy / self.time,
                time: self.time,
            });
            *self = Self::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(powered: bool, power: f64) -> DetectorInput {
        DetectorInput {
            powered,
            target: 600.0,
            speed: 600.0,
            acceleration: 0.0,
            power,
            dt: 0.02,
        }
    }

    #[test]
    fn test_periodic_average() {
        let mut acc = RunEnergyAccumulator::default();
        let mut events = Vec::new();
        // 16 s at 12 W
        for _ in 0..800 {
            acc.advance(&input(true, 12.0), &mut events);
        }
        assert_eq!(events.len(), 3);
        for event in &events {
            match *event {
                DetectorEvent::RunAverage { average_power, time } => {
                    assert!((average_power - 12.0).abs() < 1e-6);
                    assert!(time > 5.0 && time < 5.05);
                }
                ref other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_power_off_resets() {
        let mut acc = RunEnergyAccumulator::default();
        let mut events = Vec::new();
        for _ in 0..200 {
            acc.advance(&input(true, 8.0), &mut events);
        }
        acc.advance(&input(false, 0.0), &mut events);
        assert_eq!(acc.time(), 0.0);
        assert_eq!(acc.energy(), 0.0);
        // 4 s + 4 s split by a power-off never reaches a report
        for _ in 0..200 {
            acc.advance(&input(true, 8.0), &mut events);
        }
        assert!(events.is_empty());
    }
}
