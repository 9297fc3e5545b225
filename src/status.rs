// Display status pushed to the panel after each cycle and configuration change

use serde::Serialize;

use crate::config::{AT_SPEED_TOLERANCE, NUM_MOTORS};
use crate::fleet::MotorTable;
use crate::motor::GearsetTier;

/// Everything the panel shows for one motor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotorStatus {
    pub index: usize,
    pub name: char,
    pub port: Option<u8>,
    pub leader: Option<usize>,
    pub reversed: bool,
    /// Effective power state (leader's for followers)
    pub powered: bool,
    pub gearset: GearsetTier,
    /// Effective target, RPM
    pub target: i32,
    pub speed: f64,
    pub current: f64,
    pub voltage: f64,
    pub power: f64,
    pub temperature: f64,
    /// Speed within 5% of target
    pub at_speed: bool,
}

/// Told about motors whose displayed state may have changed
pub trait StatusObserver {
    fn motor_changed(&mut self, status: &MotorStatus);
}

impl StatusObserver for () {
    fn motor_changed(&mut self, _status: &MotorStatus) {}
}

impl MotorTable {
    /// Status of a configured motor
    pub fn status(&self, index: usize) -> Option<MotorStatus> {
        let motor = self.get(index).filter(|m| m.is_configured())?;
        let (powered, target) = self.effective_command(index);
        let tolerance = target as f64 * AT_SPEED_TOLERANCE;
        let speed = motor.feedback.speed;
        Some(MotorStatus {
            index,
            name: motor.name(),
            port: motor.port(),
            leader: motor.leader(),
            reversed: motor.reversed(),
            powered,
            gearset: motor.gearset(),
            target,
            speed,
            current: motor.feedback.current,
            voltage: motor.feedback.voltage,
            power: motor.feedback.power,
            temperature: motor.feedback.temperature,
            at_speed: (speed - target as f64).abs() <= tolerance,
        })
    }
}

/// Latest status per slot, with a flag for entries not yet published
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    latest: [Option<MotorStatus>; NUM_MOTORS],
    dirty: [bool; NUM_MOTORS],
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&MotorStatus> {
        self.latest.get(index)?.as_ref()
    }

    /// Statuses changed since the last call
    pub fn take_dirty(&mut self) -> Vec<MotorStatus> {
        let mut changed = Vec::new();
        for (status, dirty) in self.latest.iter().zip(self.dirty.iter_mut()) {
            if std::mem::take(dirty) {
                changed.extend(status.clone());
            }
        }
        changed
    }
}

impl StatusObserver for StatusBoard {
    fn motor_changed(&mut self, status: &MotorStatus) {
        let Some(slot) = self.latest.get_mut(status.index) else {
            return;
        };
        if slot.as_ref() != Some(status) {
            *slot = Some(status.clone());
            self.dirty[status.index] = true;
        }
    }
}
