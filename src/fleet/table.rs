// The motor table: one entry per slot, the single source of truth for per-motor state

use crate::config::NUM_MOTORS;
use crate::detect::{RunEnergyAccumulator, ShotDetector, SpinupDetector};
use crate::motor::GearsetTier;
use crate::signal::Derived;

/// Last sampled feedback, in base units and corrected for direction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Feedback {
    /// RPM
    pub speed: f64,
    /// A
    pub current: f64,
    /// V
    pub voltage: f64,
    /// W
    pub power: f64,
    /// °C
    pub temperature: f64,
}

/// One motor slot
#[derive(Debug, Clone)]
pub struct Motor {
    index: usize,
    pub(crate) port: Option<u8>,
    pub(crate) reversed: bool,
    pub(crate) powered: bool,
    pub(crate) leader: Option<usize>,
    pub(crate) gearset: GearsetTier,
    pub(crate) target: i32,
    pub feedback: Feedback,
    pub derived: Derived,
    pub spinup: SpinupDetector,
    pub shot: ShotDetector,
    pub run_energy: RunEnergyAccumulator,
}

impl Motor {
    fn new(index: usize, port: Option<u8>) -> Self {
        let gearset = GearsetTier::High;
        Self {
            index,
            port,
            reversed: false,
            powered: false,
            leader: None,
            gearset,
            target: gearset.max_speed(),
            feedback: Feedback::default(),
            derived: Derived::default(),
            spinup: SpinupDetector::default(),
            shot: ShotDetector::default(),
            run_energy: RunEnergyAccumulator::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Display name: A, B, C, ...
    pub fn name(&self) -> char {
        slot_name(self.index)
    }

    pub fn port(&self) -> Option<u8> {
        self.port
    }

    pub fn is_configured(&self) -> bool {
        self.port.is_some()
    }

    pub fn reversed(&self) -> bool {
        self.reversed
    }

    /// Own power intent; only meaningful for leaders
    pub fn powered(&self) -> bool {
        self.powered
    }

    pub fn leader(&self) -> Option<usize> {
        self.leader
    }

    pub fn is_leader(&self) -> bool {
        self.leader.is_none()
    }

    pub fn gearset(&self) -> GearsetTier {
        self.gearset
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    /// Command sign: -1 when reversed
    pub fn direction(&self) -> f64 {
        if self.reversed { -1.0 } else { 1.0 }
    }
}

pub fn slot_name(index: usize) -> char {
    (b'A' + index as u8) as char
}

/// Fixed-capacity table of motors, indexed by slot
#[derive(Debug, Clone)]
pub struct MotorTable {
    motors: [Motor; NUM_MOTORS],
}

impl MotorTable {
    /// Build a table with default settings; `None` leaves a slot unconfigured
    pub fn from_ports(ports: [Option<u8>; NUM_MOTORS]) -> Self {
        let mut index = 0;
        let motors = ports.map(|port| {
            let motor = Motor::new(index, port);
            index += 1;
            motor
        });
        Self { motors }
    }

    pub fn get(&self, index: usize) -> Option<&Motor> {
        self.motors.get(index)
    }

    pub(crate) fn motor_mut(&mut self, index: usize) -> &mut Motor {
        &mut self.motors[index]
    }

    pub fn motors(&self) -> &[Motor] {
        &self.motors
    }

    /// Indices of slots with a port
    pub fn configured(&self) -> impl Iterator<Item = usize> + '_ {
        self.motors
            .iter()
            .filter(|m| m.is_configured())
            .map(Motor::index)
    }

    /// Power state and target the motor should run with, taken from its leader if it follows one
    pub fn effective_command(&self, index: usize) -> (bool, i32) {
        let motor = &self.motors[index];
        let source = motor.leader.map_or(motor, |leader| &self.motors[leader]);
        (source.powered, source.target)
    }

    /// Followers of `leader`, in ascending slot order
    pub fn followers(&self, leader: usize) -> impl Iterator<Item = usize> + '_ {
        self.motors
            .iter()
            .filter(move |m| m.leader == Some(leader))
            .map(Motor::index)
    }

    /// Describe the first broken structural invariant, if any
    pub fn invariant_violation(&self) -> Option<String> {
        if self.motors[0].leader.is_some() {
            return Some("slot A has a leader".to_string());
        }
        for motor in &self.motors {
            let max = motor.gearset.max_speed();
            if !(0..=max).contains(&motor.target) {
                return Some(format!(
                    "motor {} target {} outside [0, {}]",
                    motor.name(),
                    motor.target,
                    max
                ));
            }
            let Some(leader) = motor.leader else { continue };
            let Some(lead) = self.motors.get(leader) else {
                return Some(format!("motor {} follows missing slot {}", motor.name(), leader));
            };
            if lead.leader.is_some() {
                return Some(format!(
                    "motor {} follows {} which is itself a follower",
                    motor.name(),
                    lead.name()
                ));
            }
            if lead.gearset != motor.gearset || lead.target != motor.target {
                return Some(format!(
                    "motor {} does not mirror leader {}",
                    motor.name(),
                    lead.name()
                ));
            }
        }
        None
    }
}
