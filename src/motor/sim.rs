// Simulated motor bus for running the bench without hardware
//
// Each motor is a first-order velocity response. Physics advance one step
// per command (the control loop issues exactly one command per motor per cycle).

use std::collections::BTreeMap;

use super::bus::{BrakeMode, BusError, BusResult, DeviceClass, MotorBus};
use super::gearset::GearsetTier;
use crate::config::PORT_COUNT;

/// Velocity time constant while driven (s)
const DRIVE_TAU: f64 = 0.3;
/// Velocity time constant while braking (s)
const BRAKE_TAU: f64 = 0.15;
/// Velocity time constant while coasting (s)
const COAST_TAU: f64 = 1.5;

/// Supply voltage (mV)
const SUPPLY_MV: f64 = 12_000.0;
/// Power drawn per RPM of speed (W)
const FRICTION_W_PER_RPM: f64 = 0.01;
/// Power drawn per RPM of speed error (W)
const DRIVE_W_PER_RPM: f64 = 0.05;
const AMBIENT_C: f64 = 25.0;

#[derive(Debug, Clone)]
struct SimMotor {
    brake_mode: BrakeMode,
    tier: GearsetTier,
    speed: f64,
    power: f64,
}

impl SimMotor {
    fn new() -> Self {
        Self {
            brake_mode: BrakeMode::Coast,
            tier: GearsetTier::default(),
            speed: 0.0,
            power: 0.0,
        }
    }

    fn step_towards(&mut self, goal: f64, tau: f64, dt: f64) {
        let alpha = (dt / tau).min(1.0);
        self.speed += (goal - self.speed) * alpha;
    }
}

/// Deterministic in-process stand-in for the hardware bus
#[derive(Debug, Clone)]
pub struct SimBus {
    motors: BTreeMap<u8, SimMotor>,
    dt: f64,
}

impl SimBus {
    /// Motors on the given ports, advancing `dt` seconds per command
    pub fn new(ports: &[u8], dt: f64) -> Self {
        let motors = ports.iter().map(|&p| (p, SimMotor::new())).collect();
        Self { motors, dt }
    }

    /// `count` motors on ports 1..=count, capped at the scanned port range
    pub fn with_motors(count: usize, dt: f64) -> Self {
        let count = count.min(PORT_COUNT as usize) as u8;
        let ports: Vec<u8> = (1..=count).collect();
        Self::new(&ports, dt)
    }

    /// Drop a motor's speed instantly, as a game piece leaving the flywheel would
    pub fn inject_load(&mut self, port: u8, speed_drop: f64) -> BusResult<()> {
        let motor = self.motor(port)?;
        motor.speed -= speed_drop.copysign(motor.speed);
        Ok(())
    }

    fn motor(&mut self, port: u8) -> BusResult<&mut SimMotor> {
        self.motors.get_mut(&port).ok_or(BusError::NoDevice { port })
    }
}

impl MotorBus for SimBus {
    fn device_class(&mut self, port: u8) -> BusResult<DeviceClass> {
        Ok(if self.motors.contains_key(&port) {
            DeviceClass::Motor
        } else {
            DeviceClass::Empty
        })
    }

    fn set_brake_mode(&mut self, port: u8, mode: BrakeMode) -> BusResult<()> {
        self.motor(port)?.brake_mode = mode;
        Ok(())
    }

    fn set_velocity(&mut self, port: u8, rpm: i32) -> BusResult<()> {
        let dt = self.dt;
        let motor = self.motor(port)?;
        let max = motor.tier.max_speed();
        let goal = rpm.clamp(-max, max) as f64;
        motor.step_towards(goal, DRIVE_TAU, dt);
        motor.power = FRICTION_W_PER_RPM * motor.speed.abs() + DRIVE_W_PER_RPM * (goal - motor.speed).abs();
        Ok(())
    }

    fn brake(&mut self, port: u8) -> BusResult<()> {
        let dt = self.dt;
        let motor = self.motor(port)?;
        match motor.brake_mode {
            BrakeMode::Coast => {
                motor.step_towards(0.0, COAST_TAU, dt);
                motor.power = 0.0;
            }
            BrakeMode::Brake | BrakeMode::Hold => {
                motor.step_towards(0.0, BRAKE_TAU, dt);
                motor.power = DRIVE_W_PER_RPM * motor.speed.abs();
            }
        }
        Ok(())
    }

    fn set_gearing(&mut self, port: u8, tier: GearsetTier) -> BusResult<()> {
        self.motor(port)?.tier = tier;
        Ok(())
    }

    fn velocity(&mut self, port: u8) -> BusResult<f64> {
        Ok(self.motor(port)?.speed)
    }

    fn current(&mut self, port: u8) -> BusResult<f64> {
        Ok(self.motor(port)?.power / (SUPPLY_MV / 1000.0) * 1000.0)
    }

    fn voltage(&mut self, port: u8) -> BusResult<f64> {
        self.motor(port)?;
        Ok(SUPPLY_MV)
    }

    fn temperature(&mut self, port: u8) -> BusResult<f64> {
        Ok(AMBIENT_C + self.motor(port)?.power * 0.1)
    }

    fn power(&mut self, port: u8) -> BusResult<f64> {
        Ok(self.motor(port)?.power)
    }
}
