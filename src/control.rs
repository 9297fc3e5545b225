//! The per-cycle control loop.
//!
//! Once per cycle, for every configured motor in slot order:
//! 1. resolve the effective power state and target (the leader's for followers)
//! 2. brake and re-apply the gearset when off, otherwise command `target` in the motor's own direction
//! 3. sample feedback and correct the speed sign by the same direction
//! 4. derive acceleration and filtered acceleration
//! 5. advance the spin-up, shot and run-energy detectors
//! 6. emit report lines and push the motor's status to the observer
//!
//! Hardware errors are logged and never abort the cycle.

use tracing::{debug, info, warn};

use crate::detect::{DetectorEvent, DetectorInput};
use crate::fleet::{Feedback, MotorTable};
use crate::motor::{BusResult, GearsetTier, MotorBus};
use crate::report::ReportSink;
use crate::status::StatusObserver;

/// Runs control cycles over a motor table
#[derive(Debug, Default)]
pub struct ControlLoop {
    events: Vec<DetectorEvent>,
}

impl ControlLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one cycle of length `dt` seconds
    pub fn cycle<B, R, O>(
        &mut self,
        table: &mut MotorTable,
        bus: &mut B,
        dt: f64,
        reports: &mut R,
        observer: &mut O,
    ) where
        B: MotorBus,
        R: ReportSink,
        O: StatusObserver,
    {
        let configured: Vec<(usize, u8)> = table
            .motors()
            .iter()
            .filter_map(|m| m.port().map(|port| (m.index(), port)))
            .collect();

        for (index, port) in configured {
            self.run_motor(table, bus, index, port, dt);

            let name = table.motors()[index].name();
            for event in self.events.drain(..) {
                debug!("Motor {}: {:?}", name, event);
                if let Some(text) = event.report(name) {
                    info!("REPORT: {}", text);
                    reports.emit(&text);
                }
            }
            if let Some(status) = table.status(index) {
                observer.motor_changed(&status);
            }
        }
    }

    fn run_motor<B: MotorBus>(
        &mut self,
        table: &mut MotorTable,
        bus: &mut B,
        index: usize,
        port: u8,
        dt: f64,
    ) {
        let (powered, target) = table.effective_command(index);
        let motor = table.motor_mut(index);
        let direction = motor.direction();

        let rpm = if motor.reversed { -target } else { target };
        if let Err(e) = command(bus, port, powered, rpm, motor.gearset) {
            warn!("Failed to command motor {} on port {:02}: {}", motor.name(), port, e);
        }

        let previous = motor.feedback;
        motor.feedback = sample(bus, port, direction, &previous);
        motor
            .derived
            .update(previous.speed, motor.feedback.speed, dt);

        let input = DetectorInput {
            powered,
            target: target as f64,
            speed: motor.feedback.speed,
            acceleration: motor.derived.acceleration,
            power: motor.feedback.power,
            dt,
        };
        motor.spinup.advance(&input, &mut self.events);
        motor.shot.advance(&input, &mut self.events);
        motor.run_energy.advance(&input, &mut self.events);
    }
}

fn command<B: MotorBus>(
    bus: &mut B,
    port: u8,
    powered: bool,
    rpm: i32,
    gearset: GearsetTier,
) -> BusResult<()> {
    if powered {
        bus.set_velocity(port, rpm)
    } else {
        bus.brake(port)?;
        bus.set_gearing(port, gearset)
    }
}

/// Read feedback in base units; a failed read keeps the previous value for that field
fn sample<B: MotorBus>(bus: &mut B, port: u8, direction: f64, previous: &Feedback) -> Feedback {
    fn or_previous(port: u8, what: &str, read: BusResult<f64>, previous: f64) -> f64 {
        read.unwrap_or_else(|e| {
            warn!("Failed to read {} on port {:02}: {}", what, port, e);
            previous
        })
    }

    Feedback {
        speed: or_previous(port, "velocity", bus.velocity(port).map(|v| v * direction), previous.speed),
        current: or_previous(port, "current", bus.current(port).map(|ma| ma / 1000.0), previous.current),
        voltage: or_previous(port, "voltage", bus.voltage(port).map(|mv| mv / 1000.0), previous.voltage),
        temperature: or_previous(port, "temperature", bus.temperature(port), previous.temperature),
        power: or_previous(port, "power", bus.power(port), previous.power),
    }
}
