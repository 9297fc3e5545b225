// Hardware command interface consumed by the control loop and port discovery
//
// Ports are the hardware channel numbers (1-based). Current and voltage are
// reported in milli-units; the control loop scales them to base units.

use super::feetech::FeetechError;
use super::gearset::GearsetTier;

/// What is plugged into a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Empty,
    Motor,
    Other(u16),
}

/// Behaviour of a motor when commanded to brake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrakeMode {
    /// Release torque and spin down freely
    Coast,
    /// Actively decelerate to zero
    Brake,
    /// Decelerate and hold position
    Hold,
}

/// Error types for the hardware command interface
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error(transparent)]
    Feetech(#[from] FeetechError),

    #[error("No device on port {port}")]
    NoDevice { port: u8 },
}

pub type BusResult<T> = std::result::Result<T, BusError>;

/// A bus of independently addressable motors
pub trait MotorBus {
    fn device_class(&mut self, port: u8) -> BusResult<DeviceClass>;

    fn set_brake_mode(&mut self, port: u8, mode: BrakeMode) -> BusResult<()>;

    /// Command a signed velocity in RPM
    fn set_velocity(&mut self, port: u8, rpm: i32) -> BusResult<()>;

    /// Stop according to the port's brake mode
    fn brake(&mut self, port: u8) -> BusResult<()>;

    fn set_gearing(&mut self, port: u8, tier: GearsetTier) -> BusResult<()>;

    /// Measured velocity in RPM, in the motor's own frame
    fn velocity(&mut self, port: u8) -> BusResult<f64>;

    /// Current draw in mA
    fn current(&mut self, port: u8) -> BusResult<f64>;

    /// Supply voltage in mV
    fn voltage(&mut self, port: u8) -> BusResult<f64>;

    /// Temperature in °C
    fn temperature(&mut self, port: u8) -> BusResult<f64>;

    /// Electrical power in W
    fn power(&mut self, port: u8) -> BusResult<f64>;
}
