// Motor hardware layer for the flywheel bench
//
// Provides:
// - The hardware command interface (MotorBus) used by the control loop
// - Feetech STS serial protocol implementation of that interface
// - A simulated bus for running without hardware
// - Gearset tiers

mod bus;
pub mod feetech;
mod gearset;
pub mod sim;

pub use bus::{BrakeMode, BusError, BusResult, DeviceClass, MotorBus};
pub use feetech::{FeetechBus, FeetechError};
pub use gearset::GearsetTier;
pub use sim::SimBus;
