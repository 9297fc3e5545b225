// Control and telemetry core for a small fleet of flywheel motors

pub mod config;
pub mod control;
pub mod detect;
pub mod fleet;
pub mod messages;
pub mod motor;
pub mod report;
pub mod runtime;
pub mod signal;
pub mod status;
