// Loop timing, detector thresholds, topics, runtime configuration
use std::time::Duration;

use crate::motor::BrakeMode;

// Number of motor slots (A, B, C, D)
pub const NUM_MOTORS: usize = 4;

// Ports are scanned 1..=PORT_COUNT in ascending order at startup
pub const PORT_COUNT: u8 = 21;

// Motors spin down freely when not powered
pub const IDLE_BRAKE_MODE: BrakeMode = BrakeMode::Coast;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

pub fn cycle_period(loop_hz: u64) -> Duration {
    // Never zero: tokio intervals reject an empty period
    Duration::from_secs_f64(1.0 / loop_hz.max(1) as f64).max(Duration::from_micros(1))
}

// Signal processing
pub const ACCEL_FILTER_ALPHA: f64 = 0.1;

// Spin-up detection
pub const SPINUP_REARM_SPEED: f64 = 5.0; // RPM
pub const SPINUP_FRACTIONS: [f64; 3] = [0.66, 0.95, 0.99];

// Shot detection
pub const SHOT_ARM_FRACTION: f64 = 0.95;
pub const SHOT_DECEL_THRESHOLD: f64 = -2000.0; // RPM/s

// Run energy accounting
pub const RUN_REPORT_PERIOD: f64 = 5.0; // seconds

// Status: actual speed counts as "at speed" within this fraction of target
pub const AT_SPEED_TOLERANCE: f64 = 0.05;

// Report buffers
pub const REPORT_LINE_CHARS: usize = 44;
pub const REPORT_HISTORY_LINES: usize = 9;
pub const REPORT_QUEUE_DEPTH: usize = 32;

// Zenoh topics
pub const TOPIC_CMD_CONFIG: &str = "flywheel/cmd/config"; // configuration commands from the panel
pub const TOPIC_REPORT: &str = "flywheel/report"; // one report line per sample
pub const TOPIC_REPORT_HISTORY: &str = "flywheel/report/history"; // rendered scrollback
pub const TOPIC_STATUS_PREFIX: &str = "flywheel/state/motor"; // + "/<name>"
pub const TOPIC_HEALTH: &str = "flywheel/state/health";

// Default serial port for the Feetech bus
pub const MOTOR_PORT: &str = "/dev/ttyACM0";

/// Runtime configuration assembled from command-line flags
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Serial port for the motor bus; `None` runs against the simulated bus
    pub motor_port: Option<String>,
    pub loop_hz: u64,
    pub simulate: bool,
    /// Number of motors the simulated bus exposes
    pub simulated_motors: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            motor_port: Some(MOTOR_PORT.to_string()),
            loop_hz: LOOP_HZ,
            simulate: false,
            simulated_motors: NUM_MOTORS,
        }
    }
}

impl RuntimeConfig {
    pub fn use_simulator(&self) -> bool {
        self.simulate || self.motor_port.is_none()
    }
}
