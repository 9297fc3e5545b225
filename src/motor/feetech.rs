// Feetech STS serial bus servos driven as velocity-controlled motors
//
// Protocol is similar to Dynamixel Protocol 1.0:
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// The servo ID doubles as the port number of the hardware command interface.

use serialport::{self, SerialPort};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

use super::bus::{BrakeMode, BusResult, DeviceClass, MotorBus};
use super::gearset::GearsetTier;

/// Default serial configuration for Feetech motors
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 20;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Encoder steps per output revolution
const STEPS_PER_REVOLUTION: f64 = 4096.0;

/// Present current LSB in mA
const CURRENT_LSB_MA: f64 = 6.5;

/// Present voltage LSB in mV
const VOLTAGE_LSB_MV: f64 = 100.0;

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// Register addresses used for velocity control and telemetry
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    ModelNumber = 3,         // 2 bytes, read-only
    OperatingMode = 33,      // 1 byte: 0=position, 1=velocity, 2=PWM, 3=step
    TorqueEnable = 40,       // 1 byte: 0=off, 1=on
    GoalVelocity = 46,       // 2 bytes (sign-magnitude)
    PresentVelocity = 58,    // 2 bytes (sign-magnitude), steps/s
    PresentVoltage = 62,     // 1 byte, 0.1 V
    PresentTemperature = 63, // 1 byte, °C
    PresentCurrent = 69,     // 2 bytes (sign-magnitude), 6.5 mA
}

/// Operating modes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Position = 0,
    Velocity = 1,
}

/// Error types for Feetech communication
#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} returned error status: 0x{status:02X}")]
    MotorError { id: u8, status: u8 },

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

/// Per-servo state the bus needs to emulate brake modes and gearing
#[derive(Debug, Clone, Copy)]
struct PortState {
    brake_mode: BrakeMode,
    tier: GearsetTier,
    torque_on: bool,
    last_current_ma: f64,
    last_voltage_mv: f64,
}

impl Default for PortState {
    fn default() -> Self {
        Self {
            brake_mode: BrakeMode::Coast,
            tier: GearsetTier::default(),
            torque_on: false,
            last_current_ma: 0.0,
            last_voltage_mv: 0.0,
        }
    }
}

/// Feetech servo bus exposed as a motor bus
pub struct FeetechBus {
    port: Box<dyn SerialPort>,
    ports: HashMap<u8, PortState>,
}

impl FeetechBus {
    /// Open a new connection to the motor bus
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self {
            port,
            ports: HashMap::new(),
        })
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // params + instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        let checksum = Self::checksum(&packet[2..]);
        packet.push(checksum);

        packet
    }

    /// Send a request and return the response parameters
    fn transact(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        let packet = Self::build_packet(id, instruction, params);
        self.port.write_all(&packet)?;
        self.port.flush()?;
        self.read_response(id)
    }

    /// Read a status packet
    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                FeetechError::Timeout { id: expected_id }
            } else {
                FeetechError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.port.read_exact(&mut id_length)?;
        let [id, length] = id_length;

        if id != expected_id {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }
        if length < 2 {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Length {} too short", length),
            });
        }

        // error + params + checksum = length bytes
        let mut remaining = vec![0u8; length as usize];
        self.port.read_exact(&mut remaining)?;

        let (body, checksum) = remaining.split_at(remaining.len() - 1);
        let mut checksum_data = vec![id, length];
        checksum_data.extend_from_slice(body);
        if Self::checksum(&checksum_data) != checksum[0] {
            return Err(FeetechError::ChecksumMismatch { id });
        }

        if body[0] != 0 {
            return Err(FeetechError::MotorError {
                id,
                status: body[0],
            });
        }

        Ok(body[1..].to_vec())
    }

    /// Ping a servo; a timeout means nothing answered on that ID
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        match self.transact(id, Instruction::Ping, &[]) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("Write u8 to motor {}: reg={:?}, value={}", id, register, value);
        self.transact(id, Instruction::Write, &[register as u8, value])?;
        Ok(())
    }

    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        debug!("Write u16 to motor {}: reg={:?}, value={}", id, register, value);
        self.transact(id, Instruction::Write, &[register as u8, lo, hi])?;
        Ok(())
    }

    fn read_bytes<const N: usize>(&mut self, id: u8, register: Register) -> Result<[u8; N]> {
        let response = self.transact(id, Instruction::Read, &[register as u8, N as u8])?;
        response
            .get(..N)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| FeetechError::InvalidResponse {
                id,
                reason: format!("Expected {} bytes, got {}", N, response.len()),
            })
    }

    pub fn read_u8(&mut self, id: u8, register: Register) -> Result<u8> {
        let [value] = self.read_bytes::<1>(id, register)?;
        Ok(value)
    }

    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_bytes::<2>(id, register)?))
    }

    /// Read a sign-magnitude register
    pub fn read_i16(&mut self, id: u8, register: Register) -> Result<i16> {
        Ok(decode_sign_magnitude(self.read_u16(id, register)?))
    }

    fn set_torque(&mut self, id: u8, on: bool) -> Result<()> {
        if self.ports.entry(id).or_default().torque_on == on {
            return Ok(());
        }
        self.write_u8(id, Register::TorqueEnable, on as u8)?;
        self.ports.entry(id).or_default().torque_on = on;
        Ok(())
    }

    fn write_goal_rpm(&mut self, id: u8, rpm: i32) -> Result<()> {
        self.write_u16(id, Register::GoalVelocity, encode_sign_magnitude(rpm_to_steps(rpm)))
    }
}

impl MotorBus for FeetechBus {
    fn device_class(&mut self, port: u8) -> BusResult<DeviceClass> {
        if !self.ping(port)? {
            return Ok(DeviceClass::Empty);
        }
        let model = self.read_u16(port, Register::ModelNumber)?;
        debug!("Servo {} reports model {}", port, model);
        // Every servo on this bus can run in velocity mode
        Ok(DeviceClass::Motor)
    }

    fn set_brake_mode(&mut self, port: u8, mode: BrakeMode) -> BusResult<()> {
        // Operating mode can only change with torque released
        self.set_torque(port, false)?;
        self.write_u8(port, Register::OperatingMode, OperatingMode::Velocity as u8)?;
        self.ports.entry(port).or_default().brake_mode = mode;
        Ok(())
    }

    fn set_velocity(&mut self, port: u8, rpm: i32) -> BusResult<()> {
        let max = self.ports.entry(port).or_default().tier.max_speed();
        self.set_torque(port, true)?;
        self.write_goal_rpm(port, rpm.clamp(-max, max))?;
        Ok(())
    }

    fn brake(&mut self, port: u8) -> BusResult<()> {
        // Velocity mode cannot hold a position, so Brake and Hold both servo to zero speed
        let mode = self.ports.entry(port).or_default().brake_mode;
        match mode {
            BrakeMode::Coast => self.set_torque(port, false)?,
            BrakeMode::Brake | BrakeMode::Hold => {
                self.set_torque(port, true)?;
                self.write_goal_rpm(port, 0)?;
            }
        }
        Ok(())
    }

    fn set_gearing(&mut self, port: u8, tier: GearsetTier) -> BusResult<()> {
        // No gearbox register: the tier caps commanded speed
        self.ports.entry(port).or_default().tier = tier;
        Ok(())
    }

    fn velocity(&mut self, port: u8) -> BusResult<f64> {
        let steps = self.read_i16(port, Register::PresentVelocity)?;
        Ok(steps_to_rpm(steps))
    }

    fn current(&mut self, port: u8) -> BusResult<f64> {
        let raw = self.read_i16(port, Register::PresentCurrent)?;
        let ma = raw as f64 * CURRENT_LSB_MA;
        self.ports.entry(port).or_default().last_current_ma = ma;
        Ok(ma)
    }

    fn voltage(&mut self, port: u8) -> BusResult<f64> {
        let raw = self.read_u8(port, Register::PresentVoltage)?;
        let mv = raw as f64 * VOLTAGE_LSB_MV;
        self.ports.entry(port).or_default().last_voltage_mv = mv;
        Ok(mv)
    }

    fn temperature(&mut self, port: u8) -> BusResult<f64> {
        Ok(self.read_u8(port, Register::PresentTemperature)? as f64)
    }

    fn power(&mut self, port: u8) -> BusResult<f64> {
        // No power register: derived from the latest current and voltage samples
        let state = self.ports.entry(port).or_default();
        Ok((state.last_voltage_mv / 1000.0) * (state.last_current_ma.abs() / 1000.0))
    }
}

impl Drop for FeetechBus {
    fn drop(&mut self) {
        // Let every motor we drove spin down freely
        let driven: Vec<u8> = self
            .ports
            .iter()
            .filter(|(_, state)| state.torque_on)
            .map(|(&id, _)| id)
            .collect();
        for id in driven {
            if let Err(e) = self.set_torque(id, false) {
                warn!("Failed to release motor {} on drop: {}", id, e);
            }
        }
    }
}

/// Convert RPM to raw steps/s, saturating at the register range
fn rpm_to_steps(rpm: i32) -> i16 {
    let steps = (rpm as f64 * STEPS_PER_REVOLUTION / 60.0).round() as i32;
    steps.clamp(-0x7FFF, 0x7FFF) as i16
}

fn steps_to_rpm(steps: i16) -> f64 {
    steps as f64 * 60.0 / STEPS_PER_REVOLUTION
}

/// Encode a signed value to sign-magnitude format
/// Bit 15 = sign (1 = negative), Bits 0-14 = magnitude
fn encode_sign_magnitude(value: i16) -> u16 {
    if value >= 0 {
        value as u16
    } else {
        0x8000 | value.unsigned_abs()
    }
}

/// Decode sign-magnitude format to signed value
fn decode_sign_magnitude(raw: u16) -> i16 {
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // ID=1, Length=4, Instruction=WRITE, Addr=30, Data=0, 2
        let data = [1u8, 4, 0x03, 30, 0, 2];
        // ~(1+4+3+30+0+2) = ~40 = 215
        assert_eq!(FeetechBus::checksum(&data), 215);
    }

    #[test]
    fn test_sign_magnitude_encoding() {
        assert_eq!(encode_sign_magnitude(100), 100);
        assert_eq!(encode_sign_magnitude(-100), 0x8064);
        assert_eq!(decode_sign_magnitude(0x8064), -100);
        assert_eq!(decode_sign_magnitude(0x0064), 100);
    }

    #[test]
    fn test_read_packet_layout() {
        let packet = FeetechBus::build_packet(3, Instruction::Read, &[Register::PresentVelocity as u8, 2]);
        assert_eq!(packet.len(), 8);
        assert_eq!(&packet[..5], &[0xFF, 0xFF, 3, 4, 0x02]);
        assert_eq!(packet[7], FeetechBus::checksum(&packet[2..7]));
    }

    #[test]
    fn test_rpm_conversion() {
        assert_eq!(rpm_to_steps(60), 4096);
        assert_eq!(rpm_to_steps(-60), -4096);
        assert_eq!(rpm_to_steps(600), 0x7FFF); // saturates
        assert!((steps_to_rpm(4096) - 60.0).abs() < 1e-9);
    }
}
