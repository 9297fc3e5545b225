// Startup scan: allocate the first motors found on the bus to table slots

use tracing::{debug, info, warn};

use super::table::{slot_name, MotorTable};
use crate::config::{IDLE_BRAKE_MODE, NUM_MOTORS, PORT_COUNT};
use crate::motor::{DeviceClass, GearsetTier, MotorBus};

/// Scan ports in ascending order and assign motors to slots A, B, C, ...
///
/// Slots left over when fewer motors are found stay unconfigured. Ports that
/// fail to answer the class query are treated as empty.
pub fn discover<B: MotorBus>(bus: &mut B) -> MotorTable {
    let mut ports = [None; NUM_MOTORS];
    let mut next = 0;

    for port in 1..=PORT_COUNT {
        if next >= NUM_MOTORS {
            break;
        }

        let class = bus.device_class(port).unwrap_or_else(|e| {
            warn!("Port {:02} could not be queried: {}", port, e);
            DeviceClass::Empty
        });
        debug!("Port {:02} has device class {:?}", port, class);

        if class == DeviceClass::Motor {
            info!(
                "Found motor on port {:02}, allocating as motor {}",
                port,
                slot_name(next)
            );
            prepare(bus, port);
            ports[next] = Some(port);
            next += 1;
        }
    }

    for index in next..NUM_MOTORS {
        info!("No more motors found for motor {}", slot_name(index));
    }

    MotorTable::from_ports(ports)
}

/// Put a newly found motor into its idle configuration
fn prepare<B: MotorBus>(bus: &mut B, port: u8) {
    if let Err(e) = bus.set_brake_mode(port, IDLE_BRAKE_MODE) {
        warn!("Failed to set brake mode on port {:02}: {}", port, e);
    }
    if let Err(e) = bus.set_gearing(port, GearsetTier::High) {
        warn!("Failed to set gearing on port {:02}: {}", port, e);
    }
}
