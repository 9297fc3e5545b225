// Control loop behaviour against a scripted motor bus

use std::collections::{BTreeMap, VecDeque};

use flywheel_bench_runtime::control::ControlLoop;
use flywheel_bench_runtime::fleet::{ConfigError, MotorTable};
use flywheel_bench_runtime::messages::NudgeDirection;
use flywheel_bench_runtime::motor::{BrakeMode, BusError, BusResult, DeviceClass, GearsetTier, MotorBus};
use flywheel_bench_runtime::report::ReportBuffer;
use flywheel_bench_runtime::status::StatusBoard;

const DT: f64 = 0.02;

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Velocity(u8, i32),
    Brake(u8),
    Gearing(u8, GearsetTier),
}

/// Raw readings a port returns; speeds are consumed one per cycle, the last one repeats
#[derive(Debug, Clone)]
struct PortScript {
    speeds: VecDeque<f64>,
    last_speed: f64,
    current_ma: f64,
    voltage_mv: f64,
    power_w: f64,
    temperature: f64,
    fail_reads: bool,
}

impl Default for PortScript {
    fn default() -> Self {
        Self {
            speeds: VecDeque::new(),
            last_speed: 0.0,
            current_ma: 1500.0,
            voltage_mv: 12_000.0,
            power_w: 10.0,
            temperature: 31.0,
            fail_reads: false,
        }
    }
}

#[derive(Debug, Default)]
struct ScriptedBus {
    ports: BTreeMap<u8, PortScript>,
    commands: Vec<Command>,
}

impl ScriptedBus {
    fn with_ports(ports: &[u8]) -> Self {
        Self {
            ports: ports.iter().map(|&p| (p, PortScript::default())).collect(),
            commands: Vec::new(),
        }
    }

    fn script(&mut self, port: u8) -> &mut PortScript {
        self.ports.get_mut(&port).expect("scripted port")
    }

    fn read(&mut self, port: u8) -> BusResult<&mut PortScript> {
        match self.ports.get_mut(&port) {
            Some(script) if !script.fail_reads => Ok(script),
            _ => Err(BusError::NoDevice { port }),
        }
    }

    fn commanded_ports(&self) -> Vec<u8> {
        let mut ports: Vec<u8> = self
            .commands
            .iter()
            .map(|c| match *c {
                Command::Velocity(p, _) | Command::Brake(p) | Command::Gearing(p, _) => p,
            })
            .collect();
        ports.dedup();
        ports
    }
}

impl MotorBus for ScriptedBus {
    fn device_class(&mut self, port: u8) -> BusResult<DeviceClass> {
        Ok(if self.ports.contains_key(&port) {
            DeviceClass::Motor
        } else {
            DeviceClass::Empty
        })
    }

    fn set_brake_mode(&mut self, _port: u8, _mode: BrakeMode) -> BusResult<()> {
        Ok(())
    }

    fn set_velocity(&mut self, port: u8, rpm: i32) -> BusResult<()> {
        self.commands.push(Command::Velocity(port, rpm));
        Ok(())
    }

    fn brake(&mut self, port: u8) -> BusResult<()> {
        self.commands.push(Command::Brake(port));
        Ok(())
    }

    fn set_gearing(&mut self, port: u8, tier: GearsetTier) -> BusResult<()> {
        self.commands.push(Command::Gearing(port, tier));
        Ok(())
    }

    fn velocity(&mut self, port: u8) -> BusResult<f64> {
        let script = self.read(port)?;
        if let Some(speed) = script.speeds.pop_front() {
            script.last_speed = speed;
        }
        Ok(script.last_speed)
    }

    fn current(&mut self, port: u8) -> BusResult<f64> {
        Ok(self.read(port)?.current_ma)
    }

    fn voltage(&mut self, port: u8) -> BusResult<f64> {
        Ok(self.read(port)?.voltage_mv)
    }

    fn temperature(&mut self, port: u8) -> BusResult<f64> {
        Ok(self.read(port)?.temperature)
    }

    fn power(&mut self, port: u8) -> BusResult<f64> {
        Ok(self.read(port)?.power_w)
    }
}

struct Bench {
    table: MotorTable,
    bus: ScriptedBus,
    control: ControlLoop,
    reports: ReportBuffer,
    board: StatusBoard,
}

impl Bench {
    fn new(ports: [Option<u8>; 4]) -> Self {
        let scripted: Vec<u8> = ports.iter().flatten().copied().collect();
        Self {
            table: MotorTable::from_ports(ports),
            bus: ScriptedBus::with_ports(&scripted),
            control: ControlLoop::new(),
            reports: ReportBuffer::new(64),
            board: StatusBoard::new(),
        }
    }

    fn cycle(&mut self) {
        self.control.cycle(
            &mut self.table,
            &mut self.bus,
            DT,
            &mut self.reports,
            &mut self.board,
        );
    }

    fn reports(&mut self) -> Vec<String> {
        self.reports.drain().collect()
    }
}

#[test]
fn unconfigured_slot_is_skipped() {
    let mut bench = Bench::new([Some(1), Some(2), None, Some(4)]);

    assert_eq!(bench.table.toggle_power(2), Err(ConfigError::Unconfigured { index: 2 }));
    assert_eq!(bench.table.toggle_leadership(2), Err(ConfigError::Unconfigured { index: 2 }));
    assert_eq!(bench.table.toggle_reversed(2), Err(ConfigError::Unconfigured { index: 2 }));
    assert_eq!(bench.table.cycle_gearset(2), Err(ConfigError::Unconfigured { index: 2 }));
    assert_eq!(
        bench.table.nudge_target(2, NudgeDirection::Up),
        Err(ConfigError::Unconfigured { index: 2 })
    );

    bench.table.toggle_power(0).unwrap();
    bench.table.toggle_power(3).unwrap();
    bench.cycle();

    assert_eq!(bench.bus.commanded_ports(), vec![1, 2, 4]);
    assert_eq!(bench.bus.commands[0], Command::Velocity(1, 600));
    assert_eq!(bench.bus.commands[1], Command::Brake(2));
    assert_eq!(bench.bus.commands[2], Command::Gearing(2, GearsetTier::High));
    assert_eq!(bench.bus.commands[3], Command::Velocity(4, 600));
    assert!(bench.board.get(2).is_none());
    assert!(bench.board.get(3).is_some());
}

#[test]
fn follower_uses_leader_command_and_own_direction() {
    let mut bench = Bench::new([Some(1), Some(2), Some(3), Some(4)]);
    bench.table.nudge_target(0, NudgeDirection::Down).unwrap();
    bench.table.toggle_leadership(1).unwrap();
    bench.table.toggle_reversed(1).unwrap();
    bench.table.toggle_power(0).unwrap();
    bench.bus.script(2).speeds.push_back(-450.0);

    bench.cycle();

    assert!(bench.bus.commands.contains(&Command::Velocity(1, 590)));
    assert!(bench.bus.commands.contains(&Command::Velocity(2, -590)));
    let follower = bench.table.get(1).unwrap();
    assert_eq!(follower.feedback.speed, 450.0);
    assert!((follower.derived.acceleration - 450.0 / DT).abs() < 1e-6);

    let status = bench.board.get(1).unwrap();
    assert!(status.powered);
    assert_eq!(status.target, 590);
    assert!(status.reversed);
}

#[test]
fn feedback_is_scaled_to_base_units() {
    let mut bench = Bench::new([Some(5), None, None, None]);
    bench.cycle();
    let feedback = bench.table.get(0).unwrap().feedback;
    assert!((feedback.current - 1.5).abs() < 1e-9);
    assert!((feedback.voltage - 12.0).abs() < 1e-9);
    assert_eq!(feedback.power, 10.0);
    assert_eq!(feedback.temperature, 31.0);
}

#[test]
fn failed_reads_keep_previous_values_and_other_motors_run() {
    let mut bench = Bench::new([Some(1), Some(2), None, None]);
    bench.table.toggle_power(0).unwrap();
    bench.table.toggle_power(1).unwrap();
    bench.bus.script(1).speeds.extend([300.0]);
    bench.bus.script(2).speeds.extend([310.0, 320.0]);
    bench.cycle();

    bench.bus.script(1).fail_reads = true;
    bench.cycle();

    let a = bench.table.get(0).unwrap();
    assert_eq!(a.feedback.speed, 300.0);
    assert_eq!(a.derived.acceleration, 0.0);
    assert_eq!(bench.table.get(1).unwrap().feedback.speed, 320.0);
    assert_eq!(bench.bus.commands.iter().filter(|c| **c == Command::Velocity(1, 600)).count(), 2);
}

#[test]
fn shot_trace_yields_one_report() {
    let mut bench = Bench::new([Some(1), None, None, None]);
    bench.table.cycle_gearset(0).unwrap(); // Low, target 100
    bench.table.cycle_gearset(0).unwrap(); // Medium, target 200
    bench.table.toggle_power(0).unwrap();
    bench.bus.script(1).power_w = 20.0;
    bench
        .bus
        .script(1)
        .speeds
        .extend([100.0, 170.0, 195.0, 200.0, 200.0, 140.0, 120.0, 150.0, 180.0, 200.0, 200.0]);

    for _ in 0..11 {
        bench.cycle();
    }

    let shots: Vec<String> = bench
        .reports()
        .into_iter()
        .filter(|r| r.starts_with("A shot"))
        .collect();
    // In progress for 140, 120, 150, 180: four cycles at 20 W, dipping to 120 of 200
    assert_eq!(shots, vec!["A shot 0.08s 1.6J min 120 (60%)".to_string()]);
}

#[test]
fn spinup_reports_thresholds_through_control_loop() {
    let mut bench = Bench::new([Some(1), None, None, None]);
    bench.cycle(); // arms while stopped
    bench.table.toggle_power(0).unwrap();
    bench
        .bus
        .script(1)
        .speeds
        .extend([200.0, 400.0, 580.0, 600.0, 600.0]);
    for _ in 0..5 {
        bench.cycle();
    }
    let spinups: Vec<String> = bench
        .reports()
        .into_iter()
        .filter(|r| r.contains("spin-up"))
        .collect();
    assert_eq!(
        spinups,
        vec![
            "A spin-up 66% 0.04s 0.4J".to_string(),
            "A spin-up 95% 0.06s 0.6J".to_string(),
            "A spin-up 99% 0.08s 0.8J".to_string(),
        ]
    );
}

#[test]
fn run_energy_reports_periodically_and_resets() {
    let mut bench = Bench::new([Some(1), None, None, None]);
    bench.table.toggle_power(0).unwrap();
    bench.bus.script(1).speeds.push_back(600.0);
    bench.bus.script(1).power_w = 7.5;

    // 11 s powered
    for _ in 0..550 {
        bench.cycle();
    }
    let averages: Vec<String> = bench
        .reports()
        .into_iter()
        .filter(|r| r.contains("avg power"))
        .collect();
    assert_eq!(averages.len(), 2);
    assert!(averages.iter().all(|r| r.starts_with("A avg power 7.5W")), "{:?}", averages);

    bench.table.toggle_power(0).unwrap();
    bench.cycle();
    assert_eq!(bench.table.get(0).unwrap().run_energy.time(), 0.0);
    assert_eq!(bench.table.get(0).unwrap().run_energy.energy(), 0.0);
}

#[test]
fn unpowered_motor_brakes_and_reapplies_gearset() {
    let mut bench = Bench::new([Some(9), None, None, None]);
    bench.table.cycle_gearset(0).unwrap();
    bench.cycle();
    assert_eq!(
        bench.bus.commands,
        vec![Command::Brake(9), Command::Gearing(9, GearsetTier::Low)]
    );
}
