// Fixed-rate control runtime
// Configuration commands from the panel are queued by zenoh and applied at the
// start of each cycle, so every cycle sees a table where all invariants hold.

use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::{
    cycle_period, RuntimeConfig, MOTOR_PORT, REPORT_HISTORY_LINES, REPORT_QUEUE_DEPTH,
    TOPIC_CMD_CONFIG, TOPIC_HEALTH, TOPIC_REPORT, TOPIC_REPORT_HISTORY, TOPIC_STATUS_PREFIX,
};
use crate::control::ControlLoop;
use crate::fleet::{discover, MotorTable};
use crate::messages::{ConfigCommand, RuntimeHealth};
use crate::motor::{FeetechBus, MotorBus, SimBus};
use crate::report::{ReportBuffer, ReportSink};
use crate::status::{MotorStatus, StatusBoard, StatusObserver};

pub struct Runtime<B: MotorBus> {
    table: MotorTable,
    bus: B,
    control: ControlLoop,
    pending: ReportBuffer,
    history: ReportBuffer,
    board: StatusBoard,
}

impl<B: MotorBus> Runtime<B> {
    /// Scan the bus and build the motor table
    pub fn new(mut bus: B) -> Self {
        let table = discover(&mut bus);
        let mut board = StatusBoard::new();
        for index in table.configured() {
            if let Some(status) = table.status(index) {
                board.motor_changed(&status);
            }
        }
        Self {
            table,
            bus,
            control: ControlLoop::new(),
            pending: ReportBuffer::new(REPORT_QUEUE_DEPTH),
            history: ReportBuffer::new(REPORT_HISTORY_LINES),
            board,
        }
    }

    pub fn table(&self) -> &MotorTable {
        &self.table
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn health(&self) -> RuntimeHealth {
        if self.table.configured().next().is_some() {
            RuntimeHealth::Ok
        } else {
            RuntimeHealth::NoMotors
        }
    }

    /// Apply a configuration command and refresh the affected motors' status
    pub fn on_command(&mut self, cmd: ConfigCommand) {
        info!("Received command: {:?}", &cmd);
        // Rejections are logged where they are detected
        if let Ok(changed) = self.table.apply(&cmd) {
            for index in changed {
                if let Some(status) = self.table.status(index) {
                    self.board.motor_changed(&status);
                }
            }
        }
    }

    /// Run one control cycle
    pub fn step(&mut self, dt: f64) {
        self.control.cycle(
            &mut self.table,
            &mut self.bus,
            dt,
            &mut self.pending,
            &mut self.board,
        );
    }

    /// Report lines produced since the last call; also appended to the history
    pub fn take_reports(&mut self) -> Vec<String> {
        let lines: Vec<String> = self.pending.drain().collect();
        for line in &lines {
            self.history.emit(line);
        }
        lines
    }

    pub fn report_history(&self) -> String {
        self.history.render()
    }

    pub fn take_status_updates(&mut self) -> Vec<MotorStatus> {
        self.board.take_dirty()
    }
}

pub async fn run(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if config.use_simulator() {
        let dt = cycle_period(config.loop_hz).as_secs_f64();
        info!("Using simulated bus with {} motors", config.simulated_motors);
        run_with_bus(SimBus::with_motors(config.simulated_motors, dt), &config).await
    } else {
        let port = config.motor_port.as_deref().unwrap_or(MOTOR_PORT);
        info!("Opening motor bus on {}", port);
        let bus = FeetechBus::open(port)?;
        run_with_bus(bus, &config).await
    }
}

async fn run_with_bus<B: MotorBus>(
    bus: B,
    config: &RuntimeConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_CONFIG).await?;
    let pub_report = session.declare_publisher(TOPIC_REPORT).await?;
    let pub_history = session.declare_publisher(TOPIC_REPORT_HISTORY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    info!("Scanning motor bus...");
    let mut runtime = Runtime::new(bus);
    if runtime.health() == RuntimeHealth::NoMotors {
        warn!("No motors found, running with an empty table");
    }

    let period = cycle_period(config.loop_hz);
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_cycle: Option<Instant> = None;

    info!(
        "Runtime started: {}Hz loop, {} motors configured",
        config.loop_hz,
        runtime.table().configured().count()
    );
    info!("Subscribed to: {}", TOPIC_CMD_CONFIG);
    info!(
        "Publishing to: {}, {}, {}/*, {}",
        TOPIC_REPORT, TOPIC_REPORT_HISTORY, TOPIC_STATUS_PREFIX, TOPIC_HEALTH
    );

    loop {
        tick.tick().await;

        // 1. Apply all pending configuration commands (non-blocking)
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ConfigCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        }

        // 2. Control cycle with the measured period
        let now = Instant::now();
        let dt = last_cycle.map_or(period, |last| now.duration_since(last));
        last_cycle = Some(now);
        runtime.step(dt.max(Duration::from_micros(1)).as_secs_f64());

        // 3. Reports, status and health, best effort
        let reports = runtime.take_reports();
        for line in &reports {
            published("report", pub_report.put(line.clone()).await);
        }
        if !reports.is_empty() {
            published("report history", pub_history.put(runtime.report_history()).await);
        }
        for status in runtime.take_status_updates() {
            let what = format!("status of motor {}", status.name);
            let key = format!("{}/{}", TOPIC_STATUS_PREFIX, status.name);
            match serde_json::to_string(&status) {
                Ok(json) => published(&what, session.put(key, json).await),
                Err(e) => published(&what, Err(e)),
            };
        }
        match serde_json::to_string(&runtime.health()) {
            Ok(json) => published("health", pub_health.put(json).await),
            Err(e) => published("health", Err(e)),
        };
    }
}

/// A failed publish is logged and never stops the control loop
fn published<E: std::fmt::Display>(what: &str, result: Result<(), E>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to publish {}: {}", what, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::NudgeDirection;

    #[test]
    fn test_commands_refresh_status() {
        let mut runtime = Runtime::new(SimBus::with_motors(2, 0.02));
        assert_eq!(runtime.take_status_updates().len(), 2);

        runtime.on_command(ConfigCommand::NudgeTarget {
            index: 0,
            direction: NudgeDirection::Down,
        });
        let updates = runtime.take_status_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].target, 590);

        // Rejected: nothing to refresh
        runtime.on_command(ConfigCommand::TogglePower { index: 3 });
        assert!(runtime.take_status_updates().is_empty());
    }

    #[test]
    fn test_simulated_spinup_is_reported() {
        let mut runtime = Runtime::new(SimBus::with_motors(1, 0.02));
        runtime.step(0.02);
        runtime.on_command(ConfigCommand::TogglePower { index: 0 });
        for _ in 0..150 {
            runtime.step(0.02);
        }
        let reports = runtime.take_reports();
        assert!(reports.iter().any(|r| r.starts_with("A spin-up 66%")), "{:?}", reports);
        assert!(reports.iter().any(|r| r.starts_with("A spin-up 95%")), "{:?}", reports);
        assert!(runtime.report_history().contains("A spin-up 66%"));
        assert!(runtime.take_reports().is_empty());
    }

    #[test]
    fn test_simulated_shot_is_reported() {
        let mut runtime = Runtime::new(SimBus::with_motors(1, 0.02));
        runtime.on_command(ConfigCommand::TogglePower { index: 0 });
        for _ in 0..200 {
            runtime.step(0.02);
        }
        runtime.take_reports();

        runtime.bus_mut().inject_load(1, 150.0).unwrap();
        for _ in 0..60 {
            runtime.step(0.02);
        }
        let reports = runtime.take_reports();
        let shots: Vec<_> = reports.iter().filter(|r| r.starts_with("A shot")).collect();
        assert_eq!(shots.len(), 1, "{:?}", reports);
    }

    #[test]
    fn test_publish_failure_is_not_fatal() {
        assert!(published::<String>("health", Ok(())));
        assert!(!published("health", Err("session closed".to_string())));
        let bad = serde_json::from_str::<ConfigCommand>("{").map(|_| ());
        assert!(!published("status of motor A", bad));
    }

    #[test]
    fn test_health() {
        assert_eq!(Runtime::new(SimBus::with_motors(0, 0.02)).health(), RuntimeHealth::NoMotors);
        assert_eq!(Runtime::new(SimBus::with_motors(3, 0.02)).health(), RuntimeHealth::Ok);
    }
}
