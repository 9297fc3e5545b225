use clap::Parser;
use tracing_subscriber::EnvFilter;

use flywheel_bench_runtime::config::{RuntimeConfig, LOOP_HZ, MOTOR_PORT, NUM_MOTORS};

/// Flywheel motor bench: control loop, event detection and panel telemetry
#[derive(Debug, Parser)]
#[command(name = "flywheel-bench", version)]
struct Args {
    /// Serial port of the motor bus
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,

    /// Control loop frequency
    #[arg(long, default_value_t = LOOP_HZ)]
    loop_hz: u64,

    /// Run against the simulated bus instead of hardware
    #[arg(long)]
    simulate: bool,

    /// Number of motors on the simulated bus
    #[arg(long, default_value_t = NUM_MOTORS)]
    simulated_motors: usize,
}

impl From<Args> for RuntimeConfig {
    fn from(args: Args) -> Self {
        Self {
            motor_port: Some(args.port),
            loop_hz: args.loop_hz,
            simulate: args.simulate,
            simulated_motors: args.simulated_motors,
        }
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RuntimeConfig::from(Args::parse());
    if let Err(e) = flywheel_bench_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
