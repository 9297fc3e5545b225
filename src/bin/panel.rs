// Keyboard panel: 1-4 select motor, P power, L lead/follow, R reverse, G gearset, +/- target, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::info;

use flywheel_bench_runtime::config::{NUM_MOTORS, TOPIC_CMD_CONFIG};
use flywheel_bench_runtime::fleet::slot_name;
use flywheel_bench_runtime::messages::{ConfigCommand, NudgeDirection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_CONFIG).await?;

    info!("Controls: 1-4=select, P=power, L=lead, R=reverse, G=gearset, +/-=target, Q=quit");
    info!("Selected: motor A");

    enable_raw_mode()?;
    let result = run_panel(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_panel(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut selected: usize = 0;

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let index = selected;
        let cmd = match code {
            KeyCode::Char(c @ '1'..='9') => {
                let slot = (c as usize) - ('1' as usize);
                if slot < NUM_MOTORS {
                    selected = slot;
                    info!("Selected: motor {}", slot_name(selected));
                }
                None
            }
            KeyCode::Char('p') => Some(ConfigCommand::TogglePower { index }),
            KeyCode::Char('l') => Some(ConfigCommand::ToggleLeadership { index }),
            KeyCode::Char('r') => Some(ConfigCommand::ToggleReversed { index }),
            KeyCode::Char('g') => Some(ConfigCommand::CycleGearset { index }),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => Some(ConfigCommand::NudgeTarget {
                index,
                direction: NudgeDirection::Up,
            }),
            KeyCode::Char('-') | KeyCode::Down => Some(ConfigCommand::NudgeTarget {
                index,
                direction: NudgeDirection::Down,
            }),
            KeyCode::Char('q') | KeyCode::Esc => break,
            _ => None,
        };

        if let Some(cmd) = cmd {
            info!("Sending {:?}", cmd);
            publisher.put(serde_json::to_string(&cmd)?).await?;
        }
    }

    Ok(())
}
