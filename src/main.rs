use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{info, warn};
use parking_lot::Mutex;
use tokio::time::{MissedTickBehavior, interval};

use q_fx::config::init_logging;
use q_fx::console::execute_console_command;
use q_fx::dmx_output::{describe_frame, mix_fixture_outputs};
use q_fx::dmx_types::DMX_CHANNELS;
use q_fx::input::CommandInput;
use q_fx::{ChannelSink, EffectScheduler, EngineConfig, Rig, Scheduler};

struct EngineState {
    rig: Rig,
    scheduler: EffectScheduler,
    universe: [u8; DMX_CHANNELS],
}

fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = EngineConfig::load(config_path.as_deref())?;
    init_logging(&config);

    let rig = match &config.rig_path {
        Some(path) => Rig::load(path)?,
        None => Rig::demo()?,
    };
    info!(
        "Starting: {} fixtures, {} effects, tick {}ms, seed {:?}",
        rig.fixtures.len(),
        rig.effects.len(),
        config.tick_interval_ms,
        config.seed
    );

    let state = Arc::new(Mutex::new(EngineState {
        rig,
        scheduler: EffectScheduler::from_seed(config.seed),
        universe: [0u8; DMX_CHANNELS],
    }));

    let monitor = {
        let state = Arc::clone(&state);
        let period = Duration::from_millis(config.monitor_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let universe = state.lock().universe;
                info!("DMX {}", describe_frame(&universe));
            }
        })
    };

    let mut input = CommandInput::stdin();
    let mut ticker = interval(Duration::from_millis(config.tick_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let mut guard = state.lock();
        let EngineState {
            rig,
            scheduler,
            universe,
        } = &mut *guard;

        for line in input.drain() {
            match execute_console_command(rig, &line) {
                Ok(reply) => println!("{reply}"),
                Err(e) => warn!("{e}"),
            }
        }

        let report = scheduler.tick(now_ms(), &rig.effects, &mut rig.fixtures);
        *universe = mix_fixture_outputs(rig.fixtures.fixtures());

        if config.max_ticks.is_some_and(|max| report.tick >= max) {
            info!("Stopping after {} ticks", report.tick);
            break;
        }
    }

    monitor.abort();
    Ok(())
}
