//! Cold Brew bench console — main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                   │
//! │  stdin console   LogEventSink   FileSettingsStore        │
//! │  (AppCommand)    (EventSink)    (ConfigPort)             │
//! │                                                          │
//! │  ────────────── Port Trait Boundary ──────────────       │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │        PumpController (mode · rate · pulses)       │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │                        MotorPort                         │
//! │        MotorHat (I2C, production) · SimulatedMotor       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! One command per line: `drip <rate>`, `rate <rate>`, `run`, `off`,
//! `status`, `settings <durationMs> <dripSpeed> <runSpeed>`, `quit`.

#![deny(unused_must_use)]

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use log::{error, info, warn};

use coldbrew::PumpController;
use coldbrew::adapters::log_sink::LogEventSink;
use coldbrew::adapters::settings_store::{FileSettingsStore, load_or_default};
use coldbrew::app::commands::AppCommand;
use coldbrew::app::ports::ConfigPort;
use coldbrew::config::AppConfig;
use coldbrew::drivers::hw_init;

fn main() -> Result<()> {
    // ── 1. Configuration + logging ────────────────────────────
    let config = AppConfig::load().context("loading configuration")?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    info!("Cold Brew v{} ({:?})", env!("CARGO_PKG_VERSION"), config.environment);

    // ── 2. Settings (stored or defaults) ──────────────────────
    let store = FileSettingsStore::new(&config.settings_dir);
    let settings = load_or_default(&store);

    // ── 3. Motor + controller ─────────────────────────────────
    let motor = hw_init::init_motor(config.environment, &config.motor)
        .context("binding motor transport")?;
    let controller = PumpController::new(settings, motor).context("starting pump controller")?;
    let mut sink = LogEventSink::new();

    // ── 4. Console loop ───────────────────────────────────────
    for line in io::stdin().lock().lines() {
        let line = line.context("reading console input")?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "quit" | "exit") {
            break;
        }

        let cmd = match AppCommand::parse(input) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        // Persist first so a restart comes back with what the user chose.
        if let AppCommand::Reconfigure(new_settings) = cmd {
            if let Err(e) = store.save(&new_settings) {
                error!("settings not saved: {}", e);
                continue;
            }
        }

        if let Err(e) = controller.handle_command(cmd, &mut sink) {
            error!("'{}' failed: {}", input, e);
        }
    }

    controller.stop().context("stopping pump")?;
    info!("pump off, exiting");
    Ok(())
}
