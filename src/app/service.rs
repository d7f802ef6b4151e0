//! Pump controller — the hexagonal core.
//!
//! [`PumpController`] owns the operating mode, the target drip rate and
//! the background pulsing task.  All hardware access goes through the
//! injected [`MotorPort`], so the whole controller runs against a fake
//! motor in tests.
//!
//! ```text
//!  callers ──▶ ┌──────────────────────────────┐
//!  (any thread)│        PumpController        │ ──▶ MotorPort
//!              │ task slot · mode · rate      │
//!              └──────────────┬───────────────┘
//!                             │ Arc<Shared>
//!                      ┌──────▼──────┐
//!                      │ drip-pulse  │ ──▶ MotorPort
//!                      └─────────────┘
//! ```
//!
//! ## Locking
//!
//! - The task slot serialises mode transitions and is held across motor
//!   commands and the join of the pulsing thread.  The pulsing thread never
//!   takes it.
//! - `mode` and `target_rate` each have their own lock, taken only for the
//!   duration of a read or write.  Reads never wait on a transition.
//! - The motor lock is held for exactly one command sequence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::Settings;
use crate::error::{Error, Result};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::mode::Mode;
use super::ports::{EventSink, MotorError, MotorPort};
use super::pulse::PulseTask;

// ───────────────────────────────────────────────────────────────
// Shared state (controller ↔ pulsing task)
// ───────────────────────────────────────────────────────────────

/// Pulse counters, updated by the pulsing task.
#[derive(Debug, Default)]
pub(crate) struct PulseStats {
    pulses: AtomicU64,
    faults: AtomicU64,
}

impl PulseStats {
    pub(crate) fn record_pulse(&self) {
        self.pulses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }
}

/// State reachable from both the controller and the pulsing thread.
pub(crate) struct Shared<M> {
    motor: Mutex<M>,
    mode: Mutex<Mode>,
    target_rate: Mutex<f64>,
    pub(crate) stats: PulseStats,
}

impl<M: MotorPort> Shared<M> {
    /// Run one command sequence with exclusive access to the motor.
    pub(crate) fn motor_command<T>(
        &self,
        f: impl FnOnce(&mut M) -> core::result::Result<T, MotorError>,
    ) -> core::result::Result<T, MotorError> {
        let mut motor = self.motor.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut motor)
    }
}

impl<M> Shared<M> {
    pub(crate) fn mode(&self) -> Mode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub(crate) fn target_rate(&self) -> f64 {
        *self.target_rate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_target_rate(&self, rate: f64) {
        *self.target_rate.lock().unwrap_or_else(PoisonError::into_inner) = rate;
    }
}

// ───────────────────────────────────────────────────────────────
// Snapshot
// ───────────────────────────────────────────────────────────────

/// Point-in-time view of the controller, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub mode: Mode,
    pub drips_per_minute: f64,
    /// Pulses completed since construction.
    pub pulses: u64,
    /// Motor commands that failed inside a pulse.
    pub pulse_faults: u64,
}

// ───────────────────────────────────────────────────────────────
// PumpController
// ───────────────────────────────────────────────────────────────

/// Drives one peristaltic pump in `Off`, `Run` or `Drip` mode.
///
/// Every method takes `&self`; share the controller between threads with
/// an `Arc`.  Dropping the controller stops the pump.
pub struct PumpController<M: MotorPort + 'static> {
    shared: Arc<Shared<M>>,
    /// The running pulsing task, present iff the mode is `Drip`.
    task: Mutex<Option<PulseTask>>,
    settings: Mutex<Settings>,
}

impl<M: MotorPort + 'static> PumpController<M> {
    /// Validate `settings`, start the motor driver and come up in `Off`.
    pub fn new(settings: Settings, mut motor: M) -> Result<Self> {
        settings.validate()?;
        motor.start()?;
        info!(
            "PumpController ready (drip={}ms @ {}, run @ {})",
            settings.drip_duration_ms, settings.drip_speed, settings.run_speed
        );

        Ok(Self {
            shared: Arc::new(Shared {
                motor: Mutex::new(motor),
                mode: Mutex::new(Mode::Off),
                target_rate: Mutex::new(0.0),
                stats: PulseStats::default(),
            }),
            task: Mutex::new(None),
            settings: Mutex::new(settings),
        })
    }

    // ── Transitions ───────────────────────────────────────────

    /// Pulse at `drips_per_minute`.
    ///
    /// Already dripping: only the target changes, the running task is
    /// kept.  Otherwise the motor is set to the drip level and exactly one
    /// pulsing task is started.
    pub fn enter_drip(&self, drips_per_minute: f64) -> Result<()> {
        if !drips_per_minute.is_finite() || drips_per_minute < 0.0 {
            return Err(Error::InvalidRate);
        }

        let mut task = self.lock_task();
        if task.is_some() {
            self.shared.set_target_rate(drips_per_minute);
            debug!("drip re-targeted to {:.1}/min", drips_per_minute);
            return Ok(());
        }

        let settings = self.settings();
        let from = self.shared.mode();
        self.shared
            .motor_command(|m| m.set_speed(settings.drip_speed))?;

        let previous_rate = self.shared.target_rate();
        self.shared.set_target_rate(drips_per_minute);
        match PulseTask::spawn(Arc::clone(&self.shared), settings) {
            Ok(t) => *task = Some(t),
            Err(e) => {
                error!("drip: pulsing thread spawn failed: {}", e);
                self.shared.set_target_rate(previous_rate);
                if from == Mode::Run {
                    if let Err(e) = self.shared.motor_command(|m| m.set_speed(settings.run_speed)) {
                        warn!("drip: could not restore run speed: {}", e);
                    }
                }
                return Err(Error::TaskSpawn);
            }
        }

        self.shared.set_mode(Mode::Drip);
        info!("mode {} -> drip at {:.1}/min", from, drips_per_minute);
        Ok(())
    }

    /// Run the motor continuously at the run level.
    ///
    /// A running pulsing task is fully stopped first so it can never toggle
    /// the motor while it is held at full speed.
    pub fn enter_run(&self) -> Result<()> {
        let mut task = self.lock_task();
        if task.is_some() {
            self.stop_locked(&mut task)?;
        }

        let settings = self.settings();
        let from = self.shared.mode();
        self.shared.motor_command(|m| {
            m.set_speed(settings.run_speed)?;
            m.engage()
        })?;

        self.shared.set_mode(Mode::Run);
        info!("mode {} -> run", from);
        Ok(())
    }

    /// Stop the pump.  Blocks until the pulsing task, if any, has exited.
    ///
    /// Calling this while already `Off` is a no-op with no motor command.
    pub fn stop(&self) -> Result<()> {
        let mut task = self.lock_task();
        self.stop_locked(&mut task)
    }

    /// Change the drip target.  Takes effect at the next pulse boundary.
    ///
    /// Negative or non-finite input is treated as zero.
    pub fn set_target_rate(&self, drips_per_minute: f64) {
        let rate = if drips_per_minute.is_finite() && drips_per_minute >= 0.0 {
            drips_per_minute
        } else {
            warn!("ignoring invalid drip rate {}, using 0", drips_per_minute);
            0.0
        };
        self.shared.set_target_rate(rate);
    }

    /// Stop, swap in `settings` and re-initialise the motor driver.
    ///
    /// Invalid settings are rejected before any motor command.
    pub fn reconfigure(&self, settings: Settings) -> Result<()> {
        settings.validate()?;

        let mut task = self.lock_task();
        self.stop_locked(&mut task)?;

        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings;
        self.shared.motor_command(|m| m.start())?;
        info!(
            "reconfigured (drip={}ms @ {}, run @ {})",
            settings.drip_duration_ms, settings.drip_speed, settings.run_speed
        );
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current operating mode.  Never blocks on a transition in progress.
    pub fn state(&self) -> Mode {
        self.shared.mode()
    }

    /// Target drip rate in drips per minute, kept across mode changes.
    pub fn target_rate(&self) -> f64 {
        self.shared.target_rate()
    }

    /// The active settings.
    pub fn settings(&self) -> Settings {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mode, rate and pulse counters.  Each field is read on its own, so a
    /// concurrent transition may show between them.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.state(),
            drips_per_minute: self.target_rate(),
            pulses: self.shared.stats.pulses.load(Ordering::Relaxed),
            pulse_faults: self.shared.stats.faults.load(Ordering::Relaxed),
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command and report what changed through `sink`.
    pub fn handle_command(&self, cmd: AppCommand, sink: &mut impl EventSink) -> Result<()> {
        let from = self.state();

        let result = match cmd {
            AppCommand::Drip(rate) => self.enter_drip(rate).map(|()| {
                sink.emit(&AppEvent::RateChanged(self.target_rate()));
            }),
            AppCommand::Run => self.enter_run(),
            AppCommand::Off => self.stop(),
            AppCommand::SetRate(rate) => {
                self.set_target_rate(rate);
                sink.emit(&AppEvent::RateChanged(self.target_rate()));
                Ok(())
            }
            AppCommand::Reconfigure(settings) => self.reconfigure(settings).map(|()| {
                sink.emit(&AppEvent::Reconfigured(settings));
            }),
            AppCommand::Status => {
                sink.emit(&AppEvent::Status(self.snapshot()));
                Ok(())
            }
        };

        let to = self.state();
        if to != from {
            sink.emit(&AppEvent::ModeChanged { from, to });
        }
        result
    }

    // ── Internal ──────────────────────────────────────────────

    fn lock_task(&self) -> MutexGuard<'_, Option<PulseTask>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop sequence; the caller holds the task slot.
    ///
    /// Once a pulsing task has been joined the mode is `Off` even if the
    /// final release fails, since no task remains to drip.
    fn stop_locked(&self, task: &mut Option<PulseTask>) -> Result<()> {
        let from = self.shared.mode();
        match task.take() {
            Some(pulse) => {
                pulse.stop();
                self.shared.set_mode(Mode::Off);
                self.shared.motor_command(|m| m.release())?;
            }
            None if from == Mode::Off => {
                debug!("stop: already off");
                return Ok(());
            }
            None => {
                self.shared.motor_command(|m| m.release())?;
                self.shared.set_mode(Mode::Off);
            }
        }
        info!("mode {} -> off", from);
        Ok(())
    }
}

impl<M: MotorPort + 'static> Drop for PumpController<M> {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut task = task.take();
        if let Err(e) = self.stop_locked(&mut task) {
            warn!("PumpController dropped with motor fault: {}", e);
        }
    }
}
