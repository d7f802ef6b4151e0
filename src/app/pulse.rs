//! Drip pulsing task.
//!
//! The peristaltic pump cannot turn reliably below its drip level, so a
//! slow flow is approximated by pulsing: engage the motor for one drip
//! duration, release it, then wait long enough to hit the target rate.
//!
//! ```text
//!   ┌────────────── one cycle ──────────────┐
//!   │ stop? │ engage ─ on_time ─ release │ stop? │ wait(rate) │
//!   └───────────────────────────────────────┘
//! ```
//!
//! Pacing uses plain sleeps, so drift accumulates over long runs.  Only
//! the inter-drip wait is interruptible; a stop request lands within one
//! in-flight pulse.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use super::ports::MotorPort;
use super::service::Shared;
use crate::config::Settings;

/// Hard ceiling on the drip rate, independent of the configured pulse.
///
/// At the default 250 ms pulse this is exactly where the inter-drip wait
/// reaches zero.  Longer pulses hit a zero wait earlier (at
/// `60_000 / drip_duration_ms`) and the clamp in [`inter_drip_wait`]
/// covers that.  Shorter pulses are still held at 240/min.
pub const MAX_DRIPS_PER_MINUTE: f64 = 240.0;

/// Re-check interval for the target rate while it is zero.
pub const IDLE_POLL: Duration = Duration::from_secs(1);

const SECS_PER_MINUTE: f64 = 60.0;
const MILLIS_PER_SEC: f64 = 1000.0;

/// Time to wait after a pulse so the cycle hits `drips_per_minute`.
///
/// The rate is capped at [`MAX_DRIPS_PER_MINUTE`] and a negative result
/// clamps to zero.  Returns `None` when the rate is zero (or NaN), or so
/// small that the wait does not fit in a [`Duration`]: the task idles as
/// for a zero rate.
pub fn inter_drip_wait(drips_per_minute: f64, drip_duration_ms: u32) -> Option<Duration> {
    if drips_per_minute.is_nan() || drips_per_minute <= 0.0 {
        return None;
    }
    let rate = drips_per_minute.min(MAX_DRIPS_PER_MINUTE);
    let secs = SECS_PER_MINUTE / rate - f64::from(drip_duration_ms) / MILLIS_PER_SEC;
    Duration::try_from_secs_f64(secs.max(0.0)).ok()
}

// ---------------------------------------------------------------------------
// Stop signal
// ---------------------------------------------------------------------------

/// Single-slot, level-triggered stop request with an interruptible wait.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake any waiter.  Repeated requests collapse.
    pub fn request(&self) {
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `timeout`, returning early once the signal is raised.
    /// Returns `true` if a stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |stop| !*stop)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

// ---------------------------------------------------------------------------
// Task handle
// ---------------------------------------------------------------------------

/// Handle to the one running pulsing thread.
pub(crate) struct PulseTask {
    stop: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

impl PulseTask {
    /// Spawn the pulsing thread with a snapshot of the active settings.
    pub(crate) fn spawn<M: MotorPort + 'static>(
        shared: Arc<Shared<M>>,
        settings: Settings,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(StopSignal::new());
        let task_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("drip-pulse".into())
            .spawn(move || run(&shared, &task_stop, settings.drip_duration_ms))?;
        Ok(Self { stop, handle })
    }

    /// Signal the thread and block until it has exited.
    pub(crate) fn stop(self) {
        self.stop.request();
        if self.handle.join().is_err() {
            warn!("pulsing task panicked before acknowledging stop");
        }
    }
}

fn run<M: MotorPort>(shared: &Shared<M>, stop: &StopSignal, drip_duration_ms: u32) {
    let on_time = Duration::from_millis(u64::from(drip_duration_ms));
    debug!("pulsing task started (on_time={:?})", on_time);

    'cycle: loop {
        if stop.is_requested() {
            break;
        }

        pulse(shared, on_time);

        if stop.is_requested() {
            break;
        }

        let wait = loop {
            match inter_drip_wait(shared.target_rate(), drip_duration_ms) {
                Some(wait) => break wait,
                None => {
                    if stop.wait(IDLE_POLL) {
                        break 'cycle;
                    }
                }
            }
        };
        if stop.wait(wait) {
            break;
        }
    }

    debug!("pulsing task exited");
}

/// One drip.  Motor failures are counted and logged, never fatal.
fn pulse<M: MotorPort>(shared: &Shared<M>, on_time: Duration) {
    if let Err(e) = shared.motor_command(|m| m.engage()) {
        shared.stats.record_fault();
        warn!("drip pulse: engage failed: {}", e);
    }

    thread::sleep(on_time);

    if let Err(e) = shared.motor_command(|m| m.release()) {
        shared.stats.record_fault();
        warn!("drip pulse: release failed: {}", e);
    }

    shared.stats.record_pulse();
}
