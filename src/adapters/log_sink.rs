//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing controller events through the
//! `log` facade.  A network front-end would implement the same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ModeChanged { from, to } => {
                info!("MODE | {} -> {}", from, to);
            }
            AppEvent::RateChanged(rate) => {
                info!("RATE | {:.1} drips/min", rate);
            }
            AppEvent::Reconfigured(s) => {
                info!(
                    "SETTINGS | dripDuration={}ms dripSpeed={} runSpeed={}",
                    s.drip_duration_ms, s.drip_speed, s.run_speed
                );
            }
            AppEvent::Status(snap) => {
                info!(
                    "STATUS | mode={} | rate={:.1}/min | pulses={} faults={}",
                    snap.mode, snap.drips_per_minute, snap.pulses, snap.pulse_faults
                );
            }
        }
    }
}
