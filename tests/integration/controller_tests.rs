//! Integration tests for the PumpController → pulsing task → motor pipeline.
//!
//! A short pulse keeps the tests quick: at 240 drips/min with a 20 ms
//! pulse the task fires roughly every 250 ms.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use coldbrew::app::commands::AppCommand;
use coldbrew::app::events::AppEvent;
use coldbrew::app::ports::MotorError;
use coldbrew::{Error, Mode, PumpController, Settings};

use super::mock_hw::{MockMotor, MotorCall, RecordingSink};

const FAST: Settings = Settings {
    drip_duration_ms: 20,
    drip_speed: 100,
    run_speed: 255,
};

fn make_controller() -> (PumpController<MockMotor>, MockMotor) {
    let motor = MockMotor::new();
    let ctl = PumpController::new(FAST, motor.clone()).unwrap();
    (ctl, motor)
}

/// Calls recorded after the last `Engage`.
fn tail_after_last_engage(calls: &[MotorCall]) -> Vec<MotorCall> {
    let idx = calls
        .iter()
        .rposition(|c| *c == MotorCall::Engage)
        .expect("motor was never engaged");
    calls[idx + 1..].to_vec()
}

// ── Construction ─────────────────────────────────────────────

#[test]
fn new_controller_is_off_and_started_once() {
    let (ctl, motor) = make_controller();
    assert_eq!(ctl.state(), Mode::Off);
    assert_eq!(motor.calls(), vec![MotorCall::Start]);
}

// ── Drip ─────────────────────────────────────────────────────

#[test]
fn enter_drip_reports_drip_and_rate() {
    let (ctl, motor) = make_controller();
    ctl.enter_drip(60.0).unwrap();

    assert_eq!(ctl.state(), Mode::Drip);
    assert_eq!(ctl.target_rate(), 60.0);
    assert_eq!(motor.calls()[1], MotorCall::SetSpeed(FAST.drip_speed));

    ctl.stop().unwrap();
}

#[test]
fn re_entering_drip_only_retargets() {
    let (ctl, motor) = make_controller();
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(300));
    ctl.enter_drip(120.0).unwrap();
    thread::sleep(Duration::from_millis(300));

    assert_eq!(ctl.state(), Mode::Drip);
    assert_eq!(ctl.target_rate(), 120.0);
    ctl.stop().unwrap();

    assert_eq!(motor.count(MotorCall::SetSpeed(FAST.drip_speed)), 1);
    assert_eq!(motor.engage_threads().len(), 1, "a second pulsing task was spawned");
}

#[test]
fn pulses_keep_coming_while_dripping() {
    let (ctl, _motor) = make_controller();
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(700));

    let snap = ctl.snapshot();
    assert!(snap.pulses >= 2, "expected repeated pulses, got {}", snap.pulses);
    assert_eq!(snap.pulse_faults, 0);
    ctl.stop().unwrap();
}

#[test]
fn rate_change_applies_at_next_pulse_boundary() {
    let (ctl, _motor) = make_controller();
    // Zero rate: one pulse, then idle.
    ctl.enter_drip(0.0).unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(ctl.snapshot().pulses, 1);

    ctl.set_target_rate(240.0);
    thread::sleep(Duration::from_millis(1800));
    assert!(ctl.snapshot().pulses >= 2);
    ctl.stop().unwrap();
}

#[test]
fn pulse_failures_are_counted_not_fatal() {
    let (ctl, motor) = make_controller();
    motor.fail_engage(true);
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(600));

    let snap = ctl.snapshot();
    assert_eq!(snap.mode, Mode::Drip);
    assert!(snap.pulse_faults >= 2);
    assert!(snap.pulses >= 2, "loop must keep cycling after a failed pulse");

    motor.fail_engage(false);
    ctl.stop().unwrap();
}

#[test]
fn pulse_release_failures_are_counted_not_fatal() {
    let (ctl, motor) = make_controller();
    motor.fail_release(true);
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(600));

    let snap = ctl.snapshot();
    assert_eq!(snap.mode, Mode::Drip);
    assert!(snap.pulse_faults >= 2);
    assert!(motor.count(MotorCall::Engage) >= 2, "loop must keep engaging after a failed release");

    motor.fail_release(false);
    ctl.stop().unwrap();
}

#[test]
fn vanishing_rate_idles_and_recovers_on_retarget() {
    let (ctl, _motor) = make_controller();
    ctl.enter_drip(1e-20).unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(ctl.snapshot().pulses, 1);

    ctl.set_target_rate(240.0);
    thread::sleep(Duration::from_millis(1800));

    let snap = ctl.snapshot();
    assert_eq!(snap.mode, Mode::Drip);
    assert!(snap.pulses >= 2, "pulsing task must survive a tiny rate");
    ctl.stop().unwrap();
}

// ── Run ──────────────────────────────────────────────────────

#[test]
fn enter_run_from_drip_stops_pulsing_first() {
    let (ctl, motor) = make_controller();
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(300));

    ctl.enter_run().unwrap();
    assert_eq!(ctl.state(), Mode::Run);
    let pulses_at_run = ctl.snapshot().pulses;
    thread::sleep(Duration::from_millis(500));

    let calls = motor.calls();
    let run_idx = calls
        .iter()
        .position(|c| *c == MotorCall::SetSpeed(FAST.run_speed))
        .unwrap();
    assert_eq!(calls[run_idx - 1], MotorCall::Release);
    assert_eq!(&calls[run_idx + 1..], &[MotorCall::Engage]);
    assert_eq!(ctl.snapshot().pulses, pulses_at_run);

    ctl.stop().unwrap();
}

#[test]
fn set_speed_failure_in_enter_run_leaves_mode_unchanged() {
    let (ctl, motor) = make_controller();
    motor.fail_set_speed(true);

    let err = ctl.enter_run().unwrap_err();
    assert!(matches!(err, Error::HardwareCommandFailed(MotorError::Unavailable(_))));
    assert_eq!(ctl.state(), Mode::Off);
    assert_eq!(motor.count(MotorCall::Engage), 0);
}

#[test]
fn run_failure_after_leaving_drip_commits_the_stop() {
    let (ctl, motor) = make_controller();
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(100));
    motor.fail_set_speed(true);

    let err = ctl.enter_run().unwrap_err();
    assert!(matches!(err, Error::HardwareCommandFailed(_)));
    assert_eq!(ctl.state(), Mode::Off);

    let calls = motor.calls();
    assert_eq!(calls.last(), Some(&MotorCall::Release));
    thread::sleep(Duration::from_millis(400));
    assert_eq!(motor.calls(), calls, "pump moved after the failed run");
    assert!(!calls.contains(&MotorCall::SetSpeed(FAST.run_speed)));
}

#[test]
fn set_speed_failure_in_enter_drip_starts_no_task() {
    let (ctl, motor) = make_controller();
    ctl.set_target_rate(10.0);
    motor.fail_set_speed(true);

    assert!(ctl.enter_drip(60.0).is_err());
    assert_eq!(ctl.state(), Mode::Off);
    assert_eq!(ctl.target_rate(), 10.0);

    thread::sleep(Duration::from_millis(100));
    assert_eq!(motor.count(MotorCall::Engage), 0);
}

#[test]
fn run_to_drip_sets_drip_level() {
    let (ctl, motor) = make_controller();
    ctl.enter_run().unwrap();
    ctl.enter_drip(30.0).unwrap();

    assert_eq!(ctl.state(), Mode::Drip);
    assert!(motor.calls().contains(&MotorCall::SetSpeed(FAST.drip_speed)));
    ctl.stop().unwrap();
}

// ── Stop ─────────────────────────────────────────────────────

#[test]
fn stop_from_off_is_idempotent_and_silent() {
    let (ctl, motor) = make_controller();
    ctl.stop().unwrap();
    ctl.stop().unwrap();
    assert_eq!(ctl.state(), Mode::Off);
    assert_eq!(motor.calls(), vec![MotorCall::Start]);
}

#[test]
fn stop_from_run_releases_once() {
    let (ctl, motor) = make_controller();
    ctl.enter_run().unwrap();
    ctl.stop().unwrap();
    ctl.stop().unwrap();

    assert_eq!(ctl.state(), Mode::Off);
    assert_eq!(motor.count(MotorCall::Release), 1);
}

#[test]
fn failed_release_from_run_keeps_run() {
    let (ctl, motor) = make_controller();
    ctl.enter_run().unwrap();
    motor.fail_release(true);

    assert!(matches!(ctl.stop(), Err(Error::HardwareCommandFailed(_))));
    assert_eq!(ctl.state(), Mode::Run);

    motor.fail_release(false);
    ctl.stop().unwrap();
    assert_eq!(ctl.state(), Mode::Off);
}

#[test]
fn failed_release_from_drip_still_ends_off() {
    let (ctl, motor) = make_controller();
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(100));
    motor.fail_release(true);

    assert!(matches!(ctl.stop(), Err(Error::HardwareCommandFailed(_))));
    assert_eq!(ctl.state(), Mode::Off);

    let engages = motor.count(MotorCall::Engage);
    thread::sleep(Duration::from_millis(400));
    assert_eq!(motor.count(MotorCall::Engage), engages, "pulsing continued after stop");
    motor.fail_release(false);
}

#[test]
fn stop_interrupts_a_long_inter_drip_wait() {
    let (ctl, motor) = make_controller();
    // One drip per minute: after the first pulse the task waits ~60 s.
    ctl.enter_drip(1.0).unwrap();
    thread::sleep(Duration::from_millis(200));

    let started = Instant::now();
    ctl.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(ctl.state(), Mode::Off);

    let after_stop = motor.calls().len();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(motor.calls().len(), after_stop, "pulsing continued after stop");
}

#[test]
fn concurrent_stops_neither_deadlock_nor_double_release() {
    let (ctl, motor) = make_controller();
    let ctl = Arc::new(ctl);
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(300));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let ctl = Arc::clone(&ctl);
            thread::spawn(move || ctl.stop())
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }

    assert_eq!(ctl.state(), Mode::Off);
    // Pulse release, then the single release from the stop sequence.
    assert_eq!(
        tail_after_last_engage(&motor.calls()),
        vec![MotorCall::Release, MotorCall::Release]
    );
}

#[test]
fn dropping_the_controller_stops_pulsing() {
    let (ctl, motor) = make_controller();
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(100));
    drop(ctl);

    let calls = motor.calls();
    assert_eq!(calls.last(), Some(&MotorCall::Release));
    thread::sleep(Duration::from_millis(300));
    assert_eq!(motor.calls().len(), calls.len());
}

// ── Concurrency ──────────────────────────────────────────────

#[test]
fn readers_only_see_whole_values_during_transitions() {
    let (ctl, _motor) = make_controller();
    let ctl = Arc::new(ctl);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let ctl = Arc::clone(&ctl);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let rate = ctl.target_rate();
                    assert!(rate == 0.0 || rate == 30.0 || rate == 90.0, "torn rate {rate}");
                    let _ = ctl.state();
                }
            })
        })
        .collect();

    for i in 0..10 {
        let rate = if i % 2 == 0 { 30.0 } else { 90.0 };
        ctl.enter_drip(rate).unwrap();
        assert_eq!(ctl.state(), Mode::Drip);
        ctl.stop().unwrap();
        assert_eq!(ctl.state(), Mode::Off);
    }

    for r in readers {
        r.join().unwrap();
    }
}

// ── Reconfigure ──────────────────────────────────────────────

#[test]
fn reconfigure_rejects_invalid_settings_without_hardware_calls() {
    let (ctl, motor) = make_controller();
    ctl.enter_run().unwrap();
    let before = motor.calls().len();

    let bad = Settings { drip_speed: 300, run_speed: 200, ..FAST };
    assert!(matches!(ctl.reconfigure(bad), Err(Error::InvalidSettings(_))));
    assert_eq!(motor.calls().len(), before);
    assert_eq!(ctl.state(), Mode::Run);
    assert_eq!(ctl.settings(), FAST);
}

#[test]
fn reconfigure_stops_swaps_and_restarts_the_motor() {
    let (ctl, motor) = make_controller();
    ctl.enter_drip(240.0).unwrap();
    thread::sleep(Duration::from_millis(100));

    let next = Settings { drip_duration_ms: 30, drip_speed: 80, run_speed: 200 };
    ctl.reconfigure(next).unwrap();

    assert_eq!(ctl.state(), Mode::Off);
    assert_eq!(ctl.settings(), next);
    assert_eq!(motor.count(MotorCall::Start), 2);
    assert_eq!(motor.calls().last(), Some(&MotorCall::Start));

    let restarted_at = motor.calls().len();
    ctl.enter_drip(60.0).unwrap();
    assert_eq!(motor.calls()[restarted_at], MotorCall::SetSpeed(80));
    ctl.stop().unwrap();
}

// ── Command handling ─────────────────────────────────────────

#[test]
fn commands_emit_rate_and_mode_events() {
    let (ctl, _motor) = make_controller();
    let mut sink = RecordingSink::new();

    ctl.handle_command(AppCommand::Drip(45.0), &mut sink).unwrap();
    ctl.handle_command(AppCommand::Off, &mut sink).unwrap();

    assert_eq!(
        sink.events,
        vec![
            AppEvent::RateChanged(45.0),
            AppEvent::ModeChanged { from: Mode::Off, to: Mode::Drip },
            AppEvent::ModeChanged { from: Mode::Drip, to: Mode::Off },
        ]
    );
}

#[test]
fn failed_command_emits_nothing() {
    let (ctl, motor) = make_controller();
    let mut sink = RecordingSink::new();
    motor.fail_set_speed(true);

    assert!(ctl.handle_command(AppCommand::Run, &mut sink).is_err());
    assert!(sink.events.is_empty());
}

#[test]
fn status_command_reports_snapshot() {
    let (ctl, _motor) = make_controller();
    let mut sink = RecordingSink::new();
    ctl.set_target_rate(12.0);

    ctl.handle_command(AppCommand::Status, &mut sink).unwrap();
    match &sink.events[..] {
        [AppEvent::Status(snap)] => {
            assert_eq!(snap.mode, Mode::Off);
            assert_eq!(snap.drips_per_minute, 12.0);
        }
        other => panic!("unexpected events {other:?}"),
    }
}
