//! Continuous runs and run-to-date through the controller.

mod common;

use common::{ScriptedFactory, WAIT, controller, controller_with, date, jan};
use wn_run::{FinishReason, RunError, RunMode, RunState};

#[test]
fn run_reaches_the_end_date() {
    let (mut c, rec) = controller(ScriptedFactory::default());
    c.run().unwrap();
    assert!(c.controls().stop);
    assert!(c.controls().pause);
    assert!(c.wait_until_idle(WAIT));

    assert_eq!(c.last_finish(), Some(&FinishReason::ReachedEndDate));
    assert_eq!(c.last_snapshot().map(|s| s.timestamp), Some(jan(5)));
    let rec = rec.borrow();
    assert_eq!(rec.annotated_flows, [0.0, 1.0, 2.0, 3.0, 4.0]);
    assert!(rec.annotations.is_empty());
    assert_eq!(rec.lock_calls.last(), Some(&false));
    assert_eq!(rec.statuses.last().map(String::as_str), Some("Run completed"));
    assert!(rec.errors.is_empty());

    // progress never goes backwards
    let shown: Vec<usize> = rec.shown_progress().iter().map(|p| p.current_index).collect();
    assert!(shown.windows(2).all(|w| w[0] < w[1]));
    assert!(shown.last().is_some_and(|&i| i <= 4));
}

#[test]
fn run_to_pauses_on_the_target() {
    let (mut c, rec) = controller(ScriptedFactory::default());
    c.run_to(jan(3)).unwrap();
    assert_eq!(c.state(), RunState::Running(RunMode::RunToDate(jan(3))));
    assert!(c.wait_while_running(WAIT));

    assert_eq!(c.state(), RunState::Paused);
    assert_eq!(c.current_timestamp(), Some(jan(3)));
    assert_eq!(c.last_snapshot().map(|s| s.timestamp), Some(jan(3)));
    assert_eq!(rec.borrow().annotated_flows, [0.0, 1.0, 2.0]);
    assert_eq!(rec.borrow().annotations["Input"], "Flow: 2.000");

    // the run-to field still holds 2015-01-03
    let controls = c.controls();
    assert!(!controls.run_to);
    assert!(controls.step && controls.run && controls.stop && controls.inspector);

    c.run().unwrap();
    assert!(c.wait_until_idle(WAIT));
    assert_eq!(c.last_finish(), Some(&FinishReason::ReachedEndDate));
    assert_eq!(rec.borrow().annotated_flows, [0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn run_to_the_end_date_pauses_there() {
    let (mut c, _rec) = controller_with(ScriptedFactory::default(), jan(5), jan(5));
    c.run_to(jan(5)).unwrap();
    assert!(c.wait_while_running(WAIT));
    assert_eq!(c.state(), RunState::Paused);
    assert_eq!(c.current_timestamp(), Some(jan(5)));
    assert!(!c.controls().step && !c.controls().run && !c.controls().run_to);

    c.stop().unwrap();
    assert!(c.wait_until_idle(WAIT));
    assert_eq!(c.last_finish(), Some(&FinishReason::StoppedByUser));
}

#[test]
fn invalid_run_to_targets_are_rejected_without_a_session() {
    let (mut c, rec) = controller(ScriptedFactory::default());

    // the start date itself, past the end, before the start
    for target in [jan(1), jan(6), date(2014, 12, 31)] {
        let err = c.run_to(target).unwrap_err();
        assert!(
            matches!(err, RunError::InvalidTarget { target: t, .. } if t == target),
            "{target}: {err:?}"
        );
        assert!(!c.is_running());
    }
    assert_eq!(c.state(), RunState::Idle);
    let rec = rec.borrow();
    assert!(rec.run_status.is_empty());
    assert!(rec.lock_calls.is_empty());
    assert!(rec.annotated_flows.is_empty());
    assert!(rec.errors.is_empty());
}

#[test]
fn run_to_behind_the_current_timestep_is_rejected() {
    let (mut c, rec) = controller(ScriptedFactory::default());
    c.run_to(jan(3)).unwrap();
    assert!(c.wait_while_running(WAIT));

    for target in [jan(2), jan(3)] {
        assert!(matches!(
            c.run_to(target),
            Err(RunError::InvalidTarget { .. })
        ));
    }
    assert_eq!(c.state(), RunState::Paused);
    assert_eq!(c.poll_timeout(std::time::Duration::from_millis(50)), 0);
    assert_eq!(rec.borrow().annotated_flows.len(), 3);

    c.run_to(jan(4)).unwrap();
    assert!(c.wait_while_running(WAIT));
    assert_eq!(c.current_timestamp(), Some(jan(4)));

    c.stop().unwrap();
    assert!(c.wait_until_idle(WAIT));
}

#[test]
fn pause_a_running_session() {
    let (mut c, rec) = controller_with(ScriptedFactory::slow(10), date(2015, 12, 31), jan(3));
    c.run().unwrap();
    assert!(c.wait_for(WAIT, |c| c.current_timestamp().is_some()));

    c.pause().unwrap();
    assert!(c.wait_while_running(WAIT));
    assert_eq!(c.state(), RunState::Paused);
    let paused_at = c.current_timestamp().unwrap();
    assert!(paused_at < date(2015, 12, 31));
    assert!(c.controls().step && c.controls().run);
    assert!(
        rec.borrow()
            .statuses
            .last()
            .is_some_and(|s| s.starts_with("Paused at"))
    );

    c.step().unwrap();
    assert!(c.wait_while_running(WAIT));
    assert_eq!(c.current_timestamp(), paused_at.succ_opt());

    c.stop().unwrap();
    assert!(c.wait_until_idle(WAIT));
}

#[test]
fn pause_before_the_first_timestep() {
    let factory = ScriptedFactory::slow_to_load(200, 10);
    let (mut c, rec) = controller_with(factory, date(2015, 12, 31), jan(3));
    c.run().unwrap();
    c.pause().unwrap();
    assert!(c.wait_while_running(WAIT));

    assert_eq!(c.state(), RunState::Paused);
    assert_eq!(c.current_timestamp(), None);
    assert!(rec.borrow().annotated_flows.is_empty());
    let controls = c.controls();
    assert!(controls.step && controls.run && controls.run_to && controls.stop);
    assert!(!controls.inspector);

    c.step().unwrap();
    assert!(c.wait_while_running(WAIT));
    assert_eq!(c.current_timestamp(), Some(jan(1)));
    assert!(c.controls().inspector);

    c.stop().unwrap();
    assert!(c.wait_until_idle(WAIT));
    assert_eq!(c.last_finish(), Some(&FinishReason::StoppedByUser));
}

#[test]
fn run_to_enablement_follows_the_requested_target() {
    // the run-to field holds the end date, the command asks for an earlier one
    let (mut c, _rec) = controller_with(ScriptedFactory::default(), jan(5), jan(5));
    c.run_to(jan(2)).unwrap();
    assert!(c.wait_while_running(WAIT));
    assert_eq!(c.current_timestamp(), Some(jan(2)));
    assert!(!c.controls().run_to);
    assert!(c.controls().step && c.controls().run);

    // a step forgets the target and falls back to the field
    c.step().unwrap();
    assert!(c.wait_while_running(WAIT));
    assert_eq!(c.current_timestamp(), Some(jan(3)));
    assert!(c.controls().run_to);

    c.stop().unwrap();
    assert!(c.wait_until_idle(WAIT));
}

#[test]
fn pause_after_the_worker_closed_is_a_noop() {
    let (mut c, rec) = controller(ScriptedFactory::default());
    c.run().unwrap();
    // let the worker reach the end date without pumping its notifications
    std::thread::sleep(std::time::Duration::from_millis(300));
    assert_eq!(c.state(), RunState::Running(RunMode::Run));

    assert_eq!(c.pause(), Ok(()));
    assert!(c.wait_until_idle(WAIT));
    assert_eq!(c.last_finish(), Some(&FinishReason::ReachedEndDate));
    assert!(rec.borrow().errors.is_empty());
}

#[test]
fn commands_are_rejected_while_running() {
    let (mut c, rec) = controller_with(ScriptedFactory::slow(10), date(2015, 12, 31), jan(3));
    c.run().unwrap();
    let session = c.session_id();

    assert_eq!(c.step(), Err(RunError::AlreadyRunning));
    assert_eq!(c.run(), Err(RunError::AlreadyRunning));
    assert_eq!(c.run_to(jan(10)), Err(RunError::AlreadyRunning));
    assert_eq!(c.session_id(), session);

    c.stop().unwrap();
    assert_eq!(c.run(), Err(RunError::AlreadyRunning));
    assert_eq!(c.pause(), Err(RunError::NotRunning));
    assert!(c.wait_until_idle(WAIT));

    assert_eq!(c.last_finish(), Some(&FinishReason::StoppedByUser));
    let rec = rec.borrow();
    assert!(rec.annotated_flows.len() < 365);
    assert!(rec.annotations.is_empty());
    assert!(!rec.locked);
}
