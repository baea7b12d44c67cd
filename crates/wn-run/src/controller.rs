//! Run controller: turns user commands into worker sessions and keeps the
//! interactive side consistent with the worker.
//!
//! The controller lives on the interactive thread. Commands return
//! immediately; worker notifications are applied when the host pumps the
//! controller with [`RunController::poll`] (once per frame for a GUI) or one
//! of the blocking variants (for headless hosts and tests).

use std::sync::Arc;
use std::sync::mpsc::{RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;
use wn_core::Timestepper;
use wn_engine::{EngineFactory, StepSnapshot};
use wn_model::ModelDef;

use crate::collaborators::{HostUi, ScheduleInputs, SchematicCollaborator};
use crate::controls::{ControlEnablement, ControlInputs, RunState};
use crate::error::{RunError, RunResult};
use crate::events::{Command, FinishReason, RunMode, WorkerEvent};
use crate::session::SessionHandle;

/// Interactive-side collaborators driven by the controller.
pub struct Collaborators {
    pub schematic: Box<dyn SchematicCollaborator>,
    pub schedule: ScheduleInputs,
    pub host: Box<dyn HostUi>,
}

pub struct RunController<F: EngineFactory> {
    factory: Arc<F>,
    model: Arc<ModelDef>,
    ui: Collaborators,
    session: Option<SessionHandle>,
    state: RunState,
    stopping: bool,
    current: Option<NaiveDate>,
    /// Target of the advance in progress or last paused, when it was a run-to.
    run_to_target: Option<NaiveDate>,
    last_snapshot: Option<Arc<StepSnapshot>>,
    last_finish: Option<FinishReason>,
    controls: ControlEnablement,
}

impl<F: EngineFactory> RunController<F> {
    pub fn new(factory: F, model: ModelDef, ui: Collaborators) -> Self {
        let mut controller = Self {
            factory: Arc::new(factory),
            model: Arc::new(model),
            ui,
            session: None,
            state: RunState::Idle,
            stopping: false,
            current: None,
            run_to_target: None,
            last_snapshot: None,
            last_finish: None,
            controls: ControlEnablement::IDLE,
        };
        controller.ui.host.show_status("Ready to run");
        controller.refresh();
        controller
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// True while a session is open, including while it is paused or stopping.
    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn controls(&self) -> ControlEnablement {
        self.controls
    }

    /// Last completed timestep of the open session.
    pub fn current_timestamp(&self) -> Option<NaiveDate> {
        self.current
    }

    /// Results of the last successful timestep. Kept after a failed session
    /// until the next one starts.
    pub fn last_snapshot(&self) -> Option<&StepSnapshot> {
        self.last_snapshot.as_deref()
    }

    pub fn last_finish(&self) -> Option<&FinishReason> {
        self.last_finish.as_ref()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(SessionHandle::id)
    }

    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    /// Replace the model. Only allowed while idle.
    pub fn set_model(&mut self, model: ModelDef) -> RunResult<()> {
        if self.session.is_some() {
            return Err(RunError::AlreadyRunning);
        }
        self.model = Arc::new(model);
        self.last_snapshot = None;
        self.last_finish = None;
        self.refresh();
        Ok(())
    }

    /// Schedule of the open session, or the one the schedule inputs describe.
    pub fn schedule(&self) -> RunResult<Timestepper> {
        if let Some(session) = &self.session {
            return Ok(session.timestepper().clone());
        }
        let schedule = Timestepper::new(
            self.ui.schedule.start.date(),
            self.ui.schedule.end.date(),
            self.model.timestepper.timestep,
        )?;
        Ok(schedule)
    }

    pub fn step(&mut self) -> RunResult<()> {
        self.advance(RunMode::Step)
    }

    pub fn run(&mut self) -> RunResult<()> {
        self.advance(RunMode::Run)
    }

    pub fn run_to(&mut self, target: NaiveDate) -> RunResult<()> {
        self.advance(RunMode::RunToDate(target))
    }

    /// Pause a run or run-to at the next timestep boundary.
    pub fn pause(&mut self) -> RunResult<()> {
        let Some(session) = &self.session else {
            return Err(RunError::NotRunning);
        };
        match self.state {
            RunState::Running(RunMode::Run | RunMode::RunToDate(_)) if !self.stopping => {
                debug!("pause requested");
                if session.send(Command::Pause).is_err() {
                    // the worker already closed; its Finished is applied on the next poll
                    debug!("pause ignored: session already closed");
                }
                Ok(())
            }
            _ => Err(RunError::NotRunning),
        }
    }

    /// Stop the open session. The controller returns to `Idle` once the
    /// worker reports `Finished`.
    pub fn stop(&mut self) -> RunResult<()> {
        let Some(session) = &self.session else {
            trace!("stop ignored: no open session");
            return Ok(());
        };
        if self.stopping {
            return Ok(());
        }
        info!(id = %session.id(), "stopping run");
        session.kill();
        self.stopping = true;
        self.ui.host.show_progress(None);
        self.ui.host.show_status("Stopping");
        self.refresh();
        Ok(())
    }

    fn advance(&mut self, mode: RunMode) -> RunResult<()> {
        if self.state.is_running() || self.stopping {
            warn!(%mode, "command rejected: a run is in progress");
            return Err(RunError::AlreadyRunning);
        }

        let sent = match &self.session {
            Some(session) => {
                mode.validate(self.current, session.timestepper())?;
                session.send(Command::Advance(mode))
            }
            None => return self.open_session(mode),
        };
        if let Err(err) = sent {
            self.on_finished(FinishReason::Error(err.clone()));
            return Err(err);
        }
        self.enter_running(mode);
        Ok(())
    }

    fn open_session(&mut self, mode: RunMode) -> RunResult<()> {
        let schedule = self.schedule()?;
        mode.validate(None, &schedule)?;

        let session = SessionHandle::spawn(
            Arc::clone(&self.factory),
            Arc::clone(&self.model),
            schedule,
            mode,
        )?;
        info!(id = %session.id(), %mode, "run started");

        self.session = Some(session);
        self.current = None;
        self.last_snapshot = None;
        self.last_finish = None;
        self.ui.host.run_status_changed(true);
        self.enter_running(mode);
        Ok(())
    }

    fn enter_running(&mut self, mode: RunMode) {
        self.state = RunState::Running(mode);
        self.run_to_target = match mode {
            RunMode::RunToDate(target) => Some(target),
            RunMode::Step | RunMode::Run => None,
        };
        self.ui.schematic.lock(true);
        self.refresh();
    }

    /// Apply every notification already delivered, without blocking.
    /// Returns the number of notifications applied.
    pub fn poll(&mut self) -> usize {
        let mut batch = Vec::new();
        if let Some(session) = &self.session {
            loop {
                match session.try_event() {
                    Ok(event) => {
                        let finished = event.is_finished();
                        batch.push(event);
                        if finished {
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        batch.push(disconnected());
                        break;
                    }
                }
            }
        }
        self.dispatch(batch)
    }

    /// Wait up to `timeout` for a notification, then apply everything delivered.
    pub fn poll_timeout(&mut self, timeout: Duration) -> usize {
        let Some(session) = &self.session else {
            return 0;
        };
        let first = match session.event_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => return 0,
            Err(RecvTimeoutError::Disconnected) => disconnected(),
        };
        let finished = first.is_finished();
        let applied = self.dispatch(vec![first]);
        if finished {
            applied
        } else {
            applied + self.poll()
        }
    }

    /// Pump notifications until `done` holds or `timeout` elapses.
    pub fn wait_for(&mut self, timeout: Duration, done: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll();
        while !done(self) {
            let now = Instant::now();
            if self.session.is_none() || now >= deadline {
                return false;
            }
            self.poll_timeout(deadline - now);
        }
        true
    }

    /// Pump notifications until the controller leaves `Running`.
    pub fn wait_while_running(&mut self, timeout: Duration) -> bool {
        self.wait_for(timeout, |c| !c.state.is_running())
    }

    /// Pump notifications until the open session has closed.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        self.wait_for(timeout, |c| c.state.is_idle())
    }

    fn dispatch(&mut self, batch: Vec<WorkerEvent>) -> usize {
        // Progress is advisory: only the latest of a batch is shown.
        let last_progress = batch
            .iter()
            .rposition(|e| matches!(e, WorkerEvent::Progress(_)));
        let mut applied = 0;
        for (i, event) in batch.into_iter().enumerate() {
            if matches!(event, WorkerEvent::Progress(_)) && Some(i) != last_progress {
                continue;
            }
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Status(message) => self.ui.host.show_status(&message),
            WorkerEvent::BeforeStep { timestamp } => {
                trace!(%timestamp, "before step");
            }
            WorkerEvent::StepDone {
                timestamp,
                snapshot,
            } => {
                self.current = Some(timestamp);
                self.ui.host.step_completed(&snapshot);
                for result in &snapshot.nodes {
                    self.ui.schematic.set_node_annotation(&result.node, result);
                }
                self.last_snapshot = Some(snapshot);
                self.refresh();
            }
            WorkerEvent::Progress(progress) => self.ui.host.show_progress(Some(&progress)),
            WorkerEvent::Paused { timestamp, at_end } => {
                if timestamp.is_some() {
                    self.current = timestamp;
                }
                self.state = RunState::Paused;
                if at_end {
                    self.ui.host.show_status("End date reached");
                } else if let Some(t) = timestamp {
                    self.ui
                        .host
                        .show_status(&format!("Paused at {}", t.format("%d/%m/%Y")));
                }
                self.refresh();
            }
            WorkerEvent::Finished(reason) => self.on_finished(reason),
        }
    }

    fn on_finished(&mut self, reason: FinishReason) {
        if let Some(mut session) = self.session.take() {
            session.join();
            info!(id = %session.id(), ?reason, "run finished");
        }
        self.state = RunState::Idle;
        self.stopping = false;
        self.current = None;
        self.run_to_target = None;

        self.ui.schematic.lock(false);
        self.ui.schematic.clear_annotations();
        self.ui.host.show_progress(None);
        match &reason {
            FinishReason::StoppedByUser => self.ui.host.show_status("Ready to run"),
            FinishReason::ReachedEndDate => self.ui.host.show_status("Run completed"),
            FinishReason::Error(err) => {
                warn!(%err, "run failed");
                self.ui.host.show_status("Run failed");
                self.ui.host.report_error(err);
            }
        }
        self.last_finish = Some(reason);
        self.ui.host.run_status_changed(false);
        self.refresh();
    }

    fn end_date(&self) -> NaiveDate {
        match self.schedule() {
            Ok(schedule) => schedule.last_timestamp(),
            Err(_) => self.ui.schedule.end.date(),
        }
    }

    /// Recompute control enablement and push it to the host and schedule inputs.
    fn refresh(&mut self) {
        let inputs = ControlInputs {
            stopping: self.stopping,
            current: self.current,
            end: self.end_date(),
            run_to: self
                .run_to_target
                .unwrap_or_else(|| self.ui.schedule.run_to.date()),
        };
        let controls = ControlEnablement::derive(self.state, &inputs);
        self.controls = controls;
        self.ui.host.apply_controls(&controls);
        self.ui.schedule.set_enabled(controls.schedule_inputs);
    }
}

fn disconnected() -> WorkerEvent {
    WorkerEvent::Finished(FinishReason::Error(RunError::WorkerDisconnected))
}
