//! Simulation worker: owns one engine and advances it on behalf of the controller.
//!
//! The worker is a plain state machine; `session` runs it on its own thread.
//! Every state transition happens on that thread, and every observable effect
//! leaves it as a [`WorkerEvent`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use chrono::NaiveDate;
use tracing::{debug, info, trace, warn};
use wn_core::Timestepper;
use wn_engine::{Engine, EngineFactory, StepSnapshot};
use wn_model::ModelDef;

use crate::error::{RunError, RunResult};
use crate::events::{Command, FinishReason, RunMode, RunProgress, WorkerEvent};

/// Outcome of advancing the engine by one timestep.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Continuing(NaiveDate),
    /// The engine reached the last timestep of its schedule.
    Completed(NaiveDate),
    /// The engine failed; its handle has already been released.
    Failed(RunError),
}

/// Sending half of the notification channel.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<WorkerEvent>,
}

impl EventSink {
    pub fn new(tx: Sender<WorkerEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: WorkerEvent) {
        if self.tx.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}

/// Mutable worker state. `engine` is `Some` exactly while a session is open.
pub struct WorkerState<E> {
    pub mode: Option<RunMode>,
    pub is_paused: bool,
    pub is_killed: bool,
    engine: Option<E>,
}

impl<E> Default for WorkerState<E> {
    fn default() -> Self {
        Self {
            mode: None,
            is_paused: false,
            is_killed: false,
            engine: None,
        }
    }
}

impl<E> WorkerState<E> {
    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }
}

pub struct SimulationWorker<F: EngineFactory> {
    factory: Arc<F>,
    state: WorkerState<F::Engine>,
    events: EventSink,
    kill_requested: Arc<AtomicBool>,
    finished_sent: bool,
}

impl<F: EngineFactory> SimulationWorker<F> {
    pub fn new(factory: Arc<F>, events: EventSink) -> Self {
        Self {
            factory,
            state: WorkerState::default(),
            events,
            kill_requested: Arc::new(AtomicBool::new(false)),
            finished_sent: false,
        }
    }

    pub fn state(&self) -> &WorkerState<F::Engine> {
        &self.state
    }

    /// Flag another thread can raise to stop the session at the next timestep boundary.
    pub fn kill_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.kill_requested)
    }

    pub fn kill_requested(&self) -> bool {
        self.kill_requested.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.state.engine.is_some()
    }

    /// True while a session is open with an active mode and not paused.
    pub fn is_advancing(&self) -> bool {
        self.is_open() && self.state.mode.is_some() && !self.state.is_paused
    }

    pub fn current_timestamp(&self) -> Option<NaiveDate> {
        self.state.engine.as_ref()?.current_timestamp()
    }

    /// Open a session: construct the engine and arm `mode`.
    ///
    /// A mode that cannot advance on a fresh engine is rejected before
    /// anything is emitted. An engine construction failure closes the session
    /// immediately with `Finished(Error)`.
    pub fn start(
        &mut self,
        mode: RunMode,
        model: &ModelDef,
        timestepper: &Timestepper,
    ) -> RunResult<()> {
        if self.is_open() {
            return Err(RunError::AlreadyRunning);
        }
        mode.validate(None, timestepper)?;

        self.state = WorkerState::default();
        self.finished_sent = false;

        info!(%mode, start = %timestepper.start(), end = %timestepper.end(), "loading model");
        self.events.emit(WorkerEvent::Status("Loading model".to_string()));

        match self.factory.construct(model, timestepper) {
            Ok(engine) => {
                self.state.engine = Some(engine);
                self.state.mode = Some(mode);
                Ok(())
            }
            Err(e) => {
                let err = RunError::EngineConstruction {
                    message: e.to_string(),
                };
                warn!(%err, "model failed to load");
                self.finish(FinishReason::Error(err.clone()));
                Err(err)
            }
        }
    }

    /// Advance the engine by exactly one timestep.
    pub fn advance_one_step(&mut self) -> StepResult {
        let Some(engine) = self.state.engine.as_mut() else {
            return StepResult::Failed(RunError::NotRunning);
        };
        let Some(timestamp) = engine.next_timestamp() else {
            let last = engine.timestepper().last_timestamp();
            return StepResult::Completed(engine.current_timestamp().unwrap_or(last));
        };

        self.events.emit(WorkerEvent::BeforeStep { timestamp });

        if let Err(e) = engine.step() {
            let err = RunError::EngineStep {
                timestamp: Some(timestamp),
                message: e.to_string(),
            };
            self.release_engine();
            return StepResult::Failed(err);
        }

        let reached = engine.current_timestamp();
        let snapshot = match StepSnapshot::capture(&*engine) {
            Some(snapshot) if reached == Some(timestamp) => snapshot,
            _ => {
                let err = RunError::EngineStep {
                    timestamp: Some(timestamp),
                    message: format!(
                        "the engine did not stop on the timestep boundary (reached {:?})",
                        reached
                    ),
                };
                self.release_engine();
                return StepResult::Failed(err);
            }
        };

        let progress = RunProgress {
            timestamp,
            current_index: snapshot.index,
            last_index: engine.timestepper().last_index(),
        };
        let at_end = engine.is_at_end();
        debug!(
            %timestamp,
            step = progress.current_index + 1,
            of = progress.last_index + 1,
            "stepped"
        );

        self.events.emit(WorkerEvent::StepDone {
            timestamp,
            snapshot: Arc::new(snapshot),
        });
        self.events.emit(WorkerEvent::Progress(progress));

        if at_end {
            StepResult::Completed(timestamp)
        } else {
            StepResult::Continuing(timestamp)
        }
    }

    /// Advance once under the current mode and apply its stopping rule.
    pub fn advance_for_mode(&mut self) {
        if !self.is_advancing() {
            return;
        }
        let Some(mode) = self.state.mode else {
            return;
        };

        let (timestamp, at_end) = match self.advance_one_step() {
            StepResult::Failed(err) => {
                warn!(%err, "model failed to step");
                self.close(FinishReason::Error(err));
                return;
            }
            StepResult::Continuing(t) => (t, false),
            StepResult::Completed(t) => (t, true),
        };

        match mode {
            RunMode::RunToDate(target) if timestamp > target => {
                self.close(FinishReason::Error(RunError::InvalidTarget {
                    target,
                    reason: format!("the engine stepped past it to {}", timestamp),
                }));
            }
            RunMode::Run if at_end => {
                info!(%timestamp, "last timestep reached");
                self.close(FinishReason::ReachedEndDate);
            }
            RunMode::Step => self.suspend(Some(timestamp), at_end),
            RunMode::RunToDate(target) if timestamp == target || at_end => {
                self.suspend(Some(timestamp), at_end)
            }
            _ => {}
        }
    }

    /// Apply a controller command.
    pub fn handle(&mut self, command: Command) -> RunResult<()> {
        match command {
            Command::Kill => {
                self.kill();
                Ok(())
            }
            Command::Pause => {
                if !self.is_advancing() {
                    return Err(RunError::NotRunning);
                }
                let timestamp = self.current_timestamp();
                self.suspend(timestamp, false);
                Ok(())
            }
            Command::Advance(mode) => {
                let Some(engine) = self.state.engine.as_ref() else {
                    return Err(RunError::NotRunning);
                };
                if self.is_advancing() {
                    return Err(RunError::AlreadyRunning);
                }
                mode.validate(engine.current_timestamp(), engine.timestepper())?;
                debug!(%mode, "advancing");
                self.state.mode = Some(mode);
                self.resume();
                Ok(())
            }
        }
    }

    /// Suspend advancing without releasing the engine.
    pub fn pause(&mut self) {
        self.state.is_paused = true;
        self.state.mode = None;
    }

    pub fn resume(&mut self) {
        self.state.is_paused = false;
    }

    /// Stop the session and release the engine. A no-op when no session is open.
    pub fn kill(&mut self) {
        self.state.is_killed = true;
        self.state.mode = None;
        self.state.is_paused = false;
        if self.state.engine.is_some() {
            info!("stopping run");
            self.close(FinishReason::StoppedByUser);
        }
    }

    /// Emit `Finished` unless this session already did.
    pub(crate) fn finish(&mut self, reason: FinishReason) {
        if self.finished_sent {
            return;
        }
        self.finished_sent = true;
        self.events.emit(WorkerEvent::Finished(reason));
    }

    fn suspend(&mut self, timestamp: Option<NaiveDate>, at_end: bool) {
        self.pause();
        debug!(?timestamp, at_end, "paused");
        self.events.emit(WorkerEvent::Paused { timestamp, at_end });
    }

    fn release_engine(&mut self) {
        if self.state.engine.take().is_some() {
            trace!("engine released");
        }
    }

    fn close(&mut self, reason: FinishReason) {
        self.release_engine();
        self.state.mode = None;
        self.state.is_paused = false;
        self.finish(reason);
    }
}
