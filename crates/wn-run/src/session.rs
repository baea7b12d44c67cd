//! One worker thread per run session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info_span, warn};
use uuid::Uuid;
use wn_core::Timestepper;
use wn_engine::EngineFactory;
use wn_model::ModelDef;

use crate::error::{RunError, RunResult};
use crate::events::{Command, FinishReason, RunMode, WorkerEvent};
use crate::worker::{EventSink, SimulationWorker};

/// Controller-side handle on an open session.
///
/// The engine lives on the worker thread; the handle can only send commands
/// and receive notifications.
pub struct SessionHandle {
    id: Uuid,
    timestepper: Timestepper,
    commands: Sender<Command>,
    events: Receiver<WorkerEvent>,
    kill_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Spawn the worker thread and open a session advancing under `mode`.
    pub fn spawn<F: EngineFactory>(
        factory: Arc<F>,
        model: Arc<ModelDef>,
        timestepper: Timestepper,
        mode: RunMode,
    ) -> RunResult<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let id = Uuid::new_v4();

        let worker = SimulationWorker::new(factory, EventSink::new(event_tx));
        let kill_flag = worker.kill_flag();
        let worker_timestepper = timestepper.clone();

        let thread = thread::Builder::new()
            .name(format!("wn-session-{}", id.simple()))
            .spawn(move || {
                let span = info_span!("session", %id);
                let _enter = span.enter();
                run_session(worker, &model, &worker_timestepper, mode, command_rx);
            })
            .map_err(|e| RunError::Spawn {
                message: e.to_string(),
            })?;

        debug!(%id, %mode, "session spawned");
        Ok(Self {
            id,
            timestepper,
            commands: command_tx,
            events: event_rx,
            kill_flag,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestepper(&self) -> &Timestepper {
        &self.timestepper
    }

    pub fn send(&self, command: Command) -> RunResult<()> {
        self.commands
            .send(command)
            .map_err(|_| RunError::WorkerDisconnected)
    }

    /// Request the session to stop at the next timestep boundary.
    pub fn kill(&self) {
        self.kill_flag.store(true, Ordering::SeqCst);
        // wakes a paused worker; a closed session has already dropped its receiver
        let _ = self.commands.send(Command::Kill);
    }

    pub fn try_event(&self) -> Result<WorkerEvent, TryRecvError> {
        self.events.try_recv()
    }

    pub fn event_timeout(&self, timeout: Duration) -> Result<WorkerEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Wait for the worker thread to exit. Only call after `Finished` was received.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!(id = %self.id, "worker thread panicked");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        // Detach rather than join: the worker exits at its next timestep boundary.
        if self.thread.is_some() {
            self.kill();
        }
    }
}

fn apply<F: EngineFactory>(worker: &mut SimulationWorker<F>, command: Command) {
    if let Err(err) = worker.handle(command) {
        warn!(?command, %err, "command rejected by worker");
    }
}

/// Worker thread body. Blocks on the command channel while paused, polls it
/// between timesteps while advancing.
fn run_session<F: EngineFactory>(
    mut worker: SimulationWorker<F>,
    model: &ModelDef,
    timestepper: &Timestepper,
    mode: RunMode,
    commands: Receiver<Command>,
) {
    if let Err(err) = worker.start(mode, model, timestepper) {
        worker.finish(FinishReason::Error(err));
        return;
    }

    while worker.is_open() {
        if !worker.is_advancing() {
            match commands.recv() {
                Ok(command) => apply(&mut worker, command),
                Err(_) => worker.kill(),
            }
            continue;
        }

        loop {
            match commands.try_recv() {
                Ok(command) => apply(&mut worker, command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    worker.kill();
                    break;
                }
            }
        }
        if worker.kill_requested() {
            worker.kill();
        }
        worker.advance_for_mode();
    }
    debug!("session closed");
}
