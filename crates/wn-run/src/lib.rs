//! Run control for waternet models.
//!
//! This crate coordinates a simulation running on a background worker thread
//! with the interactive side of an editor:
//! - `worker`: the engine-owning state machine (step, run, run-to, pause, kill)
//! - `session`: one worker thread per run, connected by ordered channels
//! - `controller`: the command surface, run state and control enablement
//! - `collaborators`: the schematic, schedule inputs and host window it drives

pub mod collaborators;
pub mod controller;
pub mod controls;
pub mod error;
pub mod events;
pub mod session;
pub mod settings;
pub mod worker;

pub use collaborators::{DateInput, HostUi, ScheduleInputs, SchematicCollaborator};
pub use controller::{Collaborators, RunController};
pub use controls::{ControlEnablement, ControlInputs, RunState};
pub use error::{RunError, RunResult};
pub use events::{Command, FinishReason, RunMode, RunProgress, WorkerEvent};
pub use session::SessionHandle;
pub use settings::{EditorSettings, SettingsError};
pub use worker::{EventSink, SimulationWorker, StepResult, WorkerState};
