//! Interfaces the controller drives on the interactive side.
//!
//! Implementations live on the interactive thread and are never touched by
//! the worker.

use chrono::NaiveDate;
use wn_core::NodeId;
use wn_engine::{NodeResult, StepSnapshot};

use crate::controls::ControlEnablement;
use crate::error::RunError;
use crate::events::RunProgress;

/// The model schematic.
pub trait SchematicCollaborator {
    /// Lock (no selection or movement, dimmed canvas) or unlock the schematic.
    fn lock(&mut self, locked: bool);

    /// Show the latest timestep results on a node, e.g. as its tooltip.
    fn set_node_annotation(&mut self, node: &NodeId, result: &NodeResult);

    /// Restore every node's static tooltip.
    fn clear_annotations(&mut self);
}

/// A date field of the schedule (start, end or run-to date).
pub trait DateInput {
    fn date(&self) -> NaiveDate;

    fn set_enabled(&mut self, enabled: bool);
}

pub struct ScheduleInputs {
    pub start: Box<dyn DateInput>,
    pub end: Box<dyn DateInput>,
    pub run_to: Box<dyn DateInput>,
}

impl ScheduleInputs {
    pub fn set_enabled(&mut self, enabled: bool) {
        self.start.set_enabled(enabled);
        self.end.set_enabled(enabled);
        self.run_to.set_enabled(enabled);
    }
}

/// Buttons, progress bar, status label and dialogs of the host window.
pub trait HostUi {
    fn apply_controls(&mut self, controls: &ControlEnablement);

    /// `None` resets the progress indicator.
    fn show_progress(&mut self, _progress: Option<&RunProgress>) {}

    fn show_status(&mut self, _message: &str) {}

    /// Called once per completed timestep, before the schematic is annotated.
    fn step_completed(&mut self, _snapshot: &StepSnapshot) {}

    fn report_error(&mut self, error: &RunError);

    /// Fired when a session opens (`true`) and once it has closed (`false`).
    fn run_status_changed(&mut self, _running: bool) {}
}
