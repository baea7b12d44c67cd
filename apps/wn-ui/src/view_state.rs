//! State shared between the run controller's collaborators and the egui views.
//!
//! The controller pushes into [`ViewState`] through the collaborator
//! implementations below; the views read it once per frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::NaiveDate;
use wn_core::NodeId;
use wn_engine::NodeResult;
use wn_run::{
    Collaborators, ControlEnablement, DateInput, HostUi, RunError, RunProgress, ScheduleInputs,
    SchematicCollaborator,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Editable date with the last valid value it held.
pub struct DateField {
    pub label: &'static str,
    pub text: String,
    pub enabled: bool,
    date: NaiveDate,
}

impl DateField {
    pub fn new(label: &'static str, date: NaiveDate) -> Self {
        Self {
            label,
            text: date.format(DATE_FORMAT).to_string(),
            enabled: true,
            date,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn set(&mut self, date: NaiveDate) {
        self.date = date;
        self.text = date.format(DATE_FORMAT).to_string();
    }

    /// Take the edited text as the new date. Invalid text keeps the previous date.
    pub fn commit(&mut self) -> bool {
        match NaiveDate::parse_from_str(self.text.trim(), DATE_FORMAT) {
            Ok(date) => {
                self.date = date;
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        NaiveDate::parse_from_str(self.text.trim(), DATE_FORMAT).is_ok()
    }
}

pub struct ViewState {
    pub controls: ControlEnablement,
    pub progress: Option<RunProgress>,
    pub status: String,
    pub error: Option<RunError>,
    pub locked: bool,
    pub annotations: HashMap<NodeId, String>,
    pub start: DateField,
    pub end: DateField,
    pub run_to: DateField,
}

impl ViewState {
    pub fn new(start: NaiveDate, end: NaiveDate, run_to: NaiveDate) -> Self {
        Self {
            controls: ControlEnablement::IDLE,
            progress: None,
            status: String::new(),
            error: None,
            locked: false,
            annotations: HashMap::new(),
            start: DateField::new("Start", start),
            end: DateField::new("End", end),
            run_to: DateField::new("Run to", run_to),
        }
    }

    fn field(&self, which: Field) -> &DateField {
        match which {
            Field::Start => &self.start,
            Field::End => &self.end,
            Field::RunTo => &self.run_to,
        }
    }

    fn field_mut(&mut self, which: Field) -> &mut DateField {
        match which {
            Field::Start => &mut self.start,
            Field::End => &mut self.end,
            Field::RunTo => &mut self.run_to,
        }
    }
}

pub type SharedView = Rc<RefCell<ViewState>>;

#[derive(Debug, Clone, Copy)]
enum Field {
    Start,
    End,
    RunTo,
}

struct Schematic(SharedView);

impl SchematicCollaborator for Schematic {
    fn lock(&mut self, locked: bool) {
        self.0.borrow_mut().locked = locked;
    }

    fn set_node_annotation(&mut self, node: &NodeId, result: &NodeResult) {
        self.0
            .borrow_mut()
            .annotations
            .insert(node.clone(), result.to_string());
    }

    fn clear_annotations(&mut self) {
        self.0.borrow_mut().annotations.clear();
    }
}

struct Host(SharedView);

impl HostUi for Host {
    fn apply_controls(&mut self, controls: &ControlEnablement) {
        self.0.borrow_mut().controls = *controls;
    }

    fn show_progress(&mut self, progress: Option<&RunProgress>) {
        self.0.borrow_mut().progress = progress.copied();
    }

    fn show_status(&mut self, message: &str) {
        self.0.borrow_mut().status = message.to_string();
    }

    fn report_error(&mut self, error: &RunError) {
        self.0.borrow_mut().error = Some(error.clone());
    }
}

struct DateInputField(SharedView, Field);

impl DateInput for DateInputField {
    fn date(&self) -> NaiveDate {
        self.0.borrow().field(self.1).date()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.0.borrow_mut().field_mut(self.1).enabled = enabled;
    }
}

/// Collaborators writing into `view`.
pub fn collaborators(view: &SharedView) -> Collaborators {
    Collaborators {
        schematic: Box::new(Schematic(Rc::clone(view))),
        schedule: ScheduleInputs {
            start: Box::new(DateInputField(Rc::clone(view), Field::Start)),
            end: Box::new(DateInputField(Rc::clone(view), Field::End)),
            run_to: Box::new(DateInputField(Rc::clone(view), Field::RunTo)),
        },
        host: Box::new(Host(Rc::clone(view))),
    }
}
