//! Shared fixtures: a scripted engine and recording collaborators.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use chrono::NaiveDate;
use wn_core::{NodeId, Timestepper};
use wn_engine::{Engine, EngineError, EngineFactory, EngineResult, NodeResult, StepSnapshot};
use wn_model::{MetadataDef, ModelDef, NodeDef, NodeKind, TimestepperDef};
use wn_run::{
    Collaborators, ControlEnablement, DateInput, HostUi, RunController, RunError, RunProgress,
    ScheduleInputs, SchematicCollaborator,
};

pub const WAIT: Duration = Duration::from_secs(10);

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn jan(d: u32) -> NaiveDate {
    date(2015, 1, d)
}

/// Engine whose single node reports the timestep index as its flow.
pub struct ScriptedEngine {
    ts: Timestepper,
    current: Option<usize>,
    fail_at: Option<usize>,
    delay: Duration,
}

impl Engine for ScriptedEngine {
    fn timestepper(&self) -> &Timestepper {
        &self.ts
    }

    fn current_index(&self) -> Option<usize> {
        self.current
    }

    fn step(&mut self) -> EngineResult<()> {
        let next = self.current.map_or(0, |i| i + 1);
        if next >= self.ts.len() {
            return Err(EngineError::Finished { end: self.ts.end() });
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail_at == Some(next) {
            return Err(EngineError::Backend {
                message: format!("solver failed at timestep {next}"),
            });
        }
        self.current = Some(next);
        Ok(())
    }

    fn node_ids(&self) -> Vec<NodeId> {
        vec![NodeId::new("Input")]
    }

    fn results_for(&self, node: &NodeId) -> Option<NodeResult> {
        Some(NodeResult {
            node: node.clone(),
            flow: self.current? as f64,
            volume: None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedFactory {
    pub fail_construct: bool,
    pub fail_at: Option<usize>,
    pub delay: Duration,
    pub load_delay: Duration,
}

impl ScriptedFactory {
    pub fn slow(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            ..Self::default()
        }
    }

    /// Steps take `delay_ms`, construction takes `load_ms`.
    pub fn slow_to_load(load_ms: u64, delay_ms: u64) -> Self {
        Self {
            load_delay: Duration::from_millis(load_ms),
            ..Self::slow(delay_ms)
        }
    }
}

impl EngineFactory for ScriptedFactory {
    type Engine = ScriptedEngine;

    fn construct(&self, _model: &ModelDef, ts: &Timestepper) -> EngineResult<ScriptedEngine> {
        if self.fail_construct {
            return Err(EngineError::Backend {
                message: "model file is corrupt".to_string(),
            });
        }
        if !self.load_delay.is_zero() {
            std::thread::sleep(self.load_delay);
        }
        Ok(ScriptedEngine {
            ts: ts.clone(),
            current: None,
            fail_at: self.fail_at,
            delay: self.delay,
        })
    }
}

pub fn model() -> ModelDef {
    ModelDef {
        metadata: MetadataDef::default(),
        timestepper: TimestepperDef {
            start: jan(1),
            end: jan(5),
            timestep: 1,
        },
        nodes: vec![NodeDef {
            name: "Input".to_string(),
            kind: NodeKind::Input { max_flow: 1.0 },
        }],
        edges: vec![],
    }
}

/// Everything the controller told the interactive side.
#[derive(Debug)]
pub struct Recorder {
    pub locked: bool,
    pub lock_calls: Vec<bool>,
    pub annotations: BTreeMap<String, String>,
    /// Flow of every annotation, in call order.
    pub annotated_flows: Vec<f64>,
    pub completed_steps: Vec<NaiveDate>,
    pub controls: ControlEnablement,
    pub progress: Vec<Option<RunProgress>>,
    pub statuses: Vec<String>,
    pub errors: Vec<RunError>,
    pub run_status: Vec<bool>,
    pub dates: [NaiveDate; 3],
    pub dates_enabled: [bool; 3],
}

impl Recorder {
    pub fn shown_progress(&self) -> Vec<RunProgress> {
        self.progress.iter().flatten().copied().collect()
    }
}

pub type Shared = Rc<RefCell<Recorder>>;

struct Schematic(Shared);

impl SchematicCollaborator for Schematic {
    fn lock(&mut self, locked: bool) {
        let mut rec = self.0.borrow_mut();
        rec.locked = locked;
        rec.lock_calls.push(locked);
    }

    fn set_node_annotation(&mut self, node: &NodeId, result: &NodeResult) {
        let mut rec = self.0.borrow_mut();
        rec.annotations.insert(node.to_string(), result.to_string());
        rec.annotated_flows.push(result.flow);
    }

    fn clear_annotations(&mut self) {
        self.0.borrow_mut().annotations.clear();
    }
}

struct DateField(Shared, usize);

impl DateInput for DateField {
    fn date(&self) -> NaiveDate {
        self.0.borrow().dates[self.1]
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.0.borrow_mut().dates_enabled[self.1] = enabled;
    }
}

struct Host(Shared);

impl HostUi for Host {
    fn apply_controls(&mut self, controls: &ControlEnablement) {
        self.0.borrow_mut().controls = *controls;
    }

    fn show_progress(&mut self, progress: Option<&RunProgress>) {
        self.0.borrow_mut().progress.push(progress.copied());
    }

    fn show_status(&mut self, message: &str) {
        self.0.borrow_mut().statuses.push(message.to_string());
    }

    fn step_completed(&mut self, snapshot: &StepSnapshot) {
        self.0.borrow_mut().completed_steps.push(snapshot.timestamp);
    }

    fn report_error(&mut self, error: &RunError) {
        self.0.borrow_mut().errors.push(error.clone());
    }

    fn run_status_changed(&mut self, running: bool) {
        self.0.borrow_mut().run_status.push(running);
    }
}

/// Recording collaborators whose date inputs start out as `[start, end, run_to]`.
pub fn collaborators(dates: [NaiveDate; 3]) -> (Collaborators, Shared) {
    let rec = Rc::new(RefCell::new(Recorder {
        locked: false,
        lock_calls: Vec::new(),
        annotations: BTreeMap::new(),
        annotated_flows: Vec::new(),
        completed_steps: Vec::new(),
        controls: ControlEnablement::IDLE,
        progress: Vec::new(),
        statuses: Vec::new(),
        errors: Vec::new(),
        run_status: Vec::new(),
        dates,
        dates_enabled: [true; 3],
    }));
    let ui = Collaborators {
        schematic: Box::new(Schematic(Rc::clone(&rec))),
        schedule: ScheduleInputs {
            start: Box::new(DateField(Rc::clone(&rec), 0)),
            end: Box::new(DateField(Rc::clone(&rec), 1)),
            run_to: Box::new(DateField(Rc::clone(&rec), 2)),
        },
        host: Box::new(Host(Rc::clone(&rec))),
    };
    (ui, rec)
}

/// Controller over a 2015-01-01..=`end` schedule with `run_to` in the run-to field.
pub fn controller_with(
    factory: ScriptedFactory,
    end: NaiveDate,
    run_to: NaiveDate,
) -> (RunController<ScriptedFactory>, Shared) {
    let (ui, rec) = collaborators([jan(1), end, run_to]);
    (RunController::new(factory, model(), ui), rec)
}

pub fn controller(factory: ScriptedFactory) -> (RunController<ScriptedFactory>, Shared) {
    controller_with(factory, jan(5), jan(3))
}
