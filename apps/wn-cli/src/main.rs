use std::cell::RefCell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wn_core::{CoreError, NodeId};
use wn_engine::{BalanceEngine, BalanceEngineFactory, EngineError, NodeResult, StepSnapshot};
use wn_model::ModelError;
use wn_run::{
    Collaborators, ControlEnablement, DateInput, EditorSettings, FinishReason, HostUi,
    RunController, RunError, RunProgress, ScheduleInputs, SchematicCollaborator, SettingsError,
};

#[derive(Parser)]
#[command(name = "wn-cli")]
#[command(about = "waternet CLI - run water resource network models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a model file
    Validate {
        /// Path to the model file (.json, .yaml or .yml)
        model_path: PathBuf,
    },
    /// Show the schedule, nodes and edges of a model
    Info {
        /// Path to the model file
        model_path: PathBuf,
    },
    /// Run a model
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to the model file
    model_path: PathBuf,
    /// How to advance the model
    #[arg(long, value_enum, default_value_t = ModeArg::Run)]
    mode: ModeArg,
    /// Target date for run-to mode (YYYY-MM-DD); defaults to the saved run-to date
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Number of timesteps to take in step mode
    #[arg(long, default_value_t = 1)]
    steps: usize,
    /// Override the model's start date
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Override the model's end date
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Print one JSON line per timestep instead of node annotations
    #[arg(long)]
    json: bool,
    /// Editor settings file (defaults to $WN_SETTINGS or the temp directory)
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Run,
    Step,
    RunTo,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("{0}")]
    Schedule(#[from] CoreError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Run(#[from] RunError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Run-to mode needs a target date (--to)")]
    MissingTarget,
}

type CliResult<T> = Result<T, CliError>;

/// Granularity of the event pump while waiting on the worker.
const PUMP_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> CliResult<()> {
    // Logs go to stderr so `--json` output stays machine readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { model_path } => cmd_validate(&model_path),
        Commands::Info { model_path } => cmd_info(&model_path),
        Commands::Run(args) => cmd_run(args),
    }
}

fn cmd_validate(model_path: &Path) -> CliResult<()> {
    println!("Validating model: {}", model_path.display());
    let model = wn_model::load(model_path)?;
    let schedule = model.timestepper()?;
    // construction also rejects cyclic networks
    BalanceEngine::new(&model, schedule)?;
    println!("✓ Model is valid");
    Ok(())
}

fn cmd_info(model_path: &Path) -> CliResult<()> {
    let model = wn_model::load(model_path)?;
    let schedule = model.timestepper()?;

    if !model.metadata.title.is_empty() {
        println!("{}", model.metadata.title);
    }
    if let Some(description) = &model.metadata.description {
        println!("  {}", description);
    }
    println!(
        "\nSchedule: {} to {} every {} day(s), {} timesteps",
        schedule.start(),
        schedule.end(),
        schedule.timestep_days(),
        schedule.len()
    );

    println!("\nNodes:");
    for node in &model.nodes {
        let downstream: Vec<&str> = model.downstream(&node.name).collect();
        if downstream.is_empty() {
            println!("  {} ({})", node.name, node.kind.label());
        } else {
            println!(
                "  {} ({}) -> {}",
                node.name,
                node.kind.label(),
                downstream.join(", ")
            );
        }
    }
    println!("\nEdges: {}", model.edges.len());
    Ok(())
}

fn cmd_run(args: RunArgs) -> CliResult<()> {
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(EditorSettings::default_path);
    let mut settings = EditorSettings::load(&settings_path)?;

    let model = wn_model::load(&args.model_path)?;
    let start = args.start.unwrap_or(model.timestepper.start);
    let end = args.end.unwrap_or(model.timestepper.end);
    let run_to = args.to.or(settings.run_to_date);
    if args.mode == ModeArg::RunTo && run_to.is_none() {
        return Err(CliError::MissingTarget);
    }

    let console = Rc::new(RefCell::new(Console::new(args.json)));
    let ui = Collaborators {
        schematic: Box::new(ConsoleSchematic(Rc::clone(&console))),
        schedule: ScheduleInputs {
            start: Box::new(FixedDate(start)),
            end: Box::new(FixedDate(end)),
            run_to: Box::new(FixedDate(run_to.unwrap_or(end))),
        },
        host: Box::new(ConsoleHost(Rc::clone(&console))),
    };
    let mut controller = RunController::new(BalanceEngineFactory, model, ui);
    let started = Instant::now();

    match (args.mode, run_to) {
        (ModeArg::Run, _) => {
            controller.run()?;
            pump_until(&mut controller, |c| c.state().is_idle());
        }
        (ModeArg::RunTo, Some(target)) => {
            controller.run_to(target)?;
            pump_until(&mut controller, |c| !c.state().is_running());
        }
        (ModeArg::RunTo, None) => return Err(CliError::MissingTarget),
        (ModeArg::Step, _) => {
            for _ in 0..args.steps.max(1) {
                if !controller.controls().step {
                    info!("no further timesteps to take");
                    break;
                }
                controller.step()?;
                pump_until(&mut controller, |c| !c.state().is_running());
                if controller.state().is_idle() {
                    break;
                }
            }
        }
    }

    if controller.is_running() {
        controller.stop()?;
        pump_until(&mut controller, |c| c.state().is_idle());
    }
    debug!(elapsed_s = started.elapsed().as_secs_f64(), "run closed");

    if args.to.is_some() {
        settings.run_to_date = args.to;
    }
    settings.last_model = Some(args.model_path.clone());
    if let Err(err) = settings.save(&settings_path) {
        warn!(%err, path = %settings_path.display(), "failed to save settings");
    }

    console.borrow_mut().write_out()?;
    match controller.last_finish() {
        Some(FinishReason::Error(err)) => Err(err.clone().into()),
        _ => Ok(()),
    }
}

/// Pump the controller until `done` holds or the session closes.
fn pump_until(
    controller: &mut RunController<BalanceEngineFactory>,
    done: impl Fn(&RunController<BalanceEngineFactory>) -> bool,
) {
    while !controller.wait_for(PUMP_INTERVAL, &done) {
        if !controller.is_running() {
            break;
        }
    }
}

/// Console output shared by the collaborators.
struct Console {
    json: bool,
    lines: Vec<String>,
}

impl Console {
    fn new(json: bool) -> Self {
        Self {
            json,
            lines: Vec::new(),
        }
    }

    fn emit(&mut self, line: String) {
        self.lines.push(line);
        if self.lines.len() >= 64 {
            if let Err(err) = self.write_out() {
                warn!(%err, "failed to write run output");
            }
        }
    }

    fn write_out(&mut self) -> io::Result<()> {
        let mut out = io::stdout().lock();
        for line in self.lines.drain(..) {
            writeln!(out, "{}", line)?;
        }
        out.flush()
    }
}

struct ConsoleSchematic(Rc<RefCell<Console>>);

impl SchematicCollaborator for ConsoleSchematic {
    fn lock(&mut self, locked: bool) {
        debug!(locked, "schematic lock");
    }

    fn set_node_annotation(&mut self, node: &NodeId, result: &NodeResult) {
        let mut console = self.0.borrow_mut();
        if !console.json {
            let text = result.to_string().replace('\n', ", ");
            console.emit(format!("  {:<16} {}", node, text));
        }
    }

    fn clear_annotations(&mut self) {}
}

struct ConsoleHost(Rc<RefCell<Console>>);

impl HostUi for ConsoleHost {
    fn apply_controls(&mut self, controls: &ControlEnablement) {
        debug!(?controls, "controls");
    }

    fn show_progress(&mut self, progress: Option<&RunProgress>) {
        if let Some(p) = progress {
            debug!(timestamp = %p.timestamp, fraction = p.fraction(), "progress");
        }
    }

    fn show_status(&mut self, message: &str) {
        info!("{}", message);
    }

    fn step_completed(&mut self, snapshot: &StepSnapshot) {
        let mut console = self.0.borrow_mut();
        if console.json {
            match serde_json::to_string(snapshot) {
                Ok(line) => console.emit(line),
                Err(err) => warn!(%err, date = %snapshot.timestamp, "failed to serialize timestep"),
            }
        } else {
            console.emit(format!(
                "[{:>4}] {}",
                snapshot.index + 1,
                snapshot.timestamp.format("%d/%m/%Y")
            ));
        }
    }

    fn report_error(&mut self, error: &RunError) {
        eprintln!("✗ {}", error);
    }
}

/// Schedule input fixed on the command line.
struct FixedDate(NaiveDate);

impl DateInput for FixedDate {
    fn date(&self) -> NaiveDate {
        self.0
    }

    fn set_enabled(&mut self, _enabled: bool) {}
}
