use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use egui_file_dialog::{DialogMode, FileDialog};
use tracing::{info, warn};
use wn_engine::BalanceEngineFactory;
use wn_model::{ModelDef, NodeDef};
use wn_run::{EditorSettings, RunController, RunError};

use crate::view_state::{DateField, SharedView, ViewState, collaborators};

pub struct WaternetApp {
    controller: Option<RunController<BalanceEngineFactory>>,
    view: SharedView,
    model_path: Option<PathBuf>,
    settings: EditorSettings,
    settings_path: PathBuf,
    file_dialog: FileDialog,
    last_directory: Option<PathBuf>,
    selected_node: Option<String>,
    show_inspector: bool,
    message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Open,
    Step,
    Run,
    RunTo,
    Pause,
    Stop,
}

impl WaternetApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, initial_model: Option<PathBuf>) -> Self {
        let settings_path = EditorSettings::default_path();
        let settings = EditorSettings::load(&settings_path).unwrap_or_else(|err| {
            warn!(%err, path = %settings_path.display(), "ignoring unreadable settings");
            EditorSettings::default()
        });
        let today = chrono::Local::now().date_naive();
        let initial_model = initial_model.or_else(|| settings.last_model.clone());

        let mut app = Self {
            controller: None,
            view: Rc::new(RefCell::new(ViewState::new(today, today, today))),
            model_path: None,
            settings,
            settings_path,
            file_dialog: FileDialog::new(),
            last_directory: None,
            selected_node: None,
            show_inspector: false,
            message: None,
        };
        if let Some(path) = initial_model {
            app.open_model(path);
        }
        app
    }

    fn open_model(&mut self, path: PathBuf) {
        let model = match wn_model::load(&path) {
            Ok(model) => model,
            Err(e) => {
                self.message = Some(format!("Failed to load model: {}", e));
                return;
            }
        };
        if self.controller.as_ref().is_some_and(RunController::is_running) {
            self.message = Some("Stop the run before opening another model".to_string());
            return;
        }

        {
            let mut view = self.view.borrow_mut();
            let schedule = &model.timestepper;
            view.start.set(schedule.start);
            view.end.set(schedule.end);
            view.run_to.set(self.settings.run_to_or(schedule.end));
            view.annotations.clear();
        }

        match self.controller.as_mut() {
            Some(controller) => {
                if let Err(err) = controller.set_model(model) {
                    self.message = Some(err.to_string());
                    return;
                }
            }
            None => {
                self.controller = Some(RunController::new(
                    BalanceEngineFactory,
                    model,
                    collaborators(&self.view),
                ));
            }
        }

        info!(path = %path.display(), "model opened");
        if let Some(parent) = path.parent() {
            self.last_directory = Some(parent.to_path_buf());
        }
        self.selected_node = None;
        self.settings.last_model = Some(path.clone());
        self.model_path = Some(path);
        self.save_settings();
    }

    fn save_settings(&self) {
        if let Err(err) = self.settings.save(&self.settings_path) {
            warn!(%err, "failed to save settings");
        }
    }

    fn apply(&mut self, action: Action) {
        if action == Action::Open {
            let initial_dir = self.last_directory.as_ref().and_then(|p| p.to_str());
            let _ = self
                .file_dialog
                .open(DialogMode::SelectFile, true, initial_dir);
            return;
        }

        let run_to = self.view.borrow().run_to.date();
        if action == Action::RunTo && self.settings.run_to_date != Some(run_to) {
            self.settings.run_to_date = Some(run_to);
            self.save_settings();
        }

        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let result = match action {
            Action::Step => controller.step(),
            Action::Run => controller.run(),
            Action::RunTo => controller.run_to(run_to),
            Action::Pause => controller.pause(),
            Action::Stop => controller.stop(),
            Action::Open => Ok(()),
        };
        if let Err(err) = result {
            warn!(?action, %err, "command rejected");
            self.view.borrow_mut().error = Some(err);
        }
    }

    fn toolbar(&mut self, ctx: &egui::Context, actions: &mut Vec<Action>) {
        let view = Rc::clone(&self.view);
        let view = view.borrow();
        let controls = view.controls;
        let has_model = self.controller.is_some();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(controls.schedule_inputs, egui::Button::new("Open"))
                    .clicked()
                {
                    actions.push(Action::Open);
                }

                ui.separator();

                let buttons = [
                    ("Step", controls.step, Action::Step),
                    ("Run", controls.run, Action::Run),
                    ("Run to", controls.run_to, Action::RunTo),
                    ("Pause", controls.pause, Action::Pause),
                    ("Stop", controls.stop, Action::Stop),
                ];
                for (label, enabled, action) in buttons {
                    if ui
                        .add_enabled(has_model && enabled, egui::Button::new(label))
                        .clicked()
                    {
                        actions.push(action);
                    }
                }

                ui.separator();
                if ui
                    .add_enabled(
                        controls.inspector,
                        egui::SelectableLabel::new(self.show_inspector, "Inspector"),
                    )
                    .clicked()
                {
                    self.show_inspector = !self.show_inspector;
                }

                ui.separator();
                if let Some(progress) = view.progress {
                    ui.add(
                        egui::ProgressBar::new(progress.fraction() as f32)
                            .desired_width(180.0)
                            .text(progress.timestamp.format("%d/%m/%Y").to_string()),
                    );
                }
                ui.label(&view.status);
            });
        });
    }

    fn schedule_panel(&mut self, ctx: &egui::Context) {
        let view = Rc::clone(&self.view);
        egui::SidePanel::left("schedule")
            .default_width(200.0)
            .show(ctx, |ui| {
                ui.heading("Schedule");
                {
                    let mut view = view.borrow_mut();
                    let view = &mut *view;
                    for field in [&mut view.start, &mut view.end, &mut view.run_to] {
                        date_row(ui, field);
                    }
                }

                if let Some(controller) = &self.controller {
                    let model = controller.model();
                    ui.separator();
                    ui.label(format!("Timestep: {} day(s)", model.timestepper.timestep));
                    if let Ok(schedule) = controller.schedule() {
                        ui.label(format!("{} timesteps", schedule.len()));
                    }
                }
                if let Some(path) = &self.model_path {
                    ui.separator();
                    ui.weak(path.display().to_string());
                }
            });
    }

    fn schematic_panel(&mut self, ctx: &egui::Context) {
        let view = Rc::clone(&self.view);
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(controller) = &self.controller else {
                ui.label("Open a model to start");
                return;
            };
            let model = controller.model();
            let view = view.borrow();

            ui.heading(if model.metadata.title.is_empty() {
                "Schematic"
            } else {
                model.metadata.title.as_str()
            });
            ui.separator();

            ui.add_enabled_ui(!view.locked, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for node in &model.nodes {
                        let annotation = view.annotations.get(node.name.as_str());
                        let tooltip = annotation
                            .cloned()
                            .unwrap_or_else(|| static_tooltip(model, node));
                        ui.horizontal(|ui| {
                            let selected = self.selected_node.as_deref() == Some(&node.name);
                            let response = ui
                                .selectable_label(selected, &node.name)
                                .on_hover_text(&tooltip)
                                .on_disabled_hover_text(&tooltip);
                            if response.clicked() {
                                self.selected_node = Some(node.name.clone());
                            }
                            ui.weak(node.kind.label());
                            if let Some(text) = annotation {
                                ui.label(text.replace('\n', "   "));
                            }
                        });
                    }
                });
            });
        });
    }

    fn inspector_window(&mut self, ctx: &egui::Context) {
        if !self.show_inspector || !self.view.borrow().controls.inspector {
            return;
        }
        let Some(controller) = &self.controller else {
            return;
        };
        egui::Window::new("Inspector")
            .open(&mut self.show_inspector)
            .show(ctx, |ui| {
                let Some(snapshot) = controller.last_snapshot() else {
                    ui.label("No results yet");
                    return;
                };
                ui.label(format!(
                    "Results on {}",
                    snapshot.timestamp.format("%d/%m/%Y")
                ));
                egui::Grid::new("inspector_grid")
                    .striped(true)
                    .show(ui, |ui| {
                        ui.strong("Node");
                        ui.strong("Flow");
                        ui.strong("Volume");
                        ui.end_row();
                        for result in &snapshot.nodes {
                            ui.label(result.node.as_str());
                            ui.label(format!("{:.3}", result.flow));
                            ui.label(
                                result
                                    .volume
                                    .map(|v| format!("{:.3}", v))
                                    .unwrap_or_default(),
                            );
                            ui.end_row();
                        }
                    });
            });
    }

    fn error_window(&mut self, ctx: &egui::Context) {
        let error: Option<RunError> = self.view.borrow().error.clone();
        let text = match (&error, &self.message) {
            (Some(err), _) => err.to_string(),
            (None, Some(message)) => message.clone(),
            (None, None) => return,
        };
        let title = if error.as_ref().is_some_and(RunError::is_engine_error) {
            "Run failed"
        } else {
            "Error"
        };

        let mut dismissed = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(text);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            if error.is_some() {
                self.view.borrow_mut().error = None;
            } else {
                self.message = None;
            }
        }
    }
}

fn date_row(ui: &mut egui::Ui, field: &mut DateField) {
    ui.horizontal(|ui| {
        ui.label(field.label);
        let valid = field.is_valid();
        let mut edit = egui::TextEdit::singleline(&mut field.text).desired_width(90.0);
        if !valid {
            edit = edit.text_color(egui::Color32::RED);
        }
        if ui.add_enabled(field.enabled, edit).changed() {
            field.commit();
        }
    });
}

fn static_tooltip(model: &ModelDef, node: &NodeDef) -> String {
    let downstream: Vec<&str> = model.downstream(&node.name).collect();
    if downstream.is_empty() {
        node.kind.label().to_string()
    } else {
        format!("{}\nTo: {}", node.kind.label(), downstream.join(", "))
    }
}

impl eframe::App for WaternetApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(controller) = self.controller.as_mut() {
            controller.poll();
        }

        let mut actions = Vec::new();
        self.toolbar(ctx, &mut actions);

        self.file_dialog.update(ctx);
        if let Some(path) = self.file_dialog.take_selected() {
            self.open_model(path.to_path_buf());
        }

        self.schedule_panel(ctx);
        self.schematic_panel(ctx);
        self.inspector_window(ctx);
        self.error_window(ctx);

        for action in actions {
            self.apply(action);
        }

        if self
            .controller
            .as_ref()
            .is_some_and(RunController::is_running)
        {
            ctx.request_repaint_after(Duration::from_millis(30));
        }
    }
}
