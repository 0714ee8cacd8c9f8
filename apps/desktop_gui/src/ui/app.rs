//! Main window: workspace and tag pickers, the experiment list, and the
//! overview editor. All state lives in `ViewController`; this module only
//! draws it and turns clicks into controller calls.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use egui::text::{CCursor, CCursorRange};
use shared::time::format_local;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{
    events::UiEvent,
    guard::NativeDiscardPrompt,
    orchestration::dispatch_backend_command,
    reducer::{ControllerSettings, ViewController},
};
use crate::ui::rich_text::{
    formats_at, layout_job, parse_markup, toggle_format, Format, PreviewStyle, Selection,
};

const BODY_EDITOR_ID: &str = "overview_body";
const NO_SELECTION: &str = "(none)";

enum UiAction {
    SelectWorkspace(usize),
    SelectFilter(usize),
    SelectExperiment(usize),
    EditTitle(String),
    EditBody(String),
    EditTags(String),
    ToggleFormat(Format),
    Save,
    SignIn,
    DismissBanner,
}

pub struct LabDeskApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    controller: ViewController,
    prompt: NativeDiscardPrompt,
    body_selection: Selection,
    /// Selection to push into the body editor on the next frame.
    pending_body_cursor: Option<Selection>,
    show_preview: bool,
}

impl LabDeskApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        settings: ControllerSettings,
    ) -> Self {
        let mut app = Self {
            cmd_tx,
            ui_rx,
            controller: ViewController::new(settings),
            prompt: NativeDiscardPrompt,
            body_selection: Selection::cursor(0),
            pending_body_cursor: None,
            show_preview: true,
        };
        let commands = app.controller.start_login(&mut app.prompt);
        app.dispatch(commands);
        app
    }

    fn dispatch(&mut self, commands: Vec<BackendCommand>) {
        for cmd in commands {
            let ticket = cmd.ticket();
            if let Err(status) = dispatch_backend_command(&self.cmd_tx, cmd) {
                self.controller.abandon(ticket, status);
            }
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            let commands = self.controller.apply_event(event);
            self.dispatch(commands);
        }
    }

    fn perform(&mut self, action: UiAction) {
        let commands = match action {
            UiAction::SelectWorkspace(index) => {
                self.controller.select_workspace(index, &mut self.prompt)
            }
            UiAction::SelectFilter(position) => {
                self.controller.select_filter(position, &mut self.prompt)
            }
            UiAction::SelectExperiment(index) => {
                self.controller.select_experiment(index, &mut self.prompt)
            }
            UiAction::EditTitle(title) => {
                self.controller.edit_title(title);
                Vec::new()
            }
            UiAction::EditBody(body) => {
                self.controller.edit_body(body);
                Vec::new()
            }
            UiAction::EditTags(tags) => {
                self.controller.edit_tags(tags);
                Vec::new()
            }
            UiAction::ToggleFormat(format) => {
                let (body, selection) =
                    toggle_format(&self.controller.draft().body, self.body_selection, format);
                if self.controller.edit_body(body) {
                    self.body_selection = selection;
                    self.pending_body_cursor = Some(selection);
                }
                Vec::new()
            }
            UiAction::Save => self.controller.save(),
            UiAction::SignIn => self.controller.start_login(&mut self.prompt),
            UiAction::DismissBanner => {
                self.controller.dismiss_banner();
                Vec::new()
            }
        };
        self.dispatch(commands);
    }

    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.viewport().close_requested())
            && !self.controller.confirm_close(&mut self.prompt)
        {
            tracing::debug!("close cancelled; unsaved edits kept");
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
        }
    }

    fn show_top_bar(&self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let snapshot = self.controller.snapshot();
        let busy = self.controller.is_busy();
        let needs_sign_in = self.controller.needs_sign_in();

        egui::TopBottomPanel::top("workspace_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.add_enabled_ui(!busy, |ui| {
                    ui.label("Workspace:");
                    egui::ComboBox::from_id_salt("workspace_selector")
                        .width(220.0)
                        .selected_text(
                            snapshot
                                .workspace()
                                .map_or(NO_SELECTION, |workspace| workspace.name.as_str()),
                        )
                        .show_ui(ui, |ui| {
                            for (index, workspace) in snapshot.workspaces.iter().enumerate() {
                                let selected = snapshot.current_workspace == Some(index);
                                if ui.selectable_label(selected, &workspace.name).clicked() {
                                    actions.push(UiAction::SelectWorkspace(index));
                                }
                            }
                        });

                    ui.label("Tag:");
                    let options = snapshot.filter_options();
                    let current = snapshot.filter_position();
                    egui::ComboBox::from_id_salt("tag_filter")
                        .width(160.0)
                        .selected_text(
                            options
                                .get(current)
                                .map_or(NO_SELECTION, |option| option.label.as_str()),
                        )
                        .show_ui(ui, |ui| {
                            for (position, option) in options.iter().enumerate() {
                                if ui
                                    .selectable_label(position == current, &option.label)
                                    .clicked()
                                {
                                    actions.push(UiAction::SelectFilter(position));
                                }
                            }
                        });
                });

                ui.separator();
                let mut read_only = self.controller.permission().read_only();
                ui.add_enabled(false, egui::Checkbox::new(&mut read_only, "Read only"));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(session) = &snapshot.session {
                        ui.label(session.user().display_name());
                    }
                    if needs_sign_in && ui.button("Sign in again").clicked() {
                        actions.push(UiAction::SignIn);
                    }
                });
            });
        });
    }

    fn show_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.controller.is_busy() {
                    ui.spinner();
                }
                ui.label(self.controller.status());
                if self.controller.is_dirty() {
                    ui.separator();
                    ui.weak("Unsaved changes");
                }
            });
        });
    }

    fn show_experiment_list(&self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let snapshot = self.controller.snapshot();
        let busy = self.controller.is_busy();

        egui::SidePanel::left("experiment_list")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading(
                    snapshot
                        .workspace()
                        .map_or("Experiments", |workspace| workspace.name.as_str()),
                );
                ui.separator();
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        ui.add_enabled_ui(!busy, |ui| {
                            if snapshot.experiments.is_empty() {
                                ui.weak("No experiments");
                            }
                            for (index, experiment) in snapshot.experiments.iter().enumerate() {
                                let selected = snapshot.current_experiment_index == Some(index);
                                if ui.selectable_label(selected, &experiment.name).clicked() {
                                    actions.push(UiAction::SelectExperiment(index));
                                }
                            }
                        });
                    });
            });
    }

    fn show_banner(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let Some(text) = self.controller.banner_text() else {
            return;
        };
        let error_color = ui.visuals().error_fg_color;
        egui::Frame::new()
            .fill(error_color.gamma_multiply(0.12))
            .inner_margin(8.0)
            .corner_radius(4.0)
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.colored_label(error_color, text);
                    if self.controller.needs_sign_in() && ui.button("Sign in again").clicked() {
                        actions.push(UiAction::SignIn);
                    }
                    if ui.button("Dismiss").clicked() {
                        actions.push(UiAction::DismissBanner);
                    }
                });
            });
        ui.add_space(6.0);
    }

    fn show_overview(&mut self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let snapshot = self.controller.snapshot();
        let busy = self.controller.is_busy();
        let permission = self.controller.permission();
        let can_edit = permission.can_edit();
        let can_save = self.controller.can_save();
        let draft = self.controller.draft().clone();

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_banner(ui, actions);

            let Some(experiment) = snapshot.current_experiment.as_ref() else {
                ui.centered_and_justified(|ui| {
                    ui.weak("Select an experiment to view its overview");
                });
                return;
            };

            ui.add_enabled_ui(!busy, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Title");
                    let mut title = draft.title.clone();
                    let response = ui.add_sized(
                        [ui.available_width(), 24.0],
                        egui::TextEdit::singleline(&mut title).interactive(can_edit),
                    );
                    if response.changed() {
                        actions.push(UiAction::EditTitle(title));
                    }
                });
                ui.horizontal(|ui| {
                    ui.weak(format!("Created at: {}", format_local(&experiment.created_at)));
                    ui.separator();
                    ui.weak(format!("Updated at: {}", format_local(&experiment.updated_at)));
                });
                ui.add_space(4.0);

                let active = formats_at(&draft.body, self.body_selection.end);
                ui.horizontal(|ui| {
                    for format in Format::ALL {
                        let mut label = egui::RichText::new(format.label());
                        label = match format {
                            Format::Bold => label.strong(),
                            Format::Italic => label.italics(),
                            Format::Underline => label.underline(),
                            Format::Superscript | Format::Subscript => label,
                        };
                        let button = egui::Button::new(label).selected(active.contains(format));
                        if ui
                            .add_enabled(can_edit, button)
                            .on_hover_text(format.hint())
                            .clicked()
                        {
                            actions.push(UiAction::ToggleFormat(format));
                        }
                    }
                    ui.separator();
                    ui.checkbox(&mut self.show_preview, "Preview");
                });

                let body_id = egui::Id::new(BODY_EDITOR_ID);
                if let Some(selection) = self.pending_body_cursor.take() {
                    if let Some(mut state) = egui::TextEdit::load_state(ui.ctx(), body_id) {
                        state.cursor.set_char_range(Some(CCursorRange::two(
                            CCursor::new(selection.start),
                            CCursor::new(selection.end),
                        )));
                        state.store(ui.ctx(), body_id);
                    }
                    ui.memory_mut(|memory| memory.request_focus(body_id));
                }

                let mut body = draft.body.clone();
                let output = egui::TextEdit::multiline(&mut body)
                    .id(body_id)
                    .desired_rows(12)
                    .desired_width(f32::INFINITY)
                    .interactive(can_edit)
                    .show(ui);
                if let Some(range) = output.cursor_range {
                    self.body_selection = Selection::new(range.primary.index, range.secondary.index);
                }
                if output.response.changed() {
                    actions.push(UiAction::EditBody(body));
                }

                if self.show_preview {
                    let style = PreviewStyle {
                        font_size: 14.0,
                        color: ui.visuals().text_color(),
                        strong_color: ui.visuals().strong_text_color(),
                    };
                    egui::Frame::group(ui.style()).show(ui, |ui| {
                        ui.set_min_width(ui.available_width());
                        ui.label(layout_job(&parse_markup(&draft.body), &style));
                    });
                }

                ui.add_space(6.0);
                ui.label("Tags (separated by ;)");
                let mut tags = draft.tags.clone();
                let response = ui.add_sized(
                    [ui.available_width(), 24.0],
                    egui::TextEdit::singleline(&mut tags).interactive(can_edit),
                );
                if response.changed() {
                    actions.push(UiAction::EditTags(tags));
                }

                ui.add_space(6.0);
                let save = ui
                    .add_enabled(can_save, egui::Button::new("Save"))
                    .on_disabled_hover_text(if permission.experiment_edit {
                        "Nothing to save"
                    } else {
                        "You don't have permission to edit this experiment"
                    });
                if save.clicked() {
                    actions.push(UiAction::Save);
                }
            });
        });
    }
}

impl eframe::App for LabDeskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        self.handle_close_request(ctx);

        let mut actions = Vec::new();
        if self.controller.can_save()
            && ctx.input_mut(|i| {
                i.consume_shortcut(&egui::KeyboardShortcut::new(
                    egui::Modifiers::COMMAND,
                    egui::Key::S,
                ))
            })
        {
            actions.push(UiAction::Save);
        }
        self.show_top_bar(ctx, &mut actions);
        self.show_status_bar(ctx);
        self.show_experiment_list(ctx, &mut actions);
        self.show_overview(ctx, &mut actions);

        for action in actions {
            self.perform(action);
        }

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
