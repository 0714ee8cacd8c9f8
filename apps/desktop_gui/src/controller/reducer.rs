//! View state machine. Every user action and request completion goes through
//! `ViewController`, which updates the snapshot and returns the backend
//! commands to queue next.

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
};

use client_core::{OverviewDraft, DEFAULT_LIST_COUNT};
use shared::protocol::{join_tag_names, Experiment, Tag};

use crate::backend_bridge::commands::{BackendCommand, RequestTarget, RequestTicket};
use crate::controller::events::{
    classify_login_failure, err_label, TaskCompletion, TaskOutput, UiError, UiErrorContext,
    UiEvent,
};
use crate::controller::guard::DiscardGuard;
use crate::controller::session::{EditPermission, SessionSnapshot};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub credentials_path: PathBuf,
    pub experiment_limit: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("key.cfg"),
            experiment_limit: DEFAULT_LIST_COUNT,
        }
    }
}

/// Latest generation issued per request target. Only a completion carrying
/// the latest generation is applied.
#[derive(Debug, Default)]
struct Generations {
    latest: HashMap<RequestTarget, u64>,
}

impl Generations {
    fn issue(&mut self, target: RequestTarget) -> RequestTicket {
        let generation = self.latest.entry(target).or_insert(0);
        *generation += 1;
        RequestTicket {
            target,
            generation: *generation,
        }
    }

    fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.get(&ticket.target) == Some(&ticket.generation)
    }
}

pub struct ViewController {
    settings: ControllerSettings,
    snapshot: Arc<SessionSnapshot>,
    draft: OverviewDraft,
    dirty: bool,
    /// Fetched experiment waiting for its tags; shown only once both arrived.
    loading: Option<Experiment>,
    generations: Generations,
    /// Blocking requests in flight, with the status text they show.
    pending: BTreeMap<RequestTarget, String>,
    status: String,
    banner: Option<UiError>,
}

impl ViewController {
    pub fn new(settings: ControllerSettings) -> Self {
        Self {
            settings,
            snapshot: Arc::new(SessionSnapshot::default()),
            draft: OverviewDraft::default(),
            dirty: false,
            loading: None,
            generations: Generations::default(),
            pending: BTreeMap::new(),
            status: "Starting...".to_string(),
            banner: None,
        }
    }

    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn draft(&self) -> &OverviewDraft {
        &self.draft
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn banner(&self) -> Option<&UiError> {
        self.banner.as_ref()
    }

    pub fn banner_text(&self) -> Option<String> {
        self.banner.as_ref().map(|err| match err.context() {
            UiErrorContext::Login => classify_login_failure(err),
            _ => format!("{}: {}", err_label(err.category()), err.message()),
        })
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    pub fn permission(&self) -> EditPermission {
        self.snapshot.permission()
    }

    pub fn can_save(&self) -> bool {
        !self.is_busy() && self.permission().can_save(self.dirty)
    }

    /// No usable session and none being established.
    pub fn needs_sign_in(&self) -> bool {
        (self.snapshot.session.is_none() && !self.pending.contains_key(&RequestTarget::Session))
            || self.banner.as_ref().is_some_and(UiError::requires_reauth)
    }

    pub fn start_login(&mut self, guard: &mut dyn DiscardGuard) -> Vec<BackendCommand> {
        if self.pending.contains_key(&RequestTarget::Session) || !self.leave_editing(guard) {
            return Vec::new();
        }
        self.banner = None;
        let ticket = self.begin(RequestTarget::Session, "Logging in...");
        vec![BackendCommand::Login {
            ticket,
            credentials_path: self.settings.credentials_path.clone(),
        }]
    }

    pub fn select_workspace(
        &mut self,
        index: usize,
        guard: &mut dyn DiscardGuard,
    ) -> Vec<BackendCommand> {
        if index >= self.snapshot.workspaces.len()
            || self.snapshot.current_workspace == Some(index)
            || !self.leave_editing(guard)
        {
            return Vec::new();
        }
        self.request_experiments(index)
    }

    /// `position` indexes `SessionSnapshot::filter_options`.
    pub fn select_filter(
        &mut self,
        position: usize,
        guard: &mut dyn DiscardGuard,
    ) -> Vec<BackendCommand> {
        let Some(option) = self.snapshot.filter_options().into_iter().nth(position) else {
            return Vec::new();
        };
        if option.filter == self.snapshot.filter || !self.leave_editing(guard) {
            return Vec::new();
        }
        Arc::make_mut(&mut self.snapshot).filter = option.filter;
        match self.snapshot.current_workspace {
            Some(index) => self.request_experiments(index),
            None => Vec::new(),
        }
    }

    pub fn select_experiment(
        &mut self,
        index: usize,
        guard: &mut dyn DiscardGuard,
    ) -> Vec<BackendCommand> {
        if self.snapshot.current_experiment_index == Some(index) {
            return Vec::new();
        }
        let (Some(session), Some(experiment)) = (
            self.snapshot.session.clone(),
            self.snapshot.experiments.get(index).cloned(),
        ) else {
            return Vec::new();
        };
        if !self.leave_editing(guard) {
            return Vec::new();
        }
        Arc::make_mut(&mut self.snapshot).current_experiment_index = Some(index);
        let ticket = self.begin(
            RequestTarget::Experiment,
            format!("Getting \"{}\"...", experiment.name),
        );
        vec![BackendCommand::LoadExperiment {
            ticket,
            session,
            experiment_id: experiment.id,
        }]
    }

    pub fn edit_title(&mut self, title: String) -> bool {
        self.edit_field(title, |draft| &mut draft.title)
    }

    pub fn edit_body(&mut self, body: String) -> bool {
        self.edit_field(body, |draft| &mut draft.body)
    }

    pub fn edit_tags(&mut self, tags: String) -> bool {
        self.edit_field(tags, |draft| &mut draft.tags)
    }

    pub fn save(&mut self) -> Vec<BackendCommand> {
        if !self.can_save() {
            return Vec::new();
        }
        let (Some(session), Some(experiment_id)) = (
            self.snapshot.session.clone(),
            self.snapshot.current_experiment.as_ref().map(|experiment| experiment.id),
        ) else {
            return Vec::new();
        };
        let ticket = self.begin(RequestTarget::Experiment, "Saving to Labstep server...");
        vec![BackendCommand::SaveOverview {
            ticket,
            session,
            experiment_id,
            draft: self.draft.clone(),
            existing_tags: self.snapshot.current_tags.clone(),
        }]
    }

    /// `true` when the window may close.
    pub fn confirm_close(&self, guard: &mut dyn DiscardGuard) -> bool {
        !self.dirty || guard.confirm_discard()
    }

    /// The command for `ticket` never reached the backend.
    pub fn abandon(&mut self, ticket: RequestTicket, message: String) {
        if self.generations.is_current(ticket) {
            self.pending.remove(&ticket.target);
        }
        tracing::warn!(target_slot = ?ticket.target, "request not queued: {message}");
        self.banner = Some(UiError::from_message(UiErrorContext::General, message.clone()));
        self.status = message;
    }

    pub fn apply_event(&mut self, event: UiEvent) -> Vec<BackendCommand> {
        match event {
            UiEvent::Error(err) => {
                tracing::error!(context = ?err.context(), "{}", err.message());
                self.pending.clear();
                self.status = err.message().to_string();
                self.banner = Some(err);
                Vec::new()
            }
            UiEvent::Completed(completion) => self.apply(completion),
        }
    }

    pub fn apply(&mut self, completion: TaskCompletion) -> Vec<BackendCommand> {
        let TaskCompletion { ticket, outcome } = completion;
        if !self.generations.is_current(ticket) {
            tracing::debug!(
                target_slot = ?ticket.target,
                generation = ticket.generation,
                "dropping superseded result"
            );
            return Vec::new();
        }
        match outcome {
            Ok(output) => self.apply_output(ticket, output),
            Err(err) => {
                self.pending.remove(&ticket.target);
                self.fail(ticket.target, err);
                Vec::new()
            }
        }
    }

    fn apply_output(&mut self, ticket: RequestTicket, output: TaskOutput) -> Vec<BackendCommand> {
        match output {
            TaskOutput::LoggedIn(session) => {
                tracing::info!(user = %session.user().username, "signed in");
                for target in [
                    RequestTarget::Workspaces,
                    RequestTarget::UserTags,
                    RequestTarget::Experiments,
                    RequestTarget::Experiment,
                ] {
                    self.generations.issue(target);
                }
                self.pending.clear();
                self.snapshot = Arc::new(SessionSnapshot {
                    session: Some(session.clone()),
                    ..SessionSnapshot::default()
                });
                self.draft = OverviewDraft::default();
                self.dirty = false;
                self.loading = None;
                self.banner = None;

                let tags_ticket = self.begin(RequestTarget::UserTags, "Getting tags...");
                let workspaces_ticket =
                    self.begin(RequestTarget::Workspaces, "Getting workspaces...");
                vec![
                    BackendCommand::ListWorkspaces {
                        ticket: workspaces_ticket,
                        session: session.clone(),
                    },
                    BackendCommand::ListUserTags {
                        ticket: tags_ticket,
                        session,
                    },
                ]
            }
            TaskOutput::Workspaces(workspaces) => {
                self.pending.remove(&RequestTarget::Workspaces);
                let empty = workspaces.is_empty();
                {
                    let snapshot = Arc::make_mut(&mut self.snapshot);
                    snapshot.workspaces = workspaces;
                    snapshot.current_workspace = None;
                }
                if empty {
                    self.status = "No workspaces available for this account".to_string();
                    return Vec::new();
                }
                self.request_experiments(0)
            }
            TaskOutput::UserTags(tags) => {
                Arc::make_mut(&mut self.snapshot).user_tags = tags;
                Vec::new()
            }
            TaskOutput::Experiments(experiments) => {
                self.pending.remove(&RequestTarget::Experiments);
                self.status = format!("{} experiments loaded", experiments.len());
                self.clear_experiment(experiments);
                Vec::new()
            }
            TaskOutput::Experiment(experiment) => {
                let Some(session) = self.snapshot.session.clone() else {
                    self.pending.remove(&RequestTarget::Experiment);
                    return Vec::new();
                };
                let experiment_id = experiment.id;
                self.loading = Some(experiment);
                self.resume(ticket, "Getting tags...");
                vec![BackendCommand::LoadExperimentTags {
                    ticket,
                    session,
                    experiment_id,
                }]
            }
            TaskOutput::ExperimentTags {
                experiment_id,
                tags,
            } => {
                self.pending.remove(&RequestTarget::Experiment);
                let Some(experiment) = self
                    .loading
                    .take()
                    .filter(|experiment| experiment.id == experiment_id)
                else {
                    return Vec::new();
                };
                self.draft = draft_for(Some(&experiment), &tags);
                self.dirty = false;
                {
                    let snapshot = Arc::make_mut(&mut self.snapshot);
                    snapshot.current_experiment = Some(experiment);
                    snapshot.current_tags = tags;
                }
                self.status = "Ready".to_string();
                Vec::new()
            }
            TaskOutput::OverviewSaved {
                experiment_id,
                title,
                added_tags,
            } => {
                tracing::info!(
                    experiment_id = experiment_id.0,
                    added_tags = added_tags.len(),
                    "overview saved"
                );
                {
                    let snapshot = Arc::make_mut(&mut self.snapshot);
                    for experiment in snapshot
                        .experiments
                        .iter_mut()
                        .filter(|experiment| experiment.id == experiment_id)
                    {
                        experiment.name = title.clone();
                    }
                }
                self.dirty = false;
                let Some(session) = self.snapshot.session.clone() else {
                    self.pending.remove(&RequestTarget::Experiment);
                    return Vec::new();
                };
                self.resume(ticket, "Reloading experiment...");
                vec![BackendCommand::LoadExperiment {
                    ticket,
                    session,
                    experiment_id,
                }]
            }
        }
    }

    fn fail(&mut self, target: RequestTarget, err: UiError) {
        tracing::warn!(target_slot = ?target, context = ?err.context(), "{}", err.message());
        self.status = match target {
            RequestTarget::Session => classify_login_failure(&err),
            _ => format!("{}: {}", err_label(err.category()), err.message()),
        };
        match target {
            RequestTarget::Experiments => self.clear_experiment(Vec::new()),
            RequestTarget::Experiment => {
                self.loading = None;
                // point the selection back at what is actually shown
                let snapshot = Arc::make_mut(&mut self.snapshot);
                snapshot.current_experiment_index =
                    snapshot.current_experiment.as_ref().and_then(|shown| {
                        snapshot
                            .experiments
                            .iter()
                            .position(|experiment| experiment.id == shown.id)
                    });
            }
            _ => {}
        }
        if err.context().is_persistent() || err.requires_reauth() {
            self.banner = Some(err);
        }
    }

    fn request_experiments(&mut self, index: usize) -> Vec<BackendCommand> {
        let (Some(session), Some(workspace)) = (
            self.snapshot.session.clone(),
            self.snapshot.workspaces.get(index).cloned(),
        ) else {
            return Vec::new();
        };
        Arc::make_mut(&mut self.snapshot).current_workspace = Some(index);
        // whatever experiment was loading belongs to the old list
        self.generations.issue(RequestTarget::Experiment);
        self.pending.remove(&RequestTarget::Experiment);
        self.loading = None;

        let ticket = self.begin(
            RequestTarget::Experiments,
            format!("Getting experiments for {}...", workspace.name),
        );
        vec![BackendCommand::ListExperiments {
            ticket,
            session,
            workspace_id: workspace.id,
            filter: self.snapshot.filter,
            limit: self.settings.experiment_limit,
        }]
    }

    fn clear_experiment(&mut self, experiments: Vec<Experiment>) {
        let snapshot = Arc::make_mut(&mut self.snapshot);
        snapshot.experiments = experiments;
        snapshot.current_experiment_index = None;
        snapshot.current_experiment = None;
        snapshot.current_tags = Vec::new();
        self.draft = OverviewDraft::default();
        self.dirty = false;
    }

    fn begin(&mut self, target: RequestTarget, status: impl Into<String>) -> RequestTicket {
        let ticket = self.generations.issue(target);
        let status = status.into();
        if target != RequestTarget::UserTags {
            self.pending.insert(target, status.clone());
        }
        self.status = status;
        ticket
    }

    /// Next step of a chained request keeps its ticket.
    fn resume(&mut self, ticket: RequestTicket, status: &str) {
        self.pending.insert(ticket.target, status.to_string());
        self.status = status.to_string();
    }

    /// `true` when there is nothing unsaved or the user agreed to drop it.
    fn leave_editing(&mut self, guard: &mut dyn DiscardGuard) -> bool {
        if !self.dirty {
            return true;
        }
        if !guard.confirm_discard() {
            tracing::debug!("navigation cancelled; keeping unsaved edits");
            return false;
        }
        self.dirty = false;
        self.draft = draft_for(
            self.snapshot.current_experiment.as_ref(),
            &self.snapshot.current_tags,
        );
        true
    }

    fn edit_field(
        &mut self,
        value: String,
        field: fn(&mut OverviewDraft) -> &mut String,
    ) -> bool {
        if self.snapshot.current_experiment.is_none()
            || !self.permission().can_edit()
            || self.is_busy()
        {
            return false;
        }
        let slot = field(&mut self.draft);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.dirty = true;
        true
    }
}

fn draft_for(experiment: Option<&Experiment>, tags: &[Tag]) -> OverviewDraft {
    experiment
        .map(|experiment| OverviewDraft {
            title: experiment.name.clone(),
            body: experiment.description.clone().unwrap_or_default(),
            tags: join_tag_names(tags),
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
