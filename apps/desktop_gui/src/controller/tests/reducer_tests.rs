use super::*;
use std::collections::VecDeque;

use client_core::Session;
use shared::{
    domain::{ExperimentId, TagFilter, TagId, UserId, WorkspaceId},
    protocol::{Permissions, UserSummary, Workspace},
};

use crate::controller::events::{UiErrorCategory, AUTH_FAILURE_MESSAGE};

/// Answers discard prompts from a script and counts how often it was asked.
#[derive(Default)]
struct ScriptedGuard {
    answers: VecDeque<bool>,
    asked: usize,
}

impl ScriptedGuard {
    fn answering(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: 0,
        }
    }
}

impl DiscardGuard for ScriptedGuard {
    fn confirm_discard(&mut self) -> bool {
        self.asked += 1;
        self.answers.pop_front().unwrap_or(false)
    }
}

fn session() -> Session {
    Session::new(
        UserSummary {
            id: UserId(3),
            username: "jdoe@lab.org".to_string(),
            name: None,
        },
        "secret",
    )
}

fn workspace(id: i64, name: &str, edit: bool) -> Workspace {
    Workspace {
        id: WorkspaceId(id),
        name: name.to_string(),
        permissions: Permissions { edit },
    }
}

fn experiment(id: i64, name: &str, edit: bool) -> Experiment {
    Experiment {
        id: ExperimentId(id),
        name: name.to_string(),
        description: Some(format!("<p>{name} notes</p>")),
        created_at: "2024-03-05T10:15:00+00:00".to_string(),
        updated_at: "2024-03-06T08:00:00+00:00".to_string(),
        permissions: Permissions { edit },
    }
}

fn tag(id: i64, name: &str) -> Tag {
    Tag {
        id: TagId(id),
        name: name.to_string(),
    }
}

fn ok(ticket: RequestTicket, output: TaskOutput) -> TaskCompletion {
    TaskCompletion {
        ticket,
        outcome: Ok(output),
    }
}

fn only(commands: Vec<BackendCommand>) -> BackendCommand {
    assert_eq!(commands.len(), 1, "expected exactly one command: {commands:?}");
    commands.into_iter().next().expect("one command")
}

/// Signed in, with workspaces `W1` (editable) and `W2`, `W1` selected and
/// its experiments `A` (editable) and `B` (read-only) listed.
fn listed(guard: &mut ScriptedGuard) -> ViewController {
    let mut controller = ViewController::new(ControllerSettings {
        credentials_path: PathBuf::from("/tmp/key.cfg"),
        experiment_limit: 50,
    });
    let login = only(controller.start_login(guard)).ticket();
    let follow_up = controller.apply(ok(login, TaskOutput::LoggedIn(session())));
    let workspaces = follow_up[0].ticket();
    let user_tags = follow_up[1].ticket();
    controller.apply(ok(
        user_tags,
        TaskOutput::UserTags(vec![tag(5, "pcr"), tag(6, "cloning")]),
    ));
    let listing = only(controller.apply(ok(
        workspaces,
        TaskOutput::Workspaces(vec![
            workspace(1, "W1", true),
            workspace(2, "W2", false),
        ]),
    )));
    controller.apply(ok(
        listing.ticket(),
        TaskOutput::Experiments(vec![
            experiment(10, "A", true),
            experiment(11, "B", false),
        ]),
    ));
    controller
}

/// Selects and fully loads the experiment at `index`.
fn open(controller: &mut ViewController, index: usize, tags: Vec<Tag>) {
    let mut guard = ScriptedGuard::default();
    let load = only(controller.select_experiment(index, &mut guard));
    let BackendCommand::LoadExperiment { experiment_id, .. } = &load else {
        panic!("expected experiment load, got {load:?}");
    };
    let experiment_id = *experiment_id;
    let loaded = controller.snapshot().experiments[index].clone();
    let tag_fetch = only(controller.apply(ok(load.ticket(), TaskOutput::Experiment(loaded))));
    controller.apply(ok(
        tag_fetch.ticket(),
        TaskOutput::ExperimentTags {
            experiment_id,
            tags,
        },
    ));
}

#[test]
fn startup_login_reads_configured_credentials() {
    let mut controller = ViewController::new(ControllerSettings {
        credentials_path: PathBuf::from("/tmp/key.cfg"),
        experiment_limit: 50,
    });
    let mut guard = ScriptedGuard::default();

    let command = only(controller.start_login(&mut guard));

    assert!(matches!(
        &command,
        BackendCommand::Login { credentials_path, .. } if credentials_path == &PathBuf::from("/tmp/key.cfg")
    ));
    assert!(controller.is_busy());
    assert_eq!(controller.status(), "Logging in...");
    assert!(controller.start_login(&mut guard).is_empty(), "login already running");
}

#[test]
fn sign_in_fetches_workspaces_and_user_tags_together() {
    let mut controller = ViewController::new(ControllerSettings::default());
    let mut guard = ScriptedGuard::default();
    let login = only(controller.start_login(&mut guard)).ticket();

    let commands = controller.apply(ok(login, TaskOutput::LoggedIn(session())));

    assert_eq!(commands.len(), 2);
    assert!(matches!(commands[0], BackendCommand::ListWorkspaces { .. }));
    assert!(matches!(commands[1], BackendCommand::ListUserTags { .. }));
    assert!(controller.is_busy());
    assert!(controller.snapshot().session.is_some());
}

#[test]
fn invalid_key_leaves_workspace_list_empty() {
    let mut controller = ViewController::new(ControllerSettings::default());
    let mut guard = ScriptedGuard::default();
    let login = only(controller.start_login(&mut guard)).ticket();

    let follow_up = controller.apply(TaskCompletion {
        ticket: login,
        outcome: Err(UiError::from_message(
            crate::controller::events::UiErrorContext::Login,
            "authentication rejected: 401 unauthorized",
        )),
    });

    assert!(follow_up.is_empty());
    assert!(controller.snapshot().workspaces.is_empty());
    assert!(!controller.is_busy());
    assert_eq!(controller.status(), AUTH_FAILURE_MESSAGE);
    assert_eq!(
        controller.banner().map(UiError::category),
        Some(UiErrorCategory::Auth)
    );
    assert!(controller.needs_sign_in());
}

#[test]
fn first_workspace_is_selected_and_listed_automatically() {
    let mut guard = ScriptedGuard::default();
    let mut controller = ViewController::new(ControllerSettings {
        credentials_path: PathBuf::from("key.cfg"),
        experiment_limit: 50,
    });
    let login = only(controller.start_login(&mut guard)).ticket();
    let workspaces = controller.apply(ok(login, TaskOutput::LoggedIn(session())))[0].ticket();

    let listing = only(controller.apply(ok(
        workspaces,
        TaskOutput::Workspaces(vec![workspace(1, "W1", true), workspace(2, "W2", true)]),
    )));

    match listing {
        BackendCommand::ListExperiments {
            workspace_id,
            filter,
            limit,
            ..
        } => {
            assert_eq!(workspace_id, WorkspaceId(1));
            assert_eq!(filter, TagFilter::ShowAll);
            assert_eq!(limit, 50);
        }
        other => panic!("unexpected command {other:?}"),
    }
    assert_eq!(controller.snapshot().current_workspace, Some(0));
}

#[test]
fn experiment_listing_reports_count_in_status() {
    let mut guard = ScriptedGuard::default();
    let controller = listed(&mut guard);

    assert_eq!(controller.status(), "2 experiments loaded");
    assert!(!controller.is_busy());
}

#[test]
fn no_workspaces_stops_the_chain() {
    let mut guard = ScriptedGuard::default();
    let mut controller = ViewController::new(ControllerSettings::default());
    let login = only(controller.start_login(&mut guard)).ticket();
    let workspaces = controller.apply(ok(login, TaskOutput::LoggedIn(session())))[0].ticket();

    let commands = controller.apply(ok(workspaces, TaskOutput::Workspaces(Vec::new())));

    assert!(commands.is_empty());
    assert!(!controller.is_busy());
    assert_eq!(controller.snapshot().current_workspace, None);
}

#[test]
fn opening_an_experiment_fetches_its_tags_exactly_once() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);

    let load = only(controller.select_experiment(0, &mut guard));
    assert!(controller.is_busy());
    let loaded = controller.snapshot().experiments[0].clone();
    let after_load = controller.apply(ok(load.ticket(), TaskOutput::Experiment(loaded)));

    assert_eq!(after_load.len(), 1);
    assert!(matches!(
        after_load[0],
        BackendCommand::LoadExperimentTags { experiment_id: ExperimentId(10), .. }
    ));

    let done = controller.apply(ok(
        after_load[0].ticket(),
        TaskOutput::ExperimentTags {
            experiment_id: ExperimentId(10),
            tags: vec![tag(1, "alpha"), tag(2, "beta")],
        },
    ));
    assert!(done.is_empty());
    assert!(!controller.is_busy());
    assert!(!controller.is_dirty());
    assert_eq!(controller.draft().title, "A");
    assert_eq!(controller.draft().body, "<p>A notes</p>");
    assert_eq!(controller.draft().tags, "alpha;beta");
}

#[test]
fn declining_discard_keeps_workspace_and_edits() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, vec![tag(1, "alpha")]);
    assert!(controller.edit_title("A renamed".to_string()));
    assert!(controller.is_dirty());

    let mut decline = ScriptedGuard::answering(&[false]);
    let commands = controller.select_workspace(1, &mut decline);

    assert!(commands.is_empty());
    assert_eq!(decline.asked, 1);
    assert_eq!(controller.snapshot().current_workspace, Some(0));
    assert!(controller.is_dirty());
    assert_eq!(controller.draft().title, "A renamed");
}

#[test]
fn declining_discard_keeps_experiment_selection() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, vec![tag(1, "alpha")]);
    assert!(controller.edit_body("<i>draft</i>".to_string()));

    let mut decline = ScriptedGuard::answering(&[false]);
    let commands = controller.select_experiment(1, &mut decline);

    assert!(commands.is_empty());
    assert_eq!(decline.asked, 1);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.current_experiment_index, Some(0));
    assert_eq!(
        snapshot.current_experiment.as_ref().map(|experiment| experiment.id),
        Some(ExperimentId(10))
    );
    assert!(controller.is_dirty());
    assert_eq!(controller.draft().body, "<i>draft</i>");
    assert_eq!(controller.draft().tags, "alpha");
    assert!(!controller.is_busy());
}

#[test]
fn declining_discard_keeps_tag_filter() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, Vec::new());
    assert!(controller.edit_title("A renamed".to_string()));

    let mut decline = ScriptedGuard::answering(&[false]);
    let commands = controller.select_filter(1, &mut decline);

    assert!(commands.is_empty());
    assert_eq!(decline.asked, 1);
    assert_eq!(controller.snapshot().filter, TagFilter::ShowAll);
    assert_eq!(controller.snapshot().filter_position(), 0);
    assert_eq!(controller.snapshot().experiments.len(), 2);
    assert!(controller.is_dirty());
    assert_eq!(controller.draft().title, "A renamed");
}

#[test]
fn accepting_discard_switches_workspace() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, Vec::new());
    controller.edit_body("<b>changed</b>".to_string());

    let mut accept = ScriptedGuard::answering(&[true]);
    let listing = only(controller.select_workspace(1, &mut accept));

    assert_eq!(accept.asked, 1);
    assert!(matches!(
        listing,
        BackendCommand::ListExperiments { workspace_id: WorkspaceId(2), .. }
    ));
    assert!(!controller.is_dirty());
    assert_eq!(controller.snapshot().current_workspace, Some(1));
}

#[test]
fn clean_navigation_never_prompts() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, Vec::new());

    let mut watcher = ScriptedGuard::default();
    assert_eq!(controller.select_experiment(1, &mut watcher).len(), 1);
    assert_eq!(watcher.asked, 0);
}

#[test]
fn reselecting_current_entries_is_a_no_op() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, Vec::new());

    assert!(controller.select_workspace(0, &mut guard).is_empty());
    assert!(controller.select_experiment(0, &mut guard).is_empty());
    assert!(controller.select_filter(0, &mut guard).is_empty());
    assert!(controller.select_workspace(9, &mut guard).is_empty());
    assert_eq!(guard.asked, 0);
}

#[test]
fn superseded_experiment_result_is_dropped() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);

    let first = only(controller.select_experiment(0, &mut guard));
    let second = only(controller.select_experiment(1, &mut guard));

    let stale = controller.apply(ok(
        first.ticket(),
        TaskOutput::Experiment(experiment(10, "A", true)),
    ));
    assert!(stale.is_empty());
    assert!(controller.snapshot().current_experiment.is_none());
    assert!(controller.is_busy());

    let fresh = only(controller.apply(ok(
        second.ticket(),
        TaskOutput::Experiment(experiment(11, "B", false)),
    )));
    assert!(matches!(
        fresh,
        BackendCommand::LoadExperimentTags { experiment_id: ExperimentId(11), .. }
    ));
}

#[test]
fn failed_tag_fetch_keeps_previous_overview() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, vec![tag(1, "alpha")]);

    let load = only(controller.select_experiment(1, &mut guard));
    let tag_fetch = only(controller.apply(ok(
        load.ticket(),
        TaskOutput::Experiment(experiment(11, "B", false)),
    )));
    assert_eq!(controller.draft().title, "A", "overview waits for the tags");

    controller.apply(TaskCompletion {
        ticket: tag_fetch.ticket(),
        outcome: Err(UiError::from_message(
            crate::controller::events::UiErrorContext::LoadExperiment,
            "connection reset",
        )),
    });

    let snapshot = controller.snapshot();
    assert_eq!(
        snapshot.current_experiment.as_ref().map(|experiment| experiment.id),
        Some(ExperimentId(10))
    );
    assert_eq!(snapshot.current_tags, vec![tag(1, "alpha")]);
    assert_eq!(snapshot.current_experiment_index, Some(0));
    assert_eq!(controller.draft().title, "A");
    assert_eq!(controller.draft().tags, "alpha");
    assert!(!controller.is_busy());
    assert!(!controller.is_dirty());
}

#[test]
fn experiment_and_tags_appear_together() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, vec![tag(1, "alpha")]);

    let load = only(controller.select_experiment(1, &mut guard));
    let tag_fetch = only(controller.apply(ok(
        load.ticket(),
        TaskOutput::Experiment(experiment(11, "B", false)),
    )));
    assert_eq!(
        controller.snapshot().current_experiment.as_ref().map(|experiment| experiment.id),
        Some(ExperimentId(10))
    );

    controller.apply(ok(
        tag_fetch.ticket(),
        TaskOutput::ExperimentTags {
            experiment_id: ExperimentId(11),
            tags: vec![tag(3, "gel")],
        },
    ));

    let snapshot = controller.snapshot();
    assert_eq!(
        snapshot.current_experiment.as_ref().map(|experiment| experiment.id),
        Some(ExperimentId(11))
    );
    assert_eq!(snapshot.current_tags, vec![tag(3, "gel")]);
    assert_eq!(controller.draft().title, "B");
    assert_eq!(controller.draft().tags, "gel");
    assert_eq!(controller.status(), "Ready");
}

#[test]
fn workspace_switch_drops_pending_experiment_load() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);

    let load = only(controller.select_experiment(0, &mut guard));
    controller.select_workspace(1, &mut guard);

    assert!(controller
        .apply(ok(load.ticket(), TaskOutput::Experiment(experiment(10, "A", true))))
        .is_empty());
    assert!(controller.snapshot().current_experiment.is_none());
}

#[test]
fn filter_change_relists_with_tag() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);

    let listing = only(controller.select_filter(1, &mut guard));

    assert!(matches!(
        listing,
        BackendCommand::ListExperiments {
            workspace_id: WorkspaceId(1),
            filter: TagFilter::Tag(TagId(5)),
            ..
        }
    ));
    assert_eq!(controller.snapshot().filter, TagFilter::Tag(TagId(5)));
    assert_eq!(controller.snapshot().filter_position(), 1);
}

#[test]
fn save_sends_draft_then_renames_and_reloads() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, vec![tag(1, "alpha")]);
    controller.edit_title("A v2".to_string());
    controller.edit_tags("alpha;beta".to_string());
    assert!(controller.can_save());

    let save = only(controller.save());
    match &save {
        BackendCommand::SaveOverview {
            experiment_id,
            draft,
            existing_tags,
            ..
        } => {
            assert_eq!(*experiment_id, ExperimentId(10));
            assert_eq!(draft.title, "A v2");
            assert_eq!(draft.tags, "alpha;beta");
            assert_eq!(existing_tags, &vec![tag(1, "alpha")]);
        }
        other => panic!("unexpected command {other:?}"),
    }
    assert!(controller.is_busy());
    assert!(!controller.edit_title("during save".to_string()));

    let reload = only(controller.apply(ok(
        save.ticket(),
        TaskOutput::OverviewSaved {
            experiment_id: ExperimentId(10),
            title: "A v2".to_string(),
            added_tags: vec![tag(7, "beta")],
        },
    )));
    assert!(matches!(
        reload,
        BackendCommand::LoadExperiment { experiment_id: ExperimentId(10), .. }
    ));
    assert!(!controller.is_dirty());
    assert_eq!(controller.snapshot().experiments[0].name, "A v2");
}

#[test]
fn failed_save_keeps_edits_and_shows_banner() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, Vec::new());
    controller.edit_title("A v2".to_string());
    let save = only(controller.save());

    controller.apply(TaskCompletion {
        ticket: save.ticket(),
        outcome: Err(UiError::from_message(
            crate::controller::events::UiErrorContext::SaveOverview,
            "request timed out",
        )),
    });

    assert!(controller.is_dirty());
    assert_eq!(controller.draft().title, "A v2");
    assert!(!controller.is_busy());
    assert!(controller.banner().is_some());
    assert_eq!(controller.snapshot().current_experiment_index, Some(0));
    assert!(controller.can_save());
}

#[test]
fn read_only_indicator_follows_workspace_grant() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    let listing = only(controller.select_workspace(1, &mut guard));
    controller.apply(ok(
        listing.ticket(),
        TaskOutput::Experiments(vec![experiment(20, "C", true)]),
    ));
    open(&mut controller, 0, Vec::new());

    assert!(controller.permission().read_only());
    assert!(controller.edit_title("C v2".to_string()));
    assert!(controller.can_save());
}

#[test]
fn experiment_without_edit_right_ignores_edits() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 1, Vec::new());

    assert!(!controller.permission().read_only());
    assert!(!controller.edit_body("draft".to_string()));
    assert!(!controller.edit_tags("x".to_string()));
    assert!(!controller.is_dirty());
    assert!(!controller.can_save());
    assert!(controller.save().is_empty());
}

#[test]
fn closing_asks_only_when_dirty() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    open(&mut controller, 0, Vec::new());

    let mut watcher = ScriptedGuard::default();
    assert!(controller.confirm_close(&mut watcher));
    assert_eq!(watcher.asked, 0);

    controller.edit_title("changed".to_string());
    let mut decline = ScriptedGuard::answering(&[false]);
    assert!(!controller.confirm_close(&mut decline));
    let mut accept = ScriptedGuard::answering(&[true]);
    assert!(controller.confirm_close(&mut accept));
}

#[test]
fn unqueued_command_releases_busy_state() {
    let mut guard = ScriptedGuard::default();
    let mut controller = listed(&mut guard);
    let load = only(controller.select_experiment(0, &mut guard));

    controller.abandon(load.ticket(), "UI command queue is full; please retry".to_string());

    assert!(!controller.is_busy());
    assert_eq!(controller.status(), "UI command queue is full; please retry");
}

#[test]
fn backend_startup_failure_clears_pending_work() {
    let mut guard = ScriptedGuard::default();
    let mut controller = ViewController::new(ControllerSettings::default());
    controller.start_login(&mut guard);

    controller.apply_event(UiEvent::Error(UiError::from_message(
        crate::controller::events::UiErrorContext::BackendStartup,
        "backend worker startup failure: failed to build runtime",
    )));

    assert!(!controller.is_busy());
    assert!(controller.banner_text().is_some());
}
