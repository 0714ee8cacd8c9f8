//! Backend commands queued from UI to backend worker.

use std::path::PathBuf;

use client_core::{OverviewDraft, Session};
use shared::{
    domain::{ExperimentId, TagFilter, WorkspaceId},
    protocol::Tag,
};

use crate::controller::events::UiErrorContext;

/// Logical slot a request fills. A newer request for the same target
/// supersedes older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestTarget {
    Session,
    Workspaces,
    UserTags,
    Experiments,
    Experiment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub target: RequestTarget,
    pub generation: u64,
}

#[derive(Debug)]
pub enum BackendCommand {
    Login {
        ticket: RequestTicket,
        credentials_path: PathBuf,
    },
    ListWorkspaces {
        ticket: RequestTicket,
        session: Session,
    },
    ListUserTags {
        ticket: RequestTicket,
        session: Session,
    },
    ListExperiments {
        ticket: RequestTicket,
        session: Session,
        workspace_id: WorkspaceId,
        filter: TagFilter,
        limit: u32,
    },
    LoadExperiment {
        ticket: RequestTicket,
        session: Session,
        experiment_id: ExperimentId,
    },
    LoadExperimentTags {
        ticket: RequestTicket,
        session: Session,
        experiment_id: ExperimentId,
    },
    SaveOverview {
        ticket: RequestTicket,
        session: Session,
        experiment_id: ExperimentId,
        draft: OverviewDraft,
        existing_tags: Vec<Tag>,
    },
}

impl BackendCommand {
    pub fn ticket(&self) -> RequestTicket {
        match self {
            Self::Login { ticket, .. }
            | Self::ListWorkspaces { ticket, .. }
            | Self::ListUserTags { ticket, .. }
            | Self::ListExperiments { ticket, .. }
            | Self::LoadExperiment { ticket, .. }
            | Self::LoadExperimentTags { ticket, .. }
            | Self::SaveOverview { ticket, .. } => *ticket,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::ListWorkspaces { .. } => "list_workspaces",
            Self::ListUserTags { .. } => "list_user_tags",
            Self::ListExperiments { .. } => "list_experiments",
            Self::LoadExperiment { .. } => "load_experiment",
            Self::LoadExperimentTags { .. } => "load_experiment_tags",
            Self::SaveOverview { .. } => "save_overview",
        }
    }

    pub fn error_context(&self) -> UiErrorContext {
        match self {
            Self::Login { .. } => UiErrorContext::Login,
            Self::ListWorkspaces { .. } => UiErrorContext::LoadWorkspaces,
            Self::ListUserTags { .. } | Self::LoadExperimentTags { .. } => UiErrorContext::LoadTags,
            Self::ListExperiments { .. } => UiErrorContext::LoadExperiments,
            Self::LoadExperiment { .. } => UiErrorContext::LoadExperiment,
            Self::SaveOverview { .. } => UiErrorContext::SaveOverview,
        }
    }
}
