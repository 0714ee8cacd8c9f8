//! UI/backend events and error modeling for desktop GUI controller.

use client_core::{ClientError, Session};
use shared::{
    domain::ExperimentId,
    error::ErrorCode,
    protocol::{Experiment, Tag, Workspace},
};

use crate::backend_bridge::commands::RequestTicket;

pub enum UiEvent {
    Error(UiError),
    Completed(TaskCompletion),
}

/// Result of one background request, tagged with the ticket it was issued under.
#[derive(Debug)]
pub struct TaskCompletion {
    pub ticket: RequestTicket,
    pub outcome: Result<TaskOutput, UiError>,
}

#[derive(Debug)]
pub enum TaskOutput {
    LoggedIn(Session),
    Workspaces(Vec<Workspace>),
    UserTags(Vec<Tag>),
    Experiments(Vec<Experiment>),
    Experiment(Experiment),
    ExperimentTags {
        experiment_id: ExperimentId,
        tags: Vec<Tag>,
    },
    OverviewSaved {
        experiment_id: ExperimentId,
        title: String,
        added_tags: Vec<Tag>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Login,
    LoadWorkspaces,
    LoadTags,
    LoadExperiments,
    LoadExperiment,
    SaveOverview,
    General,
}

impl UiErrorContext {
    /// Failures in these contexts stay visible as a banner until dismissed.
    pub fn is_persistent(self) -> bool {
        matches!(self, Self::BackendStartup | Self::Login | Self::SaveOverview)
    }
}

pub const AUTH_FAILURE_MESSAGE: &str =
    "Couldn't authenticate with Labstep. Check the credential file and your internet connection.";

pub fn classify_login_failure(error: &UiError) -> String {
    match error.category() {
        UiErrorCategory::Auth => AUTH_FAILURE_MESSAGE.to_string(),
        UiErrorCategory::Transport => {
            "Labstep unreachable; check the API URL and network, then retry sign-in.".to_string()
        }
        _ => format!("Sign-in error: {}", error.message()),
    }
}

pub fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Auth => "Authentication",
        UiErrorCategory::Transport => "Network",
        UiErrorCategory::Validation => "Request",
        UiErrorCategory::Unknown => "Error",
    }
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_client_error(context: UiErrorContext, error: &ClientError) -> Self {
        let category = if error.is_auth_failure() {
            UiErrorCategory::Auth
        } else if error.is_transport() {
            UiErrorCategory::Transport
        } else {
            match error {
                // 403 is a refused action, not a bad key
                ClientError::Api(_) => match error.api_code() {
                    Some(ErrorCode::Forbidden | ErrorCode::Validation | ErrorCode::NotFound) => {
                        UiErrorCategory::Validation
                    }
                    _ => UiErrorCategory::Unknown,
                },
                ClientError::Decode { .. } | ClientError::InvalidBaseUrl { .. } => {
                    UiErrorCategory::Validation
                }
                _ => UiErrorCategory::Unknown,
            }
        };

        Self {
            category,
            context,
            message: error.to_string(),
        }
    }

    /// Keyword classification for failures that never became a `ClientError`.
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("401")
            || message_lower.contains("unauthorized")
            || message_lower.contains("api key")
            || message_lower.contains("credential")
        {
            UiErrorCategory::Auth
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
        {
            UiErrorCategory::Validation
        } else if message_lower.contains("timeout")
            || message_lower.contains("timed out")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("unavailable")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == UiErrorCategory::Auth
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
