//! Immutable view of what the app currently knows about the signed-in user.

use client_core::Session;
use shared::{
    domain::TagFilter,
    protocol::{Experiment, Tag, Workspace},
};

pub const SHOW_ALL_LABEL: &str = "Show all";

/// Replaced wholesale on every change; readers hold an `Arc` to a
/// consistent version.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub workspaces: Vec<Workspace>,
    pub current_workspace: Option<usize>,
    pub filter: TagFilter,
    pub user_tags: Vec<Tag>,
    pub experiments: Vec<Experiment>,
    pub current_experiment_index: Option<usize>,
    pub current_experiment: Option<Experiment>,
    pub current_tags: Vec<Tag>,
}

impl SessionSnapshot {
    pub fn workspace(&self) -> Option<&Workspace> {
        self.current_workspace
            .and_then(|index| self.workspaces.get(index))
    }

    pub fn permission(&self) -> EditPermission {
        edit_permission(self.workspace(), self.current_experiment.as_ref())
    }

    pub fn filter_options(&self) -> Vec<TagFilterOption> {
        tag_filter_options(&self.user_tags)
    }

    /// Position of the active filter among `filter_options`, falling back
    /// to "Show all" when the tag disappeared from the user's tags.
    pub fn filter_position(&self) -> usize {
        self.filter_options()
            .iter()
            .position(|option| option.filter == self.filter)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditPermission {
    pub workspace_edit: bool,
    pub experiment_edit: bool,
}

impl EditPermission {
    /// Overview fields accept edits.
    pub fn can_edit(self) -> bool {
        self.experiment_edit
    }

    /// Read-only indicator; follows the workspace grant.
    pub fn read_only(self) -> bool {
        !self.workspace_edit
    }

    pub fn can_save(self, dirty: bool) -> bool {
        dirty && self.experiment_edit
    }
}

/// Missing workspace or experiment means no permission at all.
pub fn edit_permission(
    workspace: Option<&Workspace>,
    experiment: Option<&Experiment>,
) -> EditPermission {
    match (workspace, experiment) {
        (Some(workspace), Some(experiment)) => EditPermission {
            workspace_edit: workspace.permissions.edit,
            experiment_edit: experiment.permissions.edit,
        },
        _ => EditPermission::default(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilterOption {
    pub label: String,
    pub filter: TagFilter,
}

pub fn tag_filter_options(user_tags: &[Tag]) -> Vec<TagFilterOption> {
    std::iter::once(TagFilterOption {
        label: SHOW_ALL_LABEL.to_string(),
        filter: TagFilter::ShowAll,
    })
    .chain(user_tags.iter().map(|tag| TagFilterOption {
        label: tag.name.clone(),
        filter: TagFilter::Tag(tag.id),
    }))
    .collect()
}
