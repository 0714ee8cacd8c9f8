//! Saving an experiment overview: title and description edit, followed by
//! one tag attachment per tag name the experiment does not have yet.

use std::collections::HashSet;

use shared::{
    domain::ExperimentId,
    protocol::{ExperimentEdit, Tag},
};
use tracing::info;

use crate::{RemoteClient, Result, Session};

/// Edit buffers of the overview form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverviewDraft {
    pub title: String,
    pub body: String,
    /// Semicolon separated tag names.
    pub tags: String,
}

/// Tag names from `tags_text` that are not among `existing`, in input order,
/// without blanks or repeats.
pub fn novel_tag_names(existing: &[Tag], tags_text: &str) -> Vec<String> {
    let known: HashSet<&str> = existing.iter().map(|tag| tag.name.as_str()).collect();
    let mut seen = HashSet::new();
    tags_text
        .split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| !known.contains(name))
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Returns the tags that were attached.
pub async fn save_overview(
    client: &dyn RemoteClient,
    session: &Session,
    experiment_id: ExperimentId,
    draft: &OverviewDraft,
    existing_tags: &[Tag],
) -> Result<Vec<Tag>> {
    client
        .edit_experiment(
            session,
            experiment_id,
            &ExperimentEdit {
                name: draft.title.clone(),
                description: draft.body.clone(),
            },
        )
        .await?;

    let mut added = Vec::new();
    for name in novel_tag_names(existing_tags, &draft.tags) {
        added.push(client.add_tag(session, experiment_id, &name).await?);
    }
    info!(
        experiment_id = experiment_id.0,
        added_tags = added.len(),
        "overview saved"
    );
    Ok(added)
}

#[cfg(test)]
#[path = "tests/overview_tests.rs"]
mod tests;
