//! Runtime bridge between UI command queue and backend event intake.

use std::{future::Future, io, sync::Arc, thread};

use client_core::{save_overview, ClientError, Credentials, CredentialsError, RemoteClient};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use shared::domain::TagScope;
use tokio::{runtime::Handle, task::JoinHandle};

use crate::backend_bridge::commands::{BackendCommand, RequestTicket};
use crate::controller::events::{TaskCompletion, TaskOutput, UiError, UiErrorContext, UiEvent};

/// Runs request futures on the backend runtime and reports every outcome,
/// including a panicked task, back to the UI queue exactly once.
#[derive(Clone)]
pub struct TaskRunner {
    runtime: Handle,
    ui_tx: Sender<UiEvent>,
}

pub struct TaskHandle {
    ticket: RequestTicket,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn ticket(&self) -> RequestTicket {
        self.ticket
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl TaskRunner {
    pub fn new(runtime: Handle, ui_tx: Sender<UiEvent>) -> Self {
        Self { runtime, ui_tx }
    }

    pub fn submit<F>(&self, ticket: RequestTicket, context: UiErrorContext, work: F) -> TaskHandle
    where
        F: Future<Output = Result<TaskOutput, ClientError>> + Send + 'static,
    {
        let ui_tx = self.ui_tx.clone();
        let worker = self.runtime.spawn(work);
        let join = self.runtime.spawn(async move {
            let outcome = match worker.await {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(err)) => {
                    tracing::warn!(
                        target_slot = ?ticket.target,
                        generation = ticket.generation,
                        "request failed: {err}"
                    );
                    Err(UiError::from_client_error(context, &err))
                }
                Err(join_err) => {
                    tracing::error!(
                        target_slot = ?ticket.target,
                        generation = ticket.generation,
                        "request task aborted: {join_err}"
                    );
                    Err(UiError::from_message(
                        context,
                        format!("background task failed: {join_err}"),
                    ))
                }
            };
            deliver(&ui_tx, TaskCompletion { ticket, outcome }).await;
        });
        TaskHandle { ticket, join }
    }
}

/// Every completion reaches the UI; a full queue only delays it.
async fn deliver(ui_tx: &Sender<UiEvent>, completion: TaskCompletion) {
    match ui_tx.try_send(UiEvent::Completed(completion)) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            tracing::warn!("ui event queue full; waiting to deliver request completion");
            let ui_tx = ui_tx.clone();
            let sent = tokio::task::spawn_blocking(move || ui_tx.send(event).is_ok()).await;
            if !matches!(sent, Ok(true)) {
                tracing::debug!("ui event queue closed before completion was delivered");
            }
        }
        Err(TrySendError::Disconnected(_)) => {
            tracing::debug!("ui event queue closed; app is shutting down");
        }
    }
}

/// Spawns the backend thread. It owns the tokio runtime and lives until the
/// command queue closes.
pub fn launch(
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
    client: Arc<dyn RemoteClient>,
) -> io::Result<()> {
    thread::Builder::new()
        .name("labdesk-backend".to_string())
        .spawn(move || start_backend_bridge(cmd_rx, ui_tx, client))?;
    Ok(())
}

pub fn start_backend_bridge(
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
    client: Arc<dyn RemoteClient>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("labdesk-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::BackendStartup,
                format!("backend worker startup failure: failed to build runtime: {err}"),
            )));
            tracing::error!("failed to build backend runtime: {err}");
            return;
        }
    };

    let runner = TaskRunner::new(runtime.handle().clone(), ui_tx);
    let mut in_flight: Vec<TaskHandle> = Vec::new();
    tracing::info!("backend worker ready");
    while let Ok(cmd) = cmd_rx.recv() {
        let ticket = cmd.ticket();
        let context = cmd.error_context();
        tracing::info!(
            command = cmd.name(),
            generation = ticket.generation,
            "backend: submitting request"
        );
        in_flight.retain(|handle| !handle.is_finished());
        let handle = runner.submit(ticket, context, execute(Arc::clone(&client), cmd));
        tracing::debug!(ticket = ?handle.ticket(), in_flight = in_flight.len() + 1, "request running");
        in_flight.push(handle);
    }
    tracing::info!(
        unfinished = in_flight.iter().filter(|handle| !handle.is_finished()).count(),
        "command queue closed; backend worker stopping"
    );
}

pub async fn execute(
    client: Arc<dyn RemoteClient>,
    cmd: BackendCommand,
) -> Result<TaskOutput, ClientError> {
    match cmd {
        BackendCommand::Login {
            credentials_path, ..
        } => {
            let path = credentials_path.clone();
            let credentials = tokio::task::spawn_blocking(move || Credentials::load(&path))
                .await
                .map_err(|join_err| CredentialsError::Read {
                    path: credentials_path,
                    source: io::Error::other(join_err),
                })??;
            let session = client.authenticate(&credentials).await?;
            Ok(TaskOutput::LoggedIn(session))
        }
        BackendCommand::ListWorkspaces { session, .. } => {
            Ok(TaskOutput::Workspaces(client.list_workspaces(&session).await?))
        }
        BackendCommand::ListUserTags { session, .. } => Ok(TaskOutput::UserTags(
            client.list_tags(&session, TagScope::User).await?,
        )),
        BackendCommand::ListExperiments {
            session,
            workspace_id,
            filter,
            limit,
            ..
        } => Ok(TaskOutput::Experiments(
            client
                .list_experiments(&session, workspace_id, filter, limit)
                .await?,
        )),
        BackendCommand::LoadExperiment {
            session,
            experiment_id,
            ..
        } => Ok(TaskOutput::Experiment(
            client.get_experiment(&session, experiment_id).await?,
        )),
        BackendCommand::LoadExperimentTags {
            session,
            experiment_id,
            ..
        } => {
            let tags = client
                .list_tags(&session, TagScope::Experiment(experiment_id))
                .await?;
            Ok(TaskOutput::ExperimentTags {
                experiment_id,
                tags,
            })
        }
        BackendCommand::SaveOverview {
            session,
            experiment_id,
            draft,
            existing_tags,
            ..
        } => {
            let added_tags = save_overview(
                client.as_ref(),
                &session,
                experiment_id,
                &draft,
                &existing_tags,
            )
            .await?;
            Ok(TaskOutput::OverviewSaved {
                experiment_id,
                title: draft.title,
                added_tags,
            })
        }
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
