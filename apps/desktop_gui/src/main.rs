use std::{sync::Arc, time::Duration};

mod backend_bridge;
mod config;
mod controller;
mod ui;

use anyhow::Context;
use clap::Parser;
use client_core::{LabstepClient, RemoteClient};
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::backend_bridge::commands::BackendCommand;
use crate::config::{load_settings, StartupArgs};
use crate::controller::{events::UiEvent, reducer::ControllerSettings};
use crate::ui::app::LabDeskApp;

fn init_tracing(directive: Option<&str>) {
    let filter = directive
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = StartupArgs::parse();
    init_tracing(args.log_filter.as_deref());

    let settings = load_settings(&args)?;
    let labstep = LabstepClient::with_timeout(
        &settings.api_url,
        Duration::from_secs(settings.request_timeout_secs),
    )
    .context("failed to set up Labstep client")?;
    tracing::info!(
        api_url = %labstep.base_url(),
        credentials = %settings.credentials_path.display(),
        experiment_limit = settings.experiment_limit,
        "starting labdesk"
    );
    let client: Arc<dyn RemoteClient> = Arc::new(labstep);

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    backend_bridge::runtime::launch(cmd_rx, ui_tx, client)
        .context("failed to start backend worker thread")?;

    let controller_settings = ControllerSettings {
        credentials_path: settings.credentials_path,
        experiment_limit: settings.experiment_limit,
    };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Labdesk")
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([760.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Labdesk",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(LabDeskApp::new(
                cmd_tx,
                ui_rx,
                controller_settings,
            )))
        }),
    )
    .map_err(|err| anyhow::anyhow!("desktop ui exited with error: {err}"))
}
