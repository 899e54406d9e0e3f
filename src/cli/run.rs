//! Pipeline runner behind the CLI commands.
//!
//! Builds the HTTP stack from settings, starts the connection monitor,
//! prints the event stream to stdout and runs one pipeline.

use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::{eyre, Report, WrapErr};
use color_eyre::{Result, Section};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::args::CliCommand;
use crate::adapters::ReqwestHttpClient;
use crate::api::UserApi;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::events::{create_event_channel, EventReceiver, SyncEvent};
use crate::models::{DeleteTarget, PasswordUpdate, UserRecord};
use crate::monitor::{wait_for_status_until, ConnectionMonitor, ConnectionStatus};
use crate::sync::{BatchSize, BatchUpsertEngine, DeletionPipeline, ExportEngine, PasswordPipeline};
use crate::traits::HttpClient;
use crate::transport::RetryingTransport;

/// Turn a run error into a report carrying the hint for its category.
pub fn with_suggestion(err: SyncError) -> Report {
    let hint = err.category().recovery_hint();
    Report::new(err).suggestion(hint)
}

/// Read a JSON array from disk.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("failed to parse {}", path.display()))
}

/// One line of operator output, or `None` for events not printed.
pub fn format_event(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::Log(log) => Some(format!(
            "{} [{:<7}] {}",
            log.timestamp.format("%H:%M:%S"),
            log.severity,
            log.message
        )),
        SyncEvent::Progress { percent: 100, pipeline } => Some(format!("{} 100%", pipeline)),
        SyncEvent::Progress { .. } => None,
    }
}

fn spawn_printer(mut rx: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = format_event(&event) {
                println!("{}", line);
            }
        }
    })
}

fn install_interrupt_handler(cancel: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || {
        if !cancel.is_cancelled() {
            eprintln!("Interrupted, stopping after the current step...");
            cancel.cancel();
        }
    })
    .map_err(|e| eyre!("failed to install Ctrl-C handler: {}", e))
}

/// Run `command` against the server described by `config`.
pub async fn run_pipeline(command: CliCommand, config: SyncConfig) -> Result<()> {
    let (events, rx) = create_event_channel();
    let printer = spawn_printer(rx);

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let transport = RetryingTransport::from_config(client, &config, events);
    let api = UserApi::new(transport, config);

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone())?;

    let result = match command {
        CliCommand::Export { out } => export(api, out.as_deref()).await,
        command => with_connection(command, api, &cancel).await,
    };

    // The printer finishes once every sender is gone.
    let _ = printer.await;
    result
}

async fn with_connection(command: CliCommand, api: UserApi, cancel: &CancellationToken) -> Result<()> {
    let base_url = api.config().base_url.clone();
    let monitor = ConnectionMonitor::new(api.clone());
    let mut status = monitor.status_receiver();
    let stop = CancellationToken::new();
    let handle = monitor.spawn(stop.clone());

    let result = match wait_for_status_until(&mut status, cancel).await {
        Some(ConnectionStatus::Connected) => dispatch(command, api, status, cancel).await,
        None if cancel.is_cancelled() => Err(eyre!("interrupted before {} answered", base_url)),
        _ => Err(eyre!("cannot reach {}", base_url)),
    };

    stop.cancel();
    let _ = handle.await;
    result
}

async fn dispatch(
    command: CliCommand,
    api: UserApi,
    status: watch::Receiver<ConnectionStatus>,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        CliCommand::Upsert { file, batch_size } => {
            let batch_size = BatchSize::try_from(batch_size).map_err(with_suggestion)?;
            let records: Vec<UserRecord> = read_json(&file)?;
            let engine = BatchUpsertEngine::new(api, status);
            let summary = engine
                .run(records, batch_size, cancel)
                .await
                .map_err(with_suggestion)?;
            for record in &summary.failed_records {
                println!("failed: {}", record.username);
            }
            match summary.failure_count() {
                0 => Ok(()),
                n => Err(eyre!("{} record(s) failed", n)),
            }
        }
        CliCommand::Delete { file } => {
            let targets: Vec<DeleteTarget> = read_json(&file)?;
            let pipeline = DeletionPipeline::new(api, status);
            let summary = pipeline.run(targets, cancel).await.map_err(with_suggestion)?;
            match summary.failed {
                0 => Ok(()),
                n => Err(eyre!("{} deletion(s) failed", n)),
            }
        }
        CliCommand::Passwords { file } => {
            let updates: Vec<PasswordUpdate> = read_json(&file)?;
            let pipeline = PasswordPipeline::new(api, status);
            let summary = pipeline.run(updates, cancel).await.map_err(with_suggestion)?;
            match summary.failed + summary.not_found {
                0 => Ok(()),
                n => Err(eyre!("{} password update(s) did not apply", n)),
            }
        }
        other => Err(eyre!("{:?} does not run a pipeline", other)),
    }
}

async fn export(api: UserApi, out: Option<&Path>) -> Result<()> {
    let engine = ExportEngine::new(api);
    let rows = engine.run().await.map_err(with_suggestion)?;
    match out {
        Some(path) => {
            let json = serde_json::to_string_pretty(&rows)?;
            std::fs::write(path, json)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            debug!(path = %path.display(), rows = rows.len(), "Export written");
            println!("wrote {} row(s) to {}", rows.len(), path.display());
        }
        None => {
            for row in &rows {
                println!("{}\t{}\t{}\t{}", row.id, row.username, row.roles, row.org_unit_path);
            }
        }
    }
    Ok(())
}
