//! Connection liveness monitor.
//!
//! Probes the server immediately and then on a fixed cadence, publishing an
//! edge-triggered [`ConnectionStatus`] on a `watch` channel. The engines
//! read that channel to refuse work while the server is unreachable.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::UserApi;
use crate::error::{SyncError, SyncResult};

/// Connection state as last determined by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Checking,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Checking => write!(f, "checking"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Fail fast unless the monitor currently reports `Connected`.
pub fn ensure_connected(status: &watch::Receiver<ConnectionStatus>) -> SyncResult<()> {
    let current = *status.borrow();
    if current == ConnectionStatus::Connected {
        Ok(())
    } else {
        Err(SyncError::Precondition(format!(
            "server connection is {}",
            current
        )))
    }
}

/// Wait until the status leaves `Checking`.
pub async fn wait_for_status(
    status: &mut watch::Receiver<ConnectionStatus>,
) -> Option<ConnectionStatus> {
    status
        .wait_for(|s| *s != ConnectionStatus::Checking)
        .await
        .ok()
        .map(|s| *s)
}

/// [`wait_for_status`] that gives up with `None` once `cancel` fires.
pub async fn wait_for_status_until(
    status: &mut watch::Receiver<ConnectionStatus>,
    cancel: &CancellationToken,
) -> Option<ConnectionStatus> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        reached = wait_for_status(status) => reached,
    }
}

pub struct ConnectionMonitor {
    api: UserApi,
    state_tx: watch::Sender<ConnectionStatus>,
    state_rx: watch::Receiver<ConnectionStatus>,
    failures: u32,
    threshold: u32,
    interval: Duration,
    base_delay: Duration,
}

impl ConnectionMonitor {
    pub fn new(api: UserApi) -> Self {
        let config = api.config();
        let threshold = config.probe_failure_threshold.max(1);
        let interval = config.probe_interval;
        let base_delay = config.probe_base_delay;
        let (state_tx, state_rx) = watch::channel(ConnectionStatus::Checking);
        Self {
            api,
            state_tx,
            state_rx,
            failures: 0,
            threshold,
            interval,
            base_delay,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.state_rx.borrow()
    }

    /// Receiver the engines use to gate their runs.
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.state_rx.clone()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Run one probe, update the state and return the delay before the
    /// next probe.
    pub async fn probe_once(&mut self) -> Duration {
        match self.api.ping().await {
            Ok(_) => {
                self.failures = 0;
                if self.status() != ConnectionStatus::Connected {
                    info!(base_url = %self.api.config().base_url, "Connection established");
                    self.api
                        .events()
                        .success(format!("Connected to {}", self.api.config().base_url));
                    let _ = self.state_tx.send(ConnectionStatus::Connected);
                }
                self.interval
            }
            Err(e) => {
                self.failures = self.failures.saturating_add(1);
                debug!(failures = self.failures, error = %e, "Liveness probe failed");

                if self.failures < self.threshold {
                    return self.backoff();
                }
                if self.status() != ConnectionStatus::Disconnected {
                    warn!(
                        base_url = %self.api.config().base_url,
                        failures = self.failures,
                        "Connection lost"
                    );
                    self.api.events().error(format!(
                        "Disconnected from {} after {} failed probes: {}",
                        self.api.config().base_url,
                        self.failures,
                        e
                    ));
                    let _ = self.state_tx.send(ConnectionStatus::Disconnected);
                }
                self.interval
            }
        }
    }

    /// `base_delay * 2^failures`, used while below the failure threshold.
    fn backoff(&self) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << self.failures.min(16))
    }

    /// Probe in a loop until `cancel` fires. An in-flight probe is
    /// abandoned on cancellation.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let delay = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Connection monitor stopped during probe");
                        break;
                    }
                    delay = self.probe_once() => delay,
                };
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Connection monitor stopped");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        })
    }
}
