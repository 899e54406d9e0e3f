//! Bulk password rewrite.

use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::guard::BusyFlag;
use super::progress::ProgressTracker;
use crate::api::UserApi;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventSink, Pipeline};
use crate::models::{PasswordOutcome, PasswordSummary, PasswordUpdate};
use crate::monitor::{ensure_connected, ConnectionStatus};

/// Statuses accepted as a successful rewrite.
const ACCEPTED: [u16; 2] = [200, 204];

/// Set `password` on a full user document, including the nested
/// credentials object when the server uses one.
pub fn set_password(user: &mut Value, password: &str) -> SyncResult<()> {
    let obj = user
        .as_object_mut()
        .ok_or_else(|| SyncError::Decode("user document is not an object".to_string()))?;
    obj.insert("password".to_string(), Value::String(password.to_string()));
    if let Some(creds) = obj.get_mut("userCredentials").and_then(Value::as_object_mut) {
        creds.insert("password".to_string(), Value::String(password.to_string()));
    }
    Ok(())
}

pub struct PasswordPipeline {
    api: UserApi,
    status: watch::Receiver<ConnectionStatus>,
    events: EventSink,
    busy: BusyFlag,
    progress: ProgressTracker,
}

impl PasswordPipeline {
    pub fn new(api: UserApi, status: watch::Receiver<ConnectionStatus>) -> Self {
        let events = api.events().clone();
        Self {
            api,
            status,
            progress: ProgressTracker::new(Pipeline::Password, events.clone()),
            events,
            busy: BusyFlag::new(Pipeline::Password),
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    pub async fn run(
        &self,
        updates: Vec<PasswordUpdate>,
        cancel: &CancellationToken,
    ) -> SyncResult<PasswordSummary> {
        let _guard = self.busy.try_acquire()?;
        ensure_connected(&self.status)?;

        let run_id = Uuid::new_v4();
        let total = updates.len();
        info!(%run_id, total, "Password run started");
        self.events.info(format!("Updating {} password(s)", total));
        self.progress.reset();

        let mut summary = PasswordSummary::default();
        for (done, update) in updates.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let outcome = self.update_one(update).await;
            match &outcome {
                PasswordOutcome::Updated => {
                    self.events
                        .success(format!("Password updated for {}", update.username))
                }
                PasswordOutcome::NotFound => {
                    self.events.warning(format!("User {} not found", update.username))
                }
                PasswordOutcome::Failed(reason) => self.events.error(format!(
                    "Password update failed for {}: {}",
                    update.username, reason
                )),
            }
            summary.record(&outcome);
            self.progress.advance(done + 1, total);
        }

        let message = format!(
            "Password update {}: {} updated, {} not found, {} failed",
            if summary.cancelled { "cancelled" } else { "finished" },
            summary.updated,
            summary.not_found,
            summary.failed
        );
        if summary.not_found + summary.failed > 0 {
            self.events.warning(message);
        } else {
            self.events.success(message);
        }
        info!(%run_id, updated = summary.updated, "Password run ended");
        self.progress.reset();
        Ok(summary)
    }

    async fn update_one(&self, update: &PasswordUpdate) -> PasswordOutcome {
        let id = match self.api.find_user_id(&update.username).await {
            Ok(Some(id)) => id,
            Ok(None) => return PasswordOutcome::NotFound,
            Err(e) => return PasswordOutcome::Failed(format!("lookup failed: {}", e)),
        };
        let mut user = match self.api.get_user(&id).await {
            Ok(user) => user,
            Err(e) => return PasswordOutcome::Failed(format!("could not fetch user: {}", e)),
        };
        if let Err(e) = set_password(&mut user, &update.new_password) {
            return PasswordOutcome::Failed(e.to_string());
        }

        match self.api.put_user_value(&id, &user).await {
            Ok(response) if ACCEPTED.contains(&response.status) => PasswordOutcome::Updated,
            Ok(response) => {
                debug!(username = %update.username, status = response.status, "Unexpected success status");
                PasswordOutcome::Failed(format!("unexpected status {}", response.status))
            }
            Err(e) => PasswordOutcome::Failed(e.to_string()),
        }
    }
}
