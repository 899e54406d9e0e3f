//! Two-step user deletion.
//!
//! A user with live references cannot be deleted, so each target is first
//! disabled and stripped down to a single minimal role, then deleted after
//! a settle delay. A DELETE that times out is resolved by re-reading the
//! user; 404 from either call means the delete went through.

use serde_json::{json, Value};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::guard::BusyFlag;
use super::progress::ProgressTracker;
use crate::api::UserApi;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventSink, Pipeline};
use crate::models::{DeleteOutcome, DeleteSummary, DeleteTarget};
use crate::monitor::{ensure_connected, ConnectionStatus};

const EMPTIED_SETS: [&str; 4] = [
    "organisationUnits",
    "dataViewOrganisationUnits",
    "teiSearchOrganisationUnits",
    "userGroups",
];

/// Disable `user` and reduce its references to `minimal_role_id` only.
/// Unknown fields are left untouched.
pub fn strip_references(user: &mut Value, minimal_role_id: &str) -> SyncResult<()> {
    let obj = user
        .as_object_mut()
        .ok_or_else(|| SyncError::Decode("user document is not an object".to_string()))?;

    let roles = json!([{ "id": minimal_role_id }]);
    obj.insert("disabled".to_string(), Value::Bool(true));
    obj.insert("userRoles".to_string(), roles.clone());
    for key in EMPTIED_SETS {
        obj.insert(key.to_string(), json!([]));
    }
    if let Some(creds) = obj.get_mut("userCredentials").and_then(Value::as_object_mut) {
        creds.insert("disabled".to_string(), Value::Bool(true));
        creds.insert("userRoles".to_string(), roles);
    }
    Ok(())
}

pub struct DeletionPipeline {
    api: UserApi,
    status: watch::Receiver<ConnectionStatus>,
    events: EventSink,
    busy: BusyFlag,
    progress: ProgressTracker,
}

impl DeletionPipeline {
    pub fn new(api: UserApi, status: watch::Receiver<ConnectionStatus>) -> Self {
        let events = api.events().clone();
        Self {
            api,
            status,
            progress: ProgressTracker::new(Pipeline::Delete, events.clone()),
            events,
            busy: BusyFlag::new(Pipeline::Delete),
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    pub fn is_running(&self) -> bool {
        self.busy.is_running()
    }

    /// Delete `targets` one at a time. `cancel` is checked between targets.
    pub async fn run(
        &self,
        targets: Vec<DeleteTarget>,
        cancel: &CancellationToken,
    ) -> SyncResult<DeleteSummary> {
        let _guard = self.busy.try_acquire()?;
        ensure_connected(&self.status)?;
        let minimal_role = self
            .api
            .config()
            .minimal_role_id
            .clone()
            .ok_or_else(|| SyncError::Precondition("no minimal role id configured".to_string()))?;

        let run_id = Uuid::new_v4();
        let total = targets.len();
        info!(%run_id, total, "Delete run started");
        self.events.info(format!("Deleting {} user(s)", total));
        self.progress.reset();

        let mut summary = DeleteSummary::default();
        for (done, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            match self.delete_one(target, &minimal_role).await {
                DeleteOutcome::Deleted => {
                    summary.deleted += 1;
                    self.events.success(format!("Deleted {}", target.label()));
                }
                DeleteOutcome::Failed(reason) => {
                    summary.failed += 1;
                    self.events
                        .error(format!("Failed to delete {}: {}", target.label(), reason));
                }
                DeleteOutcome::Unknown => {
                    summary.failed += 1;
                    self.events
                        .error(format!("Delete of {} left unresolved", target.label()));
                }
            }
            self.progress.advance(done + 1, total);
        }

        let message = format!(
            "Delete {}: {} deleted, {} failed",
            if summary.cancelled { "cancelled" } else { "finished" },
            summary.deleted,
            summary.failed
        );
        if summary.failed > 0 {
            self.events.warning(message);
        } else {
            self.events.success(message);
        }
        info!(%run_id, deleted = summary.deleted, failed = summary.failed, "Delete run ended");
        self.progress.reset();
        Ok(summary)
    }

    async fn delete_one(&self, target: &DeleteTarget, minimal_role: &str) -> DeleteOutcome {
        let mut user = match self.api.get_user(&target.id).await {
            Ok(user) => user,
            Err(e) => return DeleteOutcome::Failed(format!("could not fetch user: {}", e)),
        };
        if let Err(e) = strip_references(&mut user, minimal_role) {
            return DeleteOutcome::Failed(e.to_string());
        }
        if let Err(e) = self.api.put_user_value(&target.id, &user).await {
            return DeleteOutcome::Failed(format!("could not strip references: {}", e));
        }
        debug!(id = %target.id, "References stripped, waiting before delete");

        tokio::time::sleep(self.api.config().settle_delay).await;

        let outcome = match self.api.delete_user(&target.id).await {
            Ok(_) => DeleteOutcome::Deleted,
            // The user was just read and rewritten, so 404 here means an
            // earlier attempt went through before its response was lost.
            Err(e) if e.has_status(404) => {
                debug!(id = %target.id, "User already absent on delete");
                DeleteOutcome::Deleted
            }
            Err(e) if e.is_timeout() => {
                warn!(id = %target.id, "Delete timed out, verifying");
                DeleteOutcome::Unknown
            }
            Err(e) => DeleteOutcome::Failed(e.to_string()),
        };
        match outcome {
            DeleteOutcome::Unknown => self.verify_absent(target).await,
            resolved => resolved,
        }
    }

    /// Compensating read after an ambiguous delete.
    async fn verify_absent(&self, target: &DeleteTarget) -> DeleteOutcome {
        match self.api.get_user(&target.id).await {
            Err(SyncError::Network(e)) if e.has_status(404) => {
                debug!(id = %target.id, "User absent after delete timeout");
                DeleteOutcome::Deleted
            }
            Ok(_) => DeleteOutcome::Failed(
                SyncError::TimeoutAmbiguity("user still exists after delete timed out".to_string())
                    .to_string(),
            ),
            Err(e) => DeleteOutcome::Failed(
                SyncError::TimeoutAmbiguity(format!("verification failed: {}", e)).to_string(),
            ),
        }
    }
}
