//! Create-first upsert of a single record.

use tracing::{debug, warn};

use crate::api::UserApi;
use crate::error::SyncError;
use crate::models::{BatchResult, UserRecord};

/// Resolves one record against the server: POST, and on 409 look the
/// username up and replace the existing user in full.
///
/// Each branch is attempted once. Retries happen only inside the transport.
#[derive(Clone)]
pub struct ConflictResolver {
    api: UserApi,
}

impl ConflictResolver {
    pub fn new(api: UserApi) -> Self {
        Self { api }
    }

    pub async fn resolve(&self, record: UserRecord) -> BatchResult {
        let events = self.api.events();
        let username = record.username.clone();

        let conflict = match self.api.create_user(&record).await {
            Ok(response) => {
                debug!(username = %username, status = response.status, "User created");
                events.success(format!("Created {}", username));
                return BatchResult::ok(record);
            }
            Err(e) if e.has_status(409) => e,
            Err(e) => {
                warn!(username = %username, error = %e, "Create failed");
                events.error(format!("Failed to create {}: {}", username, e));
                return BatchResult::failed(record);
            }
        };

        debug!(username = %username, error = %conflict, "Create conflict, looking up existing user");
        let id = match self.api.find_user_id(&username).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                let err = SyncError::Conflict(format!("{} exists but its id was not found", username));
                warn!(username = %username, "Conflict and id not found");
                events.error(err.to_string());
                return BatchResult::failed(record);
            }
            Err(e) => {
                warn!(username = %username, error = %e, "Lookup after conflict failed");
                events.error(format!("Failed to look up {}: {}", username, e));
                return BatchResult::failed(record);
            }
        };

        match self.api.replace_user(&id, &record).await {
            Ok(_) => {
                debug!(username = %username, id = %id, "User updated");
                events.success(format!("Updated {}", username));
                BatchResult::ok(record)
            }
            Err(e) => {
                warn!(username = %username, id = %id, error = %e, "Update failed");
                events.error(format!("Failed to update {}: {}", username, e));
                BatchResult::failed(record)
            }
        }
    }
}
