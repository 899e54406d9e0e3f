//! Typed calls against the remote user API.
//!
//! Every call goes through the [`RetryingTransport`] and carries the
//! configured `Authorization` header. Errors come back unmodified so the
//! engines can branch on status (409 conflict, 404 absent).

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{NetworkError, SyncError, SyncResult};
use crate::events::EventSink;
use crate::models::{UserPage, UserRecord};
use crate::traits::{HttpRequest, Response};
use crate::transport::RetryingTransport;

/// Fields requested by the export.
pub const EXPORT_FIELDS: &str = "id,name,displayName,username,lastLogin,\
userGroups[id,name],userRoles[id,name],\
userCredentials[username,lastLogin,userRoles[id,name]],\
organisationUnits[id,name,ancestors[id,name]]";

#[derive(Debug, Deserialize)]
struct IdEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct IdList {
    #[serde(default)]
    users: Vec<IdEntry>,
}

/// Client for the user endpoints.
#[derive(Clone)]
pub struct UserApi {
    transport: RetryingTransport,
    config: SyncConfig,
}

impl UserApi {
    pub fn new(transport: RetryingTransport, config: SyncConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn events(&self) -> &EventSink {
        self.transport.events()
    }

    fn request(&self, request: HttpRequest) -> HttpRequest {
        let request = request
            .with_header("Accept", "application/json")
            .with_timeout(self.config.request_timeout);
        match self.config.authorization_header() {
            Some(auth) => request.with_header("Authorization", auth),
            None => request,
        }
    }

    pub fn users_url(&self) -> String {
        self.config.api_url("users")
    }

    pub fn user_url(&self, id: &str) -> String {
        self.config.api_url(&format!("users/{}", urlencoding::encode(id)))
    }

    /// Exact-username lookup URL.
    pub fn lookup_url(&self, username: &str) -> String {
        format!(
            "{}?filter=username:eq:{}&fields=id&paging=false",
            self.users_url(),
            urlencoding::encode(username)
        )
    }

    /// First page of the full-collection export.
    pub fn export_first_url(&self) -> String {
        format!(
            "{}?fields={}&pageSize={}&page=1",
            self.users_url(),
            EXPORT_FIELDS,
            self.config.page_size
        )
    }

    /// Liveness probe.
    pub async fn ping(&self) -> Result<Response, NetworkError> {
        let url = self.config.api_url("system/ping");
        self.transport.send(self.request(HttpRequest::get(url))).await
    }

    /// POST a new user.
    pub async fn create_user(&self, record: &UserRecord) -> Result<Response, NetworkError> {
        let request = HttpRequest::post(self.users_url())
            .with_json(record)
            .map_err(|e| NetworkError::Other {
                message: e.to_string(),
            })?;
        self.transport.send(self.request(request)).await
    }

    /// Id of the user with exactly this username, if any.
    pub async fn find_user_id(&self, username: &str) -> SyncResult<Option<String>> {
        let response = self
            .transport
            .send(self.request(HttpRequest::get(self.lookup_url(username))))
            .await?;
        let list: IdList = response.json()?;
        let id = list.users.into_iter().map(|u| u.id).find(|id| !id.is_empty());
        debug!(username = %username, found = id.is_some(), "Username lookup");
        Ok(id)
    }

    /// Full-replace update from a record.
    pub async fn replace_user(&self, id: &str, record: &UserRecord) -> Result<Response, NetworkError> {
        self.put_user_value(id, &record.update_payload(id)).await
    }

    /// Fetch the full stored user, keeping every field.
    pub async fn get_user(&self, id: &str) -> SyncResult<Value> {
        let response = self
            .transport
            .send(self.request(HttpRequest::get(self.user_url(id))))
            .await?;
        Ok(response.json()?)
    }

    /// PUT a full user document back.
    pub async fn put_user_value(&self, id: &str, user: &Value) -> Result<Response, NetworkError> {
        let request = HttpRequest::put(self.user_url(id))
            .with_json(user)
            .map_err(|e| NetworkError::Other {
                message: e.to_string(),
            })?;
        self.transport.send(self.request(request)).await
    }

    /// DELETE with the extended timeout. A timeout is returned as-is after
    /// the first attempt; callers resolve it with a compensating read.
    pub async fn delete_user(&self, id: &str) -> Result<Response, NetworkError> {
        let request = self
            .request(HttpRequest::delete(self.user_url(id)))
            .with_timeout(self.config.delete_timeout)
            .without_timeout_retries();
        self.transport.send(request).await
    }

    /// Fetch one export page from an absolute URL. Page URLs carry cursor
    /// state, so a page is requested once and never resent.
    pub async fn fetch_page(&self, url: &str) -> SyncResult<UserPage> {
        let response = self
            .transport
            .send(self.request(HttpRequest::get(url)).without_retries())
            .await?;
        response
            .json::<UserPage>()
            .map_err(|e| SyncError::Decode(format!("{}: {}", url, e)))
    }
}
