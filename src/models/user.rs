use serde::{Deserialize, Serialize};

use super::export::ExportedRow;
use super::{deserialize_id, deserialize_nullable_vec};

/// Reference to another object by id, serialized as `{"id": "..."}`.
///
/// Deserializes from either a bare id or an object with an `id` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl<'de> Deserialize<'de> for IdRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserialize_id(deserializer).map(IdRef::new)
    }
}

fn deserialize_refs<'de, D>(deserializer: D) -> Result<Vec<IdRef>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let refs: Vec<IdRef> = deserialize_nullable_vec(deserializer)?;
    Ok(refs.into_iter().filter(|r| !r.id.is_empty()).collect())
}

/// One user entity submitted for synchronization.
///
/// Field names follow the remote API, so a record serializes directly into
/// a create or full-replace payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Unique key on the server
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Initial password, only sent when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "deserialize_refs")]
    pub user_roles: Vec<IdRef>,
    #[serde(default, deserialize_with = "deserialize_refs")]
    pub organisation_units: Vec<IdRef>,
    #[serde(default, deserialize_with = "deserialize_refs")]
    pub data_view_organisation_units: Vec<IdRef>,
    #[serde(default, deserialize_with = "deserialize_refs")]
    pub tei_search_organisation_units: Vec<IdRef>,
    #[serde(default, deserialize_with = "deserialize_refs")]
    pub user_groups: Vec<IdRef>,
}

impl UserRecord {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            first_name: None,
            surname: None,
            email: None,
            phone_number: None,
            password: None,
            user_roles: Vec::new(),
            organisation_units: Vec::new(),
            data_view_organisation_units: Vec::new(),
            tei_search_organisation_units: Vec::new(),
            user_groups: Vec::new(),
        }
    }

    pub fn with_names(mut self, first_name: impl Into<String>, surname: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self.surname = Some(surname.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_roles<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_roles = ids.into_iter().map(IdRef::new).collect();
        self
    }

    pub fn with_org_units<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.organisation_units = ids.into_iter().map(IdRef::new).collect();
        self
    }

    pub fn with_data_view_org_units<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_view_organisation_units = ids.into_iter().map(IdRef::new).collect();
        self
    }

    pub fn with_search_org_units<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tei_search_organisation_units = ids.into_iter().map(IdRef::new).collect();
        self
    }

    pub fn with_groups<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_groups = ids.into_iter().map(IdRef::new).collect();
        self
    }

    /// Reasons this record cannot be submitted; empty when valid.
    pub fn validation_errors(&self) -> Vec<&'static str> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push("username is empty");
        }
        if self.user_roles.is_empty() {
            errors.push("no user role");
        }
        if self.organisation_units.is_empty() {
            errors.push("no organisation unit");
        }
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validation_errors().is_empty()
    }

    /// Full-replace payload for an existing user.
    ///
    /// Every reference set is sent in full; the server replaces rather than
    /// merges. The password is left out so a resync never resets it.
    pub fn update_payload(&self, id: &str) -> serde_json::Value {
        let mut payload = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = payload.as_object_mut() {
            obj.remove("password");
            obj.insert("id".to_string(), serde_json::Value::String(id.to_string()));
        }
        payload
    }
}

/// A user selected for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTarget {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

impl DeleteTarget {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }

    /// Name used in log lines.
    pub fn label(&self) -> &str {
        if self.username.is_empty() {
            &self.id
        } else {
            &self.username
        }
    }
}

impl From<&ExportedRow> for DeleteTarget {
    fn from(row: &ExportedRow) -> Self {
        Self::new(row.id.clone(), row.username.clone())
    }
}

/// One credential rewrite request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdate {
    pub username: String,
    pub new_password: String,
    /// Carried from the ingestion sheet; the rewrite does not touch roles.
    #[serde(default)]
    pub role_ids: Vec<String>,
}

impl PasswordUpdate {
    pub fn new(username: impl Into<String>, new_password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            new_password: new_password.into(),
            role_ids: Vec::new(),
        }
    }
}
