use serde::{Deserialize, Serialize};

use super::{deserialize_nullable_string, deserialize_nullable_vec};

/// Ancestor chains of exactly this length produce an org-unit path.
pub const ORG_PATH_ANCESTORS: usize = 4;

/// Pagination metadata returned with every collection page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    #[serde(default)]
    pub page: u32,
    #[serde(default, alias = "totalPages")]
    pub page_count: u32,
    /// Absolute URL of the next page; absent on the last page
    #[serde(default)]
    pub next_page: Option<String>,
}

impl Pager {
    /// Percentage after `fetched` pages, clamped for undercounted totals.
    pub fn percent_after(&self, fetched: u32) -> u8 {
        if self.page_count == 0 {
            return 100;
        }
        let pct = (u64::from(fetched) * 100) / u64::from(self.page_count);
        pct.min(100) as u8
    }
}

/// One page of the user collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPage {
    #[serde(default)]
    pub pager: Option<Pager>,
    #[serde(default, deserialize_with = "deserialize_nullable_vec")]
    pub users: Vec<RemoteUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NamedRef {
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteOrgUnit {
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub name: String,
    /// Root first
    #[serde(default, deserialize_with = "deserialize_nullable_vec")]
    pub ancestors: Vec<NamedRef>,
}

impl RemoteOrgUnit {
    /// `(path, uid)` for this unit, or `None` unless the ancestor chain has
    /// exactly [`ORG_PATH_ANCESTORS`] entries.
    pub fn path(&self) -> Option<(String, String)> {
        if self.ancestors.len() != ORG_PATH_ANCESTORS {
            return None;
        }
        let names: Vec<&str> = self
            .ancestors
            .iter()
            .map(|a| a.name.as_str())
            .chain(std::iter::once(self.name.as_str()))
            .collect();
        let ids: Vec<&str> = self
            .ancestors
            .iter()
            .map(|a| a.id.as_str())
            .chain(std::iter::once(self.id.as_str()))
            .collect();
        Some((names.join("/"), ids.join("/")))
    }
}

/// Older servers nest the account fields under `userCredentials`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCredentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable_vec")]
    pub user_roles: Vec<NamedRef>,
}

/// A user as returned by the export projection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUser {
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable_vec")]
    pub user_groups: Vec<NamedRef>,
    #[serde(default, deserialize_with = "deserialize_nullable_vec")]
    pub user_roles: Vec<NamedRef>,
    #[serde(default, deserialize_with = "deserialize_nullable_vec")]
    pub organisation_units: Vec<RemoteOrgUnit>,
    #[serde(default)]
    pub user_credentials: Option<RemoteCredentials>,
}

fn join_names(refs: &[NamedRef]) -> String {
    refs.iter()
        .map(|r| r.name.as_str())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RemoteUser {
    /// Flatten into a display row.
    pub fn project(&self) -> ExportedRow {
        let creds = self.user_credentials.as_ref();

        let username = self
            .username
            .clone()
            .or_else(|| creds.and_then(|c| c.username.clone()))
            .unwrap_or_default();
        let last_login = self
            .last_login
            .clone()
            .or_else(|| creds.and_then(|c| c.last_login.clone()))
            .unwrap_or_default();
        let roles = if self.user_roles.is_empty() {
            creds.map(|c| join_names(&c.user_roles)).unwrap_or_default()
        } else {
            join_names(&self.user_roles)
        };

        let (paths, uids): (Vec<String>, Vec<String>) = self
            .organisation_units
            .iter()
            .filter_map(RemoteOrgUnit::path)
            .unzip();

        ExportedRow {
            id: self.id.clone(),
            name: self
                .name
                .clone()
                .or_else(|| self.display_name.clone())
                .unwrap_or_default(),
            username,
            groups: join_names(&self.user_groups),
            roles,
            last_login,
            org_unit_path: paths.join(", "),
            org_unit_uid: uids.join(", "),
        }
    }
}

/// Flattened, read-only export row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub groups: String,
    pub roles: String,
    pub last_login: String,
    pub org_unit_path: String,
    pub org_unit_uid: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ancestors(n: usize) -> serde_json::Value {
        let list: Vec<_> = (0..n)
            .map(|i| json!({"id": format!("a{}", i), "name": format!("Level {}", i)}))
            .collect();
        json!(list)
    }

    #[test]
    fn test_org_path_requires_four_ancestors() {
        let three: RemoteOrgUnit = serde_json::from_value(json!({
            "id": "ou", "name": "Clinic", "ancestors": ancestors(3)
        }))
        .unwrap();
        assert!(three.path().is_none());

        let four: RemoteOrgUnit = serde_json::from_value(json!({
            "id": "ou", "name": "Clinic", "ancestors": ancestors(4)
        }))
        .unwrap();
        let (path, uid) = four.path().unwrap();
        assert_eq!(path, "Level 0/Level 1/Level 2/Level 3/Clinic");
        assert_eq!(path.split('/').count(), 5);
        assert_eq!(uid, "a0/a1/a2/a3/ou");
    }

    #[test]
    fn test_project_joins_only_full_chains() {
        let user: RemoteUser = serde_json::from_value(json!({
            "id": "u1",
            "name": "Alice Smith",
            "username": "alice",
            "lastLogin": "2024-03-01T10:00:00.000",
            "userGroups": [{"id": "g1", "name": "Nurses"}, {"id": "g2", "name": "Admins"}],
            "userRoles": [{"id": "r1", "name": "Data entry"}],
            "organisationUnits": [
                {"id": "ou1", "name": "Short", "ancestors": ancestors(3)},
                {"id": "ou2", "name": "Clinic", "ancestors": ancestors(4)},
                {"id": "ou3", "name": "Other", "ancestors": ancestors(4)}
            ]
        }))
        .unwrap();

        let row = user.project();
        assert_eq!(row.username, "alice");
        assert_eq!(row.groups, "Nurses, Admins");
        assert_eq!(row.roles, "Data entry");
        assert_eq!(
            row.org_unit_path,
            "Level 0/Level 1/Level 2/Level 3/Clinic, Level 0/Level 1/Level 2/Level 3/Other"
        );
        assert_eq!(row.org_unit_uid, "a0/a1/a2/a3/ou2, a0/a1/a2/a3/ou3");
    }

    #[test]
    fn test_project_falls_back_to_credentials() {
        let user: RemoteUser = serde_json::from_value(json!({
            "id": "u2",
            "displayName": "Bob",
            "userCredentials": {
                "username": "bob",
                "lastLogin": "2023-12-31",
                "userRoles": [{"id": "r", "name": "Viewer"}]
            },
            "organisationUnits": null
        }))
        .unwrap();

        let row = user.project();
        assert_eq!(row.name, "Bob");
        assert_eq!(row.username, "bob");
        assert_eq!(row.last_login, "2023-12-31");
        assert_eq!(row.roles, "Viewer");
        assert!(row.org_unit_path.is_empty());
    }

    #[test]
    fn test_pager_aliases_and_percent() {
        let pager: Pager = serde_json::from_value(json!({
            "page": 2, "totalPages": 4, "nextPage": "http://x/api/users?page=3"
        }))
        .unwrap();
        assert_eq!(pager.page_count, 4);
        assert_eq!(pager.percent_after(2), 50);
        assert_eq!(pager.percent_after(5), 100);
        assert_eq!(Pager::default().percent_after(1), 100);
    }

    #[test]
    fn test_row_serializes_camel_case() {
        let row = ExportedRow {
            id: "u1".into(),
            last_login: "x".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["lastLogin"], "x");
        assert!(value.get("orgUnitPath").is_some());
    }
}
