pub mod export;
pub mod summary;
pub mod user;

pub use export::{ExportedRow, Pager, RemoteOrgUnit, RemoteUser, UserPage};
pub use summary::{BatchResult, DeleteOutcome, DeleteSummary, PasswordOutcome, PasswordSummary, UpsertSummary};
pub use user::{DeleteTarget, IdRef, PasswordUpdate, UserRecord};

use serde::{Deserialize, Deserializer};

/// Helper to deserialize an id as a string, an integer, or an `{"id": ...}`
/// object. Ingested sheets carry bare ids; API payloads carry objects.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, MapAccess, Visitor};
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, an integer or an object with an id")
        }

        fn visit_str<E>(self, value: &str) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.trim().to_string())
        }

        fn visit_string<E>(self, value: String) -> Result<String, E>
        where
            E: de::Error,
        {
            self.visit_str(&value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_map<A>(self, mut map: A) -> Result<String, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut id = None;
            while let Some(key) = map.next_key::<String>()? {
                if key == "id" {
                    id = Some(map.next_value::<serde_json::Value>()?);
                } else {
                    map.next_value::<de::IgnoredAny>()?;
                }
            }
            match id {
                Some(serde_json::Value::String(s)) => Ok(s.trim().to_string()),
                Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
                _ => Err(de::Error::missing_field("id")),
            }
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Helper to deserialize nullable strings as empty string.
/// Handles both missing fields and explicit null values.
pub(crate) fn deserialize_nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}

/// Helper to deserialize a nullable list as empty.
pub(crate) fn deserialize_nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}
