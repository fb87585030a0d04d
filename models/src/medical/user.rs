// models/src/medical/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{encode_timestamp, put_opt, Document, Fields};
use crate::medical::Role;

/// The profile stored under `users/<uid>`. The role on this record decides
/// which dashboards the account may open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Only present for accounts that use the built-in password login.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::String(self.name.clone()));
        fields.insert("email".into(), Value::String(self.email.clone()));
        fields.insert("role".into(), Value::String(self.role.as_str().to_string()));
        put_opt(&mut fields, "passwordHash", self.password_hash.as_ref());
        fields.insert("createdAt".into(), encode_timestamp(&self.created_at));
        fields
    }

    /// Unlike other records, a profile without a recognizable role is not
    /// usable at all, so decoding it is fallible.
    pub fn try_from_document(doc: &Document) -> Option<Self> {
        let r = doc.reader();
        let role = r.opt_str("role")?.parse().ok()?;
        Some(UserProfile {
            uid: doc.id.clone(),
            name: r.str_or_default("name"),
            email: r.str_or_default("email"),
            role,
            password_hash: r.non_empty_str("passwordHash"),
            created_at: r.timestamp_or_now("createdAt"),
        })
    }
}
