use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, Fields, FromDocument, ToDocument};

/// A doctor profile, linked to the user account the doctor signs in with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
}

impl ToDocument for Doctor {
    fn to_document(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("userId".into(), Value::String(self.user_id.clone()));
        fields.insert("name".into(), Value::String(self.name.clone()));
        fields.insert("specialization".into(), Value::String(self.specialization.clone()));
        fields.insert("email".into(), Value::String(self.email.clone()));
        fields.insert("phone".into(), Value::String(self.phone.clone()));
        fields
    }
}

impl FromDocument for Doctor {
    fn from_document(doc: &Document) -> Self {
        let r = doc.reader();
        Doctor {
            id: doc.id.clone(),
            user_id: r.str_or_default("userId"),
            name: r.non_empty_str("name").unwrap_or_else(|| "Unknown".to_string()),
            specialization: r.str_or_default("specialization"),
            email: r.str_or_default("email"),
            phone: r.str_or_default("phone"),
        }
    }
}
