use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{encode_timestamp, put_opt, Document, Fields, FromDocument, ToDocument};
use crate::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(ValidationError::InvalidGender(s.to_string())),
        }
    }
}

/// A registered patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub guardian: Option<String>,
    pub blood_group: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

/// Registration form as submitted by reception staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub name: String,
    /// Signed so that a negative entry reaches validation instead of failing to parse.
    pub age: i64,
    pub gender: Gender,
    pub phone: String,
    pub email: String,
    pub address: String,
    #[serde(default)]
    pub guardian: Option<String>,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update; only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub guardian: Option<String>,
    pub blood_group: Option<String>,
    pub notes: Option<String>,
}

impl NewPatient {
    /// Builds the stored field map. `age` must already be validated.
    pub fn into_fields(self, age: u32, created_by: Option<&str>, now: DateTime<Utc>) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::String(self.name));
        fields.insert("age".into(), Value::from(age));
        fields.insert("gender".into(), Value::String(self.gender.as_str().to_string()));
        fields.insert("phone".into(), Value::String(self.phone));
        fields.insert("email".into(), Value::String(self.email));
        fields.insert("address".into(), Value::String(self.address));
        put_opt(&mut fields, "guardian", self.guardian.as_ref());
        put_opt(&mut fields, "bloodGroup", self.blood_group.as_ref());
        put_opt(&mut fields, "notes", self.notes.as_ref());
        fields.insert("createdAt".into(), encode_timestamp(&now));
        if let Some(uid) = created_by {
            fields.insert("createdBy".into(), Value::String(uid.to_string()));
        }
        fields
    }
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self == &PatientUpdate::default()
    }
}

impl ToDocument for PatientUpdate {
    fn to_document(&self) -> Fields {
        let mut fields = Fields::new();
        put_opt(&mut fields, "name", self.name.as_ref());
        if let Some(age) = self.age {
            fields.insert("age".into(), Value::from(age));
        }
        if let Some(gender) = self.gender {
            fields.insert("gender".into(), Value::String(gender.as_str().to_string()));
        }
        put_opt(&mut fields, "phone", self.phone.as_ref());
        put_opt(&mut fields, "email", self.email.as_ref());
        put_opt(&mut fields, "address", self.address.as_ref());
        put_opt(&mut fields, "guardian", self.guardian.as_ref());
        put_opt(&mut fields, "bloodGroup", self.blood_group.as_ref());
        put_opt(&mut fields, "notes", self.notes.as_ref());
        fields
    }
}

impl ToDocument for Patient {
    fn to_document(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::String(self.name.clone()));
        fields.insert("age".into(), Value::from(self.age));
        fields.insert("gender".into(), Value::String(self.gender.as_str().to_string()));
        fields.insert("phone".into(), Value::String(self.phone.clone()));
        fields.insert("email".into(), Value::String(self.email.clone()));
        fields.insert("address".into(), Value::String(self.address.clone()));
        put_opt(&mut fields, "guardian", self.guardian.as_ref());
        put_opt(&mut fields, "bloodGroup", self.blood_group.as_ref());
        put_opt(&mut fields, "notes", self.notes.as_ref());
        fields.insert("createdAt".into(), encode_timestamp(&self.created_at));
        put_opt(&mut fields, "createdBy", self.created_by.as_ref());
        fields
    }
}

impl FromDocument for Patient {
    fn from_document(doc: &Document) -> Self {
        let r = doc.reader();
        Patient {
            id: doc.id.clone(),
            // Older records carry the name under `fullName`.
            name: r
                .non_empty_str("name")
                .or_else(|| r.non_empty_str("fullName"))
                .unwrap_or_else(|| "Unknown".to_string()),
            age: r.opt_u32("age").unwrap_or(0),
            gender: r
                .opt_str("gender")
                .and_then(|g| g.parse().ok())
                .unwrap_or_default(),
            phone: r.str_or_default("phone"),
            email: r.str_or_default("email"),
            address: r.str_or_default("address"),
            guardian: r.non_empty_str("guardian"),
            blood_group: r.non_empty_str("bloodGroup"),
            notes: r.non_empty_str("notes"),
            created_at: r.timestamp_or_now("createdAt"),
            created_by: r.non_empty_str("createdBy"),
        }
    }
}
