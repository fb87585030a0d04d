// models/src/identifiers.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::HospitalError;

/// The collections the application reads and writes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Appointments,
    Patients,
    Users,
    Doctors,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Appointments,
        Collection::Patients,
        Collection::Users,
        Collection::Doctors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Appointments => "appointments",
            Collection::Patients => "patients",
            Collection::Users => "users",
            Collection::Doctors => "doctors",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = HospitalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| HospitalError::QueryError(format!("unknown collection '{}'", s)))
    }
}

/// Generates an opaque document id. Ids are 32 lowercase hex characters.
pub fn generate_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}
