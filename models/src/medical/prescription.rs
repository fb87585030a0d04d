use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::medical::{Doctor, Patient};

/// One row of the medication table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    pub dosage: String,
    pub duration: String,
}

impl Medicine {
    pub fn new(name: impl Into<String>, dosage: impl Into<String>, duration: impl Into<String>) -> Self {
        Medicine { name: name.into(), dosage: dosage.into(), duration: duration.into() }
    }

    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }
}

/// The patient details printed on a prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionPatient {
    pub id: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

impl From<&Patient> for PrescriptionPatient {
    fn from(p: &Patient) -> Self {
        PrescriptionPatient {
            id: p.id.clone(),
            name: p.name.clone(),
            age: Some(p.age),
            gender: Some(p.gender.to_string()),
        }
    }
}

/// Everything the prescription form collects. `patient` stays `None` until
/// one is selected; exporting without it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRequest {
    pub doctor: Option<Doctor>,
    pub patient: Option<PrescriptionPatient>,
    pub diagnosis: String,
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub next_visit: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}
