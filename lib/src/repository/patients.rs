// lib/src/repository/patients.rs

use std::sync::Arc;

use chrono::Utc;
use models::medical::{NewPatient, Patient, PatientUpdate};
use models::{Collection, FromDocument, HospitalError, HospitalResult, ToDocument, ValidationError};
use tracing::{info, warn};

use super::decode_all;
use crate::storage_engine::{Direction, DocumentStore, Query};

#[derive(Clone)]
pub struct PatientRepository {
    store: Arc<dyn DocumentStore>,
}

impl PatientRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        PatientRepository { store }
    }

    /// Stores a patient and returns the generated id.
    pub async fn add_patient(&self, patient: NewPatient, created_by: Option<&str>) -> HospitalResult<String> {
        let age = u32::try_from(patient.age).map_err(|_| ValidationError::InvalidAge)?;
        let fields = patient.into_fields(age, created_by, Utc::now());
        let id = self.store.add(Collection::Patients, fields).await?;
        info!("Registered patient {}", id);
        Ok(id)
    }

    pub async fn update_patient(&self, id: &str, update: &PatientUpdate) -> HospitalResult<()> {
        if let Some(age) = update.age {
            if age < 0 {
                return Err(ValidationError::InvalidAge.into());
            }
        }
        if update.is_empty() {
            return Ok(());
        }
        self.store.update(Collection::Patients, id, update.to_document()).await
    }

    pub async fn delete_patient(&self, id: &str) -> HospitalResult<()> {
        self.store.delete(Collection::Patients, id).await
    }

    pub async fn get_patient(&self, id: &str) -> HospitalResult<Option<Patient>> {
        Ok(self
            .store
            .get(Collection::Patients, id)
            .await?
            .map(|doc| Patient::from_document(&doc)))
    }

    pub async fn require_patient(&self, id: &str) -> HospitalResult<Patient> {
        self.get_patient(id)
            .await?
            .ok_or_else(|| HospitalError::not_found(Collection::Patients.as_str(), id))
    }

    /// All patients by name. Falls back to sorting locally if the ordered
    /// query is refused.
    pub async fn list_patients(&self) -> HospitalResult<Vec<Patient>> {
        let ordered = Query::collection(Collection::Patients).order_by("name", Direction::Asc);
        match self.store.query(&ordered).await {
            Ok(docs) => Ok(decode_all(&docs)),
            Err(e) if e.is_missing_index() => {
                warn!("Ordered patient listing unavailable ({}); sorting locally", e);
                let docs = self.store.query(&Query::collection(Collection::Patients)).await?;
                let mut patients: Vec<Patient> = decode_all(&docs);
                patients.sort_by_key(|p| p.name.to_lowercase());
                Ok(patients)
            }
            Err(e) => Err(e),
        }
    }

    /// Case-insensitive match on name or e-mail, substring match on phone.
    pub async fn search_patients(&self, term: &str) -> HospitalResult<Vec<Patient>> {
        let patients = self.list_patients().await?;
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Ok(patients);
        }
        Ok(patients
            .into_iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&term)
                    || p.email.to_lowercase().contains(&term)
                    || p.phone.contains(&term)
            })
            .collect())
    }

    pub async fn count_patients(&self) -> HospitalResult<usize> {
        Ok(self.store.query(&Query::collection(Collection::Patients)).await?.len())
    }
}
