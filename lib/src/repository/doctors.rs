// lib/src/repository/doctors.rs

use std::sync::Arc;

use models::medical::Doctor;
use models::{Collection, FromDocument, HospitalResult, ToDocument};

use super::decode_all;
use crate::storage_engine::{Direction, DocumentStore, Query};

#[derive(Clone)]
pub struct DoctorRepository {
    store: Arc<dyn DocumentStore>,
}

impl DoctorRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        DoctorRepository { store }
    }

    /// Doctors are provisioned out of band; this is used for seeding.
    pub async fn put_doctor(&self, doctor: &Doctor) -> HospitalResult<()> {
        self.store.set(Collection::Doctors, &doctor.id, doctor.to_document()).await
    }

    pub async fn get_doctor(&self, id: &str) -> HospitalResult<Option<Doctor>> {
        Ok(self
            .store
            .get(Collection::Doctors, id)
            .await?
            .map(|doc| Doctor::from_document(&doc)))
    }

    /// The doctor profile linked to a signed-in account.
    pub async fn by_user_id(&self, uid: &str) -> HospitalResult<Option<Doctor>> {
        let q = Query::collection(Collection::Doctors).where_eq("userId", uid).limit(1);
        let docs = self.store.query(&q).await?;
        Ok(docs.first().map(Doctor::from_document))
    }

    pub async fn list_doctors(&self) -> HospitalResult<Vec<Doctor>> {
        let q = Query::collection(Collection::Doctors).order_by("name", Direction::Asc);
        Ok(decode_all(&self.store.query(&q).await?))
    }
}
