// lib/src/reception.rs
//
// Front-desk workflows: validated patient registration and edits, guarded
// deletion, and appointment booking.

use std::sync::Arc;

use models::medical::{normalize_time_of_day, NewAppointment, NewPatient, PatientUpdate};
use models::{Collection, HospitalError, HospitalResult, ValidationError, ValidationResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::notifications::{spawn_welcome, WelcomeMessage, WelcomeNotifier};
use crate::repository::{AppointmentRepository, DoctorRepository, PatientRepository};
use crate::storage_engine::DocumentStore;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid e-mail pattern")
});

const MIN_NAME: usize = 2;
const MIN_PHONE: usize = 10;
const MIN_ADDRESS: usize = 2;

fn min_len(field: &'static str, value: &str, min: usize) -> ValidationResult<()> {
    if value.trim().chars().count() < min {
        Err(ValidationError::TooShort { field, min })
    } else {
        Ok(())
    }
}

fn valid_email(email: &str) -> ValidationResult<()> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

fn valid_age(age: i64) -> ValidationResult<u32> {
    u32::try_from(age).map_err(|_| ValidationError::InvalidAge)
}

/// Checks a registration form and returns the accepted age.
pub fn validate_new_patient(patient: &NewPatient) -> ValidationResult<u32> {
    min_len("name", &patient.name, MIN_NAME)?;
    min_len("phone", &patient.phone, MIN_PHONE)?;
    valid_email(&patient.email)?;
    min_len("address", &patient.address, MIN_ADDRESS)?;
    valid_age(patient.age)
}

/// Applies the registration rules to whichever fields the patch carries.
pub fn validate_patient_update(update: &PatientUpdate) -> ValidationResult<()> {
    if let Some(name) = &update.name {
        min_len("name", name, MIN_NAME)?;
    }
    if let Some(phone) = &update.phone {
        min_len("phone", phone, MIN_PHONE)?;
    }
    if let Some(email) = &update.email {
        valid_email(email)?;
    }
    if let Some(address) = &update.address {
        min_len("address", address, MIN_ADDRESS)?;
    }
    if let Some(age) = update.age {
        valid_age(age)?;
    }
    Ok(())
}

/// Result of a registration. The welcome notification runs independently;
/// awaiting `welcome` is optional.
#[derive(Debug)]
pub struct PatientRegistration {
    pub patient_id: String,
    pub welcome: JoinHandle<()>,
}

#[derive(Clone)]
pub struct ReceptionDesk {
    patients: PatientRepository,
    appointments: AppointmentRepository,
    doctors: DoctorRepository,
    notifier: Arc<dyn WelcomeNotifier>,
}

impl ReceptionDesk {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<dyn WelcomeNotifier>) -> Self {
        ReceptionDesk {
            patients: PatientRepository::new(store.clone()),
            appointments: AppointmentRepository::new(store.clone()),
            doctors: DoctorRepository::new(store),
            notifier,
        }
    }

    pub async fn register_patient(&self, patient: NewPatient, created_by: &str) -> HospitalResult<PatientRegistration> {
        validate_new_patient(&patient)?;
        let message = WelcomeMessage {
            email: patient.email.trim().to_string(),
            name: patient.name.trim().to_string(),
            patient_id: String::new(),
        };
        let patient_id = self.patients.add_patient(patient, Some(created_by)).await?;
        let welcome = spawn_welcome(self.notifier.clone(), WelcomeMessage { patient_id: patient_id.clone(), ..message });
        Ok(PatientRegistration { patient_id, welcome })
    }

    pub async fn update_patient(&self, id: &str, update: &PatientUpdate) -> HospitalResult<()> {
        validate_patient_update(update)?;
        self.patients.update_patient(id, update).await
    }

    /// Refuses to delete a patient who still has appointments on record.
    pub async fn delete_patient(&self, id: &str) -> HospitalResult<()> {
        self.patients.require_patient(id).await?;
        let booked = self.appointments.count_for_patient(id).await?;
        if booked > 0 {
            return Err(HospitalError::Conflict(format!(
                "Cannot delete patient with existing appointments ({} on record)",
                booked
            )));
        }
        self.patients.delete_patient(id).await?;
        info!("Deleted patient {}", id);
        Ok(())
    }

    /// Books a `scheduled` appointment after checking that the patient and
    /// doctor exist and that the time slot is free. The time is stored as
    /// zero-padded `HH:MM`.
    pub async fn book_appointment(&self, mut booking: NewAppointment) -> HospitalResult<String> {
        booking.time = normalize_time_of_day(&booking.time)
            .ok_or_else(|| ValidationError::InvalidDateFormat(format!("unrecognized time '{}'", booking.time)))?;
        min_len("reason", &booking.reason, 1)?;
        let patient = self.patients.require_patient(&booking.patient_id).await?;
        if self.doctors.get_doctor(&booking.doctor_id).await?.is_none() {
            return Err(HospitalError::not_found(Collection::Doctors.as_str(), &booking.doctor_id));
        }

        let day = booking.date.date_naive();
        let taken = self.appointments.booked_time_slots(day).await?;
        if taken.iter().any(|t| normalize_time_of_day(t).as_deref() == Some(booking.time.as_str())) {
            return Err(HospitalError::Conflict(format!("The {} slot on {} is already booked", booking.time, day)));
        }

        if booking.patient_name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            booking.patient_name = Some(patient.name);
        }
        info!("Booking {} for patient {} at {} {}", booking.doctor_id, booking.patient_id, day, booking.time);
        self.appointments.add_appointment(booking).await
    }

    pub fn patients(&self) -> &PatientRepository {
        &self.patients
    }

    pub fn appointments(&self) -> &AppointmentRepository {
        &self.appointments
    }

    pub fn doctors(&self) -> &DoctorRepository {
        &self.doctors
    }
}
