// lib/src/dashboard.rs
//
// Aggregates shown on the landing pages. Read failures degrade to empty
// lists and zero counts with an error notice; they never fail the page.

use chrono::{DateTime, NaiveDate, Utc};
use models::medical::{Appointment, AppointmentStatus, Doctor};
use serde::Serialize;
use tracing::{error, warn};

use crate::notice::Notice;
use crate::repository::{AppointmentRepository, AppointmentStats, DoctorRepository, PatientRepository};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStats {
    pub total: usize,
    pub completed: usize,
    /// Scheduled or checked in.
    pub waiting: usize,
    pub in_progress: usize,
}

impl DoctorStats {
    pub fn from_appointments(appointments: &[Appointment]) -> Self {
        let count = |f: &dyn Fn(AppointmentStatus) -> bool| appointments.iter().filter(|a| f(a.status)).count();
        DoctorStats {
            total: appointments.len(),
            completed: count(&|s| s == AppointmentStatus::Completed),
            waiting: count(&|s| matches!(s, AppointmentStatus::Scheduled | AppointmentStatus::CheckedIn)),
            in_progress: count(&|s| s == AppointmentStatus::InProgress),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorDashboard {
    pub doctor: Option<Doctor>,
    pub doctor_id: String,
    pub date: NaiveDate,
    pub today: Vec<Appointment>,
    pub today_stats: DoctorStats,
    pub overall_stats: DoctorStats,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceptionDashboard {
    pub date: NaiveDate,
    pub patient_count: usize,
    pub today: Vec<Appointment>,
    pub stats: AppointmentStats,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientVisitSummary {
    pub total_visits: usize,
    pub completed_visits: usize,
    /// Dated after `now` and not cancelled.
    pub upcoming_visits: usize,
    pub last_visit: Option<DateTime<Utc>>,
}

impl PatientVisitSummary {
    pub fn from_appointments(appointments: &[Appointment], now: DateTime<Utc>) -> Self {
        let completed = appointments.iter().filter(|a| a.status == AppointmentStatus::Completed);
        PatientVisitSummary {
            total_visits: appointments.len(),
            completed_visits: completed.clone().count(),
            upcoming_visits: appointments
                .iter()
                .filter(|a| a.date > now && a.status != AppointmentStatus::Cancelled)
                .count(),
            last_visit: completed.map(|a| a.date).max(),
        }
    }
}

/// The doctor profile linked to `uid`, and the id to query appointments by.
/// Accounts without a profile fall back to their own uid.
pub async fn resolve_doctor(doctors: &DoctorRepository, uid: &str) -> (Option<Doctor>, String) {
    match doctors.by_user_id(uid).await {
        Ok(Some(doctor)) => {
            let id = doctor.id.clone();
            (Some(doctor), id)
        }
        Ok(None) => (None, uid.to_string()),
        Err(e) => {
            warn!("Could not load doctor profile for {}: {}", uid, e);
            (None, uid.to_string())
        }
    }
}

pub async fn doctor_dashboard(
    doctors: &DoctorRepository,
    appointments: &AppointmentRepository,
    uid: &str,
    today: NaiveDate,
) -> DoctorDashboard {
    let (doctor, doctor_id) = resolve_doctor(doctors, uid).await;
    let mut notices = Vec::new();

    let todays = appointments.by_doctor(&doctor_id, Some(today)).await.unwrap_or_else(|e| {
        error!("Error fetching today's appointments for {}: {}", doctor_id, e);
        notices.push(Notice::error("Error loading today's appointments."));
        Vec::new()
    });
    let all = appointments.by_doctor(&doctor_id, None).await.unwrap_or_else(|e| {
        error!("Error fetching appointments for {}: {}", doctor_id, e);
        notices.push(Notice::error("Failed to load appointments."));
        Vec::new()
    });

    DoctorDashboard {
        doctor,
        today_stats: DoctorStats::from_appointments(&todays),
        overall_stats: DoctorStats::from_appointments(&all),
        doctor_id,
        date: today,
        today: todays,
        notices,
    }
}

pub async fn reception_dashboard(
    patients: &PatientRepository,
    appointments: &AppointmentRepository,
    today: NaiveDate,
) -> ReceptionDashboard {
    let mut notices = Vec::new();
    let patient_count = patients.count_patients().await.unwrap_or_else(|e| {
        error!("Error counting patients: {}", e);
        notices.push(Notice::error("Failed to load patient count."));
        0
    });
    let todays = appointments.by_date(today).await.unwrap_or_else(|e| {
        error!("Error fetching appointments for {}: {}", today, e);
        notices.push(Notice::error("Failed to load today's appointments."));
        Vec::new()
    });
    ReceptionDashboard {
        date: today,
        patient_count,
        today: todays,
        stats: appointments.stats().await,
        notices,
    }
}
