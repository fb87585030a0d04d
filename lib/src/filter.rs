// lib/src/filter.rs
//
// In-memory filtering of an appointment list. Both filters preserve order,
// are idempotent and commute with each other.

use models::medical::{Appointment, AppointmentStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub search: Option<String>,
}

impl AppointmentFilter {
    pub fn new(status: Option<AppointmentStatus>, search: Option<String>) -> Self {
        AppointmentFilter { status, search }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && search_term(self.search.as_deref()).is_none()
    }

    pub fn apply(&self, appointments: &[Appointment]) -> Vec<Appointment> {
        let by_status = filter_by_status(appointments, self.status);
        filter_by_text(&by_status, self.search.as_deref())
    }
}

fn search_term(term: Option<&str>) -> Option<String> {
    term.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty())
}

pub fn filter_by_status(appointments: &[Appointment], status: Option<AppointmentStatus>) -> Vec<Appointment> {
    match status {
        Some(status) => appointments.iter().filter(|a| a.status == status).cloned().collect(),
        None => appointments.to_vec(),
    }
}

/// Case-insensitive substring match on patient name or reason. Blank terms match everything.
pub fn filter_by_text(appointments: &[Appointment], term: Option<&str>) -> Vec<Appointment> {
    let Some(term) = search_term(term) else {
        return appointments.to_vec();
    };
    appointments
        .iter()
        .filter(|a| a.patient_name.to_lowercase().contains(&term) || a.reason.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn appt(id: &str, name: &str, reason: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: id.into(),
            patient_id: format!("p-{}", id),
            patient_name: name.into(),
            doctor_id: "d1".into(),
            date: Utc::now(),
            time: "09:00".into(),
            reason: reason.into(),
            notes: None,
            prescription: None,
            status,
            created_at: Utc::now(),
        }
    }

    fn sample() -> Vec<Appointment> {
        vec![
            appt("1", "Jane Doe", "Fever", AppointmentStatus::Scheduled),
            appt("2", "John Roe", "Follow-up for fever", AppointmentStatus::Completed),
            appt("3", "Ann Lee", "Back pain", AppointmentStatus::Scheduled),
            appt("4", "Janet King", "Checkup", AppointmentStatus::Cancelled),
        ]
    }

    fn ids(list: &[Appointment]) -> Vec<&str> {
        list.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn text_matches_name_or_reason_ignoring_case() {
        assert_eq!(ids(&filter_by_text(&sample(), Some("FEVER"))), vec!["1", "2"]);
        assert_eq!(ids(&filter_by_text(&sample(), Some("jan"))), vec!["1", "4"]);
        assert_eq!(filter_by_text(&sample(), Some("   ")).len(), 4);
    }

    #[test]
    fn filters_commute_and_are_idempotent() {
        let list = sample();
        let statuses = [None, Some(AppointmentStatus::Scheduled), Some(AppointmentStatus::Completed)];
        let terms = [None, Some("fever"), Some("jan"), Some(""), Some("zzz")];
        for status in statuses {
            for term in terms {
                let a = filter_by_text(&filter_by_status(&list, status), term);
                let b = filter_by_status(&filter_by_text(&list, term), status);
                assert_eq!(a, b);
                let once = AppointmentFilter::new(status, term.map(str::to_string)).apply(&list);
                assert_eq!(once, a);
                assert_eq!(AppointmentFilter::new(status, term.map(str::to_string)).apply(&once), once);
            }
        }
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let filter = AppointmentFilter::new(None, Some(" ".into()));
        assert!(filter.is_empty());
        assert_eq!(ids(&filter.apply(&sample())), vec!["1", "2", "3", "4"]);
    }
}
