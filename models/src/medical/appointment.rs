use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{encode_timestamp, put_opt, Document, Fields, FromDocument, ToDocument};
use crate::errors::ValidationError;

/// Appointment status. Any status may be set to any other; there is no
/// transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::CheckedIn,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::CheckedIn => "checked-in",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses that still occupy a time slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled | AppointmentStatus::CheckedIn | AppointmentStatus::InProgress
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ValidationError::InvalidStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    /// Denormalized at booking time so list views can search by name.
    pub patient_name: String,
    pub doctor_id: String,
    pub date: DateTime<Utc>,
    /// Time of day, e.g. "09:30". Older records may hold other forms.
    pub time: String,
    pub reason: String,
    pub notes: Option<String>,
    pub prescription: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }

    /// Orders by date, then by time of day.
    pub fn cmp_schedule(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| time_sort_key(&self.time).cmp(&time_sort_key(&other.time)))
    }
}

/// Parses the time-of-day formats the booking form produces.
pub fn parse_time_of_day(time: &str) -> Option<NaiveTime> {
    let time = time.trim();
    NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(time, "%I:%M %p"))
        .ok()
}

/// The zero-padded 24-hour `HH:MM` form stored for a booking time.
pub fn normalize_time_of_day(time: &str) -> Option<String> {
    parse_time_of_day(time).map(|t| t.format("%H:%M").to_string())
}

/// Sort key for a time-of-day string. Parseable times sort by clock value;
/// anything else sorts after them, by its text.
fn time_sort_key(time: &str) -> (bool, NaiveTime, &str) {
    match parse_time_of_day(time) {
        Some(t) => (false, t, ""),
        None => (true, NaiveTime::MIN, time),
    }
}

/// Inclusive UTC bounds of a calendar day: 00:00:00.000 to 23:59:59.999.
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

/// Booking request. Status and creation time are assigned by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub patient_id: String,
    #[serde(default)]
    pub patient_name: Option<String>,
    pub doctor_id: String,
    pub date: DateTime<Utc>,
    pub time: String,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn into_fields(self, now: DateTime<Utc>) -> Fields {
        let mut fields = Fields::new();
        fields.insert("patientId".into(), Value::String(self.patient_id));
        fields.insert("patientName".into(), Value::String(self.patient_name.unwrap_or_default()));
        fields.insert("doctorId".into(), Value::String(self.doctor_id));
        fields.insert("date".into(), encode_timestamp(&self.date));
        fields.insert("time".into(), Value::String(self.time));
        fields.insert("reason".into(), Value::String(self.reason));
        put_opt(&mut fields, "notes", self.notes.as_ref());
        fields.insert("status".into(), Value::String(AppointmentStatus::Scheduled.as_str().to_string()));
        fields.insert("createdAt".into(), encode_timestamp(&now));
        fields
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppointmentUpdate {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub doctor_id: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub time: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub prescription: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl ToDocument for AppointmentUpdate {
    fn to_document(&self) -> Fields {
        let mut fields = Fields::new();
        put_opt(&mut fields, "patientId", self.patient_id.as_ref());
        put_opt(&mut fields, "patientName", self.patient_name.as_ref());
        put_opt(&mut fields, "doctorId", self.doctor_id.as_ref());
        if let Some(date) = &self.date {
            fields.insert("date".into(), encode_timestamp(date));
        }
        put_opt(&mut fields, "time", self.time.as_ref());
        put_opt(&mut fields, "reason", self.reason.as_ref());
        put_opt(&mut fields, "notes", self.notes.as_ref());
        put_opt(&mut fields, "prescription", self.prescription.as_ref());
        if let Some(status) = self.status {
            fields.insert("status".into(), Value::String(status.as_str().to_string()));
        }
        fields
    }
}

impl ToDocument for Appointment {
    fn to_document(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("patientId".into(), Value::String(self.patient_id.clone()));
        fields.insert("patientName".into(), Value::String(self.patient_name.clone()));
        fields.insert("doctorId".into(), Value::String(self.doctor_id.clone()));
        fields.insert("date".into(), encode_timestamp(&self.date));
        fields.insert("time".into(), Value::String(self.time.clone()));
        fields.insert("reason".into(), Value::String(self.reason.clone()));
        put_opt(&mut fields, "notes", self.notes.as_ref());
        put_opt(&mut fields, "prescription", self.prescription.as_ref());
        fields.insert("status".into(), Value::String(self.status.as_str().to_string()));
        fields.insert("createdAt".into(), encode_timestamp(&self.created_at));
        fields
    }
}

impl FromDocument for Appointment {
    fn from_document(doc: &Document) -> Self {
        let r = doc.reader();
        Appointment {
            id: doc.id.clone(),
            patient_id: r.str_or_default("patientId"),
            patient_name: r.str_or_default("patientName"),
            doctor_id: r.str_or_default("doctorId"),
            date: r.timestamp_or_now("date"),
            time: r.str_or_default("time"),
            reason: r.str_or_default("reason"),
            notes: r.non_empty_str("notes"),
            prescription: r.non_empty_str("prescription"),
            status: r
                .opt_str("status")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            created_at: r.timestamp_or_now("createdAt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in AppointmentStatus::ALL {
            assert_eq!(status.as_str().parse::<AppointmentStatus>(), Ok(status));
            assert_eq!(serde_json::to_value(status).unwrap(), json!(status.as_str()));
        }
        assert!("done".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn day_bounds_cover_the_whole_day() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let (start, end) = day_bounds(day);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
        assert_eq!(end.date_naive(), day);
        assert_eq!((end + Duration::milliseconds(1)).date_naive(), day.succ_opt().unwrap());
    }

    #[test]
    fn broken_fields_fall_back_to_defaults() {
        let data = json!({ "doctorId": "d1", "date": "not a date", "status": "archived" });
        let before = Utc::now();
        let appt = Appointment::from_document(&Document::new("a1", data.as_object().unwrap().clone()));
        assert_eq!(appt.doctor_id, "d1");
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert!(appt.date >= before);
        assert!(appt.notes.is_none());
    }

    #[test]
    fn booking_times_normalize_to_padded_clock() {
        assert_eq!(normalize_time_of_day("9:30").as_deref(), Some("09:30"));
        assert_eq!(normalize_time_of_day(" 2:05 PM ").as_deref(), Some("14:05"));
        assert_eq!(normalize_time_of_day("10:00:00").as_deref(), Some("10:00"));
        assert_eq!(normalize_time_of_day("noonish"), None);
    }

    #[test]
    fn schedule_order_uses_clock_time() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mk = |time: &str| Appointment {
            id: time.into(),
            patient_id: "p".into(),
            patient_name: "P".into(),
            doctor_id: "d".into(),
            date,
            time: time.into(),
            reason: String::new(),
            notes: None,
            prescription: None,
            status: AppointmentStatus::Scheduled,
            created_at: date,
        };
        let mut list = vec![mk("14:00"), mk("whenever"), mk("9:15"), mk("09:00")];
        list.sort_by(|a, b| a.cmp_schedule(b));
        let order: Vec<_> = list.iter().map(|a| a.time.as_str()).collect();
        assert_eq!(order, vec!["09:00", "9:15", "14:00", "whenever"]);
    }
}
