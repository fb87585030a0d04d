// lib/src/repository/appointments.rs

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use models::document::encode_timestamp;
use models::medical::{
    day_bounds, normalize_time_of_day, Appointment, AppointmentStatus, AppointmentUpdate, NewAppointment,
};
use models::{Collection, Document, FromDocument, HospitalError, HospitalResult, ToDocument, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::decode_all;
use crate::storage_engine::{Direction, DocumentStore, Query, QueryWatch};

/// Counts over a set of appointments. `waiting` covers every status that
/// still occupies a slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentStats {
    pub total: usize,
    pub completed: usize,
    pub waiting: usize,
    pub cancelled: usize,
}

impl AppointmentStats {
    pub fn from_appointments(appointments: &[Appointment]) -> Self {
        let count = |f: fn(&AppointmentStatus) -> bool| appointments.iter().filter(|a| f(&a.status)).count();
        AppointmentStats {
            total: appointments.len(),
            completed: count(|s| *s == AppointmentStatus::Completed),
            waiting: count(AppointmentStatus::is_active),
            cancelled: count(|s| *s == AppointmentStatus::Cancelled),
        }
    }
}

#[derive(Clone)]
pub struct AppointmentRepository {
    store: Arc<dyn DocumentStore>,
}

/// Whether a record's stored `date` falls on `day`. A record whose date is
/// missing or unreadable is on no day, as it is for the store's range filter.
fn on_day(day: NaiveDate) -> impl Fn(&Document) -> bool {
    let (start, end) = day_bounds(day);
    move |doc: &Document| doc.reader().opt_timestamp("date").is_some_and(|d| d >= start && d <= end)
}

/// Only a readable active status counts, matching the store's `In` filter.
fn is_active(doc: &Document) -> bool {
    doc.reader()
        .opt_str("status")
        .and_then(|s| s.parse::<AppointmentStatus>().ok())
        .is_some_and(|s| s.is_active())
}

impl AppointmentRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        AppointmentRepository { store }
    }

    /// Books an appointment. The stored status is always `scheduled`.
    pub async fn add_appointment(&self, appointment: NewAppointment) -> HospitalResult<String> {
        let fields = appointment.into_fields(Utc::now());
        let id = self.store.add(Collection::Appointments, fields).await?;
        info!("Booked appointment {}", id);
        Ok(id)
    }

    /// Applies the fields present in `update`. A new time is stored in the
    /// same padded form bookings use.
    pub async fn update_appointment(&self, id: &str, update: &AppointmentUpdate) -> HospitalResult<()> {
        let mut patch = update.to_document();
        if let Some(time) = &update.time {
            let time = normalize_time_of_day(time)
                .ok_or_else(|| ValidationError::InvalidDateFormat(format!("unrecognized time '{}'", time)))?;
            patch.insert("time".into(), Value::String(time));
        }
        self.store.update(Collection::Appointments, id, patch).await
    }

    /// Any status may follow any other.
    pub async fn update_status(&self, id: &str, status: AppointmentStatus) -> HospitalResult<()> {
        let mut patch = Map::new();
        patch.insert("status".into(), Value::String(status.as_str().to_string()));
        self.store.update(Collection::Appointments, id, patch).await?;
        info!("Appointment {} is now {}", id, status);
        Ok(())
    }

    pub async fn delete_appointment(&self, id: &str) -> HospitalResult<()> {
        self.store.delete(Collection::Appointments, id).await
    }

    pub async fn get_appointment(&self, id: &str) -> HospitalResult<Option<Appointment>> {
        Ok(self
            .store
            .get(Collection::Appointments, id)
            .await?
            .map(|doc| Appointment::from_document(&doc)))
    }

    pub async fn require_appointment(&self, id: &str) -> HospitalResult<Appointment> {
        self.get_appointment(id)
            .await?
            .ok_or_else(|| HospitalError::not_found(Collection::Appointments.as_str(), id))
    }

    /// Appointments on `day`, optionally for one doctor, ordered by date then time.
    pub fn day_query(doctor_id: Option<&str>, day: NaiveDate) -> Query {
        let (start, end) = day_bounds(day);
        let mut query = Query::collection(Collection::Appointments);
        if let Some(doctor) = doctor_id {
            query = query.where_eq("doctorId", doctor);
        }
        query
            .where_gte("date", encode_timestamp(&start))
            .where_lte("date", encode_timestamp(&end))
            .order_by("date", Direction::Asc)
            .order_by("time", Direction::Asc)
    }

    /// Every appointment of one doctor, without ordering.
    pub fn doctor_query(doctor_id: &str) -> Query {
        Query::collection(Collection::Appointments).where_eq("doctorId", doctor_id)
    }

    pub async fn run(&self, query: &Query) -> HospitalResult<Vec<Appointment>> {
        Ok(decode_all(&self.store.query(query).await?))
    }

    pub async fn watch(&self, query: Query) -> HospitalResult<QueryWatch> {
        self.store.watch(query).await
    }

    /// Runs `query` and decodes the records `keep` accepts.
    async fn run_where<F>(&self, query: &Query, keep: F) -> HospitalResult<Vec<Appointment>>
    where
        F: Fn(&Document) -> bool,
    {
        let docs = self.store.query(query).await?;
        Ok(docs.iter().filter(|&d| keep(d)).map(Appointment::from_document).collect())
    }

    /// Runs `ordered`; if the store wants an index for it, runs `simple`
    /// instead and filters locally. Either way the result is sorted with
    /// `sort`, which orders times by the clock rather than as text.
    async fn with_fallback<F, S>(&self, ordered: Query, simple: Query, keep: F, sort: S) -> HospitalResult<Vec<Appointment>>
    where
        F: Fn(&Document) -> bool,
        S: FnMut(&Appointment, &Appointment) -> std::cmp::Ordering,
    {
        let mut list = match self.run(&ordered).await {
            Ok(list) => list,
            Err(e) if e.is_missing_index() => {
                warn!("{}; falling back to a simpler query with local filtering", e);
                self.run_where(&simple, keep).await?
            }
            Err(e) => return Err(e),
        };
        list.sort_by(sort);
        Ok(list)
    }

    /// A doctor's appointments on `day` from the equality-only query,
    /// filtered and sorted here instead of by the store.
    pub async fn doctor_day_unindexed(&self, doctor_id: &str, day: NaiveDate) -> HospitalResult<Vec<Appointment>> {
        let mut list = self.run_where(&Self::doctor_query(doctor_id), on_day(day)).await?;
        list.sort_by(Appointment::cmp_schedule);
        Ok(list)
    }

    pub async fn by_date(&self, day: NaiveDate) -> HospitalResult<Vec<Appointment>> {
        self.with_fallback(
            Self::day_query(None, day),
            Query::collection(Collection::Appointments),
            on_day(day),
            Appointment::cmp_schedule,
        )
        .await
    }

    pub async fn by_doctor(&self, doctor_id: &str, day: Option<NaiveDate>) -> HospitalResult<Vec<Appointment>> {
        match day {
            Some(day) => {
                self.with_fallback(
                    Self::day_query(Some(doctor_id), day),
                    Self::doctor_query(doctor_id),
                    on_day(day),
                    Appointment::cmp_schedule,
                )
                .await
            }
            None => {
                let ordered = Self::doctor_query(doctor_id)
                    .order_by("date", Direction::Asc)
                    .order_by("time", Direction::Asc);
                self.with_fallback(ordered, Self::doctor_query(doctor_id), |_| true, Appointment::cmp_schedule)
                    .await
            }
        }
    }

    /// Newest first; appointments on the same date keep clock order.
    pub async fn by_patient(&self, patient_id: &str) -> HospitalResult<Vec<Appointment>> {
        let simple = Query::collection(Collection::Appointments).where_eq("patientId", patient_id);
        let ordered = simple
            .clone()
            .order_by("date", Direction::Desc)
            .order_by("time", Direction::Asc);
        self.with_fallback(ordered, simple, |_| true, |a, b| {
            b.date.cmp(&a.date).then_with(|| a.cmp_schedule(b))
        })
        .await
    }

    pub async fn count_for_patient(&self, patient_id: &str) -> HospitalResult<usize> {
        let q = Query::collection(Collection::Appointments).where_eq("patientId", patient_id);
        Ok(self.store.query(&q).await?.len())
    }

    /// Every appointment, newest first.
    pub async fn all(&self) -> HospitalResult<Vec<Appointment>> {
        let mut list = self.run(&Query::collection(Collection::Appointments)).await?;
        list.sort_by(|a, b| b.cmp_schedule(a));
        Ok(list)
    }

    /// Zeros when the appointments cannot be read.
    pub async fn stats(&self) -> AppointmentStats {
        match self.all().await {
            Ok(list) => AppointmentStats::from_appointments(&list),
            Err(e) => {
                warn!("Could not compute appointment statistics: {}", e);
                AppointmentStats::default()
            }
        }
    }

    /// Times already taken on `day` by appointments that are not finished or cancelled.
    pub async fn booked_time_slots(&self, day: NaiveDate) -> HospitalResult<Vec<String>> {
        let (start, end) = day_bounds(day);
        let active: Vec<&str> = AppointmentStatus::ALL
            .iter()
            .filter(|s| s.is_active())
            .map(|s| s.as_str())
            .collect();
        let ordered = Query::collection(Collection::Appointments)
            .where_gte("date", encode_timestamp(&start))
            .where_lte("date", encode_timestamp(&end))
            .where_in("status", active);
        let list = self
            .with_fallback(
                ordered,
                Query::collection(Collection::Appointments),
                move |doc: &Document| is_active(doc) && on_day(day)(doc),
                Appointment::cmp_schedule,
            )
            .await?;
        Ok(list.into_iter().map(|a| a.time).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::{add_foreign_dates, booking, day, permissive_store, unindexed_store};

    async fn seeded(store: Arc<dyn DocumentStore>) -> AppointmentRepository {
        let repo = AppointmentRepository::new(store);
        let d1 = day(2024, 5, 1);
        let d2 = day(2024, 5, 2);
        for (patient, doctor, date, time) in [
            ("p1", "doc1", d1, "14:00"),
            ("p2", "doc1", d1, "09:00"),
            ("p1", "doc2", d1, "10:00"),
            ("p1", "doc1", d2, "08:00"),
        ] {
            repo.add_appointment(booking(patient, doctor, date, time)).await.unwrap();
        }
        repo
    }

    fn times(list: &[Appointment]) -> Vec<&str> {
        list.iter().map(|a| a.time.as_str()).collect()
    }

    #[tokio::test]
    async fn doctor_day_query_and_fallback_agree() {
        let indexed = seeded(permissive_store()).await;
        let degraded = seeded(unindexed_store()).await;
        let d1 = day(2024, 5, 1);

        let live = indexed.by_doctor("doc1", Some(d1)).await.unwrap();
        let fallback = degraded.by_doctor("doc1", Some(d1)).await.unwrap();
        assert_eq!(times(&live), vec!["09:00", "14:00"]);
        assert_eq!(times(&live), times(&fallback));

        assert_eq!(times(&degraded.by_doctor("doc1", None).await.unwrap()), vec!["09:00", "14:00", "08:00"]);
        assert_eq!(degraded.by_date(d1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn both_paths_read_stored_dates_alike() {
        let d1 = day(2024, 5, 1);
        let (permissive, strict) = (permissive_store(), unindexed_store());
        add_foreign_dates(&permissive, "doc1", d1).await;
        add_foreign_dates(&strict, "doc1", d1).await;
        let indexed = seeded(permissive).await;
        let degraded = seeded(strict).await;
        for repo in [&indexed, &degraded] {
            repo.add_appointment(booking("p3", "doc1", d1, "9:30")).await.unwrap();
        }

        let live = indexed.by_doctor("doc1", Some(d1)).await.unwrap();
        let fallback = degraded.by_doctor("doc1", Some(d1)).await.unwrap();
        assert_eq!(times(&live), vec!["09:00", "9:30", "14:00", "10:30"]);
        assert_eq!(times(&live), times(&fallback));

        let ids = |list: &[Appointment]| list.iter().map(|a| a.patient_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&indexed.by_date(d1).await.unwrap()), ids(&degraded.by_date(d1).await.unwrap()));
        let unindexed = degraded.doctor_day_unindexed("doc1", d1).await.unwrap();
        assert_eq!(times(&unindexed), times(&fallback));

        let slots = indexed.booked_time_slots(d1).await.unwrap();
        assert_eq!(slots, vec!["09:00", "9:30", "10:00", "14:00", "10:30"]);
        assert_eq!(slots, degraded.booked_time_slots(d1).await.unwrap());
    }

    #[tokio::test]
    async fn new_appointments_are_scheduled_and_status_changes_freely() {
        let repo = AppointmentRepository::new(permissive_store());
        let mut new = booking("p1", "doc1", day(2024, 5, 1), "09:00");
        new.notes = Some("first visit".into());
        let id = repo.add_appointment(new).await.unwrap();

        let appt = repo.require_appointment(&id).await.unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.notes.as_deref(), Some("first visit"));

        let reschedule = AppointmentUpdate { time: Some("8:15".into()), ..Default::default() };
        repo.update_appointment(&id, &reschedule).await.unwrap();
        assert_eq!(repo.require_appointment(&id).await.unwrap().time, "08:15");
        let garbled = AppointmentUpdate { time: Some("later".into()), ..Default::default() };
        assert!(matches!(repo.update_appointment(&id, &garbled).await, Err(HospitalError::Validation(_))));

        repo.update_status(&id, AppointmentStatus::Completed).await.unwrap();
        repo.update_status(&id, AppointmentStatus::Scheduled).await.unwrap();
        assert_eq!(repo.require_appointment(&id).await.unwrap().status, AppointmentStatus::Scheduled);
        assert!(matches!(
            repo.update_status("missing", AppointmentStatus::Cancelled).await,
            Err(HospitalError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn patient_history_is_newest_first() {
        let repo = seeded(unindexed_store()).await;
        let history = repo.by_patient("p1").await.unwrap();
        assert_eq!(times(&history), vec!["08:00", "10:00", "14:00"]);
        assert_eq!(repo.count_for_patient("p1").await.unwrap(), 3);
        assert_eq!(repo.count_for_patient("p9").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_and_booked_slots_ignore_cancelled() {
        let repo = seeded(unindexed_store()).await;
        let d1 = day(2024, 5, 1);
        let first = repo.by_date(d1).await.unwrap();
        repo.update_status(&first[0].id, AppointmentStatus::Cancelled).await.unwrap();
        repo.update_status(&first[1].id, AppointmentStatus::Completed).await.unwrap();

        let stats = repo.stats().await;
        assert_eq!(stats, AppointmentStats { total: 4, completed: 1, waiting: 2, cancelled: 1 });

        let slots = repo.booked_time_slots(d1).await.unwrap();
        assert_eq!(slots, vec!["14:00"]);
    }

    #[tokio::test]
    async fn all_is_sorted_newest_first() {
        let repo = seeded(permissive_store()).await;
        let all = repo.all().await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].time, "08:00");
        assert_eq!(all.last().map(|a| a.time.as_str()), Some("09:00"));
    }
}
