// lib/src/sync.rs
//
// A doctor's appointment list for one day, kept current. On setup the view
// tries a live query; if the store refuses it, the view polls instead. While
// polling, an ordered fetch is tried first, then a doctor-only fetch that is
// filtered and sorted locally. If both fail the view shows nothing and
// carries an error notice.

use std::time::Duration;

use chrono::NaiveDate;
use models::medical::Appointment;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::filter::AppointmentFilter;
use crate::notice::Notice;
use crate::repository::{decode_all, AppointmentRepository};
use crate::storage_engine::QueryWatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Live,
    Polling,
}

enum Strategy {
    Idle,
    Live(QueryWatch),
    Polling,
}

pub struct AppointmentView {
    repo: AppointmentRepository,
    doctor_id: String,
    day: NaiveDate,
    filter: AppointmentFilter,
    poll_interval: Duration,
    strategy: Strategy,
    degraded: bool,
    appointments: Vec<Appointment>,
    visible: Vec<Appointment>,
    notices: Vec<Notice>,
}

impl AppointmentView {
    /// Opens the view and waits for its first result set.
    pub async fn open(
        repo: AppointmentRepository,
        doctor_id: impl Into<String>,
        day: NaiveDate,
        filter: AppointmentFilter,
        poll_interval: Duration,
    ) -> Self {
        let mut view = AppointmentView {
            repo,
            doctor_id: doctor_id.into(),
            day,
            filter,
            poll_interval,
            strategy: Strategy::Idle,
            degraded: false,
            appointments: Vec::new(),
            visible: Vec::new(),
            notices: Vec::new(),
        };
        view.establish().await;
        view
    }

    /// Drops the current subscription, if any, then picks a strategy anew.
    async fn establish(&mut self) {
        self.strategy = Strategy::Idle;
        self.degraded = false;
        let query = AppointmentRepository::day_query(Some(&self.doctor_id), self.day);
        match self.repo.watch(query).await {
            Ok(mut watch) => match watch.next().await {
                Some(Ok(docs)) => {
                    info!("Live appointment updates for doctor {} on {}", self.doctor_id, self.day);
                    self.replace(decode_all(&docs));
                    self.strategy = Strategy::Live(watch);
                }
                Some(Err(e)) => {
                    warn!("Live query failed on first snapshot: {}", e);
                    self.start_polling().await;
                }
                None => {
                    warn!("Live query closed before its first snapshot");
                    self.start_polling().await;
                }
            },
            Err(e) => {
                warn!("Live appointment updates unavailable ({}); polling every {:?}", e, self.poll_interval);
                self.start_polling().await;
            }
        }
    }

    async fn start_polling(&mut self) {
        self.strategy = Strategy::Polling;
        self.poll_once().await;
    }

    async fn poll_once(&mut self) {
        let ordered = AppointmentRepository::day_query(Some(&self.doctor_id), self.day);
        let first = match self.repo.run(&ordered).await {
            Ok(list) => {
                self.replace(list);
                return;
            }
            Err(e) => e,
        };

        debug!("Ordered fetch failed ({}); trying doctor-only fetch", first);
        match self.repo.doctor_day_unindexed(&self.doctor_id, self.day).await {
            Ok(list) => {
                if !self.degraded {
                    warn!("Appointments for doctor {} are filtered and sorted locally", self.doctor_id);
                    self.notices
                        .push(Notice::warning("Using a simplified query; appointments are sorted locally."));
                    self.degraded = true;
                }
                self.replace(list);
            }
            Err(e) => {
                error!("Could not load appointments for doctor {}: {}", self.doctor_id, e);
                self.notices.push(Notice::error("Failed to load appointments."));
                self.replace(Vec::new());
            }
        }
    }

    /// Stores a fresh result set in clock order. The store orders `time` as
    /// text, which puts "10:00" before "9:30".
    fn replace(&mut self, mut appointments: Vec<Appointment>) {
        appointments.sort_by(Appointment::cmp_schedule);
        self.appointments = appointments;
        self.visible = self.filter.apply(&self.appointments);
    }

    /// Waits for the next change and applies it. A live subscription that
    /// ends or errors is replaced by polling.
    pub async fn next_update(&mut self) {
        let pushed = match &mut self.strategy {
            Strategy::Live(watch) => Some(watch.next().await),
            Strategy::Polling | Strategy::Idle => None,
        };
        let Some(pushed) = pushed else {
            if matches!(self.strategy, Strategy::Polling) {
                tokio::time::sleep(self.poll_interval).await;
                self.poll_once().await;
            } else {
                self.establish().await;
            }
            return;
        };
        match pushed {
            Some(Ok(docs)) => self.replace(decode_all(&docs)),
            Some(Err(e)) => {
                warn!("Live appointment query failed: {}; switching to polling", e);
                self.notices.push(Notice::warning("Live updates stopped; refreshing periodically."));
                self.start_polling().await;
            }
            None => {
                warn!("Live appointment query ended; switching to polling");
                self.start_polling().await;
            }
        }
    }

    pub async fn set_date(&mut self, day: NaiveDate) {
        self.day = day;
        self.establish().await;
    }

    pub async fn refresh(&mut self) {
        self.establish().await;
    }

    pub fn set_filter(&mut self, filter: AppointmentFilter) {
        self.filter = filter;
        self.visible = self.filter.apply(&self.appointments);
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    /// The appointments that pass the current filter.
    pub fn visible(&self) -> &[Appointment] {
        &self.visible
    }

    pub fn mode(&self) -> Option<SyncMode> {
        match self.strategy {
            Strategy::Idle => None,
            Strategy::Live(_) => Some(SyncMode::Live),
            Strategy::Polling => Some(SyncMode::Polling),
        }
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn doctor_id(&self) -> &str {
        &self.doctor_id
    }

    pub fn filter(&self) -> &AppointmentFilter {
        &self.filter
    }
}
