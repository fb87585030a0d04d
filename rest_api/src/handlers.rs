// rest_api/src/handlers.rs

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::{NaiveDate, Utc};
use futures::stream::{self, Stream, StreamExt};
use hms_lib::dashboard::{self, PatientVisitSummary};
use hms_lib::filter::AppointmentFilter;
use hms_lib::notice::Notice;
use hms_lib::sync::{AppointmentView, SyncMode};
use models::medical::{
    Appointment, AppointmentStatus, AppointmentUpdate, Medicine, NewAppointment, NewPatient, PatientUpdate,
    PrescriptionPatient, PrescriptionRequest,
};
use models::{HospitalError, ValidationError};
use security::roles::{
    APPOINTMENTS_READ, APPOINTMENTS_WRITE, DASHBOARD_DOCTOR, DASHBOARD_RECEPTION, PATIENTS_READ, PATIENTS_WRITE,
    PRESCRIPTIONS_WRITE,
};
use security::{login_user, Session, UserLogin};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{AppState, AuthSession, RestApiError};

type ApiResult<T> = Result<T, RestApiError>;

fn allow(state: &AppState, session: &Session, permission: &str) -> ApiResult<()> {
    state.gate.authorize(session, permission).map_err(RestApiError::from)
}

fn parse_day(raw: Option<&str>) -> ApiResult<NaiveDate> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Utc::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDateFormat(s.to_string()).into()),
    }
}

fn parse_status(raw: Option<&str>) -> ApiResult<Option<AppointmentStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        None => Ok(None),
        Some(s) => Ok(Some(s.parse::<AppointmentStatus>()?)),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub date: Option<String>,
    pub status: Option<String>,
    pub q: Option<String>,
}

impl ListParams {
    fn filter(&self) -> ApiResult<AppointmentFilter> {
        Ok(AppointmentFilter::new(parse_status(self.status.as_deref())?, self.q.clone()))
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct DateParams {
    pub date: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Hospital API is healthy",
    }))
}

pub async fn version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn login(State(state): State<AppState>, Json(login): Json<UserLogin>) -> ApiResult<impl IntoResponse> {
    let response = login_user(&state.users, state.gate.tokens(), &login)
        .await
        .map_err(HospitalError::from)?;
    Ok(Json(response))
}

// --- patients ---

pub async fn list_patients(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, PATIENTS_READ)?;
    Ok(Json(state.desk.patients().list_patients().await?))
}

pub async fn search_patients(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, PATIENTS_READ)?;
    Ok(Json(state.desk.patients().search_patients(&params.q).await?))
}

pub async fn create_patient(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(patient): Json<NewPatient>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, PATIENTS_WRITE)?;
    let registration = state.desk.register_patient(patient, &session.uid).await?;
    info!(patient_id = %registration.patient_id, by = %session.uid, "Patient registered");
    Ok((StatusCode::CREATED, Json(json!({ "id": registration.patient_id }))))
}

pub async fn get_patient(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, PATIENTS_READ)?;
    Ok(Json(state.desk.patients().require_patient(&id).await?))
}

pub async fn update_patient(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
    Json(update): Json<PatientUpdate>,
) -> ApiResult<StatusCode> {
    allow(&state, &session, PATIENTS_WRITE)?;
    state.desk.update_patient(&id, &update).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_patient(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    allow(&state, &session, PATIENTS_WRITE)?;
    state.desk.delete_patient(&id).await?;
    info!(patient_id = %id, by = %session.uid, "Patient deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn patient_appointments(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, APPOINTMENTS_READ)?;
    Ok(Json(state.desk.appointments().by_patient(&id).await?))
}

// --- appointments ---

pub async fn list_appointments(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, APPOINTMENTS_READ)?;
    let filter = params.filter()?;
    let appointments = match params.date.as_deref() {
        Some(_) => state.desk.appointments().by_date(parse_day(params.date.as_deref())?).await?,
        None => state.desk.appointments().all().await?,
    };
    Ok(Json(filter.apply(&appointments)))
}

pub async fn book_appointment(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(booking): Json<NewAppointment>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, APPOINTMENTS_WRITE)?;
    let id = state.desk.book_appointment(booking).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn booked_slots(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(params): Query<DateParams>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, APPOINTMENTS_READ)?;
    let day = parse_day(params.date.as_deref())?;
    let slots = state.desk.appointments().booked_time_slots(day).await?;
    Ok(Json(json!({ "date": day, "bookedSlots": slots })))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, APPOINTMENTS_READ)?;
    Ok(Json(state.desk.appointments().require_appointment(&id).await?))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
    Json(update): Json<AppointmentUpdate>,
) -> ApiResult<StatusCode> {
    allow(&state, &session, APPOINTMENTS_WRITE)?;
    state.desk.appointments().update_appointment(&id, &update).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

/// Any status may follow any other.
pub async fn update_appointment_status(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> ApiResult<StatusCode> {
    allow(&state, &session, APPOINTMENTS_WRITE)?;
    let status: AppointmentStatus = change.status.parse()?;
    state.desk.appointments().update_status(&id, status).await?;
    debug!(appointment_id = %id, %status, "Appointment status changed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    allow(&state, &session, APPOINTMENTS_WRITE)?;
    state.desk.appointments().delete_appointment(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- dashboards ---

pub async fn reception_dashboard(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, DASHBOARD_RECEPTION)?;
    let today = Utc::now().date_naive();
    Ok(Json(
        dashboard::reception_dashboard(state.desk.patients(), state.desk.appointments(), today).await,
    ))
}

pub async fn doctor_dashboard(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, DASHBOARD_DOCTOR)?;
    let today = Utc::now().date_naive();
    Ok(Json(
        dashboard::doctor_dashboard(state.desk.doctors(), state.desk.appointments(), &session.uid, today).await,
    ))
}

/// One rendering of a doctor's day list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub mode: Option<SyncMode>,
    pub total: usize,
    pub appointments: Vec<Appointment>,
    pub notices: Vec<Notice>,
}

impl DayView {
    fn capture(view: &mut AppointmentView) -> Self {
        DayView {
            doctor_id: view.doctor_id().to_string(),
            date: view.day(),
            mode: view.mode(),
            total: view.appointments().len(),
            appointments: view.visible().to_vec(),
            notices: view.take_notices(),
        }
    }
}

async fn open_day_view(state: &AppState, session: &Session, params: &ListParams) -> ApiResult<AppointmentView> {
    let day = parse_day(params.date.as_deref())?;
    let filter = params.filter()?;
    let (_, doctor_id) = dashboard::resolve_doctor(state.desk.doctors(), &session.uid).await;
    let repo = state.desk.appointments().clone();
    Ok(AppointmentView::open(repo, doctor_id, day, filter, state.poll_interval).await)
}

pub async fn doctor_appointments(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, DASHBOARD_DOCTOR)?;
    let mut view = open_day_view(&state, &session, &params).await?;
    Ok(Json(DayView::capture(&mut view)))
}

/// Pushes the day list as `appointments` events: once on connect, then on
/// every change that alters what the doctor sees. The view, and with it the
/// store subscription, is released when the client disconnects.
pub async fn doctor_appointment_stream(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(params): Query<ListParams>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    allow(&state, &session, DASHBOARD_DOCTOR)?;
    let mut view = open_day_view(&state, &session, &params).await?;
    info!(doctor_id = %view.doctor_id(), day = %view.day(), mode = ?view.mode(), "Day stream opened");

    let first = DayView::capture(&mut view);
    let last = first.appointments.clone();
    let updates = stream::unfold((view, last), |(mut view, mut last)| async move {
        loop {
            view.next_update().await;
            let snapshot = DayView::capture(&mut view);
            if snapshot.appointments != last || !snapshot.notices.is_empty() {
                last = snapshot.appointments.clone();
                return Some((snapshot, (view, last)));
            }
        }
    });

    let events = stream::once(async move { first }).chain(updates).map(|snapshot| Ok::<_, Infallible>(day_event(&snapshot)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn day_event(snapshot: &DayView) -> Event {
    match Event::default().event("appointments").json_data(snapshot) {
        Ok(event) => event,
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorPatientView {
    pub patient: models::medical::Patient,
    pub appointments: Vec<Appointment>,
    pub summary: PatientVisitSummary,
}

pub async fn doctor_patient(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    allow(&state, &session, DASHBOARD_DOCTOR)?;
    let patient = state.desk.patients().require_patient(&id).await?;
    let appointments = state.desk.appointments().by_patient(&id).await?;
    let summary = PatientVisitSummary::from_appointments(&appointments, Utc::now());
    Ok(Json(DoctorPatientView { patient, appointments, summary }))
}

// --- prescriptions ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionForm {
    pub patient_id: Option<String>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub next_visit: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Also keep a copy in the export directory.
    #[serde(default)]
    pub save: bool,
}

pub async fn export_prescription(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(form): Json<PrescriptionForm>,
) -> ApiResult<Response> {
    allow(&state, &session, PRESCRIPTIONS_WRITE)?;
    let (doctor, _) = dashboard::resolve_doctor(state.desk.doctors(), &session.uid).await;
    let patient = match form.patient_id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(id) => Some(PrescriptionPatient::from(&state.desk.patients().require_patient(id).await?)),
        None => None,
    };
    let request = PrescriptionRequest {
        doctor,
        patient,
        diagnosis: form.diagnosis,
        medicines: form.medicines,
        instructions: form.instructions,
        next_visit: form.next_visit,
        notes: form.notes,
    };
    let issued = Utc::now().date_naive();
    let exporter = state.exporter.clone();
    let save = form.save;

    let (file_name, bytes) = tokio::task::spawn_blocking(move || -> Result<(String, Vec<u8>), HospitalError> {
        let rendered = exporter.render(&request, issued)?;
        if save {
            let path = exporter.save(&rendered)?;
            info!("Prescription saved to {}", path.display());
        }
        Ok((rendered.file_name, rendered.bytes))
    })
    .await
    .map_err(HospitalError::from)??;

    let disposition = format!("attachment; filename=\"{}\"", file_name);
    Ok((
        [(header::CONTENT_TYPE, "application/pdf".to_string()), (header::CONTENT_DISPOSITION, disposition)],
        bytes,
    )
        .into_response())
}
