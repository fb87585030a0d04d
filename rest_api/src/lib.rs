// rest_api/src/lib.rs
//! JSON API behind the reception and doctor dashboards.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error as AnyhowError};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use hms_lib::config::HospitalConfig;
use hms_lib::notifications::{notifier_from_settings, WelcomeNotifier};
use hms_lib::prescription::PrescriptionExporter;
use hms_lib::repository::UserRepository;
use hms_lib::{create_store, DocumentStore, ReceptionDesk};
use models::{HospitalError, ValidationError};
use security::{AuthGate, Redirect, RolesConfig, Session, TokenService};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod config;
mod handlers;

#[derive(Debug, Error)]
pub enum RestApiError {
    #[error(transparent)]
    Hospital(#[from] HospitalError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<ValidationError> for RestApiError {
    fn from(err: ValidationError) -> Self {
        RestApiError::Hospital(err.into())
    }
}

impl RestApiError {
    fn status(&self) -> StatusCode {
        match self {
            RestApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RestApiError::Hospital(err) => match err {
                HospitalError::Validation(_) | HospitalError::InvalidData(_) | HospitalError::QueryError(_) => {
                    StatusCode::BAD_REQUEST
                }
                HospitalError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
                HospitalError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                HospitalError::NotFound { .. } => StatusCode::NOT_FOUND,
                HospitalError::Conflict(_) | HospitalError::AlreadyExists(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for RestApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let redirect = match &self {
            RestApiError::Hospital(err) => Redirect::for_error(err).map(|r| r.path()),
            RestApiError::InvalidInput(_) => None,
        };
        let mut body = json!({
            "status": "error",
            "message": self.to_string(),
        });
        if let Some(path) = redirect {
            body["redirect"] = json!(path);
        }
        (status, Json(body)).into_response()
    }
}

// Shared state for the Axum application
#[derive(Clone)]
pub struct AppState {
    pub gate: AuthGate,
    pub desk: ReceptionDesk,
    pub users: UserRepository,
    pub exporter: Arc<PrescriptionExporter>,
    pub poll_interval: Duration,
}

impl AppState {
    pub fn new(
        config: &HospitalConfig,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn WelcomeNotifier>,
        roles: RolesConfig,
    ) -> Self {
        let users = UserRepository::new(store.clone());
        AppState {
            gate: AuthGate::new(TokenService::from_settings(&config.auth), users.clone(), roles),
            desk: ReceptionDesk::new(store, notifier),
            users,
            exporter: Arc::new(PrescriptionExporter::new(config.export.clone())),
            poll_interval: config.sync.poll_interval(),
        }
    }

    /// Opens the configured store and notifier.
    pub async fn from_config(config: &HospitalConfig) -> Result<Self, AnyhowError> {
        let store = create_store(&config.storage)
            .await
            .context("Failed to open the document store")?;
        let notifier = notifier_from_settings(&config.notifications)
            .context("Failed to set up the welcome notifier")?;
        let roles = RolesConfig::load_or_builtin(&config.auth.roles_file)?;
        Ok(Self::new(config, store, notifier, roles))
    }
}

/// The signed-in caller. Browsers opening an event stream cannot set
/// headers, so a `token` query parameter is accepted as well.
pub struct AuthSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = RestApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts);
        let session = state.gate.authenticate(token.as_deref()).await?;
        Ok(AuthSession(session))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string());
    from_header.or_else(|| {
        parts
            .uri
            .query()
            .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("token=")))
            .map(str::to_string)
    })
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .route("/auth/login", post(handlers::login))
        .route("/patients", get(handlers::list_patients).post(handlers::create_patient))
        .route("/patients/search", get(handlers::search_patients))
        .route(
            "/patients/:id",
            get(handlers::get_patient).put(handlers::update_patient).delete(handlers::delete_patient),
        )
        .route("/patients/:id/appointments", get(handlers::patient_appointments))
        .route("/appointments", get(handlers::list_appointments).post(handlers::book_appointment))
        .route("/appointments/booked-slots", get(handlers::booked_slots))
        .route(
            "/appointments/:id",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/appointments/:id/status", patch(handlers::update_appointment_status))
        .route("/reception/dashboard", get(handlers::reception_dashboard))
        .route("/doctor/dashboard", get(handlers::doctor_dashboard))
        .route("/doctor/appointments", get(handlers::doctor_appointments))
        .route("/doctor/appointments/stream", get(handlers::doctor_appointment_stream))
        .route("/doctor/patients/:id", get(handlers::doctor_patient))
        .route("/doctor/prescriptions", post(handlers::export_prescription));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AnyhowError> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;
    info!("REST API server listening on {}", addr);

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .context("REST API server failed to start or run")?;

    info!("REST API server stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body, BodyDataStream};
    use axum::http::{header, Request};
    use chrono::Utc;
    use futures::StreamExt;
    use hms_lib::config::ExportSettings;
    use hms_lib::notifications::DisabledNotifier;
    use hms_lib::repository::DoctorRepository;
    use hms_lib::storage_engine::InMemoryStorage;
    use models::medical::{Doctor, Role};
    use serde_json::Value;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        state: AppState,
        doctor_token: String,
        reception_token: String,
        _exports: tempfile::TempDir,
    }

    async fn app() -> TestApp {
        let exports = tempfile::tempdir().unwrap();
        let mut config = HospitalConfig::default();
        config.auth.jwt_secret = "test-secret".into();
        config.export = ExportSettings { directory: exports.path().to_path_buf(), ..ExportSettings::default() };
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStorage::default());
        let state = AppState::new(&config, store.clone(), Arc::new(DisabledNotifier), RolesConfig::builtin().unwrap());

        let doctor = security::create_account(&state.users, "Dr. Grey", "grey@clinic.org", Role::Doctor, "pw-doctor")
            .await
            .unwrap();
        DoctorRepository::new(store)
            .put_doctor(&Doctor {
                id: "d1".into(),
                user_id: doctor.uid.clone(),
                name: "Dr. Grey".into(),
                specialization: "General Medicine".into(),
                email: "grey@clinic.org".into(),
                phone: "5550001111".into(),
            })
            .await
            .unwrap();
        let reception = security::create_account(&state.users, "Rita", "rita@clinic.org", Role::Reception, "pw-desk")
            .await
            .unwrap();

        TestApp {
            router: router(state.clone()),
            doctor_token: state.gate.tokens().issue(&doctor.uid).unwrap(),
            reception_token: state.gate.tokens().issue(&reception.uid).unwrap(),
            state,
            _exports: exports,
        }
    }

    async fn send(app: &TestApp, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.router.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn jane() -> Value {
        json!({
            "name": "Jane Doe",
            "age": 34,
            "gender": "Female",
            "phone": "5551234567",
            "email": "jane@example.com",
            "address": "12 Elm Street",
        })
    }

    async fn register_jane(app: &TestApp) -> String {
        let response = send(app, Method::POST, "/api/v1/patients", Some(&app.reception_token), Some(jane())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["id"].as_str().unwrap().to_string()
    }

    /// Reads the body until the next complete `appointments` event and
    /// returns its JSON payload. Other frames, such as keep-alives, are skipped.
    async fn next_day_event(body: &mut BodyDataStream, buffer: &mut String) -> Value {
        loop {
            if let Some(end) = buffer.find("\n\n") {
                let frame: String = buffer.drain(..end + 2).collect();
                let field = |name: &str| {
                    frame
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| value.trim().to_string())
                };
                if field("event").as_deref() == Some("appointments") {
                    return serde_json::from_str(&field("data").unwrap()).unwrap();
                }
                continue;
            }
            let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
                .await
                .expect("no event within five seconds")
                .expect("stream ended")
                .unwrap();
            buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }

    #[tokio::test]
    async fn health_needs_no_session() {
        let app = app().await;
        let response = send(&app, Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn missing_session_redirects_to_sign_in() {
        let app = app().await;
        let response = send(&app, Method::GET, "/api/v1/patients", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["redirect"], "/auth/signin");
    }

    #[tokio::test]
    async fn wrong_role_redirects_to_role_selection() {
        let app = app().await;
        let response = send(&app, Method::GET, "/api/v1/reception/dashboard", Some(&app.doctor_token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["redirect"], "/auth/role-selection");

        let response = send(&app, Method::GET, "/api/v1/doctor/dashboard", Some(&app.reception_token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn login_returns_a_working_token() {
        let app = app().await;
        let login = json!({ "email": "RITA@clinic.org", "password": "pw-desk" });
        let response = send(&app, Method::POST, "/api/v1/auth/login", None, Some(login)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["redirect"], "/dashboard/reception");
        let token = body["token"].as_str().unwrap().to_string();

        let response = send(&app, Method::GET, "/api/v1/reception/dashboard", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bad = json!({ "email": "rita@clinic.org", "password": "nope" });
        let response = send(&app, Method::POST, "/api/v1/auth/login", None, Some(bad)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_registration_is_a_bad_request() {
        let app = app().await;
        let mut patient = jane();
        patient["phone"] = json!("123");
        let response = send(&app, Method::POST, "/api/v1/patients", Some(&app.reception_token), Some(patient)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["message"].as_str().unwrap().contains("phone"));
    }

    #[tokio::test]
    async fn patient_with_appointments_cannot_be_deleted() {
        let app = app().await;
        let patient_id = register_jane(&app).await;
        let booking = json!({
            "patientId": patient_id,
            "doctorId": "d1",
            "date": Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc(),
            "time": "09:30",
            "reason": "Fever",
        });
        let response =
            send(&app, Method::POST, "/api/v1/appointments", Some(&app.reception_token), Some(booking.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let appointment_id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = send(&app, Method::POST, "/api/v1/appointments", Some(&app.reception_token), Some(booking)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let uri = format!("/api/v1/patients/{}", patient_id);
        let response = send(&app, Method::DELETE, &uri, Some(&app.reception_token), None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let appt_uri = format!("/api/v1/appointments/{}", appointment_id);
        let response = send(&app, Method::DELETE, &appt_uri, Some(&app.reception_token), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, Method::DELETE, &uri, Some(&app.reception_token), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, Method::GET, &uri, Some(&app.reception_token), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn doctor_day_view_applies_status_filter() {
        let app = app().await;
        let patient_id = register_jane(&app).await;
        let today = Utc::now().date_naive();
        let mut ids = Vec::new();
        for time in ["09:00", "10:00"] {
            let booking = json!({
                "patientId": patient_id,
                "doctorId": "d1",
                "date": today.and_hms_opt(0, 0, 0).unwrap().and_utc(),
                "time": time,
                "reason": "Review",
            });
            let response =
                send(&app, Method::POST, "/api/v1/appointments", Some(&app.reception_token), Some(booking)).await;
            ids.push(json_body(response).await["id"].as_str().unwrap().to_string());
        }
        let uri = format!("/api/v1/appointments/{}/status", ids[1]);
        let response = send(&app, Method::PATCH, &uri, Some(&app.doctor_token), Some(json!({ "status": "completed" }))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, Method::PATCH, &uri, Some(&app.doctor_token), Some(json!({ "status": "done" }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/doctor/appointments?date={}", today.format("%Y-%m-%d"));
        let body = json_body(send(&app, Method::GET, &uri, Some(&app.doctor_token), None).await).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["appointments"][0]["time"], "09:00");

        let uri = format!("{}&status=completed", uri);
        let body = json_body(send(&app, Method::GET, &uri, Some(&app.doctor_token), None).await).await;
        assert_eq!(body["appointments"].as_array().unwrap().len(), 1);
        assert_eq!(body["appointments"][0]["time"], "10:00");

        let response =
            send(&app, Method::GET, "/api/v1/doctor/appointments?date=18-10-2026", Some(&app.doctor_token), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn day_stream_sends_the_list_then_pushes_bookings() {
        let app = app().await;
        let patient_id = register_jane(&app).await;
        let today = Utc::now().date_naive();
        let uri = format!("/api/v1/doctor/appointments/stream?date={}", today.format("%Y-%m-%d"));
        let response = send(&app, Method::GET, &uri, Some(&app.doctor_token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/event-stream"));
        let mut body = response.into_body().into_data_stream();
        let mut buffer = String::new();

        let first = next_day_event(&mut body, &mut buffer).await;
        assert_eq!(first["mode"], "live");
        assert_eq!(first["total"], 0);

        let booking = json!({
            "patientId": patient_id,
            "doctorId": "d1",
            "date": today.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            "time": "9:30",
            "reason": "Fever",
        });
        let response = send(&app, Method::POST, "/api/v1/appointments", Some(&app.reception_token), Some(booking)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let pushed = next_day_event(&mut body, &mut buffer).await;
        assert_eq!(pushed["total"], 1);
        assert_eq!(pushed["appointments"][0]["patientId"], patient_id.as_str());
        assert_eq!(pushed["appointments"][0]["time"], "09:30");
    }

    #[tokio::test]
    async fn prescription_downloads_as_named_pdf() {
        let app = app().await;
        let patient_id = register_jane(&app).await;
        let form = json!({
            "patientId": patient_id,
            "diagnosis": "Fever",
            "medicines": [{ "name": "Paracetamol", "dosage": "1-0-1", "duration": "5 days" }],
        });
        let response =
            send(&app, Method::POST, "/api/v1/doctor/prescriptions", Some(&app.doctor_token), Some(form)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let expected = format!("prescription_Jane_Doe_{}.pdf", Utc::now().date_naive().format("%d-%m-%Y"));
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.contains(&expected));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let form = json!({ "patientId": patient_id, "diagnosis": "Fever", "medicines": [] });
        let response =
            send(&app, Method::POST, "/api/v1/doctor/prescriptions", Some(&app.doctor_token), Some(form)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn saved_prescription_lands_in_export_directory() {
        let app = app().await;
        let patient_id = register_jane(&app).await;
        let form = json!({
            "patientId": patient_id,
            "diagnosis": "Fever",
            "medicines": [{ "name": "Paracetamol", "dosage": "1-0-1", "duration": "5 days" }],
            "save": true,
        });
        let response =
            send(&app, Method::POST, "/api/v1/doctor/prescriptions", Some(&app.doctor_token), Some(form)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let downloaded = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let expected = format!("prescription_Jane_Doe_{}.pdf", Utc::now().date_naive().format("%d-%m-%Y"));
        let saved = std::fs::read(app.state.exporter.directory().join(expected)).unwrap();
        // Each render carries a fresh document id, so equal bytes mean one render.
        assert_eq!(saved, downloaded.to_vec());
    }

    #[tokio::test]
    async fn prescription_for_a_name_with_separators_downloads() {
        let app = app().await;
        let mut patient = jane();
        patient["name"] = json!("Ana/Maria \"Lopez\"");
        let response = send(&app, Method::POST, "/api/v1/patients", Some(&app.reception_token), Some(patient)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let patient_id = json_body(response).await["id"].as_str().unwrap().to_string();

        let form = json!({
            "patientId": patient_id,
            "diagnosis": "Fever",
            "medicines": [{ "name": "Paracetamol", "dosage": "1-0-1", "duration": "5 days" }],
            "save": true,
        });
        let response =
            send(&app, Method::POST, "/api/v1/doctor/prescriptions", Some(&app.doctor_token), Some(form)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let expected = format!("prescription_Ana_Maria_Lopez__{}.pdf", Utc::now().date_naive().format("%d-%m-%Y"));
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert_eq!(disposition, format!("attachment; filename=\"{}\"", expected));
        assert!(app.state.exporter.directory().join(&expected).exists());
    }
}
