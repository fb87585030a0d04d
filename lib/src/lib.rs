// lib/src/lib.rs
//! Services behind the hospital front desk and doctor pages: the document
//! store, typed repositories, the live appointment view, dashboards, patient
//! registration and the prescription exporter.

pub mod config;
pub mod dashboard;
pub mod filter;
pub mod notice;
pub mod notifications;
pub mod prescription;
pub mod reception;
pub mod repository;
pub mod storage_engine;
pub mod sync;

pub use config::{load_config, HospitalConfig};
pub use filter::AppointmentFilter;
pub use notice::Notice;
pub use reception::ReceptionDesk;
pub use storage_engine::{create_store, DocumentStore, StorageEngineType};
pub use sync::{AppointmentView, SyncMode};
