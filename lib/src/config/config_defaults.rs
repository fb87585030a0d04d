// lib/src/config/config_defaults.rs

use std::path::PathBuf;

use crate::storage_engine::StorageEngineType;

pub const DEFAULT_CONFIG_PATH: &str = "config/hospital.yaml";
pub const ENV_PREFIX: &str = "HMS";
pub const ENV_SEPARATOR: &str = "__";

pub fn default_host() -> String { "127.0.0.1".to_string() }
pub fn default_port() -> u16 { 8082 }
pub fn default_storage_engine_type() -> StorageEngineType { StorageEngineType::InMemory }
pub fn default_data_directory() -> PathBuf { PathBuf::from("./data/hms") }
pub fn default_strict_indexes() -> bool { true }
pub fn default_jwt_secret() -> String { "change-me-in-production".to_string() }
pub fn default_token_ttl_hours() -> i64 { 24 }
pub fn default_roles_file() -> PathBuf { PathBuf::from("security/roles_permissions.yaml") }
pub fn default_notification_url() -> String { "http://127.0.0.1:3000/api/send-patient-welcome".to_string() }
pub fn default_notification_timeout_secs() -> u64 { 5 }
pub fn default_poll_interval_secs() -> u64 { 30 }
pub fn default_export_directory() -> PathBuf { PathBuf::from("./exports") }
pub fn default_clinic_name() -> String { "Hospital Clinic".to_string() }
pub fn default_clinic_tagline() -> String { "Healthcare Excellence".to_string() }
pub fn default_system_name() -> String { "Hospital Clinic Management System".to_string() }
pub fn default_emergency_contact() -> String { "+1 234 567 890".to_string() }
