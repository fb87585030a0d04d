// lib/src/config/config_structs.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::config_defaults::*;
use crate::storage_engine::StorageEngineType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HospitalConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
    pub notifications: NotificationSettings,
    pub sync: SyncSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings { host: default_host(), port: default_port() }
    }
}

/// A composite index as written in the config file, e.g.
/// `{ collection: appointments, fields: [doctorId, date, time] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub collection: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub engine: StorageEngineType,
    pub data_directory: PathBuf,
    /// When set, queries spanning several fields are refused unless one of
    /// `indexes` covers them.
    pub strict_indexes: bool,
    pub indexes: Vec<IndexDefinition>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            engine: default_storage_engine_type(),
            data_directory: default_data_directory(),
            strict_indexes: default_strict_indexes(),
            indexes: crate::storage_engine::indexes::default_index_definitions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub roles_file: PathBuf,
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: default_jwt_secret(),
            token_ttl_hours: default_token_ttl_hours(),
            roles_file: default_roles_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub welcome_url: String,
    pub timeout_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            enabled: false,
            welcome_url: default_notification_url(),
            timeout_secs: default_notification_timeout_secs(),
        }
    }
}

impl NotificationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub poll_interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings { poll_interval_secs: default_poll_interval_secs() }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub directory: PathBuf,
    pub clinic_name: String,
    pub clinic_tagline: String,
    pub system_name: String,
    pub emergency_contact: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportSettings {
            directory: default_export_directory(),
            clinic_name: default_clinic_name(),
            clinic_tagline: default_clinic_tagline(),
            system_name: default_system_name(),
            emergency_contact: default_emergency_contact(),
        }
    }
}
