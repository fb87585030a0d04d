// security/src/roles.rs
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use models::medical::Role;
use serde::Deserialize;

pub const PATIENTS_READ: &str = "patients:read";
pub const PATIENTS_WRITE: &str = "patients:write";
pub const APPOINTMENTS_READ: &str = "appointments:read";
pub const APPOINTMENTS_WRITE: &str = "appointments:write";
pub const PRESCRIPTIONS_WRITE: &str = "prescriptions:write";
pub const DASHBOARD_DOCTOR: &str = "dashboard:doctor";
pub const DASHBOARD_RECEPTION: &str = "dashboard:reception";
pub const SUPERUSER: &str = "superuser";

const BUILTIN_ROLES: &str = include_str!("../roles_permissions.yaml");

#[derive(Debug, Deserialize, Clone)]
pub struct RoleConfig {
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RolesConfig {
    pub roles: HashMap<String, RoleConfig>,
}

impl RolesConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read roles file {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse roles file")
    }

    /// The roles file shipped with the service.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_ROLES)
    }

    /// Reads `path` if it exists, otherwise falls back to the built-in table.
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_yaml_file(path)
        } else {
            tracing::warn!("Roles file {} not found; using built-in permissions", path.display());
            Self::builtin()
        }
    }

    pub fn permissions(&self, role: Role) -> &[String] {
        self.roles
            .get(role.as_str())
            .map(|cfg| cfg.permissions.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_permission(&self, role: Role, permission: &str) -> bool {
        self.permissions(role)
            .iter()
            .any(|p| p == permission || p == SUPERUSER)
    }
}
