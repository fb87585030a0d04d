// rest_api/src/config.rs

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hms_lib::config::{load_config, HospitalConfig};

#[derive(Debug, Parser)]
#[command(name = "hospital-api", version, about = "Hospital management HTTP API")]
pub struct Cli {
    /// YAML configuration file. Defaults to config/hospital.yaml when present.
    #[arg(long, short = 'c', env = "HMS_CONFIG")]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (the default).
    Serve,
    /// Create a staff account with a password login.
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// doctor, reception or admin
        #[arg(long)]
        role: String,
        #[arg(long, env = "HMS_NEW_USER_PASSWORD")]
        password: String,
        /// Creates the linked doctor profile as well (doctor accounts only).
        #[arg(long)]
        specialization: Option<String>,
        #[arg(long, default_value = "")]
        phone: String,
    },
}

/// Loads the configuration and applies command-line overrides on top.
pub fn resolve_config(cli: &Cli) -> Result<HospitalConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut HospitalConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_loaded_values() {
        let cli = Cli::parse_from(["hospital-api", "--port", "9090"]);
        let mut config = HospitalConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(cli.command.is_none());
    }

    #[test]
    fn create_user_parses() {
        let cli = Cli::parse_from([
            "hospital-api", "create-user", "--name", "Dr. Grey", "--email", "grey@clinic.org",
            "--role", "doctor", "--password", "pw", "--specialization", "Cardiology",
        ]);
        match cli.command {
            Some(Command::CreateUser { role, specialization, .. }) => {
                assert_eq!(role, "doctor");
                assert_eq!(specialization.as_deref(), Some("Cardiology"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
