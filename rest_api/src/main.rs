// rest_api/src/main.rs

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use hms_lib::create_store;
use hms_lib::repository::{DoctorRepository, UserRepository};
use models::generate_document_id;
use models::medical::{Doctor, Role};
use rest_api::config::{resolve_config, Cli, Command};
use rest_api::{start_server, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        None | Some(Command::Serve) => {
            let state = AppState::from_config(&config).await?;
            if config.auth.jwt_secret == hms_lib::config::config_defaults::default_jwt_secret() {
                warn!("Using the built-in JWT secret; set HMS__AUTH__JWT_SECRET in production");
            }
            let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Received shutdown signal.");
            };
            start_server(state, addr, shutdown).await
        }
        Some(Command::CreateUser { name, email, role, password, specialization, phone }) => {
            let role: Role = role.parse()?;
            if role != Role::Doctor && specialization.is_some() {
                bail!("--specialization only applies to doctor accounts");
            }
            let store = create_store(&config.storage).await?;
            let users = UserRepository::new(store.clone());
            let profile = security::create_account(&users, &name, &email, role, &password)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            match specialization {
                Some(specialization) => {
                    let doctor = Doctor {
                        id: generate_document_id(),
                        user_id: profile.uid.clone(),
                        name: profile.name.clone(),
                        specialization,
                        email: profile.email.clone(),
                        phone,
                    };
                    DoctorRepository::new(store.clone()).put_doctor(&doctor).await?;
                    info!("Doctor profile {} linked to account {}", doctor.id, profile.uid);
                }
                None if role == Role::Doctor => {
                    warn!("No --specialization given; account {} has no doctor profile", profile.uid)
                }
                None => {}
            }
            store.flush().await?;
            println!("Created {} account {} ({})", role, profile.uid, profile.email);
            Ok(())
        }
    }
}
