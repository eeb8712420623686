//! Server construction and the `run_server` entry point used by `main.rs`.

use crate::config::{self, Config};
use crate::server::routes;
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::path::Path;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config/gateway.yaml";

/// CLI-sourced overrides applied on top of the loaded config, before the
/// server binds.
#[derive(Default)]
pub struct StartupOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub verbose: u8,
}

pub async fn run_server() -> Result<()> {
    run_server_with_config(None, StartupOverrides::default()).await
}

pub async fn run_server_with_config(
    config_path: Option<&str>,
    overrides: StartupOverrides,
) -> Result<()> {
    let mut config = load_config(config_path.unwrap_or(DEFAULT_CONFIG_PATH))?;

    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    match overrides.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }

    let host = config.server.host.clone();
    let port = config.server.port;

    crate::utils::logging::init_tracing(&config.logging);

    info!(host = %host, port, "starting ai gateway");

    let state = web::Data::new(AppState::new(config));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(routes::configure)
    })
    .bind((host.as_str(), port))
    .map_err(|e| crate::utils::error::GatewayError::Internal(e.to_string()))?
    .run()
    .await
    .map_err(|e| crate::utils::error::GatewayError::Internal(e.to_string()))
}

/// Loads the gateway config file, falling back to defaults-plus-environment
/// with a warning only when the file is simply absent. A file that exists
/// but fails to parse or validate aborts startup instead of silently
/// running on defaults.
fn load_config(path: &str) -> Result<Config> {
    match config::load(path) {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            if Path::new(path).exists() {
                Err(GatewayError::Config(format!(
                    "config file {path} is present but invalid: {e}"
                )))
            } else {
                warn!(error = %e, "config file not found, falling back to default configuration");
                Ok(Config::default())
            }
        }
    }
}
