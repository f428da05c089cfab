use crate::api;
use crate::api::auth::{require_token, ApiToken};
use crate::control_plane::ControlPlane;
use crate::opamp::supervisor::TransportSupervisor;
use crate::registry::AgentRegistry;
use crate::settings::Settings;
use actix_web::middleware::from_fn;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const API_WORKERS: usize = 2;
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("admin API server: `{0}`")]
    Http(#[from] std::io::Error),
}

/// Wires the registry, control plane, session transport, and admin API, and
/// runs until the process is told to stop.
///
/// Shutdown order: Ctrl-C raises `stopping` (which keeps the transport
/// supervisor from restarting anything) and gracefully stops the HTTP
/// server within its deadline; the transport task is then torn down.
pub async fn run(settings: Settings) -> Result<(), RunError> {
    let registry = Arc::new(AgentRegistry::new());
    let control = Arc::new(ControlPlane::new(registry.clone()));
    let token = ApiToken::from_env();
    let stopping = Arc::new(AtomicBool::new(false));

    let supervisor = TransportSupervisor::new(settings.opamp.clone(), registry, stopping.clone());
    let transport = tokio::spawn(supervisor.run());

    let control_data = Data::from(control);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(control_data.clone())
            .app_data(Data::new(token.clone()))
            .wrap(from_fn(require_token))
            .configure(api::routes)
    })
    .bind(settings.api.listen_address.as_str())?
    .workers(API_WORKERS)
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
    .run();

    info!(address = %settings.api.listen_address, "admin API listening");

    let server_handle = server.handle();
    let stop_flag = stopping.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            stop_flag.store(true, Ordering::SeqCst);
            server_handle.stop(true).await;
        }
    });

    let served = server.await;
    stopping.store(true, Ordering::SeqCst);
    transport.abort();
    let _ = transport.await;

    Ok(served?)
}
