use crate::collector_config::LogLevel;
use crate::control_plane::ControlPlane;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LogLevelUpdateRequest {
    pub log_level: String,
}

#[derive(Debug, Serialize)]
pub struct LogLevelUpdateResponse {
    pub global_log_level: String,
    pub total_agents: usize,
    pub updated_agents: usize,
    pub failed_updates: usize,
    pub message: String,
}

/// Applies a log level to the whole fleet. Any failed agent turns the
/// answer into 206 with the counts.
pub async fn update_global_log_level(
    control: web::Data<ControlPlane>,
    body: web::Bytes,
) -> HttpResponse {
    let request: LogLevelUpdateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => return HttpResponse::BadRequest().body("Invalid request body"),
    };
    let level: LogLevel = match request.log_level.parse() {
        Ok(level) => level,
        Err(_) => return HttpResponse::BadRequest().body("Invalid log level"),
    };

    let outcome = control.broadcast_log_level(level).await;
    let status = if outcome.failed > 0 {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let message = if outcome.failed > 0 {
        format!(
            "log level applied to {} of {} agents",
            outcome.updated, outcome.total
        )
    } else {
        "log level applied to all agents".to_string()
    };

    HttpResponse::build(status).json(LogLevelUpdateResponse {
        global_log_level: level.to_string(),
        total_agents: outcome.total,
        updated_agents: outcome.updated,
        failed_updates: outcome.failed,
        message,
    })
}
