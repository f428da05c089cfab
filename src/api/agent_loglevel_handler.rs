use crate::api::error_payload;
use crate::collector_config::LogLevel;
use crate::control_plane::ControlPlane;
use crate::registry::AgentId;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AgentLogLevelUpdateRequest {
    pub agent_id: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub log_level: String,
}

#[derive(Debug, Serialize)]
pub struct AgentLogLevelUpdateResponse {
    pub status: String,
    pub agent_id: String,
    pub log_level: String,
    pub message: String,
}

/// Retargets one agent's logging verbosity, refreshing its labels on the
/// way when the request carries them.
pub async fn update_agent_log_level(
    control: web::Data<ControlPlane>,
    body: web::Bytes,
) -> HttpResponse {
    let request: AgentLogLevelUpdateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => return HttpResponse::BadRequest().body("Invalid request body"),
    };
    let level: LogLevel = match request.log_level.parse() {
        Ok(level) => level,
        Err(_) => return HttpResponse::BadRequest().body("Invalid log level"),
    };

    let id = AgentId::new(request.agent_id.clone());
    if request.ip_address.is_some() || request.location.is_some() {
        if let Err(err) =
            control.update_labels(&id, request.ip_address.as_deref(), request.location.as_deref())
        {
            return HttpResponse::InternalServerError().json(error_payload(&err));
        }
    }

    if let Err(err) = control.apply_log_level(&id, level).await {
        return HttpResponse::InternalServerError().json(error_payload(&err));
    }

    HttpResponse::Ok().json(AgentLogLevelUpdateResponse {
        status: "success".to_string(),
        agent_id: request.agent_id,
        log_level: level.to_string(),
        message: "agent log level updated".to_string(),
    })
}
