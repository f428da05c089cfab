use crate::api::error_payload;
use crate::control_plane::ControlPlane;
use crate::registry::AgentId;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AgentConfigQuery {
    pub agent_id: String,
}

/// Fleet diagnostics: labels, connection liveness, and config sizes per
/// agent.
pub async fn debug_agents(control: web::Data<ControlPlane>) -> HttpResponse {
    HttpResponse::Ok().json(control.diagnostics())
}

/// The documents known for one agent and the log level the next push would
/// start from.
pub async fn debug_agent_config(
    control: web::Data<ControlPlane>,
    query: web::Query<AgentConfigQuery>,
) -> HttpResponse {
    let id = AgentId::new(query.into_inner().agent_id);
    match control.agent_config_report(&id) {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(err) => HttpResponse::NotFound().json(error_payload(&err)),
    }
}
