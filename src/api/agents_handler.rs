use crate::control_plane::ControlPlane;
use actix_web::{web, HttpResponse};

/// Lists the currently connected agents.
pub async fn list_agents(control: web::Data<ControlPlane>) -> HttpResponse {
    HttpResponse::Ok().json(control.list_agents())
}
