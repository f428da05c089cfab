use crate::collector_config;
use actix_web::{web, HttpResponse};
use tracing::info;

/// Accepts an operator-supplied configuration document, re-emits it as YAML
/// and content-addresses it.
pub async fn receive_config(body: web::Bytes) -> HttpResponse {
    let document: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(document) => document,
        Err(_) => return HttpResponse::BadRequest().body("Invalid JSON format"),
    };

    let yaml = match serde_yaml::to_string(&document) {
        Ok(yaml) => yaml,
        Err(_) => return HttpResponse::InternalServerError().body("Failed to convert JSON to YAML"),
    };
    let hash = collector_config::hash(yaml.as_bytes());
    info!(config_hash = %hash, bytes = yaml.len(), "configuration document received");

    HttpResponse::Ok().body("Configuration received successfully")
}
