//! Thin HTTP translation layer over the control plane. Handlers validate
//! shape, call exactly one control-plane operation, and serialize the
//! result; no business logic lives here.

pub mod agent_loglevel_handler;
pub mod agents_handler;
pub mod auth;
pub mod config_handler;
pub mod debug_handler;
pub mod loglevel_handler;

use crate::control_plane::ControlPlaneError;
use actix_web::web;
use serde::Serialize;

/// JSON shape of every control-plane failure the API surfaces.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub status: String,
    pub error: &'static str,
    pub message: String,
}

pub(crate) fn error_payload(err: &ControlPlaneError) -> ErrorPayload {
    ErrorPayload {
        status: "error".to_string(),
        error: err.kind(),
        message: err.to_string(),
    }
}

/// Admin API routes. The caller attaches the control-plane and token app
/// data plus the [`auth::require_token`] middleware at the `App` level.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/config", web::post().to(config_handler::receive_config))
            .route(
                "/loglevel",
                web::put().to(loglevel_handler::update_global_log_level),
            )
            .route(
                "/agent/loglevel",
                web::put().to(agent_loglevel_handler::update_agent_log_level),
            )
            .route("/agents", web::get().to(agents_handler::list_agents))
            .route("/debug/agents", web::get().to(debug_handler::debug_agents))
            .route(
                "/debug/agent-config",
                web::get().to(debug_handler::debug_agent_config),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::auth::{require_token, ApiToken};
    use super::routes;
    use crate::collector_config;
    use crate::control_plane::ControlPlane;
    use crate::registry::connection::tests::RecordingConnection;
    use crate::registry::{AgentConnection, AgentId, AgentRecord, AgentRegistry};
    use actix_web::body::MessageBody;
    use actix_web::dev::ServiceResponse;
    use actix_web::http::StatusCode;
    use actix_web::middleware::from_fn;
    use actix_web::test;
    use actix_web::web::Data;
    use actix_web::App;
    use serde_json::json;
    use std::sync::Arc;

    const TOKEN: &str = "secret-token";

    macro_rules! admin_api {
        ($control:expr) => {
            test::init_service(
                App::new()
                    .app_data(Data::from($control))
                    .app_data(Data::new(ApiToken::new(TOKEN)))
                    .wrap(from_fn(require_token))
                    .configure(routes),
            )
            .await
        };
    }

    fn registry_with(
        agents: Vec<(&str, Arc<RecordingConnection>)>,
    ) -> Arc<AgentRegistry> {
        let registry = Arc::new(AgentRegistry::new());
        for (id, connection) in agents {
            registry.register(AgentRecord::new(
                AgentId::new(id),
                "192.0.2.1",
                connection as Arc<dyn AgentConnection>,
            ));
        }
        registry
    }

    async fn body_string<B: MessageBody>(resp: ServiceResponse<B>) -> String {
        String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
    }

    #[actix_web::test]
    async fn test_request_without_token_is_unauthorized() {
        let app = admin_api!(Arc::new(ControlPlane::new(registry_with(vec![]))));

        let req = test::TestRequest::get().uri("/api/agents").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::UNAUTHORIZED, resp.status());
        assert_eq!("Unauthorized", body_string(resp).await);
    }

    #[actix_web::test]
    async fn test_request_with_wrong_token_is_unauthorized() {
        let app = admin_api!(Arc::new(ControlPlane::new(registry_with(vec![]))));

        let req = test::TestRequest::get()
            .uri("/api/agents")
            .insert_header(("Authorization", "nope"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::UNAUTHORIZED, resp.status());
    }

    #[actix_web::test]
    async fn test_empty_configured_token_rejects_all() {
        let control = Arc::new(ControlPlane::new(registry_with(vec![])));
        let app = test::init_service(
            App::new()
                .app_data(Data::from(control))
                .app_data(Data::new(ApiToken::new("")))
                .wrap(from_fn(require_token))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/agents")
            .insert_header(("Authorization", ""))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::UNAUTHORIZED, resp.status());
    }

    #[actix_web::test]
    async fn test_list_agents() {
        let registry = registry_with(vec![("a1", Arc::new(RecordingConnection::new()))]);
        let app = admin_api!(Arc::new(ControlPlane::new(registry)));

        let req = test::TestRequest::get()
            .uri("/api/agents")
            .insert_header(("Authorization", TOKEN))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::OK, resp.status());
        let agents: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(
            json!([{"agent_id": "a1", "ip_address": "192.0.2.1", "status": "active"}]),
            agents
        );
    }

    #[actix_web::test]
    async fn test_agent_log_level_unknown_agent() {
        let app = admin_api!(Arc::new(ControlPlane::new(registry_with(vec![]))));

        let req = test::TestRequest::put()
            .uri("/api/agent/loglevel")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({"agent_id": "x", "log_level": "warn"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, resp.status());
        let body = body_string(resp).await;
        assert!(body.contains("agent x not found"), "body: {body}");
    }

    #[actix_web::test]
    async fn test_agent_log_level_pushes_config() {
        let connection = Arc::new(RecordingConnection::new());
        let registry = registry_with(vec![("a1", connection.clone())]);
        let app = admin_api!(Arc::new(ControlPlane::new(registry.clone())));

        let req = test::TestRequest::put()
            .uri("/api/agent/loglevel")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({
                "agent_id": "a1",
                "ip_address": "203.0.113.9",
                "location": "eu-west",
                "log_level": "debug"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::OK, resp.status());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!("success", body["status"]);
        assert_eq!("a1", body["agent_id"]);
        assert_eq!("debug", body["log_level"]);

        // Exactly one push whose document carries the new level and whose
        // hash covers exactly the pushed bytes.
        let sent = connection.sent();
        assert_eq!(1, sent.len());
        let remote_config = sent[0].remote_config.as_ref().unwrap();
        let file = &remote_config.config.as_ref().unwrap().config_map["collector"];
        let pushed = String::from_utf8(file.body.clone()).unwrap();
        assert_eq!("debug", collector_config::log_level_of(&pushed).unwrap());
        assert_eq!(
            collector_config::hash(pushed.as_bytes()).to_vec(),
            remote_config.config_hash
        );

        let record = registry.get(&AgentId::new("a1")).unwrap();
        assert_eq!(pushed, record.last_sent_config);
        assert_eq!("203.0.113.9", record.ip);
        assert_eq!("eu-west", record.location);
    }

    #[actix_web::test]
    async fn test_agent_log_level_builds_on_effective_config() {
        let connection = Arc::new(RecordingConnection::new());
        let registry = registry_with(vec![("a2", connection.clone())]);
        registry
            .set_effective_config(
                &AgentId::new("a2"),
                "service:\n  telemetry:\n    logs:\n      level: info\nreceivers: {x: {}}\n",
            )
            .unwrap();
        let app = admin_api!(Arc::new(ControlPlane::new(registry)));

        let req = test::TestRequest::put()
            .uri("/api/agent/loglevel")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({"agent_id": "a2", "log_level": "error"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::OK, resp.status());
        let file = connection.sent()[0]
            .remote_config
            .as_ref()
            .unwrap()
            .config
            .as_ref()
            .unwrap()
            .config_map["collector"]
            .clone();
        let pushed = String::from_utf8(file.body).unwrap();
        assert_eq!("error", collector_config::log_level_of(&pushed).unwrap());
        let root: serde_yaml::Value = serde_yaml::from_str(&pushed).unwrap();
        assert!(root.get("receivers").unwrap().get("x").is_some());
    }

    #[actix_web::test]
    async fn test_agent_log_level_invalid_level() {
        let app = admin_api!(Arc::new(ControlPlane::new(registry_with(vec![]))));

        let req = test::TestRequest::put()
            .uri("/api/agent/loglevel")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({"agent_id": "a1", "log_level": "verbose"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::BAD_REQUEST, resp.status());
        assert_eq!("Invalid log level", body_string(resp).await);
    }

    #[actix_web::test]
    async fn test_global_log_level_all_agents_updated() {
        let registry = registry_with(vec![
            ("a1", Arc::new(RecordingConnection::new())),
            ("a2", Arc::new(RecordingConnection::new())),
        ]);
        let app = admin_api!(Arc::new(ControlPlane::new(registry)));

        let req = test::TestRequest::put()
            .uri("/api/loglevel")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({"log_level": "warn"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::OK, resp.status());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!("warn", body["global_log_level"]);
        assert_eq!(2, body["total_agents"]);
        assert_eq!(2, body["updated_agents"]);
        assert_eq!(0, body["failed_updates"]);
    }

    #[actix_web::test]
    async fn test_global_log_level_partial_failure_is_206() {
        let registry = registry_with(vec![
            ("a1", Arc::new(RecordingConnection::new())),
            ("a2", Arc::new(RecordingConnection::new())),
            ("a3", Arc::new(RecordingConnection::dead())),
        ]);
        let app = admin_api!(Arc::new(ControlPlane::new(registry)));

        let req = test::TestRequest::put()
            .uri("/api/loglevel")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({"log_level": "warn"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::PARTIAL_CONTENT, resp.status());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(3, body["total_agents"]);
        assert_eq!(2, body["updated_agents"]);
        assert_eq!(1, body["failed_updates"]);
    }

    #[actix_web::test]
    async fn test_global_log_level_invalid_level() {
        let app = admin_api!(Arc::new(ControlPlane::new(registry_with(vec![]))));

        let req = test::TestRequest::put()
            .uri("/api/loglevel")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({"log_level": "verbose"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::BAD_REQUEST, resp.status());
        assert_eq!("Invalid log level", body_string(resp).await);
    }

    #[actix_web::test]
    async fn test_receive_config() {
        let app = admin_api!(Arc::new(ControlPlane::new(registry_with(vec![]))));

        let req = test::TestRequest::post()
            .uri("/api/config")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({"exporters": {"otlphttp": {"endpoint": "http://example"}}}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::OK, resp.status());
        assert_eq!("Configuration received successfully", body_string(resp).await);
    }

    #[actix_web::test]
    async fn test_receive_config_rejects_non_json() {
        let app = admin_api!(Arc::new(ControlPlane::new(registry_with(vec![]))));

        let req = test::TestRequest::post()
            .uri("/api/config")
            .insert_header(("Authorization", TOKEN))
            .set_payload("not json at all")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::BAD_REQUEST, resp.status());
        assert_eq!("Invalid JSON format", body_string(resp).await);
    }

    #[actix_web::test]
    async fn test_debug_agents() {
        let registry = registry_with(vec![("a1", Arc::new(RecordingConnection::dead()))]);
        let app = admin_api!(Arc::new(ControlPlane::new(registry)));

        let req = test::TestRequest::get()
            .uri("/api/debug/agents")
            .insert_header(("Authorization", TOKEN))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::OK, resp.status());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!("a1", body[0]["agent_id"]);
        assert_eq!(false, body[0]["connection_alive"]);
    }

    #[actix_web::test]
    async fn test_debug_agent_config_known_agent() {
        let registry = registry_with(vec![("a1", Arc::new(RecordingConnection::new()))]);
        let app = admin_api!(Arc::new(ControlPlane::new(registry)));

        let req = test::TestRequest::get()
            .uri("/api/debug/agent-config?agent_id=a1")
            .insert_header(("Authorization", TOKEN))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::OK, resp.status());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!("a1", body["agent_id"]);
        assert_eq!("default", body["source"]);
        assert_eq!("info", body["resolved_log_level"]);
    }

    #[actix_web::test]
    async fn test_debug_agent_config_unknown_agent() {
        let app = admin_api!(Arc::new(ControlPlane::new(registry_with(vec![]))));

        let req = test::TestRequest::get()
            .uri("/api/debug/agent-config?agent_id=ghost")
            .insert_header(("Authorization", TOKEN))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(StatusCode::NOT_FOUND, resp.status());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!("agent ghost not found", body["message"]);
    }
}
