use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::HttpResponse;

/// Token every admin request must present verbatim in the `Authorization`
/// header. An empty token locks the API down entirely.
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads `AUTH_TOKEN`; a missing variable behaves like an empty token.
    pub fn from_env() -> Self {
        Self(std::env::var("AUTH_TOKEN").unwrap_or_default())
    }

    fn authorizes(&self, presented: Option<&str>) -> bool {
        !self.0.is_empty() && presented == Some(self.0.as_str())
    }
}

pub async fn require_token(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let authorized = req
        .app_data::<Data<ApiToken>>()
        .is_some_and(|token| token.authorizes(presented));

    if !authorized {
        return Ok(req.into_response(HttpResponse::Unauthorized().body("Unauthorized")));
    }
    next.call(req).await
}
