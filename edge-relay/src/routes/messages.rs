use crate::error::AppError;
use crate::state::RelayState;
use actix_web::{get, http::StatusCode, web, HttpRequest, HttpResponse};

/// History proxy: forwards the request to the origin gateway, turning the
/// `access_token` cookie into a bearer header on the way.
#[get("/chat/messages/{peer_id}")]
pub async fn messages_proxy(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<RelayState>,
) -> Result<HttpResponse, AppError> {
    let peer_id = path.into_inner();

    let mut upstream = state
        .http
        .get(state.config.origin_messages_url(&peer_id))
        .timeout(state.config.upstream_timeout);

    if let Some(cookie) = req.cookie("access_token") {
        upstream = upstream.bearer_auth(cookie.value());
    }

    let response = upstream
        .send()
        .await
        .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = response
        .bytes()
        .await
        .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

    Ok(HttpResponse::build(status)
        .content_type("application/json")
        .body(body))
}
