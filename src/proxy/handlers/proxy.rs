use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};

use crate::proxy::client_ip::resolve_client_ip;
use crate::proxy::error::ProxyError;
use crate::proxy::forwarder::{redacted_headers, ProxyRequest};
use crate::proxy::server::AppState;

/// POST /proxy - authenticated generic forwarder. Body parsing is manual so
/// a malformed payload gets the endpoint's own error shape instead of the
/// extractor's.
pub async fn forward(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let client_ip = resolve_client_ip(&headers, peer);

    let spec: ProxyRequest = match serde_json::from_slice(&body) {
        Ok(spec) => spec,
        Err(_) => {
            tracing::warn!("malformed proxy payload - client: {}", client_ip);
            return ProxyError::MalformedRequest.into_response();
        }
    };

    if let Err(rejection) = state.api_keys.verify(spec.api_key.as_deref()) {
        tracing::warn!(
            "API key rejected - client: {}, reason: {}",
            client_ip,
            rejection.message()
        );
        return ProxyError::Unauthorized(rejection.message()).into_response();
    }

    let Some(target_url) = spec.target_url.as_deref().filter(|u| !u.is_empty()) else {
        tracing::warn!("proxy request without target URL - client: {}", client_ip);
        return ProxyError::MissingTarget.into_response();
    };
    let target_url = target_url.to_string();

    tracing::info!(
        "proxy request - method: {}, url: {}, client: {}, headers: {:?}",
        spec.method(),
        target_url,
        client_ip,
        redacted_headers(&spec.target_headers)
    );

    match state.forwarder.forward(&spec).await {
        Ok(result) => {
            tracing::info!(
                "proxy request succeeded - status: {}, url: {}",
                result.status_code,
                target_url
            );
            Json(result).into_response()
        }
        Err(err) => {
            tracing::error!(
                "proxy request failed - url: {}, client: {}, error: {}",
                target_url,
                client_ip,
                err.message()
            );
            err.into_response()
        }
    }
}
