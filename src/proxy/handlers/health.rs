use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Local};
use serde_json::{json, Value};

use crate::proxy::client_ip::resolve_client_ip;
use crate::proxy::server::AppState;

const SERVICE_NAME: &str = "BUAA Proxy";

/// Render elapsed time since start as "N days N hours N minutes".
pub fn format_uptime(started_at: DateTime<Local>, now: DateTime<Local>) -> String {
    let elapsed = now.signed_duration_since(started_at);
    let days = elapsed.num_days();
    let hours = elapsed.num_hours() % 24;
    let minutes = elapsed.num_minutes() % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{} day{}", days, if days != 1 { "s" } else { "" }));
    }
    if hours > 0 {
        parts.push(format!("{} hour{}", hours, if hours != 1 { "s" } else { "" }));
    }
    if minutes > 0 {
        parts.push(format!(
            "{} minute{}",
            minutes,
            if minutes != 1 { "s" } else { "" }
        ));
    }

    if parts.is_empty() {
        return "0 minute".to_string();
    }
    parts.join(" ")
}

/// Service front page: status fields only, no rendered template.
pub async fn home(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    tracing::info!("home page visit - client: {}", resolve_client_ip(&headers, peer));

    let now = Local::now();
    Json(json!({
        "service": SERVICE_NAME,
        "start_time": state.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "current_time": now.format("%Y-%m-%d %H:%M:%S").to_string(),
        "uptime": format_uptime(state.started_at, now),
    }))
}

pub async fn health(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    tracing::info!("health check - client: {}", resolve_client_ip(&headers, peer));

    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": Local::now().to_rfc3339(),
        "uptime": format_uptime(state.started_at, Local::now()),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn not_found(uri: Uri) -> Response {
    tracing::warn!("request for unknown path: {}", uri.path());

    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not Found", "path": uri.path() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_uptime_zero() {
        let now = Local::now();
        assert_eq!(format_uptime(now, now), "0 minute");
    }

    #[test]
    fn test_uptime_under_a_minute_rounds_down() {
        let now = Local::now();
        assert_eq!(format_uptime(now - Duration::seconds(59), now), "0 minute");
    }

    #[test]
    fn test_uptime_singular_units() {
        let now = Local::now();
        let started = now - Duration::days(1) - Duration::hours(1) - Duration::minutes(1);
        assert_eq!(format_uptime(started, now), "1 day 1 hour 1 minute");
    }

    #[test]
    fn test_uptime_plural_units() {
        let now = Local::now();
        let started = now - Duration::days(2) - Duration::hours(3) - Duration::minutes(15);
        assert_eq!(format_uptime(started, now), "2 days 3 hours 15 minutes");
    }

    #[test]
    fn test_uptime_skips_zero_components() {
        let now = Local::now();
        let started = now - Duration::days(2) - Duration::minutes(5);
        assert_eq!(format_uptime(started, now), "2 days 5 minutes");
    }
}
