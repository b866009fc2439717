use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Headers that may carry the originating client address, highest trust
/// first (CDN-origin headers before generic forwarding headers).
const IP_HEADERS: [&str; 8] = [
    "CF-Connecting-IP",
    "True-Client-IP",
    "X-Client-IP",
    "X-Real-IP",
    "X-Forwarded-For",
    "X-Cluster-Client-IP",
    "Forwarded-For",
    "Forwarded",
];

/// Best-effort client address: first usable candidate from the priority
/// headers, otherwise the socket peer address. Always produces a value.
pub fn resolve_client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    for name in IP_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };

        for candidate in value.split(',') {
            let candidate = candidate.trim();
            if !candidate.is_empty() && !candidate.eq_ignore_ascii_case("unknown") {
                return candidate.to_string();
            }
        }
    }

    peer.ip().to_string()
}
