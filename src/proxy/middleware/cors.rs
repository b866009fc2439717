use axum::http::{header, HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

/// CORS policy for browser callers: any origin, the verbs the API serves,
/// and the headers clients actually send.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
}
