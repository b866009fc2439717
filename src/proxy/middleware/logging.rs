use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// One access-log line per handled request.
pub async fn access_log_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    tracing::info!("{} {} - {}", method, path, response.status().as_u16());

    response
}
