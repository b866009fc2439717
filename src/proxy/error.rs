use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Failure categories for the generic proxy endpoint. Unlike the workflow
/// endpoints these map to real HTTP status codes.
#[derive(Debug)]
pub enum ProxyError {
    /// Request body was not well-formed JSON.
    MalformedRequest,
    /// API key missing or not in the configured set.
    Unauthorized(&'static str),
    /// No target URL supplied.
    MissingTarget,
    /// Caller-supplied HTTP method that does not parse.
    InvalidMethod(String),
    /// Outbound request exceeded its deadline.
    UpstreamTimeout,
    /// Could not connect to the target.
    UpstreamUnreachable,
    /// Any other transport-level failure.
    UpstreamRequest(String),
    /// Unexpected failure outside the transport.
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest | Self::MissingTarget | Self::InvalidMethod(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamUnreachable => StatusCode::BAD_GATEWAY,
            Self::UpstreamRequest(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::MalformedRequest => "请求数据必须是JSON格式".to_string(),
            Self::Unauthorized(reason) => (*reason).to_string(),
            Self::MissingTarget => "缺少目标URL参数".to_string(),
            Self::InvalidMethod(method) => format!("无效的请求方法: {}", method),
            Self::UpstreamTimeout => "请求超时".to_string(),
            Self::UpstreamUnreachable => "连接错误".to_string(),
            Self::UpstreamRequest(detail) => format!("请求异常: {}", detail),
            Self::Internal(detail) => format!("未知错误: {}", detail),
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout
        } else if err.is_connect() {
            Self::UpstreamUnreachable
        } else {
            Self::UpstreamRequest(err.to_string())
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.message() }))).into_response()
    }
}
