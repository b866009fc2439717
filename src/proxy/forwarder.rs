use std::collections::HashMap;
use std::time::Instant;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Duration;

use crate::proxy::error::ProxyError;

const FORWARD_TIMEOUT_SECS: u64 = 30;

/// Caller-supplied description of the request to forward.
#[derive(Debug, Default, Deserialize)]
pub struct ProxyRequest {
    #[serde(rename = "API_KEY", default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub target_method: Option<String>,
    #[serde(default)]
    pub target_headers: HashMap<String, String>,
    #[serde(default)]
    pub target_params: HashMap<String, Value>,
    #[serde(default)]
    pub target_data: Option<String>,
    #[serde(default)]
    pub target_json_data: Option<Value>,
}

impl ProxyRequest {
    pub fn method(&self) -> String {
        self.target_method
            .as_deref()
            .unwrap_or("GET")
            .to_ascii_uppercase()
    }
}

/// Classified upstream response handed back to the caller.
#[derive(Debug, Serialize)]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub content: String,
    pub is_base64: bool,
    pub url: String,
    pub elapsed: String,
    pub timestamp: String,
}

/// Dispatches arbitrary caller-described requests. Certificate verification
/// stays on unless the target host is explicitly trusted.
pub struct Forwarder {
    verified: Client,
    relaxed: Client,
    trusted_hosts: Vec<String>,
}

impl Forwarder {
    pub fn new(trusted_hosts: Vec<String>) -> Self {
        let verified = Client::builder()
            .timeout(Duration::from_secs(FORWARD_TIMEOUT_SECS))
            .build()
            .expect("failed to create HTTP client");

        let relaxed = Client::builder()
            .timeout(Duration::from_secs(FORWARD_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()
            .expect("failed to create HTTP client");

        Self {
            verified,
            relaxed,
            trusted_hosts,
        }
    }

    fn client_for(&self, target_url: &str) -> &Client {
        let host = Url::parse(target_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        match host {
            Some(host) if self.trusted_hosts.iter().any(|t| *t == host) => &self.relaxed,
            _ => &self.verified,
        }
    }

    pub async fn forward(&self, spec: &ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let target_url = spec
            .target_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ProxyError::MissingTarget)?;

        let method_name = spec.method();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| ProxyError::InvalidMethod(method_name.clone()))?;

        let mut request = self.client_for(target_url).request(method, target_url);

        for (name, value) in &spec.target_headers {
            request = request.header(name, value);
        }

        if !spec.target_params.is_empty() {
            let params: Vec<(String, String)> = spec
                .target_params
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect();
            request = request.query(&params);
        }

        if let Some(data) = &spec.target_data {
            request = request.body(data.clone());
        }
        if let Some(json_data) = &spec.target_json_data {
            request = request.json(json_data);
        }

        let started = Instant::now();
        let response = request.send().await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = flatten_headers(response.headers());
        let content_type = headers.get("content-type").cloned().unwrap_or_default();

        let bytes = response.bytes().await?;
        let elapsed = started.elapsed();

        let (content, is_base64) = if is_binary_content(&content_type) {
            (BASE64.encode(&bytes), true)
        } else {
            (String::from_utf8_lossy(&bytes).into_owned(), false)
        };

        Ok(ProxyResponse {
            status_code,
            headers,
            content,
            is_base64,
            url: final_url,
            elapsed: format!("{:?}", elapsed),
            timestamp: chrono::Local::now().to_rfc3339(),
        })
    }
}

fn flatten_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Bodies of these content types are shipped back as base64 rather than text.
pub fn is_binary_content(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("image") || ct.contains("octet-stream")
}

/// Render a JSON value into a query-parameter string; bare strings lose
/// their quotes, everything else keeps its JSON form.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Header map for logging, with credential-bearing entries removed.
pub fn redacted_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.to_ascii_lowercase();
            name != "authorization" && name != "cookie"
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_binary_content() {
        assert!(is_binary_content("image/png"));
        assert!(is_binary_content("IMAGE/JPEG"));
        assert!(is_binary_content("application/octet-stream"));
        assert!(is_binary_content("application/octet-stream; charset=binary"));
        assert!(!is_binary_content("text/html; charset=utf-8"));
        assert!(!is_binary_content("application/json"));
        assert!(!is_binary_content(""));
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("abc")), "abc");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(true)), "true");
    }

    #[test]
    fn test_redacted_headers_removes_credentials() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer secret".to_string());
        headers.insert("Cookie".to_string(), "session=abc".to_string());
        headers.insert("X-Trace".to_string(), "1".to_string());

        let safe = redacted_headers(&headers);
        assert_eq!(safe.len(), 1);
        assert_eq!(safe.get("X-Trace").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_redacted_headers_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("AUTHORIZATION".to_string(), "x".to_string());
        headers.insert("cookie".to_string(), "y".to_string());
        assert!(redacted_headers(&headers).is_empty());
    }

    #[test]
    fn test_spec_defaults() {
        let spec: ProxyRequest = serde_json::from_str(r#"{"target_url":"http://a"}"#).unwrap();
        assert_eq!(spec.method(), "GET");
        assert!(spec.target_headers.is_empty());
        assert!(spec.target_params.is_empty());
        assert!(spec.target_data.is_none());
        assert!(spec.target_json_data.is_none());
    }

    #[test]
    fn test_method_is_uppercased() {
        let spec: ProxyRequest =
            serde_json::from_str(r#"{"target_url":"http://a","target_method":"post"}"#).unwrap();
        assert_eq!(spec.method(), "POST");
    }

    #[tokio::test]
    async fn test_unparseable_method_is_a_caller_error() {
        let forwarder = Forwarder::new(Vec::new());
        let spec: ProxyRequest = serde_json::from_str(
            r#"{"target_url":"http://example.invalid/","target_method":"GE T"}"#,
        )
        .unwrap();

        match forwarder.forward(&spec).await {
            Err(ProxyError::InvalidMethod(method)) => assert_eq!(method, "GE T"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_target_rejected_before_dispatch() {
        let forwarder = Forwarder::new(Vec::new());
        let spec = ProxyRequest::default();

        assert!(matches!(
            forwarder.forward(&spec).await,
            Err(ProxyError::MissingTarget)
        ));
    }

    #[test]
    fn test_client_selection_by_trusted_host() {
        let forwarder = Forwarder::new(vec!["iclass.buaa.edu.cn".to_string()]);

        let relaxed = forwarder.client_for("https://iclass.buaa.edu.cn:8346/app/x");
        assert!(std::ptr::eq(relaxed, &forwarder.relaxed));

        let verified = forwarder.client_for("https://example.com/");
        assert!(std::ptr::eq(verified, &forwarder.verified));

        // unparseable URLs stay on the verifying client
        let fallback = forwarder.client_for("not a url");
        assert!(std::ptr::eq(fallback, &forwarder.verified));
    }
}
