use reqwest::Client;
use serde_json::Value;
use tokio::time::Duration;

const LOGIN_URL: &str = "https://iclass.buaa.edu.cn:8346/app/user/login.action";
const SCHEDULE_URL: &str =
    "https://iclass.buaa.edu.cn:8346/app/course/get_stu_course_sched.action";
// Sign-in goes through the plain-HTTP port of the same service.
const SIGN_URL: &str = "http://iclass.buaa.edu.cn:8081/app/course/stu_scan_sign.action";

const UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Client for the fixed iClass upstream. One blocking-style call per step,
/// no retries; the session id produced by login travels with the caller,
/// never in server-side state.
pub struct IClassClient {
    http: Client,
}

impl IClassClient {
    pub fn new() -> Self {
        // The iClass host serves a certificate the default store rejects;
        // verification is relaxed for this one known upstream.
        let http = Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()
            .expect("failed to create iClass HTTP client");

        Self { http }
    }

    /// Log in with the student id alone; this upstream verification type
    /// takes an empty password.
    pub async fn login(&self, student_id: &str) -> Result<Value, String> {
        let response = self
            .http
            .get(LOGIN_URL)
            .query(&[
                ("password", ""),
                ("phone", student_id),
                ("userLevel", "1"),
                ("verificationType", "2"),
                ("verificationUrl", ""),
            ])
            .send()
            .await
            .map_err(|e| format!("login request failed: {}", e))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("parse login response failed: {}", e))
    }

    /// Fetch the day's course schedule; the session id rides in a header,
    /// the user id and date as query parameters.
    pub async fn fetch_schedule(
        &self,
        user_id: &str,
        session_id: &str,
        date_str: &str,
    ) -> Result<Value, String> {
        let response = self
            .http
            .get(SCHEDULE_URL)
            .query(&[("dateStr", date_str), ("id", user_id)])
            .header("sessionId", session_id)
            .send()
            .await
            .map_err(|e| format!("schedule request failed: {}", e))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("parse schedule response failed: {}", e))
    }

    /// Scan-sign into a course session with a millisecond timestamp.
    pub async fn sign_in(
        &self,
        course_id: &str,
        user_id: &str,
        timestamp_ms: i64,
    ) -> Result<Value, String> {
        let response = self
            .http
            .post(SIGN_URL)
            .query(&[
                ("courseSchedId", course_id),
                ("timestamp", timestamp_ms.to_string().as_str()),
                ("id", user_id),
            ])
            .send()
            .await
            .map_err(|e| format!("sign request failed: {}", e))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("parse sign response failed: {}", e))
    }
}

impl Default for IClassClient {
    fn default() -> Self {
        Self::new()
    }
}
