use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::proxy::client_ip::resolve_client_ip;
use crate::proxy::forwarder::value_to_string;
use crate::proxy::server::AppState;

/// Grace period before class begin during which signing in is allowed.
const SIGN_GRACE_MINUTES: i64 = 10;

/// Workflow failures. These are reported inside a success-shaped JSON body;
/// callers inspect STATUS ("1" generic failure, "2" domain rejection) rather
/// than the transport status code.
#[derive(Debug)]
pub enum WorkflowError {
    MissingParameter(&'static str),
    IdentityMismatch,
    LoginFailed(String),
    ScheduleQueryFailed(String),
    SignInFailed(String),
    BadTimeFormat,
    NotYetEligible,
}

impl WorkflowError {
    pub fn status(&self) -> &'static str {
        match self {
            Self::IdentityMismatch | Self::NotYetEligible => "2",
            _ => "1",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::MissingParameter(msg) => (*msg).to_string(),
            Self::IdentityMismatch => "姓名不符".to_string(),
            Self::LoginFailed(detail) => format!("登录失败: {}", detail),
            Self::ScheduleQueryFailed(detail) => format!("查询失败: {}", detail),
            Self::SignInFailed(detail) => format!("签到失败: {}", detail),
            Self::BadTimeFormat => "时间格式错误".to_string(),
            Self::NotYetEligible => "未到签到时间".to_string(),
        }
    }
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        Json(json!({ "STATUS": self.status(), "message": self.message() })).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    #[serde(rename = "studentId")]
    student_id: Option<String>,
    #[serde(rename = "studentName")]
    student_name: Option<String>,
    #[serde(rename = "dateStr")]
    date_str: Option<String>,
}

/// GET /api/iClassSchedule - login to iClass, cross-check the student name,
/// then fetch the day's schedule with the fresh session.
pub async fn schedule(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ScheduleQuery>,
) -> Response {
    let client_ip = resolve_client_ip(&headers, peer);

    let date_str = query
        .date_str
        .clone()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| Local::now().format("%Y%m%d").to_string());

    match run_schedule(&state, &query, &date_str, &client_ip).await {
        Ok(payload) => Json(payload).into_response(),
        Err(err) => {
            tracing::warn!(
                "schedule query failed - client: {}, reason: {}",
                client_ip,
                err.message()
            );
            err.into_response()
        }
    }
}

async fn run_schedule(
    state: &AppState,
    query: &ScheduleQuery,
    date_str: &str,
    client_ip: &str,
) -> Result<Value, WorkflowError> {
    let student_id = query
        .student_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(WorkflowError::MissingParameter("缺少学号"))?;
    let student_name = query
        .student_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(WorkflowError::MissingParameter("缺少姓名"))?;

    tracing::info!(
        "schedule query - student: {}, name: {}, date: {}, client: {}",
        student_id,
        student_name,
        date_str,
        client_ip
    );

    let login_data = state
        .iclass
        .login(student_id)
        .await
        .map_err(WorkflowError::LoginFailed)?;

    let (user_id, session_id) = match classify_login(login_data, student_name)? {
        LoginOutcome::Rejected(payload) => {
            // A rejected login keeps the upstream's own status and message.
            tracing::warn!(
                "upstream login rejected - student: {}, status: {:?}",
                student_id,
                payload.get("STATUS")
            );
            return Ok(payload);
        }
        LoginOutcome::Session {
            user_id,
            session_id,
        } => (user_id, session_id),
    };

    let schedule_data = state
        .iclass
        .fetch_schedule(&value_to_string(&user_id), &session_id, date_str)
        .await
        .map_err(WorkflowError::ScheduleQueryFailed)?;

    tracing::info!(
        "schedule query succeeded - student: {}, courses: {}",
        student_id,
        course_count(&schedule_data)
    );

    Ok(shape_schedule(schedule_data, user_id))
}

/// Outcome of classifying an upstream login payload.
#[derive(Debug)]
enum LoginOutcome {
    /// Upstream rejected the login; its payload goes back to the caller
    /// unchanged.
    Rejected(Value),
    /// Login succeeded and the returned name matched the caller's.
    Session { user_id: Value, session_id: String },
}

/// Classify the login payload: non-"0" STATUS passes through, a present but
/// different name is an identity mismatch, and a payload missing any of the
/// session fields is a login failure.
fn classify_login(login_data: Value, student_name: &str) -> Result<LoginOutcome, WorkflowError> {
    if login_data.get("STATUS").and_then(Value::as_str) != Some("0") {
        return Ok(LoginOutcome::Rejected(login_data));
    }

    let result = login_data
        .get("result")
        .ok_or_else(|| missing_login_field("result"))?;

    let real_name = result
        .get("realName")
        .and_then(Value::as_str)
        .ok_or_else(|| missing_login_field("realName"))?;
    if real_name != student_name {
        return Err(WorkflowError::IdentityMismatch);
    }

    let user_id = result
        .get("id")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| missing_login_field("id"))?;
    let session_id = result
        .get("sessionId")
        .and_then(Value::as_str)
        .ok_or_else(|| missing_login_field("sessionId"))?
        .to_string();

    Ok(LoginOutcome::Session {
        user_id,
        session_id,
    })
}

fn missing_login_field(name: &str) -> WorkflowError {
    WorkflowError::LoginFailed(format!("missing {} in login response", name))
}

fn course_count(schedule_data: &Value) -> usize {
    schedule_data
        .get("result")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Zero courses become a plain success reply with a message; otherwise the
/// payload gains the upstream user id the caller needs for sign-in.
fn shape_schedule(mut schedule_data: Value, user_id: Value) -> Value {
    if course_count(&schedule_data) == 0 {
        return json!({ "STATUS": "0", "message": "查询日期没有课程" });
    }

    if let Value::Object(map) = &mut schedule_data {
        map.insert("user_id".to_string(), user_id);
    }
    schedule_data
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    #[serde(rename = "studentId")]
    student_id: Option<Value>,
    user_id: Option<Value>,
    id: Option<Value>,
    #[serde(rename = "classBeginTime")]
    class_begin_time: Option<String>,
    #[serde(rename = "classEndTime")]
    class_end_time: Option<String>,
}

/// POST /api/iClassSign - gate on the class time window, then relay the
/// scan-sign call upstream.
pub async fn sign(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<SignRequest>,
) -> Response {
    let client_ip = resolve_client_ip(&headers, peer);

    match run_sign(&state, &body, &client_ip).await {
        Ok(payload) => Json(payload).into_response(),
        Err(err) => {
            tracing::warn!(
                "sign-in failed - client: {}, reason: {}",
                client_ip,
                err.message()
            );
            err.into_response()
        }
    }
}

async fn run_sign(
    state: &AppState,
    body: &SignRequest,
    client_ip: &str,
) -> Result<Value, WorkflowError> {
    const MISSING: WorkflowError = WorkflowError::MissingParameter("缺少参数");

    let student_id = required(&body.student_id).ok_or(MISSING)?;
    let user_id = required(&body.user_id).ok_or(MISSING)?;
    let course_id = required(&body.id).ok_or(MISSING)?;
    let begin = body
        .class_begin_time
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(MISSING)?;
    let end = body
        .class_end_time
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(MISSING)?;

    tracing::info!(
        "sign-in request - student: {}, course: {}, client: {}",
        value_to_string(student_id),
        value_to_string(course_id),
        client_ip
    );

    let now = Local::now().naive_local();
    if !sign_window_contains(begin, end, now).ok_or(WorkflowError::BadTimeFormat)? {
        return Err(WorkflowError::NotYetEligible);
    }

    let timestamp_ms = Local::now().timestamp_millis();
    let result = state
        .iclass
        .sign_in(
            &value_to_string(course_id),
            &value_to_string(user_id),
            timestamp_ms,
        )
        .await
        .map_err(WorkflowError::SignInFailed)?;

    tracing::info!(
        "sign-in completed - student: {}, course: {}, status: {:?}",
        value_to_string(student_id),
        value_to_string(course_id),
        result.get("STATUS")
    );

    Ok(result)
}

/// A field counts as present only when it carries a real value.
fn required(field: &Option<Value>) -> Option<&Value> {
    match field {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => Some(value),
    }
}

/// Whether `now` falls inside the class sign-in window: the schedule entry's
/// time-of-day re-anchored to today's date, with the grace period subtracted
/// from the start. Both bounds are inclusive. None when the times cannot be
/// parsed.
pub fn sign_window_contains(
    class_begin: &str,
    class_end: &str,
    now: NaiveDateTime,
) -> Option<bool> {
    let begin = parse_class_time(class_begin, now)?;
    let end = parse_class_time(class_end, now)?;

    let window_start = begin - Duration::minutes(SIGN_GRACE_MINUTES);
    Some(window_start <= now && now <= end)
}

/// Schedule times arrive as "YYYY-MM-DDTHH:MM:SS"; only the HH:MM part is
/// used, re-anchored to the current date.
fn parse_class_time(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let hhmm = raw.get(11..16)?;
    let time = NaiveTime::parse_from_str(hhmm, "%H:%M").ok()?;
    Some(now.date().and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const BEGIN: &str = "2025-11-10T09:00:00";
    const END: &str = "2025-11-10T09:45:00";

    fn at(hour: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 10)
            .unwrap()
            .and_hms_opt(hour, min, sec)
            .unwrap()
    }

    #[test]
    fn test_eligible_inside_window() {
        assert_eq!(sign_window_contains(BEGIN, END, at(9, 20, 0)), Some(true));
    }

    #[test]
    fn test_grace_period_boundary() {
        // window opens exactly at begin - 10min
        assert_eq!(sign_window_contains(BEGIN, END, at(8, 50, 0)), Some(true));
        assert_eq!(sign_window_contains(BEGIN, END, at(8, 51, 0)), Some(true));
        assert_eq!(sign_window_contains(BEGIN, END, at(8, 49, 59)), Some(false));
    }

    #[test]
    fn test_end_boundary_is_inclusive() {
        assert_eq!(sign_window_contains(BEGIN, END, at(9, 45, 0)), Some(true));
        assert_eq!(sign_window_contains(BEGIN, END, at(9, 45, 1)), Some(false));
    }

    #[test]
    fn test_window_reanchors_to_current_date() {
        // schedule entry dated differently from "today" still gates on time of day
        let now = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(sign_window_contains(BEGIN, END, now), Some(true));
    }

    #[test]
    fn test_unparseable_times() {
        assert_eq!(sign_window_contains("09:00", END, at(9, 0, 0)), None);
        assert_eq!(sign_window_contains(BEGIN, "bad", at(9, 0, 0)), None);
        assert_eq!(
            sign_window_contains("2025-11-10Txx:yy:00", END, at(9, 0, 0)),
            None
        );
    }

    #[test]
    fn test_required_fields() {
        assert!(required(&None).is_none());
        assert!(required(&Some(Value::Null)).is_none());
        assert!(required(&Some(Value::String(String::new()))).is_none());
        assert!(required(&Some(serde_json::json!("20231234"))).is_some());
        assert!(required(&Some(serde_json::json!(42))).is_some());
    }

    #[test]
    fn test_login_rejection_passes_payload_through() {
        let payload = json!({ "STATUS": "63", "message": "账号不存在" });
        match classify_login(payload.clone(), "张三") {
            Ok(LoginOutcome::Rejected(returned)) => assert_eq!(returned, payload),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_login_success_yields_session() {
        let payload = json!({
            "STATUS": "0",
            "result": { "realName": "张三", "id": 12345, "sessionId": "abc" }
        });
        match classify_login(payload, "张三") {
            Ok(LoginOutcome::Session { user_id, session_id }) => {
                assert_eq!(user_id, json!(12345));
                assert_eq!(session_id, "abc");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_identity_mismatch_requires_present_but_different_name() {
        let payload = json!({
            "STATUS": "0",
            "result": { "realName": "李四", "id": 1, "sessionId": "s" }
        });
        assert!(matches!(
            classify_login(payload, "张三"),
            Err(WorkflowError::IdentityMismatch)
        ));
    }

    #[test]
    fn test_malformed_login_payload_is_login_failure_not_mismatch() {
        let payloads = [
            json!({ "STATUS": "0" }),
            json!({ "STATUS": "0", "result": {} }),
            json!({ "STATUS": "0", "result": { "realName": "张三" } }),
            json!({ "STATUS": "0", "result": { "realName": "张三", "id": null, "sessionId": "s" } }),
            json!({ "STATUS": "0", "result": { "realName": "张三", "id": 1 } }),
        ];
        for payload in payloads {
            assert!(matches!(
                classify_login(payload, "张三"),
                Err(WorkflowError::LoginFailed(_))
            ));
        }
    }

    #[test]
    fn test_zero_courses_is_success_with_message() {
        let shaped = shape_schedule(json!({ "STATUS": "0", "result": [] }), json!(1));
        assert_eq!(shaped.get("STATUS").and_then(Value::as_str), Some("0"));
        assert!(shaped.get("message").and_then(Value::as_str).is_some());
        assert!(shaped.get("error").is_none());

        // same when the result key is absent entirely
        let shaped = shape_schedule(json!({ "STATUS": "0" }), json!(1));
        assert_eq!(shaped.get("STATUS").and_then(Value::as_str), Some("0"));
        assert!(shaped.get("message").and_then(Value::as_str).is_some());
    }

    #[test]
    fn test_schedule_payload_gains_user_id() {
        let shaped = shape_schedule(
            json!({ "STATUS": "0", "result": [{ "id": 7 }] }),
            json!(42),
        );
        assert_eq!(shaped.get("user_id"), Some(&json!(42)));
        assert_eq!(course_count(&shaped), 1);
    }

    #[test]
    fn test_workflow_error_status_codes() {
        assert_eq!(WorkflowError::MissingParameter("缺少参数").status(), "1");
        assert_eq!(WorkflowError::LoginFailed("x".into()).status(), "1");
        assert_eq!(WorkflowError::ScheduleQueryFailed("x".into()).status(), "1");
        assert_eq!(WorkflowError::SignInFailed("x".into()).status(), "1");
        assert_eq!(WorkflowError::BadTimeFormat.status(), "1");
        assert_eq!(WorkflowError::IdentityMismatch.status(), "2");
        assert_eq!(WorkflowError::NotYetEligible.status(), "2");
    }

    #[test]
    fn test_workflow_error_messages() {
        assert_eq!(WorkflowError::IdentityMismatch.message(), "姓名不符");
        assert_eq!(WorkflowError::NotYetEligible.message(), "未到签到时间");
        assert_eq!(
            WorkflowError::LoginFailed("timeout".into()).message(),
            "登录失败: timeout"
        );
    }
}
