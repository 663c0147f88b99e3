//! 控制台报告 API 客户端
//!
//! 通过已登录页面内的 fetch 调用 generate / get 两个接口

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::Browser;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::JobError;
use crate::infrastructure::JsExecutor;
use crate::models::{JobHandle, PollOutcome};

const GENERATE_ENDPOINT: &str = "/iam/service/iamadminproxy/GenerateServiceLastAccessedDetails";
const GET_DETAILS_ENDPOINT: &str = "/iam/service/iamadminproxy/GetServiceLastAccessedDetails";

/// 报告任务接口
///
/// 生产实现是 [`ConsoleClient`]；测试里用脚本化的实现代替。
#[async_trait]
pub trait ReportApi: Send + Sync + 'static {
    /// 为一个标识符提交 generate 请求，返回任务句柄
    async fn submit_job(&self, identifier: &str) -> Result<JobHandle, JobError>;

    /// 查询一次任务状态
    async fn poll_job(&self, handle: &JobHandle) -> Result<PollOutcome, JobError>;
}

/// 页面内 fetch 的统一返回格式
#[derive(Debug, Deserialize)]
struct FetchEnvelope {
    ok: bool,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    body: JsonValue,
    #[serde(default)]
    error: Option<String>,
}

/// 控制台客户端
///
/// 持有浏览器（保证会话存活）、执行器和本次运行的 CSRF 令牌。
/// 在途请求数由信号量限制。
pub struct ConsoleClient {
    _browser: Arc<Browser>,
    executor: JsExecutor,
    csrf_token: Option<String>,
    limiter: Arc<Semaphore>,
}

impl ConsoleClient {
    pub fn new(
        browser: Browser,
        executor: JsExecutor,
        csrf_token: Option<String>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            _browser: Arc::new(browser),
            executor,
            csrf_token,
            limiter: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// 发送一次 POST，返回响应体；失败时返回可读的原因
    async fn post(&self, endpoint: &str, body: &JsonValue) -> Result<JsonValue, String> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| format!("请求限流器已关闭: {}", e))?;

        let script = build_request_script(endpoint, body, self.csrf_token.as_deref());
        let envelope: FetchEnvelope = self
            .executor
            .eval_as(script)
            .await
            .map_err(|e| e.to_string())?;

        interpret_envelope(envelope)
    }
}

#[async_trait]
impl ReportApi for ConsoleClient {
    async fn submit_job(&self, identifier: &str) -> Result<JobHandle, JobError> {
        debug!("[{}] 提交 generate 请求", identifier);
        let body = self
            .post(GENERATE_ENDPOINT, &json!({ "arn": identifier }))
            .await
            .map_err(|reason| JobError::Submission { reason })?;
        JobHandle::from_submit_response(&body)
    }

    async fn poll_job(&self, handle: &JobHandle) -> Result<PollOutcome, JobError> {
        debug!("查询任务状态: {}", handle);
        let body = self
            .post(GET_DETAILS_ENDPOINT, &json!({ "jobID": handle.as_str() }))
            .await
            .map_err(|reason| JobError::PollTransport { reason })?;
        PollOutcome::from_response(&body)
    }
}

fn interpret_envelope(envelope: FetchEnvelope) -> Result<JsonValue, String> {
    if let Some(err) = envelope.error {
        return Err(format!("网络请求失败: {}", err));
    }
    if !envelope.ok {
        return Err(format!(
            "HTTP {}: {}",
            envelope.status,
            truncate(&envelope.body.to_string(), 500)
        ));
    }
    Ok(envelope.body)
}

fn truncate(text: &str, max_len: usize) -> String {
    crate::utils::logging::truncate_text(text, max_len)
}

/// 构建页面内执行的 fetch 脚本
///
/// 所有动态值都以 JSON 字面量嵌入，避免拼接出错。
fn build_request_script(endpoint: &str, body: &JsonValue, csrf_token: Option<&str>) -> String {
    let url = JsonValue::from(endpoint);
    let csrf = csrf_token.map_or(JsonValue::Null, JsonValue::from);
    format!(
        r#"
        (async () => {{
            try {{
                const headers = {{
                    "Content-Type": "application/json",
                    "Accept": "application/json, text/plain, */*"
                }};
                const csrf = {csrf};
                if (csrf !== null) {{
                    headers["X-CSRF-Token"] = csrf;
                }}
                const res = await fetch({url}, {{
                    method: "POST",
                    headers: headers,
                    credentials: "include",
                    body: JSON.stringify({body})
                }});
                const text = await res.text();
                let data = null;
                try {{
                    data = JSON.parse(text);
                }} catch (_) {{
                    data = text;
                }}
                return {{ ok: res.ok, status: res.status, body: data, error: null }};
            }} catch (err) {{
                return {{ ok: false, status: 0, body: null, error: String(err) }};
            }}
        }})()
        "#,
        csrf = csrf,
        url = url,
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_embeds_values_as_json_literals() {
        let script = build_request_script(
            GENERATE_ENDPOINT,
            &json!({"arn": "arn:aws:iam::1:role/\"quoted\""}),
            Some("tok"),
        );
        assert!(script.contains(r#"const csrf = "tok";"#));
        assert!(script.contains(
            r#"fetch("/iam/service/iamadminproxy/GenerateServiceLastAccessedDetails""#
        ));
        assert!(script.contains(r#"{"arn":"arn:aws:iam::1:role/\"quoted\""}"#));
        assert!(script.contains(r#"credentials: "include""#));
    }

    #[test]
    fn test_script_without_csrf() {
        let script = build_request_script(GET_DETAILS_ENDPOINT, &json!({"jobID": "j"}), None);
        assert!(script.contains("const csrf = null;"));
    }

    #[test]
    fn test_interpret_envelope() {
        let ok = FetchEnvelope {
            ok: true,
            status: 200,
            body: json!({"jobID": "1"}),
            error: None,
        };
        assert_eq!(interpret_envelope(ok).unwrap(), json!({"jobID": "1"}));

        let http_err = FetchEnvelope {
            ok: false,
            status: 403,
            body: json!("denied"),
            error: None,
        };
        let reason = interpret_envelope(http_err).unwrap_err();
        assert!(reason.starts_with("HTTP 403"), "{reason}");

        let net_err = FetchEnvelope {
            ok: false,
            status: 0,
            body: JsonValue::Null,
            error: Some("TypeError: Failed to fetch".into()),
        };
        assert!(interpret_envelope(net_err).unwrap_err().contains("Failed to fetch"));
    }

    #[test]
    fn test_envelope_deserializes_from_script_shape() {
        let envelope: FetchEnvelope =
            serde_json::from_value(json!({"ok": true, "status": 200, "body": {"a": 1}, "error": null}))
                .unwrap();
        assert!(envelope.ok);
        assert_eq!(envelope.body, json!({"a": 1}));
        assert!(envelope.error.is_none());
    }
}
