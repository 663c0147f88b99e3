//! 任务模型
//!
//! 单个标识符的状态机、任务句柄，以及控制台响应的解析

use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::error::JobError;

/// 标识符（例如 IAM ARN），在一个批次内唯一
pub type Identifier = String;

/// 任务完成后的报告内容
pub type ResultPayload = JsonValue;

/// 单个标识符的任务状态
///
/// ```text
/// NOT_STARTED ──> IN_PROGRESS ──> COMPLETE
///      │              │  ↺
///      └──────────────┴──────> ERROR
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    NotStarted,
    InProgress,
    Complete,
    Error,
}

impl JobStatus {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// 状态迁移是否合法
    ///
    /// 终态之后不允许任何迁移；`IN_PROGRESS` 可以自迁移（再次轮询）。
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (NotStarted, InProgress)
                | (NotStarted, Error)
                | (InProgress, InProgress)
                | (InProgress, Complete)
                | (InProgress, Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::NotStarted => "NOT_STARTED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// generate 接口返回的任务句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 从 generate 响应中取出 `jobID`
    pub fn from_submit_response(body: &JsonValue) -> Result<Self, JobError> {
        match body.get("jobID").and_then(|v| v.as_str()) {
            Some(id) if !id.trim().is_empty() => Ok(Self::new(id)),
            _ => Err(JobError::Submission {
                reason: format!("响应中没有 jobID: {}", body),
            }),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一次轮询的结果
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// 仍在运行
    Running,
    /// 后端报告失败，附带原始响应
    Failed(JsonValue),
    /// 成功，附带报告内容
    Succeeded(ResultPayload),
}

const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
const STATUS_FAILED: &str = "FAILED";

impl PollOutcome {
    /// 解析 GetServiceLastAccessedDetails 的响应
    ///
    /// 除 `IN_PROGRESS` 和 `FAILED` 之外的任何状态都视为成功。
    pub fn from_response(body: &JsonValue) -> Result<Self, JobError> {
        let status = body
            .get("jobStatus")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JobError::PollTransport {
                reason: format!("响应中没有 jobStatus: {}", body),
            })?;

        match status {
            STATUS_IN_PROGRESS => Ok(PollOutcome::Running),
            STATUS_FAILED => Ok(PollOutcome::Failed(body.clone())),
            _ => {
                let list = body
                    .pointer("/servicesLastAccessed/serviceLastAccessedList")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| JobError::PollTransport {
                        reason: format!("状态 {} 的响应缺少 serviceLastAccessedList", status),
                    })?;
                let normalized = list.iter().map(normalize_service_entry).collect();
                Ok(PollOutcome::Succeeded(JsonValue::Array(normalized)))
            }
        }
    }
}

/// 把 `lastAuthenticated` 统一成毫秒时间戳，未访问过的服务记为 0
fn normalize_service_entry(entry: &JsonValue) -> JsonValue {
    let mut entry = entry.clone();
    if let Some(obj) = entry.as_object_mut() {
        let millis = match obj.get("lastAuthenticated") {
            Some(JsonValue::Number(n)) => JsonValue::Number(n.clone()),
            Some(JsonValue::String(s)) => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => json!(dt.timestamp_millis()),
                Err(_) => JsonValue::String(s.clone()),
            },
            _ => json!(0),
        };
        obj.insert("lastAuthenticated".to_string(), millis);
    }
    entry
}
