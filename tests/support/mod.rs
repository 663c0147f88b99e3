#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use console_report_batch::error::SessionError;
use console_report_batch::{
    AppResult, BatchSettings, JobError, JobHandle, PollOutcome, ReportApi, SessionProvider,
};
use serde_json::Value;

/// 按标识符预设 generate 结果、按句柄预设轮询序列的 API
///
/// 轮询序列用完后重复最后一个结果；没有预设的句柄一直返回 Running。
#[derive(Clone, Default)]
pub struct ScriptedApi {
    inner: Arc<ScriptedInner>,
}

#[derive(Default)]
struct ScriptedInner {
    submits: Mutex<HashMap<String, Result<JobHandle, JobError>>>,
    polls: Mutex<HashMap<String, VecDeque<Result<PollOutcome, JobError>>>>,
    stalled_submits: Mutex<HashSet<String>>,
    stalled_polls: Mutex<HashSet<String>>,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// generate 返回 `job-<identifier>`，并按顺序返回给定的轮询结果
    pub fn job(self, identifier: &str, polls: Vec<Result<PollOutcome, JobError>>) -> Self {
        let handle = JobHandle::new(format!("job-{}", identifier));
        self.inner
            .polls
            .lock()
            .unwrap()
            .insert(handle.as_str().to_string(), polls.into());
        self.inner
            .submits
            .lock()
            .unwrap()
            .insert(identifier.to_string(), Ok(handle));
        self
    }

    /// 提交后立即完成
    pub fn completes(self, identifier: &str, payload: Value) -> Self {
        self.job(identifier, vec![Ok(PollOutcome::Succeeded(payload))])
    }

    /// generate 直接失败
    pub fn rejects(self, identifier: &str, reason: &str) -> Self {
        self.inner.submits.lock().unwrap().insert(
            identifier.to_string(),
            Err(JobError::Submission {
                reason: reason.to_string(),
            }),
        );
        self
    }

    /// 任务永远停留在 IN_PROGRESS
    pub fn hangs(self, identifier: &str) -> Self {
        self.job(identifier, vec![Ok(PollOutcome::Running)])
    }

    /// generate 请求永远不返回
    pub fn stalls_on_submit(self, identifier: &str) -> Self {
        self.inner
            .stalled_submits
            .lock()
            .unwrap()
            .insert(identifier.to_string());
        self
    }

    /// 提交成功，但轮询请求永远不返回
    pub fn stalls_on_poll(self, identifier: &str) -> Self {
        let this = self.job(identifier, Vec::new());
        this.inner
            .stalled_polls
            .lock()
            .unwrap()
            .insert(format!("job-{}", identifier));
        this
    }

    pub fn submit_calls(&self) -> usize {
        self.inner.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.inner.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportApi for ScriptedApi {
    async fn submit_job(&self, identifier: &str) -> Result<JobHandle, JobError> {
        self.inner.submit_calls.fetch_add(1, Ordering::SeqCst);
        let stalled = self.inner.stalled_submits.lock().unwrap().contains(identifier);
        if stalled {
            return pending().await;
        }
        self.inner
            .submits
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| {
                Err(JobError::Submission {
                    reason: format!("unscripted identifier {}", identifier),
                })
            })
    }

    async fn poll_job(&self, handle: &JobHandle) -> Result<PollOutcome, JobError> {
        self.inner.poll_calls.fetch_add(1, Ordering::SeqCst);
        let stalled = self.inner.stalled_polls.lock().unwrap().contains(handle.as_str());
        if stalled {
            return pending().await;
        }
        let mut polls = self.inner.polls.lock().unwrap();
        match polls.get_mut(handle.as_str()) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Ok(PollOutcome::Running)),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(PollOutcome::Running)),
            None => Ok(PollOutcome::Running),
        }
    }
}

/// 返回固定 API 的会话提供者，可以模拟登录失败
pub struct MockSession {
    api: ScriptedApi,
    reject_login: bool,
    establish_calls: AtomicUsize,
}

impl MockSession {
    pub fn accepting(api: ScriptedApi) -> Self {
        Self {
            api,
            reject_login: false,
            establish_calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(api: ScriptedApi) -> Self {
        Self {
            api,
            reject_login: true,
            establish_calls: AtomicUsize::new(0),
        }
    }

    pub fn establish_calls(&self) -> usize {
        self.establish_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for MockSession {
    type Api = ScriptedApi;

    async fn establish(&self) -> AppResult<ScriptedApi> {
        self.establish_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_login {
            return Err(SessionError::LoginRejected {
                landing_url: "https://signin.aws.amazon.com/federation".to_string(),
            }
            .into());
        }
        Ok(self.api.clone())
    }
}

pub const PERIOD: Duration = Duration::from_secs(10);

pub fn unbounded() -> BatchSettings {
    BatchSettings::unbounded(PERIOD)
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
