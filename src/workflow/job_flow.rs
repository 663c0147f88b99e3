//! 单个标识符的任务流程 - 流程层
//!
//! 一个标识符对应一个 tokio 任务，完整负责 generate → poll → 终态：
//! 1. 提交 generate 请求，拿到任务句柄
//! 2. 每隔 PERIOD 轮询一次，上一次响应处理完才会发起下一次
//! 3. 成功 / 失败 / 超限后退出
//!
//! 每个请求都有超时，单任务截止时间覆盖整个流程，挂起的请求不会让任务停在非终态。
//!
//! 状态变化不直接改共享状态，而是以 [`JobEvent`] 发给完成监视器。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, error, info};

use crate::clients::ReportApi;
use crate::config::BatchSettings;
use crate::error::JobError;
use crate::models::{Identifier, JobHandle, JobStatus, PollOutcome, ResultPayload};
use crate::utils::logging::truncate_text;
use crate::workflow::job_ctx::JobCtx;

/// 任务流程发给监视器的事件
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub identifier: Identifier,
    pub kind: JobEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobEventKind {
    /// generate 成功，开始轮询
    Submitted(JobHandle),
    /// 轮询一次，仍在运行
    Polled { attempt: u32 },
    /// 任务完成
    Completed(ResultPayload),
    /// 终态失败
    Failed(JobError),
}

impl JobEventKind {
    /// 事件对应的目标状态
    pub fn target_status(&self) -> JobStatus {
        match self {
            JobEventKind::Submitted(_) | JobEventKind::Polled { .. } => JobStatus::InProgress,
            JobEventKind::Completed(_) => JobStatus::Complete,
            JobEventKind::Failed(_) => JobStatus::Error,
        }
    }
}

/// 任务流程
///
/// - 不持有任何共享状态，只持有 API 能力和事件发送端
/// - clone 开销很小，每个标识符一份
pub struct JobFlow<A> {
    api: Arc<A>,
    settings: BatchSettings,
    events: UnboundedSender<JobEvent>,
}

impl<A> Clone for JobFlow<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            settings: self.settings.clone(),
            events: self.events.clone(),
        }
    }
}

impl<A: ReportApi> JobFlow<A> {
    pub fn new(api: Arc<A>, settings: BatchSettings, events: UnboundedSender<JobEvent>) -> Self {
        Self {
            api,
            settings,
            events,
        }
    }

    /// 运行流程；流程内部 panic 时上报 `TaskAborted`，保证监视器不会一直等待
    pub async fn run_guarded(self, ctx: JobCtx) {
        let events = self.events.clone();
        let identifier = ctx.identifier.clone();

        if let Err(panic) = AssertUnwindSafe(self.run(ctx)).catch_unwind().await {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("[{}] ❌ 任务流程崩溃: {}", identifier, reason);
            let _ = events.send(JobEvent {
                identifier,
                kind: JobEventKind::Failed(JobError::TaskAborted { reason }),
            });
        }
    }

    /// 执行完整流程：提交 → 轮询 → 终态
    ///
    /// 单任务截止时间从流程开始计时，覆盖提交和所有轮询。
    pub async fn run(&self, ctx: JobCtx) {
        let started = Instant::now();
        let finished = match self.settings.job_deadline {
            Some(limit) => timeout_at(started + limit, self.drive(&ctx)).await.is_ok(),
            None => {
                self.drive(&ctx).await;
                true
            }
        };

        if !finished {
            let elapsed_secs = started.elapsed().as_secs();
            self.fail(&ctx, JobError::DeadlineExceeded { elapsed_secs });
        }
    }

    async fn drive(&self, ctx: &JobCtx) {
        if let Some(handle) = self.launch(ctx).await {
            self.poll_until_terminal(ctx, handle).await;
        }
    }

    /// 提交 generate 请求
    async fn launch(&self, ctx: &JobCtx) -> Option<JobHandle> {
        info!("{} 📝 正在生成报告...", ctx);

        let submitted = match timeout(
            self.settings.request_timeout,
            self.api.submit_job(&ctx.identifier),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(JobError::Submission {
                reason: self.timeout_reason(),
            }),
        };

        match submitted {
            Ok(handle) => {
                debug!("{} 任务已提交: {}", ctx, handle);
                self.emit(ctx, JobEventKind::Submitted(handle.clone()));
                Some(handle)
            }
            Err(e) => {
                self.fail(ctx, e);
                None
            }
        }
    }

    /// 固定周期轮询，直到终态或次数用完
    async fn poll_until_terminal(&self, ctx: &JobCtx, handle: JobHandle) {
        let mut attempt: u32 = 0;

        loop {
            sleep(self.settings.period).await;
            attempt += 1;
            debug!("{} 🔍 第 {} 次查询任务 {}", ctx, attempt, handle);

            let polled = match timeout(
                self.settings.request_timeout,
                self.api.poll_job(&handle),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(JobError::PollTransport {
                    reason: self.timeout_reason(),
                }),
            };

            match polled {
                Ok(PollOutcome::Running) => {
                    if let Some(max) = self.settings.max_poll_attempts {
                        if attempt >= max {
                            self.fail(ctx, JobError::AttemptsExhausted { attempts: attempt });
                            return;
                        }
                    }
                    info!("{} ⏳ 任务仍在进行中 (IN_PROGRESS)", ctx);
                    self.emit(ctx, JobEventKind::Polled { attempt });
                }
                Ok(PollOutcome::Failed(diagnostic)) => {
                    self.fail(ctx, JobError::JobReported { diagnostic });
                    return;
                }
                Ok(PollOutcome::Succeeded(payload)) => {
                    info!("{} ✓ 报告已生成 (第 {} 次查询)", ctx, attempt);
                    self.emit(ctx, JobEventKind::Completed(payload));
                    return;
                }
                Err(e) => {
                    self.fail(ctx, e);
                    return;
                }
            }
        }
    }

    fn timeout_reason(&self) -> String {
        format!(
            "请求在 {} 秒内没有响应",
            self.settings.request_timeout.as_secs()
        )
    }

    fn fail(&self, ctx: &JobCtx, err: JobError) {
        let message = truncate_text(&err.to_string(), 2000);
        if ctx.expected_failure {
            info!("{} 任务失败（在预期失败名单中）: {}", ctx, message);
        } else {
            error!("{} ❌ 任务失败，跳过: {}", ctx, message);
        }
        self.emit(ctx, JobEventKind::Failed(err));
    }

    fn emit(&self, ctx: &JobCtx, kind: JobEventKind) {
        let event = JobEvent {
            identifier: ctx.identifier.clone(),
            kind,
        };
        if self.events.send(event).is_err() {
            debug!("{} 监视器已退出，事件被丢弃", ctx);
        }
    }
}
