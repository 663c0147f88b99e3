//! 批次运行器 - 编排层
//!
//! 为每个标识符启动一个任务流程，由完成监视器汇总结果。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::browser::SessionProvider;
use crate::clients::ReportApi;
use crate::config::BatchSettings;
use crate::error::AppResult;
use crate::models::{BatchReport, Identifier};
use crate::orchestrator::batch_state::BatchState;
use crate::orchestrator::monitor::CompletionMonitor;
use crate::workflow::{JobCtx, JobFlow};

/// 建立会话并运行整个批次
///
/// 会话失败是唯一的致命错误，此时不会提交任何任务。
pub async fn run_batch<P: SessionProvider>(
    provider: &P,
    identifiers: Vec<Identifier>,
    settings: BatchSettings,
) -> AppResult<BatchReport> {
    let api = provider.establish().await?;
    let runner = BatchRunner::new(Arc::new(api), settings);
    Ok(runner.run(identifiers).await)
}

/// 批次运行器
pub struct BatchRunner<A> {
    api: Arc<A>,
    settings: BatchSettings,
}

impl<A: ReportApi> BatchRunner<A> {
    pub fn new(api: Arc<A>, settings: BatchSettings) -> Self {
        Self { api, settings }
    }

    /// 并发提交所有标识符，等待监视器交付最终报告
    pub async fn run(&self, identifiers: Vec<Identifier>) -> BatchReport {
        // 批次成员以 BatchState 为准（已去重）
        let state = BatchState::new(identifiers);
        let members = state.identifiers().to_vec();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let monitor = CompletionMonitor::new(state, events_rx, self.settings.clone());

        let flow = JobFlow::new(Arc::clone(&self.api), self.settings.clone(), events_tx);
        let mut tasks = JoinSet::new();
        for (idx, identifier) in members.into_iter().enumerate() {
            let expected_failure = self.settings.expected_failures.contains(&identifier);
            let ctx = JobCtx::new(identifier, idx + 1, expected_failure);
            tasks.spawn(flow.clone().run_guarded(ctx));
        }
        // 只留下各任务持有的发送端
        drop(flow);

        info!("🚀 已启动 {} 个任务流程", tasks.len());

        let report = monitor.run().await;

        // 批次截止时间到达后可能还有任务在轮询
        if !tasks.is_empty() {
            debug!("终止剩余的 {} 个任务流程", tasks.len());
        }
        tasks.shutdown().await;

        report
    }
}
