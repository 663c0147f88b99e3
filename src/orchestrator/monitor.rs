//! 批次完成监视器
//!
//! 唯一判断"整个批次是否完成"的地方：
//! - 独占 [`BatchState`]，接收各任务流程发来的事件
//! - 每隔 PERIOD 扫描一次所有状态（第一次扫描立即进行）
//! - 全部到达终态时交付报告；`run` 消费自身，交付只会发生一次
//! - 批次截止时间到达时，把未完成的标识符置为 `ERROR` 后交付

use std::future::pending;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::BatchSettings;
use crate::error::JobError;
use crate::models::BatchReport;
use crate::orchestrator::batch_state::BatchState;
use crate::workflow::JobEvent;

/// 完成监视器
pub struct CompletionMonitor {
    state: BatchState,
    events: UnboundedReceiver<JobEvent>,
    settings: BatchSettings,
}

impl CompletionMonitor {
    pub fn new(state: BatchState, events: UnboundedReceiver<JobEvent>, settings: BatchSettings) -> Self {
        Self {
            state,
            events,
            settings,
        }
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    /// 运行直到批次完成，返回最终报告
    pub async fn run(mut self) -> BatchReport {
        let mut ticker = interval(self.settings.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = self.settings.batch_deadline.map(|d| Instant::now() + d);
        let batch_deadline = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(batch_deadline);

        let mut events_open = true;

        loop {
            tokio::select! {
                received = self.events.recv(), if events_open => match received {
                    Some(event) => self.apply(event),
                    None => {
                        debug!("所有任务流程已退出");
                        events_open = false;
                    }
                },
                _ = ticker.tick() => {
                    self.drain_pending_events();
                    if self.state.all_terminal() {
                        info!(
                            "✅ {} 个标识符均已到达终态: 成功 {} / 失败 {}",
                            self.state.len(),
                            self.state.results().get_all().len(),
                            self.state.errors().len()
                        );
                        return self.state.into_report();
                    }
                    self.log_progress();
                }
                _ = &mut batch_deadline => {
                    self.drain_pending_events();
                    let expired = self.state.fail_pending(&JobError::BatchDeadlineExceeded);
                    for identifier in &expired {
                        error!("[{}] ❌ 批次截止时间已到，任务未完成", identifier);
                    }
                    warn!("⚠️ 批次截止时间已到，{} 个标识符被标记为失败", expired.len());
                    return self.state.into_report();
                }
            }
        }
    }

    fn apply(&mut self, event: JobEvent) {
        if let Err(e) = self.state.apply(event) {
            warn!("⚠️ 忽略非法的状态变化: {}", e);
        }
    }

    /// 扫描前先处理已经到达的事件
    fn drain_pending_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
    }

    fn log_progress(&self) {
        let counts = self.state.counts();
        if let Some((identifier, status)) = self.state.pending().next() {
            info!(
                "⏳ 批次未完成: 进行中 {} / 未开始 {} / 完成 {} / 失败 {} (例如 {} 为 {})",
                counts.in_progress,
                counts.not_started,
                counts.complete,
                counts.error,
                identifier,
                status
            );
            if let Some(handle) = self.state.handle(identifier) {
                debug!(
                    "[{}] 任务 {} 已轮询 {} 次",
                    identifier,
                    handle,
                    self.state.attempts(identifier)
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobHandle, JobStatus};
    use crate::workflow::JobEventKind;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn event(id: &str, kind: JobEventKind) -> JobEvent {
        JobEvent {
            identifier: id.to_string(),
            kind,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch_completes_on_first_scan() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let monitor = CompletionMonitor::new(
            BatchState::new(Vec::new()),
            rx,
            BatchSettings::unbounded(Duration::from_secs(10)),
        );

        let started = Instant::now();
        let report = monitor.run().await;
        assert_eq!(report, BatchReport::default());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_complete_while_any_pending() {
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = CompletionMonitor::new(
            BatchState::new(vec!["a".into(), "b".into()]),
            rx,
            BatchSettings::unbounded(Duration::from_secs(10)),
        );

        tx.send(event("a", JobEventKind::Submitted(JobHandle::new("ja"))))
            .unwrap();
        tx.send(event("a", JobEventKind::Completed(json!([1])))).unwrap();

        // b 一直没有消息
        let result = timeout(Duration::from_secs(600), monitor.run()).await;
        assert!(result.is_err(), "monitor must not fire while b is NOT_STARTED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_on_scan_after_last_terminal_event() {
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = CompletionMonitor::new(
            BatchState::new(vec!["a".into()]),
            rx,
            BatchSettings::unbounded(Duration::from_secs(10)),
        );

        let producer = tokio::spawn(async move {
            tx.send(event("a", JobEventKind::Submitted(JobHandle::new("ja"))))
                .unwrap();
            tokio::time::sleep(Duration::from_secs(25)).await;
            tx.send(event("a", JobEventKind::Completed(json!({"x": 1}))))
                .unwrap();
        });

        let started = Instant::now();
        let report = monitor.run().await;
        producer.await.unwrap();

        // 扫描时刻为 0, 10, 20, 30 秒
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        assert_eq!(report.results["a"], json!({"x": 1}));
        assert!(report.errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_deadline_fails_pending_identifiers() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut settings = BatchSettings::unbounded(Duration::from_secs(10));
        settings.batch_deadline = Some(Duration::from_secs(45));
        let monitor = CompletionMonitor::new(
            BatchState::new(vec!["a".into(), "b".into()]),
            rx,
            settings,
        );

        tx.send(event("a", JobEventKind::Submitted(JobHandle::new("ja"))))
            .unwrap();
        tx.send(event("a", JobEventKind::Completed(json!(1)))).unwrap();
        tx.send(event("b", JobEventKind::Submitted(JobHandle::new("jb"))))
            .unwrap();

        let started = Instant::now();
        let report = monitor.run().await;

        assert_eq!(started.elapsed(), Duration::from_secs(45));
        assert_eq!(report.results.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(report.errors["b"], JobError::BatchDeadlineExceeded);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_illegal_events_are_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut monitor = CompletionMonitor::new(
            BatchState::new(vec!["a".into()]),
            rx,
            BatchSettings::unbounded(Duration::from_secs(10)),
        );

        tx.send(event("a", JobEventKind::Submitted(JobHandle::new("ja"))))
            .unwrap();
        tx.send(event(
            "a",
            JobEventKind::Failed(JobError::PollTransport { reason: "x".into() }),
        ))
        .unwrap();
        tx.send(event("a", JobEventKind::Completed(json!(1)))).unwrap();
        tx.send(event("ghost", JobEventKind::Polled { attempt: 1 }))
            .unwrap();

        monitor.drain_pending_events();
        assert_eq!(monitor.state().status("a"), Some(JobStatus::Error));

        let report = monitor.run().await;
        assert!(report.results.is_empty());
        assert!(report.errors.contains_key("a"));
    }
}
