//! 批次状态
//!
//! 标识符集合、状态表、结果表和失败表。只由完成监视器持有和修改，
//! 每个事件的应用是一次完整的修改，监视器扫描时不会看到中间状态。

use std::collections::{BTreeMap, HashMap};

use crate::error::{JobError, TransitionError};
use crate::models::{dedupe_identifiers, BatchReport, Identifier, JobHandle, JobStatus};
use crate::orchestrator::aggregator::ResultAggregator;
use crate::workflow::{JobEvent, JobEventKind};

/// 各状态的数量
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub not_started: usize,
    pub in_progress: usize,
    pub complete: usize,
    pub error: usize,
}

/// 批次状态
#[derive(Debug)]
pub struct BatchState {
    /// 批次成员，创建后不再增减（保持输入顺序）
    identifiers: Vec<Identifier>,
    statuses: HashMap<Identifier, JobStatus>,
    handles: HashMap<Identifier, JobHandle>,
    attempts: HashMap<Identifier, u32>,
    results: ResultAggregator,
    errors: BTreeMap<Identifier, JobError>,
}

impl BatchState {
    /// 创建批次，所有标识符初始为 `NOT_STARTED`
    pub fn new(identifiers: Vec<Identifier>) -> Self {
        let identifiers = dedupe_identifiers(identifiers);
        let statuses = identifiers
            .iter()
            .map(|id| (id.clone(), JobStatus::NotStarted))
            .collect();
        Self {
            identifiers,
            statuses,
            handles: HashMap::new(),
            attempts: HashMap::new(),
            results: ResultAggregator::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn status(&self, identifier: &str) -> Option<JobStatus> {
        self.statuses.get(identifier).copied()
    }

    pub fn handle(&self, identifier: &str) -> Option<&JobHandle> {
        self.handles.get(identifier)
    }

    /// 已经完成的轮询次数
    pub fn attempts(&self, identifier: &str) -> u32 {
        self.attempts.get(identifier).copied().unwrap_or(0)
    }

    pub fn results(&self) -> &ResultAggregator {
        &self.results
    }

    pub fn errors(&self) -> &BTreeMap<Identifier, JobError> {
        &self.errors
    }

    /// 是否所有标识符都已到达终态（空批次视为已完成）
    pub fn all_terminal(&self) -> bool {
        self.statuses.values().all(|s| s.is_terminal())
    }

    /// 尚未到达终态的标识符，按输入顺序
    pub fn pending(&self) -> impl Iterator<Item = (&Identifier, JobStatus)> + '_ {
        self.identifiers.iter().filter_map(|id| {
            let status = self.statuses[id];
            (!status.is_terminal()).then_some((id, status))
        })
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for status in self.statuses.values() {
            match status {
                JobStatus::NotStarted => counts.not_started += 1,
                JobStatus::InProgress => counts.in_progress += 1,
                JobStatus::Complete => counts.complete += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// 应用一个任务事件
    ///
    /// 非法迁移（例如终态之后再变化）会被拒绝，状态保持不变。
    pub fn apply(&mut self, event: JobEvent) -> Result<JobStatus, TransitionError> {
        let JobEvent { identifier, kind } = event;
        let next = kind.target_status();
        let current = self
            .statuses
            .get(&identifier)
            .copied()
            .ok_or_else(|| TransitionError::UnknownIdentifier(identifier.clone()))?;

        if !current.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                identifier,
                from: current,
                to: next,
            });
        }

        match kind {
            JobEventKind::Submitted(handle) => {
                self.handles.insert(identifier.clone(), handle);
            }
            JobEventKind::Polled { attempt } => {
                self.attempts.insert(identifier.clone(), attempt);
            }
            JobEventKind::Completed(payload) => {
                self.results.record(identifier.clone(), payload);
            }
            JobEventKind::Failed(err) => {
                self.errors.insert(identifier.clone(), err);
            }
        }
        self.statuses.insert(identifier, next);
        Ok(next)
    }

    /// 把所有未到终态的标识符置为 `ERROR`，返回受影响的标识符
    pub fn fail_pending(&mut self, err: &JobError) -> Vec<Identifier> {
        let pending: Vec<Identifier> = self.pending().map(|(id, _)| id.clone()).collect();
        for id in &pending {
            self.statuses.insert(id.clone(), JobStatus::Error);
            self.errors.insert(id.clone(), err.clone());
        }
        pending
    }

    /// 生成最终报告
    pub fn into_report(self) -> BatchReport {
        BatchReport {
            results: self.results.into_results(),
            errors: self.errors,
        }
    }
}
