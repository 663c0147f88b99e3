//! 任务处理上下文
//!
//! 封装"我正在处理批次里的第几个标识符"这一信息

use std::fmt::Display;

use crate::models::Identifier;

/// 单个标识符的上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 标识符
    pub identifier: Identifier,

    /// 在批次中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 是否在预期失败名单中（失败时降级为 info 日志）
    pub expected_failure: bool,
}

impl JobCtx {
    pub fn new(identifier: Identifier, index: usize, expected_failure: bool) -> Self {
        Self {
            identifier,
            index,
            expected_failure,
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[#{} {}]", self.index, self.identifier)
    }
}
