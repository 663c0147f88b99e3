//! 结果聚合器
//!
//! 按标识符收集成功的报告内容

use std::collections::BTreeMap;

use crate::models::{Identifier, ResultPayload};

/// 结果聚合器
///
/// 正常流程下每个标识符最多记录一次。重复记录时后写入的覆盖先写入的
/// （last write wins），并返回被覆盖的旧值。
#[derive(Debug, Default, Clone)]
pub struct ResultAggregator {
    results: BTreeMap<Identifier, ResultPayload>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个标识符的报告，返回被覆盖的旧值
    pub fn record(&mut self, identifier: Identifier, payload: ResultPayload) -> Option<ResultPayload> {
        self.results.insert(identifier, payload)
    }

    /// 当前已完成的全部结果
    pub fn get_all(&self) -> &BTreeMap<Identifier, ResultPayload> {
        &self.results
    }

    pub fn into_results(self) -> BTreeMap<Identifier, ResultPayload> {
        self.results
    }
}
