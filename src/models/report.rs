//! 批次报告
//!
//! 完成监视器在批次结束时一次性交付的结果

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::models::job::{Identifier, ResultPayload};

/// 最终报告
///
/// `results` 只包含 `COMPLETE` 的标识符；失败的标识符只出现在 `errors` 中。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: BTreeMap<Identifier, ResultPayload>,
    pub errors: BTreeMap<Identifier, JobError>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.results.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn total(&self) -> usize {
        self.results.len() + self.errors.len()
    }
}
