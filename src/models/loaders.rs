use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, FileError};
use crate::models::job::Identifier;

/// 从 JSON 文件加载标识符列表
///
/// 文件内容是字符串数组，例如 `["arn:aws:iam::123456789012:role/a", ...]`。
/// 按文件顺序原样返回，去重由批次状态负责。
pub async fn load_identifiers(path: &Path) -> AppResult<Vec<Identifier>> {
    let path_str = path.display().to_string();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(&path_str, e))?;

    let identifiers: Vec<Identifier> =
        serde_json::from_str(&content).map_err(|source| FileError::JsonParseFailed {
            path: path_str.clone(),
            source,
        })?;

    info!("✓ 从 {} 加载了 {} 个标识符", path_str, identifiers.len());
    Ok(identifiers)
}

/// 去重并保持原始顺序
pub fn dedupe_identifiers(raw: Vec<Identifier>) -> Vec<Identifier> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut identifiers = Vec::with_capacity(raw.len());
    for id in raw {
        if seen.insert(id.clone()) {
            identifiers.push(id);
        } else {
            warn!("⚠️ 重复的标识符已忽略: {}", id);
        }
    }
    identifiers
}

/// 以格式化 JSON 写入文件
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let path_str = path.display().to_string();
    let json = serde_json::to_string_pretty(value).map_err(|source| {
        FileError::JsonParseFailed {
            path: path_str.clone(),
            source,
        }
    })?;
    fs::write(path, json)
        .await
        .map_err(|e| AppError::file_write_failed(&path_str, e))?;
    Ok(())
}
