use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::models::job::JobStatus;

/// 应用程序错误类型
///
/// 只有 `Session` 是批次级的致命错误；单个标识符的失败走 [`JobError`]，
/// 永远不会中断整个批次。
#[derive(Debug, Error)]
pub enum AppError {
    /// 会话建立失败（登录控制台）
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 会话建立错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 没有提供登录令牌
    #[error("未提供 signin token")]
    MissingToken,
    /// 联邦登录 URL 无法构造
    #[error("无法构造登录地址 ({url}): {reason}")]
    InvalidUrl { url: String, reason: String },
    /// 登录后没有落在控制台页面
    #[error("登录被拒绝，当前页面: {landing_url}")]
    LoginRejected { landing_url: String },
    /// 浏览器层面的失败
    #[error("登录过程中浏览器失败: {0}")]
    Browser(#[source] BrowserError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {reason}")]
    ConnectionFailed { port: u16, reason: String },
    /// 启动无头浏览器失败
    #[error("启动无头浏览器失败: {reason}")]
    LaunchFailed { reason: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {reason}")]
    ScriptExecutionFailed { reason: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

/// 单个标识符的终态失败
///
/// 序列化后写入 errors 文件，`kind` 字段区分种类。
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// 提交 generate 请求失败（网络错误或响应格式不对）
    #[error("提交任务失败: {reason}")]
    Submission { reason: String },
    /// 轮询请求本身失败
    #[error("轮询任务失败: {reason}")]
    PollTransport { reason: String },
    /// 后端明确报告任务失败
    #[error("后端报告任务失败: {diagnostic}")]
    JobReported { diagnostic: JsonValue },
    /// 轮询次数耗尽
    #[error("轮询 {attempts} 次后任务仍未完成")]
    AttemptsExhausted { attempts: u32 },
    /// 单个任务超过截止时间
    #[error("任务在 {elapsed_secs} 秒后仍未完成")]
    DeadlineExceeded { elapsed_secs: u64 },
    /// 整个批次超过截止时间
    #[error("批次截止时间已到，任务未完成")]
    BatchDeadlineExceeded,
    /// 任务意外退出
    #[error("任务意外终止: {reason}")]
    TaskAborted { reason: String },
}

/// 被拒绝的状态迁移
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("未知标识符: {0}")]
    UnknownIdentifier(String),
    #[error("{identifier} 不允许从 {from} 迁移到 {to}")]
    Illegal {
        identifier: String,
        from: JobStatus,
        to: JobStatus,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 是否为会话失败（批次级致命错误，此时没有提交任何任务）
    pub fn is_session_failure(&self) -> bool {
        matches!(self, AppError::Session(_))
    }
}

impl From<BrowserError> for SessionError {
    fn from(err: BrowserError) -> Self {
        SessionError::Browser(err)
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
