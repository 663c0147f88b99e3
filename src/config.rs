use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// 程序配置
///
/// 加载顺序：默认值 ← `CONFIG_FILE` 指向的 TOML 文件 ← 环境变量。
#[derive(Clone, Debug)]
pub struct Config {
    /// 联邦登录令牌
    pub signin_token: String,
    /// 标识符列表（JSON 数组）
    pub identifiers_file: String,
    /// 成功结果输出文件
    pub output_file: String,
    /// 失败明细输出文件，不设置则只记日志
    pub errors_file: Option<String>,
    /// 运行日志文件
    pub run_log_file: Option<String>,
    // --- 控制台 ---
    pub console_url: String,
    pub federation_url: String,
    pub federation_issuer: String,
    /// 设置后连接已打开的浏览器，否则启动无头浏览器
    pub browser_debug_port: Option<u16>,
    pub chrome_executable: Option<String>,
    /// 登录后等待页面稳定的时间
    pub login_settle_ms: u64,
    // --- 批次调度 ---
    /// 轮询和完成检查的固定周期
    pub period_ms: u64,
    pub max_poll_attempts: Option<u32>,
    pub job_deadline_secs: Option<u64>,
    pub batch_deadline_secs: Option<u64>,
    /// 单个请求（generate 或一次轮询）的超时时间
    pub request_timeout_secs: u64,
    /// 同时在途的请求数上限
    pub max_in_flight_requests: usize,
    /// 已知会失败的标识符，失败时只记 info
    pub expected_failures: Vec<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signin_token: String::new(),
            identifiers_file: "arns.json".to_string(),
            output_file: "access_advisor.json".to_string(),
            errors_file: None,
            run_log_file: None,
            console_url: "https://console.aws.amazon.com/iam/home?region=us-east-1".to_string(),
            federation_url: "https://signin.aws.amazon.com/federation".to_string(),
            federation_issuer: "tripleA".to_string(),
            browser_debug_port: None,
            chrome_executable: None,
            login_settle_ms: 20_000,
            period_ms: 10_000,
            max_poll_attempts: Some(30),
            job_deadline_secs: Some(300),
            batch_deadline_secs: Some(1800),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_in_flight_requests: 50,
            expected_failures: Vec::new(),
            verbose_logging: false,
        }
    }
}

/// TOML 配置文件，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub signin_token: Option<String>,
    pub identifiers_file: Option<String>,
    pub output_file: Option<String>,
    pub errors_file: Option<String>,
    pub run_log_file: Option<String>,
    pub console_url: Option<String>,
    pub federation_url: Option<String>,
    pub federation_issuer: Option<String>,
    pub browser_debug_port: Option<u16>,
    pub chrome_executable: Option<String>,
    pub login_settle_ms: Option<u64>,
    pub period_ms: Option<u64>,
    pub max_poll_attempts: Option<u32>,
    pub job_deadline_secs: Option<u64>,
    pub batch_deadline_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub max_in_flight_requests: Option<usize>,
    pub expected_failures: Option<Vec<String>>,
    pub verbose_logging: Option<bool>,
}

impl FileConfig {
    pub fn from_toml_str(content: &str, path: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|source| {
            AppError::File(FileError::TomlParseFailed {
                path: path.to_string(),
                source,
            })
        })
    }
}

impl Config {
    /// 从配置文件和环境变量加载
    pub fn load() -> AppResult<Self> {
        let file = match std::env::var("CONFIG_FILE") {
            Ok(path) => {
                let content = std::fs::read_to_string(Path::new(&path))
                    .map_err(|e| AppError::file_read_failed(&path, e))?;
                Some(FileConfig::from_toml_str(&content, &path)?)
            }
            Err(_) => None,
        };
        Self::from_sources(file, |name| std::env::var(name).ok())
    }

    /// 合并各来源的配置，`lookup` 负责读取环境变量
    pub fn from_sources(
        file: Option<FileConfig>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        let mut config = Self::default();
        if let Some(file) = file {
            config.apply_file(file);
        }
        config.apply_env(&lookup)?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.signin_token {
            self.signin_token = v;
        }
        if let Some(v) = file.identifiers_file {
            self.identifiers_file = v;
        }
        if let Some(v) = file.output_file {
            self.output_file = v;
        }
        if let Some(v) = file.console_url {
            self.console_url = v;
        }
        if let Some(v) = file.federation_url {
            self.federation_url = v;
        }
        if let Some(v) = file.federation_issuer {
            self.federation_issuer = v;
        }
        if let Some(v) = file.login_settle_ms {
            self.login_settle_ms = v;
        }
        if let Some(v) = file.period_ms {
            self.period_ms = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file.max_in_flight_requests {
            self.max_in_flight_requests = v;
        }
        if let Some(v) = file.expected_failures {
            self.expected_failures = v;
        }
        if let Some(v) = file.verbose_logging {
            self.verbose_logging = v;
        }

        if file.errors_file.is_some() {
            self.errors_file = file.errors_file;
        }
        if file.run_log_file.is_some() {
            self.run_log_file = file.run_log_file;
        }
        if file.browser_debug_port.is_some() {
            self.browser_debug_port = file.browser_debug_port;
        }
        if file.chrome_executable.is_some() {
            self.chrome_executable = file.chrome_executable;
        }
        if let Some(v) = file.max_poll_attempts {
            self.max_poll_attempts = zero_as_unlimited(v);
        }
        if let Some(v) = file.job_deadline_secs {
            self.job_deadline_secs = zero_as_unlimited(v);
        }
        if let Some(v) = file.batch_deadline_secs {
            self.batch_deadline_secs = zero_as_unlimited(v);
        }
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("SIGNIN_TOKEN") {
            self.signin_token = v;
        }
        if let Some(v) = lookup("IDENTIFIERS_FILE") {
            self.identifiers_file = v;
        }
        if let Some(v) = lookup("OUTPUT_FILE") {
            self.output_file = v;
        }
        if let Some(v) = lookup("ERRORS_FILE") {
            self.errors_file = Some(v);
        }
        if let Some(v) = lookup("RUN_LOG_FILE") {
            self.run_log_file = Some(v);
        }
        if let Some(v) = lookup("CONSOLE_URL") {
            self.console_url = v;
        }
        if let Some(v) = lookup("FEDERATION_URL") {
            self.federation_url = v;
        }
        if let Some(v) = lookup("FEDERATION_ISSUER") {
            self.federation_issuer = v;
        }
        if let Some(v) = lookup("CHROME_EXECUTABLE") {
            self.chrome_executable = Some(v);
        }
        if let Some(v) = lookup("EXPECTED_FAILURES") {
            self.expected_failures = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(v) = parse_env(lookup, "BROWSER_DEBUG_PORT", "u16")? {
            self.browser_debug_port = Some(v);
        }
        if let Some(v) = parse_env(lookup, "LOGIN_SETTLE_MS", "u64")? {
            self.login_settle_ms = v;
        }
        if let Some(v) = parse_env(lookup, "PERIOD_MS", "u64")? {
            self.period_ms = v;
        }
        if let Some(v) = parse_env(lookup, "MAX_POLL_ATTEMPTS", "u32")? {
            self.max_poll_attempts = zero_as_unlimited(v);
        }
        if let Some(v) = parse_env(lookup, "JOB_DEADLINE_SECS", "u64")? {
            self.job_deadline_secs = zero_as_unlimited(v);
        }
        if let Some(v) = parse_env(lookup, "BATCH_DEADLINE_SECS", "u64")? {
            self.batch_deadline_secs = zero_as_unlimited(v);
        }
        if let Some(v) = parse_env(lookup, "REQUEST_TIMEOUT_SECS", "u64")? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = parse_env(lookup, "MAX_IN_FLIGHT_REQUESTS", "usize")? {
            self.max_in_flight_requests = v;
        }
        if let Some(v) = parse_env(lookup, "VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        Ok(())
    }

    /// 调度引擎需要的配置
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            period: Duration::from_millis(self.period_ms.max(1)),
            max_poll_attempts: self.max_poll_attempts,
            job_deadline: self.job_deadline_secs.map(Duration::from_secs),
            batch_deadline: self.batch_deadline_secs.map(Duration::from_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            expected_failures: self.expected_failures.iter().cloned().collect(),
        }
    }
}

/// 调度引擎配置
///
/// 限制字段为 `None` 时不设上限，任务可能无限轮询。
#[derive(Clone, Debug)]
pub struct BatchSettings {
    /// PERIOD：轮询重试与完成检查共用的周期
    pub period: Duration,
    pub max_poll_attempts: Option<u32>,
    pub job_deadline: Option<Duration>,
    pub batch_deadline: Option<Duration>,
    /// 单个请求没有响应时的上限，超时按请求失败处理
    pub request_timeout: Duration,
    pub expected_failures: HashSet<String>,
}

impl BatchSettings {
    /// 没有次数和截止时间上限的配置（单个请求仍有超时）
    pub fn unbounded(period: Duration) -> Self {
        Self {
            period,
            max_poll_attempts: None,
            job_deadline: None,
            batch_deadline: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            expected_failures: HashSet::new(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Config::default().batch_settings()
    }
}

fn parse_env<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var_name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var_name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
    }
}

/// 0 表示不限制
fn zero_as_unlimited<T: Default + PartialEq>(v: T) -> Option<T> {
    if v == T::default() {
        None
    } else {
        Some(v)
    }
}
