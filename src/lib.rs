//! # Console Report Batch
//!
//! 通过控制台会话批量生成"服务最近访问"报告的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `browser/` - 连接或启动浏览器，建立已认证的控制台会话
//!
//! ### ② 业务能力层（Clients）
//! - `clients/` - 描述"我能做什么"，只处理单个任务
//! - `ReportApi` - 提交报告任务 / 查询任务状态
//! - `ConsoleClient` - 基于页面内 fetch 的实现，显式携带 CSRF 令牌
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个标识符"的完整处理流程
//! - `JobCtx` - 上下文封装（identifier + index）
//! - `JobFlow` - 流程编排（generate → poll × N → 终态）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 应用生命周期，读写文件
//! - `orchestrator/batch_runner` - 每个标识符一个任务，汇总到监视器
//! - `orchestrator/monitor` - 完成监视器，唯一的批次完成判定点
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{BrowserSessionProvider, SessionProvider};
pub use clients::{ConsoleClient, ReportApi};
pub use config::{BatchSettings, Config};
pub use error::{AppError, AppResult, JobError};
pub use infrastructure::JsExecutor;
pub use models::{BatchReport, JobHandle, JobStatus, PollOutcome};
pub use orchestrator::{
    run_batch, App, BatchRunner, BatchState, CompletionMonitor, ResultAggregator,
};
pub use workflow::{JobCtx, JobEvent, JobEventKind, JobFlow};
