//! 应用主流程 - 编排层
//!
//! ## 职责
//!
//! 1. **加载输入**：读取标识符列表
//! 2. **建立会话**：登录控制台（失败即退出，不提交任何任务）
//! 3. **运行批次**：委托 `batch_runner`
//! 4. **写出结果**：成功结果写入输出文件，失败明细可选写入 errors 文件
//! 5. **全局统计**：输出成功/失败数量

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::browser::BrowserSessionProvider;
use crate::config::Config;
use crate::models::{load_identifiers, write_json, BatchReport};
use crate::orchestrator::batch_runner::run_batch;
use crate::utils::logging::{log_batch_loaded, log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Self {
        log_startup(config.period_ms, config.max_in_flight_requests);
        Self { config }
    }

    /// 运行应用主逻辑，返回交付的报告
    pub async fn run(&self) -> Result<BatchReport> {
        let identifiers = load_identifiers(Path::new(&self.config.identifiers_file))
            .await
            .context("无法加载标识符列表")?;

        if identifiers.is_empty() {
            warn!("⚠️ 标识符列表为空，写出空结果后结束");
            let report = BatchReport::default();
            self.write_outputs(&report).await?;
            return Ok(report);
        }

        log_batch_loaded(identifiers.len());

        let provider = BrowserSessionProvider::new(&self.config);
        let report = run_batch(&provider, identifiers, self.config.batch_settings())
            .await
            .context("批次运行失败")?;

        self.write_outputs(&report).await?;
        print_final_stats(&report, &self.config.output_file);

        Ok(report)
    }

    async fn write_outputs(&self, report: &BatchReport) -> Result<()> {
        write_json(Path::new(&self.config.output_file), &report.results)
            .await
            .context("无法写入结果文件")?;
        info!("✓ 已写入 {} 条结果", report.success_count());

        match &self.config.errors_file {
            Some(path) => {
                write_json(Path::new(path), &report.errors)
                    .await
                    .context("无法写入失败明细文件")?;
                info!("✓ 已写入 {} 条失败明细: {}", report.error_count(), path);
            }
            None if !report.errors.is_empty() => {
                let failed: Vec<&str> = report.errors.keys().map(String::as_str).collect();
                warn!("⚠️ 以下标识符失败，未写入结果: {:?}", failed);
            }
            None => {}
        }
        Ok(())
    }
}
