//! 日志工具模块
//!
//! 提供启动横幅、统计输出和文本截断等辅助函数

use std::fs;

use anyhow::Result;
use tracing::info;

use crate::models::BatchReport;

/// 初始化日志文件（写入带时间戳的表头）
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n访问报告批处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `period_ms`: 轮询周期
/// - `max_in_flight`: 最大在途请求数
pub fn log_startup(period_ms: u64, max_in_flight: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量访问报告模式");
    info!("⏱️ 轮询周期: {} ms", period_ms);
    info!("📊 最大在途请求数: {}", max_in_flight);
    info!("{}", "=".repeat(60));
}

/// 记录批次加载信息
pub fn log_batch_loaded(total: usize) {
    info!("✓ 找到 {} 个待处理的标识符", total);
    info!("📋 所有标识符同时提交，各自独立轮询\n");
}

/// 打印最终统计信息
///
/// # 参数
/// - `report`: 最终报告
/// - `output_file`: 结果文件路径
pub fn print_final_stats(report: &BatchReport, output_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", report.success_count(), report.total());
    info!("❌ 失败: {}", report.error_count());
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_file);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
