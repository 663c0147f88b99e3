use anyhow::Result;
use console_report_batch::utils::logging::init_log_file;
use console_report_batch::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    if let Some(path) = &config.run_log_file {
        init_log_file(path)?;
    }
    logger::init(config.verbose_logging, config.run_log_file.as_deref())?;

    // 初始化并运行应用；会话失败时以非零状态退出
    let _report = App::initialize(config).run().await?;

    Ok(())
}
