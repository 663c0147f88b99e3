//! 会话建立
//!
//! 用联邦登录令牌换取控制台会话。失败是整个运行的致命错误，
//! 发生在提交任何任务之前。

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

use crate::browser::{connect_to_browser_and_page, launch_headless_browser};
use crate::clients::{resolve_csrf_token, ConsoleClient, ReportApi};
use crate::config::Config;
use crate::error::{AppResult, BrowserError, SessionError};
use crate::infrastructure::JsExecutor;

/// 会话提供者
///
/// 建立一个已认证的上下文，并返回基于它的报告 API。
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Api: ReportApi;

    async fn establish(&self) -> AppResult<Self::Api>;
}

/// 基于浏览器的会话提供者
pub struct BrowserSessionProvider {
    config: Config,
}

impl BrowserSessionProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    async fn open_browser(&self) -> Result<(Browser, Page), BrowserError> {
        match self.config.browser_debug_port {
            Some(port) => connect_to_browser_and_page(port).await,
            None => launch_headless_browser(self.config.chrome_executable.as_deref()).await,
        }
    }
}

#[async_trait]
impl SessionProvider for BrowserSessionProvider {
    type Api = ConsoleClient;

    async fn establish(&self) -> AppResult<ConsoleClient> {
        let config = &self.config;
        if config.signin_token.trim().is_empty() {
            return Err(SessionError::MissingToken.into());
        }

        let login_url = federation_login_url(
            &config.federation_url,
            &config.federation_issuer,
            &config.console_url,
            config.signin_token.trim(),
        )?;

        let (browser, page) = self.open_browser().await.map_err(SessionError::from)?;

        // 登录地址里带着令牌，日志里只打印联邦服务地址
        info!("🔐 正在通过 {} 登录控制台...", config.federation_url);
        page.goto(login_url.as_str()).await.map_err(|e| {
            SessionError::from(BrowserError::NavigationFailed {
                url: config.federation_url.clone(),
                reason: e.to_string(),
            })
        })?;

        debug!("等待 {} ms 让控制台加载完成", config.login_settle_ms);
        sleep(Duration::from_millis(config.login_settle_ms)).await;

        let landing_url = page
            .url()
            .await
            .map_err(|e| {
                SessionError::from(BrowserError::ScriptExecutionFailed {
                    reason: format!("无法读取当前页面地址: {}", e),
                })
            })?
            .unwrap_or_default();

        if !is_console_landing(&landing_url, &config.console_url) {
            return Err(SessionError::LoginRejected { landing_url }.into());
        }
        info!("✓ 登录成功");

        let executor = JsExecutor::new(page);
        let csrf_token = resolve_csrf_token(&executor).await;

        Ok(ConsoleClient::new(
            browser,
            executor,
            csrf_token,
            config.max_in_flight_requests,
        ))
    }
}

/// 构造联邦登录地址
pub fn federation_login_url(
    federation_url: &str,
    issuer: &str,
    destination: &str,
    signin_token: &str,
) -> Result<Url, SessionError> {
    Url::parse_with_params(
        federation_url,
        &[
            ("Action", "login"),
            ("Issuer", issuer),
            ("Destination", destination),
            ("SigninToken", signin_token),
        ],
    )
    .map_err(|e| SessionError::InvalidUrl {
        url: federation_url.to_string(),
        reason: e.to_string(),
    })
}

/// 登录后的页面是否在控制台域名下
///
/// 登录失败时页面会停在联邦登录服务上。
pub fn is_console_landing(landing_url: &str, console_url: &str) -> bool {
    let (Ok(landing), Ok(console)) = (Url::parse(landing_url), Url::parse(console_url)) else {
        return false;
    };
    landing.scheme() == console.scheme()
        && landing.host_str().is_some()
        && landing.host_str() == console.host_str()
}
