//! 防伪令牌（X-CSRF-Token）
//!
//! 每次运行只解析一次，之后显式传给每个请求

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::infrastructure::JsExecutor;

/// 控制台页面用来表示"没有令牌"的占位值
const NOT_DEFINED: &str = "NOT_DEFINED";

const CSRF_SCRIPT: &str = r#"
(() => {
    try {
        if (window.Csrf && typeof window.Csrf.fromCookie === "function") {
            return window.Csrf.fromCookie(null);
        }
        return null;
    } catch (err) {
        return null;
    }
})()
"#;

/// 从已登录页面读取防伪令牌
///
/// 拿不到令牌不算致命错误：记一条警告，之后的请求不带该请求头。
pub async fn resolve_csrf_token(executor: &JsExecutor) -> Option<String> {
    match executor.eval(CSRF_SCRIPT).await {
        Ok(value) => {
            let token = normalize_token(&value);
            match &token {
                Some(t) => debug!("✓ 已获取 CSRF 令牌 ({} 字符)", t.len()),
                None => warn!("⚠️ 页面上没有 CSRF 令牌，请求将不带 X-CSRF-Token"),
            }
            token
        }
        Err(e) => {
            warn!("⚠️ 读取 CSRF 令牌失败: {}，请求将不带 X-CSRF-Token", e);
            None
        }
    }
}

fn normalize_token(value: &JsonValue) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != NOT_DEFINED)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token(&json!("abc")), Some("abc".to_string()));
        assert_eq!(normalize_token(&json!("  abc ")), Some("abc".to_string()));
        assert_eq!(normalize_token(&json!("NOT_DEFINED")), None);
        assert_eq!(normalize_token(&json!("")), None);
        assert_eq!(normalize_token(&JsonValue::Null), None);
        assert_eq!(normalize_token(&json!(42)), None);
    }
}
