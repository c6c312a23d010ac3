//! 日志初始化与脱敏工具
//!
//! 提供 tracing 订阅器初始化，以及敏感信息脱敏功能，确保日志中不会泄露 API keys。

use std::fmt;
use tracing_subscriber::{fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. `format` is "text" or "json".
pub fn init_tracing(level: &str, format: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if format == "json" {
        registry
            .with(fmt_layer::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt_layer::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

/// 脱敏后的 API key 表示
///
/// 只显示前 8 个字符，其余替换为 `***`
///
/// # 示例
/// ```
/// use llm_broker::logging::SensitiveApiKey;
///
/// let key = "sk-ant-api123-abcdef123456";
/// assert_eq!(SensitiveApiKey::new(key).to_string(), "sk-ant-a***");
/// ```
#[derive(Clone, Debug)]
pub struct SensitiveApiKey<'a> {
    inner: &'a str,
}

impl<'a> SensitiveApiKey<'a> {
    pub fn new(key: &'a str) -> Self {
        Self { inner: key }
    }
}

impl fmt::Display for SensitiveApiKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible_len = 8;
        match self.inner.get(..visible_len) {
            // key 太短时全部脱敏
            Some(prefix) if self.inner.len() > visible_len => write!(f, "{}***", prefix),
            _ => write!(f, "***"),
        }
    }
}

/// 检查字符串是否像 API key（以 sk-、pk- 等开头）
pub fn is_sensitive_key(value: &str) -> bool {
    const SENSITIVE_PREFIXES: [&str; 5] = ["sk-", "pk-", "sess-", "Bearer sk-", "Bearer pk-"];

    SENSITIVE_PREFIXES.iter().any(|prefix| value.starts_with(prefix))
}

/// 对字符串进行脱敏处理（如果包含敏感信息）
pub fn sanitize_log_value(value: &str) -> String {
    if is_sensitive_key(value) {
        SensitiveApiKey::new(value).to_string()
    } else {
        value.to_string()
    }
}

/// 对文本中每个像 API key 的词进行脱敏，其余内容原样保留
pub fn redact_secrets(text: &str) -> String {
    text.split(' ').map(sanitize_log_value).collect::<Vec<_>>().join(" ")
}
