//! 日志初始化
//!
//! 安装 `tracing_subscriber::fmt` 订阅者，过滤规则取自 `RUST_LOG`（缺省 `info`），
//! 并通过 `LogTracer` 把 `log` crate 的记录转发到 `tracing`。

use std::error::Error;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info";

/// 初始化日志，重复调用时静默忽略
pub fn init() {
    let _ = try_init();
}

/// 初始化日志，已有全局订阅者时返回错误
pub fn try_init() -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    install(filter)
}

/// 使用指定规则初始化日志（忽略 `RUST_LOG`），例如 `"rawcan_driver=trace"`
pub fn try_init_with(directives: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    install(EnvFilter::try_new(directives)?)
}

fn install(filter: EnvFilter) -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_log::LogTracer::init()?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        // 第二次显式初始化必然失败
        assert!(try_init().is_err());
    }

    #[test]
    fn test_bad_directive() {
        assert!(try_init_with("rawcan=notalevel").is_err());
    }
}
