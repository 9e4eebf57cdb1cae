//! 日志初始化
//!
//! 默认 info 级别，可通过 RUST_LOG 环境变量调整

use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器
///
/// 重复调用是安全的（测试里常见），后续调用会被忽略
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
