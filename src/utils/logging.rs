use anyhow::Result;
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs;
use tracing::info;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
///
/// # 返回
/// 返回是否成功初始化
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n题目生成日志 - {}\n{}\n\n",
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
/// - `mode`: 运行模式
/// - `unit`: 目标单元描述
pub fn log_startup(mode: &str, unit: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题目生成模式: {}", mode);
    info!("📚 目标单元: {}", unit);
    info!("{}", "=".repeat(60));
}

/// 记录基础题加载信息
///
/// # 参数
/// - `total`: 基础题总数
/// - `variant_count`: 每道题的变体数量
pub fn log_bases_loaded(total: usize, variant_count: usize) {
    info!("✓ 找到 {} 道待处理的基础题", total);
    info!("📋 每道基础题将生成 {} 个变体", variant_count);
    info!("💡 逐题处理，单题失败不影响后续\n");
}

/// 记录单道基础题开始处理
///
/// # 参数
/// - `index`: 当前序号（从 1 开始）
/// - `total`: 基础题总数
/// - `question_key`: 基础题 key
pub fn log_base_start(index: usize, total: usize, question_key: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 道基础题: {}", index, total, question_key);
    info!("{}", "=".repeat(60));
}

/// 记录单道基础题处理完成
///
/// # 参数
/// - `question_key`: 基础题 key
/// - `persisted`: 成功入库的变体数量
/// - `requested`: 请求的变体数量
pub fn log_base_complete(question_key: &str, persisted: usize, requested: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 基础题 {} 完成: 入库 {}/{}", question_key, persisted, requested);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(success: usize, failed: usize, total: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefghij", 5), "abcde...");
    }
}
