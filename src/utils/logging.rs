/// 日志工具模块
///
/// 提供日志初始化、日志文件头以及会话级日志输出的辅助函数
use std::fs;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::SessionSummary;

/// 初始化 tracing 订阅器
///
/// 优先使用 `RUST_LOG`，否则根据 `verbose_logging` 选择 debug / info。
/// 重复调用是安全的（测试中会多次调用）。
pub fn init(config: &Config) {
    let fallback = if config.verbose_logging { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> std::io::Result<()> {
    let log_header = format!(
        "{}\n评估会话日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, subtest_count: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 评估会话模式");
    info!("📁 分测验目录: {} (共 {} 个)", config.subtest_folder, subtest_count);
    info!("{}", "=".repeat(60));
}

/// 打印会话完成统计
///
/// # 参数
/// - `session_id`: 会话 ID
/// - `summaries`: 每个分测验的完成摘要
/// - `log_file_path`: 日志文件路径
pub fn print_session_summary(session_id: &str, summaries: &[SessionSummary], log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 会话 {} 完成统计", session_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for summary in summaries {
        info!(
            "  {} | 已计分 {}/{} | {}",
            summary.subtest_id, summary.items_scored, summary.total_items, summary.completion_reason
        );
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
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
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("abcdefghij", 4), "abcd...");
    }
}
