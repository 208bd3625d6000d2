/// 日志工具模块
///
/// 负责初始化 tracing 订阅器，并提供命令行输出用的格式化辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::BatchStats;

/// 初始化日志
///
/// 设置了 `RUST_LOG` 时以它为准，否则默认 `info`，详细模式下为 `debug`。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_concurrent`: 最大并发项目数
/// - `mode`: 执行模式
pub fn log_startup(max_concurrent: usize, mode: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 学术章节批量生成");
    info!("📊 最大并发项目数: {}", max_concurrent);
    info!("⚙️ 执行模式: {}", mode);
    info!("{}", "=".repeat(60));
}

/// 记录项目加载信息
pub fn log_projects_loaded(total: usize, sections: usize) {
    info!("✓ 找到 {} 个待处理的项目，共 {} 个章节", total, sections);
}

/// 记录单个项目的统计
pub fn log_project_stats(title: &str, job_id: &str, stats: &BatchStats) {
    info!("\n{}", "─".repeat(60));
    info!("📘 {} ({})", title, job_id);
    info!(
        "   章节: 成功 {} / 失败 {}，成功率 {:.1}%",
        stats.succeeded, stats.failed, stats.success_rate
    );
    info!(
        "   字数: 共 {}，平均 {}；输出 token: {}",
        stats.total_words, stats.average_words, stats.total_tokens
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功项目数
/// - `failed`: 失败项目数
/// - `total`: 项目总数
/// - `total_words`: 所有项目的生成字数
pub fn print_final_stats(success: usize, failed: usize, total: usize, total_words: u64) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("📝 生成字数: {}", total_words);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
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
