/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::browser::BrowserMode;
use crate::config::Config;
use crate::models::outcome::{RunOutcome, RunStatus};

/// 初始化 tracing 订阅者（默认 info，可用 RUST_LOG 覆盖）
///
/// 重复调用是安全的，测试中可以随意调用。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n土地登记导出日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 土地登记文档导出");
    match &config.browser_mode {
        BrowserMode::Headless { .. } => info!("🌐 浏览器: 无头模式，每次检索启动新实例"),
        BrowserMode::Connect { port } => info!("🌐 浏览器: 连接调试端口 {}", port),
    }
    info!("📄 检索条件: {}", config.input_file);
    info!("📦 批次大小: {}", config.batch_size);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `outcome`: 运行结果
/// - `sink_failures`: 输出端写入失败次数
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(outcome: &RunOutcome, sink_failures: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 运行统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    match &outcome.status {
        RunStatus::Fatal(reason) => info!("❌ 运行终止: {}", reason),
        RunStatus::NoResults => info!("📭 检索没有结果"),
        _ => {
            info!("✅ 成功: {}/{}", outcome.succeeded, outcome.attempted);
            info!("❌ 失败: {}", outcome.failed);
            info!("📤 刷新批次: {}", outcome.flushes);
            info!("🖼️ 图片产物: {}", outcome.images_saved);
        }
    }
    if sink_failures > 0 {
        info!("⚠️ 输出端写入失败: {} 次", sink_failures);
    }
    info!("⏱️ 耗时: {:.1} 秒", outcome.elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}
