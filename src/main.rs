//! airwave - 广播网络控制台
//!
//! 入口：加载配置、初始化文件日志、创建控制台并运行 TUI 主循环。
//!
//! 用法：`airwave [--config <path>]`

use std::path::PathBuf;

use anyhow::Context;
use airwave::{
    config::{load_config, AppConfig},
    dashboard::create_dashboard,
    observability,
    prefs::PrefsStore,
    ui::run_app,
};

fn parse_config_arg() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(None),
        Some("--config") | Some("-c") => {
            let path = args.next().context("--config requires a path")?;
            Ok(Some(PathBuf::from(path)))
        }
        Some(other) => anyhow::bail!("unknown argument: {} (usage: airwave [--config <path>])", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = parse_config_arg()?;
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        eprintln!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    // TUI 占用终端，日志写文件
    observability::init_to_file(&cfg.ui.log_path)
        .with_context(|| format!("Failed to open log file {}", cfg.ui.log_path.display()))?;
    tracing::info!(log = %cfg.ui.log_path.display(), "airwave starting");

    let prefs = PrefsStore::load_or_default(cfg.ui.prefs_path.clone());
    let dashboard = create_dashboard(&cfg).context("Failed to build HTTP client")?;

    run_app(dashboard, prefs).await.context("App run failed")?;

    tracing::info!("airwave stopped");
    Ok(())
}
