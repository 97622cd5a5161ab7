//! airwave-export - 一次性导出后端统计数据
//!
//! 运行方式：
//! ```bash
//! cargo run --bin airwave-export -- csv ./exports
//! ```
//! 格式默认 json，输出目录默认当前目录。后端地址与控制台相同（AIRWAVE_API_URL / 配置文件）。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use airwave::{
    api::{ApiClient, ReqwestTransport},
    config::load_config,
    observability,
    views::{collect_export, write_export, ExportFormat},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut args = std::env::args().skip(1);
    let format: ExportFormat = match args.next() {
        Some(f) => f.parse()?,
        None => ExportFormat::default(),
    };
    let out_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    let cfg = load_config(None).unwrap_or_default();
    let base_url = cfg.api.resolved_base_url();
    let transport = Arc::new(
        ReqwestTransport::new(&base_url, Duration::from_secs(5)).context("Failed to build HTTP client")?,
    );
    let client = ApiClient::new(transport).with_policy(cfg.api.retry_policy());

    if !client.check_health().await {
        tracing::warn!(%base_url, "backend health check failed, exporting whatever responds");
    }

    let bundle = collect_export(&client, cfg.views.kpi_limit).await;
    let failed = bundle.sections.iter().filter(|s| s.error.is_some()).count();
    let path = write_export(&bundle, &out_dir, format)
        .with_context(|| format!("Failed to write export to {}", out_dir.display()))?;

    println!(
        "Exported {} sections ({} failed) to {}",
        bundle.sections.len(),
        failed,
        path.display()
    );
    Ok(())
}
