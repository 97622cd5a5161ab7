//! 只读视图：遥测、卸载、KPI、演示事件、学习时间线、存活探测与导出
//!
//! 每个视图一个轮询任务，共享一个取消令牌；退出时取消令牌即可停止全部轮询。

pub mod export;
pub mod kpi;
pub mod poller;

pub use export::{
    collect_export, csv_field, export_file_name, to_csv, to_json, write_export, ExportBundle,
    ExportError, ExportFormat, ExportSection,
};
pub use kpi::{latest_readings, percent_trend, KpiReading, KPI_METRICS};
pub use poller::{Poller, ViewState};

use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiError, DemoEvents, KpiSample};
use crate::config::ViewsSection;

/// 所有视图的订阅端
#[derive(Clone)]
pub struct ViewReceivers {
    pub telemetry: watch::Receiver<ViewState<Value>>,
    pub offloading: watch::Receiver<ViewState<Value>>,
    pub kpi: watch::Receiver<ViewState<Vec<KpiSample>>>,
    pub demo_events: watch::Receiver<ViewState<DemoEvents>>,
    pub learning: watch::Receiver<ViewState<Value>>,
    /// HEAD /docs 探测结果；Some(false) 表示连接丢失
    pub health: watch::Receiver<ViewState<bool>>,
}

/// 启动全部视图轮询
pub fn spawn_views(api: &ApiClient, cfg: &ViewsSection, token: &CancellationToken) -> ViewReceivers {
    let policy = api.policy();
    let secs = Duration::from_secs;

    let client = api.clone();
    let telemetry = Poller::spawn("telemetry", secs(cfg.telemetry_secs), token.child_token(), move || {
        let client = client.clone();
        async move { client.telemetry_all(policy).await }
    });

    let client = api.clone();
    let offloading = Poller::spawn("offloading", secs(cfg.offloading_secs), token.child_token(), move || {
        let client = client.clone();
        async move { client.telemetry_offloading(policy).await }
    });

    let client = api.clone();
    let limit = cfg.kpi_limit;
    let kpi = Poller::spawn("kpi", secs(cfg.kpi_secs), token.child_token(), move || {
        let client = client.clone();
        async move { client.kpi(limit, policy).await }
    });

    let client = api.clone();
    let demo_events = Poller::spawn("demo_events", secs(cfg.demo_events_secs), token.child_token(), move || {
        let client = client.clone();
        async move { client.demo_events(policy).await }
    });

    let client = api.clone();
    let learning = Poller::spawn("learning", secs(cfg.learning_secs), token.child_token(), move || {
        let client = client.clone();
        async move { client.learning_timeline(policy).await }
    });

    let client = api.clone();
    let health = Poller::spawn("health", secs(cfg.health_secs), token.child_token(), move || {
        let client = client.clone();
        async move { Ok::<_, ApiError>(client.check_health().await) }
    });

    ViewReceivers {
        telemetry: telemetry.subscribe(),
        offloading: offloading.subscribe(),
        kpi: kpi.subscribe(),
        demo_events: demo_events.subscribe(),
        learning: learning.subscribe(),
        health: health.subscribe(),
    }
}
