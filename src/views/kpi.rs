//! KPI 视图：趋势计算
//!
//! /kpi/ 返回的采样按时间升序排列，最新的在最后。

use crate::api::KpiSample;

/// 面板展示的指标
pub const KPI_METRICS: [&str; 4] = ["coverage", "latency_ms", "emergency_reliability", "throughput"];

/// 最近两条采样之间的百分比变化
///
/// 采样不足两条、任一条缺少该指标、或基准值为 0 时返回 None。
pub fn percent_trend(samples: &[KpiSample], metric: &str) -> Option<f64> {
    let [.., previous, latest] = samples else {
        return None;
    };
    let base = previous.metric(metric)?;
    let current = latest.metric(metric)?;
    if base == 0.0 {
        return None;
    }
    Some((current - base) / base.abs() * 100.0)
}

/// 最新值与趋势
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReading {
    pub metric: &'static str,
    pub value: Option<f64>,
    pub trend: Option<f64>,
}

pub fn latest_readings(samples: &[KpiSample]) -> Vec<KpiReading> {
    KPI_METRICS
        .iter()
        .map(|&metric| KpiReading {
            metric,
            value: samples.last().and_then(|s| s.metric(metric)),
            trend: percent_trend(samples, metric),
        })
        .collect()
}
