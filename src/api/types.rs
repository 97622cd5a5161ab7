//! 后端请求/响应的 JSON 结构
//!
//! 只对协调器和视图真正读取的字段做强类型；其余字段保留在 extra 中原样透传。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// POST /env/hurdle 响应
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HurdleResponse {
    #[serde(default)]
    pub environment_change: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// POST /ai/decision 请求中的策略
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRequest {
    pub policy: Policy,
}

/// POST /ai/decision 响应
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecisionResponse {
    #[serde(default)]
    pub explanation: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 演示模式事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemoEvent {
    #[serde(default)]
    pub timestamp: Value,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub description: String,
}

/// GET /env/demo-events 响应
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DemoEvents {
    #[serde(default)]
    pub events: Vec<DemoEvent>,
}

/// GET /kpi/ 中的一条采样；指标名不固定，全部保留在 metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KpiSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(flatten)]
    pub metrics: Map<String, Value>,
}

impl KpiSample {
    /// 读取数值型指标（数字或数字字符串）
    pub fn metric(&self, name: &str) -> Option<f64> {
        match self.metrics.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
