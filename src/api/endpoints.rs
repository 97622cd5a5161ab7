//! 后端 REST 端点的类型化封装
//!
//! 每个方法都显式接收 RetryPolicy：协调器用 one_shot，视图用客户端默认策略。

use serde_json::{json, Value};

use crate::api::{
    ApiClient, ApiError, ApiRequest, DecisionRequest, DecisionResponse, DemoEvents,
    HurdleResponse, KpiSample, Policy, RetryPolicy,
};

/// 清除当前注入项的哨兵值（hurdle 与 scenario 共用）
pub const CLEAR_SENTINEL: &str = "clear";

impl ApiClient {
    /// POST /env/reset
    pub async fn reset_environment(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::post_empty("/env/reset"), policy).await
    }

    /// POST /env/hurdle {hurdle}
    pub async fn inject_hurdle(
        &self,
        hurdle: &str,
        policy: RetryPolicy,
    ) -> Result<HurdleResponse, ApiError> {
        self.request_json(ApiRequest::post("/env/hurdle", json!({ "hurdle": hurdle })), policy)
            .await
    }

    /// POST /env/demo-mode {enabled}
    pub async fn set_demo_mode(&self, enabled: bool, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(
            ApiRequest::post("/env/demo-mode", json!({ "enabled": enabled })),
            policy,
        )
        .await
    }

    /// POST /env/speed {speed}
    pub async fn set_speed(&self, speed: f64, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::post("/env/speed", json!({ "speed": speed })), policy)
            .await
    }

    /// GET /env/demo-events
    pub async fn demo_events(&self, policy: RetryPolicy) -> Result<DemoEvents, ApiError> {
        self.request_json(ApiRequest::get("/env/demo-events"), policy).await
    }

    /// POST /ai/decision {policy: {type, target}}
    pub async fn ai_decision(
        &self,
        intent: &str,
        target: f64,
        policy: RetryPolicy,
    ) -> Result<DecisionResponse, ApiError> {
        let body = DecisionRequest {
            policy: Policy {
                kind: intent.to_string(),
                target,
            },
        };
        self.request_json(ApiRequest::post("/ai/decision", serde_json::to_value(body)?), policy)
            .await
    }

    /// POST /ai/inject-scenario {scenario}
    pub async fn inject_scenario(&self, scenario: &str, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(
            ApiRequest::post("/ai/inject-scenario", json!({ "scenario": scenario })),
            policy,
        )
        .await
    }

    /// GET /telemetry/all
    pub async fn telemetry_all(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::get("/telemetry/all"), policy).await
    }

    /// GET /telemetry/offloading
    pub async fn telemetry_offloading(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::get("/telemetry/offloading"), policy).await
    }

    /// GET /kpi/?limit=N
    pub async fn kpi(&self, limit: usize, policy: RetryPolicy) -> Result<Vec<KpiSample>, ApiError> {
        self.request_json(ApiRequest::get("/kpi/").with_query("limit", limit), policy)
            .await
    }

    /// GET /learning/timeline
    pub async fn learning_timeline(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::get("/learning/timeline"), policy).await
    }

    /// GET /learning/improvements
    pub async fn learning_improvements(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::get("/learning/improvements"), policy).await
    }

    /// GET /learning/before-after
    pub async fn learning_before_after(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::get("/learning/before-after"), policy).await
    }

    /// POST /learning/seed-demo
    pub async fn seed_learning_demo(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::post_empty("/learning/seed-demo"), policy).await
    }

    /// GET /bootstrap/analysis
    pub async fn bootstrap_analysis(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::get("/bootstrap/analysis"), policy).await
    }

    /// GET /bootstrap/diagnostics
    pub async fn bootstrap_diagnostics(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::get("/bootstrap/diagnostics"), policy).await
    }

    /// GET /broadcast/statistics
    pub async fn broadcast_statistics(&self, policy: RetryPolicy) -> Result<Value, ApiError> {
        self.request_json(ApiRequest::get("/broadcast/statistics"), policy).await
    }

    /// GET /broadcast/stations/nearby?lat&lon&radius_km
    pub async fn stations_nearby(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        policy: RetryPolicy,
    ) -> Result<Value, ApiError> {
        let req = ApiRequest::get("/broadcast/stations/nearby")
            .with_query("lat", lat)
            .with_query("lon", lon)
            .with_query("radius_km", radius_km);
        self.request_json(req, policy).await
    }

    /// GET /broadcast/stations/search?q
    pub async fn stations_search(&self, query: &str, policy: RetryPolicy) -> Result<Value, ApiError> {
        let req = ApiRequest::get("/broadcast/stations/search").with_query("q", query);
        self.request_json(req, policy).await
    }

    /// GET /broadcast/coverage/point?lat&lon
    pub async fn coverage_at_point(
        &self,
        lat: f64,
        lon: f64,
        policy: RetryPolicy,
    ) -> Result<Value, ApiError> {
        let req = ApiRequest::get("/broadcast/coverage/point")
            .with_query("lat", lat)
            .with_query("lon", lon);
        self.request_json(req, policy).await
    }
}
