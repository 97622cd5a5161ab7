//! 脚本化传输（用于测试与离线演示，无需后端）
//!
//! 按 (方法, 路径) 预置响应队列；队列耗尽后使用该路由的默认响应，未知路由返回 404。
//! 所有请求按顺序记录，便于断言调用顺序。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ApiError, ApiRequest, ApiResponse, HttpTransport, Method};

type Route = (Method, String);

/// 被记录下来的一次调用
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Script {
    queued: HashMap<Route, VecDeque<Result<ApiResponse, ApiError>>>,
    fallback: HashMap<Route, ApiResponse>,
    calls: Vec<RecordedCall>,
}

/// 脚本化传输
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<Script>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 该路由始终返回给定 JSON（200）
    pub fn on(self, method: Method, path: &str, body: Value) -> Self {
        self.on_status(method, path, 200, body)
    }

    pub fn on_status(self, method: Method, path: &str, status: u16, body: Value) -> Self {
        if let Ok(mut s) = self.script.lock() {
            s.fallback
                .insert((method, path.to_string()), ApiResponse::new(status, body.to_string()));
        }
        self
    }

    /// 追加一次性结果，优先于默认响应按顺序消费
    pub fn enqueue(self, method: Method, path: &str, result: Result<ApiResponse, ApiError>) -> Self {
        if let Ok(mut s) = self.script.lock() {
            s.queued
                .entry((method, path.to_string()))
                .or_default()
                .push_back(result);
        }
        self
    }

    /// 已发生的调用（按顺序）
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// 便于断言的简写："POST /env/hurdle coverage_drop"
    pub fn call_log(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|c| {
                let method = match c.method {
                    Method::Get => "GET",
                    Method::Post => "POST",
                    Method::Head => "HEAD",
                };
                let arg = c
                    .body
                    .as_ref()
                    .and_then(|b| b.as_object())
                    .and_then(|o| o.values().next())
                    .and_then(|v| v.as_str())
                    .map(|s| format!(" {}", s))
                    .unwrap_or_default();
                format!("{} {}{}", method, c.path, arg)
            })
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut s = self
            .script
            .lock()
            .map_err(|_| ApiError::Network("mock transport poisoned".to_string()))?;
        s.calls.push(RecordedCall {
            method: request.method,
            path: request.path.clone(),
            query: request.query.clone(),
            body: request.body.clone(),
        });
        let route = (request.method, request.path);
        if let Some(result) = s.queued.get_mut(&route).and_then(|q| q.pop_front()) {
            return result;
        }
        Ok(s
            .fallback
            .get(&route)
            .cloned()
            .unwrap_or_else(|| ApiResponse::new(404, "{\"detail\":\"Not Found\"}")))
    }
}
