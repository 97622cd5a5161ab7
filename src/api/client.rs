//! 带超时与指数退避重试的 API 客户端
//!
//! - 单次尝试超时（默认 10s），超时直接上抛不重试
//! - status < 500 的响应（成功或 4xx）立即返回
//! - 网络错误与 5xx 按 base_delay * 2^attempt 退避重试，最后一次失败后不再等待
//! - fetch_json 永不返回 Err：结果为 {data, error} 二元组

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::api::{ApiError, ApiRequest, ApiResponse, HttpTransport};

/// 默认后端地址
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// 健康探测超时
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// 每个调用点可单独选择的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（0 表示不发请求，直接 RetriesExhausted）
    pub max_retries: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// 只尝试一次（协调器的触发流程使用）
    pub fn one_shot() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 第 attempt 次（从 0 开始）失败后的等待时间
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// fetch_json 的结果二元组
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult<T> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> FetchResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl ToString) -> Self {
        Self {
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// API 客户端：持有传输层与默认重试策略，可廉价克隆
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 客户端默认策略（视图轮询使用）
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 带重试的请求；4xx 作为终态响应返回，由调用方判断
    pub async fn fetch_with_retry(
        &self,
        request: ApiRequest,
        policy: RetryPolicy,
    ) -> Result<ApiResponse, ApiError> {
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..policy.max_retries {
            let outcome =
                tokio::time::timeout(policy.attempt_timeout, self.transport.send(request.clone()))
                    .await;
            let error = match outcome {
                Err(_) => ApiError::Timeout,
                Ok(Ok(resp)) if resp.status < 500 => return Ok(resp),
                Ok(Ok(resp)) => ApiError::Http { status: resp.status },
                Ok(Err(e)) => e,
            };
            if error.is_abort() || !error.is_retryable() {
                tracing::warn!(path = %request.path, error = %error, attempt, "request failed, not retrying");
                return Err(error);
            }
            tracing::debug!(path = %request.path, error = %error, attempt, "request failed");
            last_error = Some(error);

            if attempt + 1 < policy.max_retries {
                tokio::time::sleep(policy.backoff(attempt)).await;
            }
        }

        Err(last_error.unwrap_or(ApiError::RetriesExhausted))
    }

    /// 请求并解码 JSON；失败时 data 为 None、error 为消息，永不返回 Err
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        policy: RetryPolicy,
    ) -> FetchResult<T> {
        match self.request_json(request, policy).await {
            Ok(data) => FetchResult::ok(data),
            Err(e) => FetchResult::err(e),
        }
    }

    /// 同 fetch_json，但保留类型化错误，供需要 `?` 的调用点使用
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        policy: RetryPolicy,
    ) -> Result<T, ApiError> {
        let resp = self.fetch_with_retry(request, policy).await?;
        if !resp.is_success() {
            return Err(ApiError::Http { status: resp.status });
        }
        // 空 body 按 null 处理，便于 serde_json::Value / Option 接收
        let body = if resp.body.trim().is_empty() {
            "null"
        } else {
            resp.body.as_str()
        };
        Ok(serde_json::from_str(body)?)
    }

    /// HEAD /docs 存活探测，3s 超时，任何错误都视为 false
    pub async fn check_health(&self) -> bool {
        match tokio::time::timeout(HEALTH_TIMEOUT, self.transport.send(ApiRequest::head("/docs")))
            .await
        {
            Ok(Ok(resp)) => resp.is_success(),
            _ => false,
        }
    }
}
