//! API 层错误类型
//!
//! 网络失败与 5xx 可重试；超时与主动取消直接上抛，不再重试。

use thiserror::Error;

/// 调用后端 REST API 时可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    /// 单次请求超过 attempt_timeout
    #[error("Request timed out")]
    Timeout,

    #[error("Request aborted")]
    Aborted,

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("All retries failed")]
    RetriesExhausted,
}

impl ApiError {
    /// 是否可以在下一次尝试中重试
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Http { status } => *status >= 500,
            _ => false,
        }
    }

    /// 超时/取消类错误：重试感知路径上必须原样上抛
    pub fn is_abort(&self) -> bool {
        matches!(self, ApiError::Timeout | ApiError::Aborted)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        assert_eq!(ApiError::Http { status: 503 }.to_string(), "HTTP 503");
        assert_eq!(ApiError::RetriesExhausted.to_string(), "All retries failed");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::Network("refused".into()).is_retryable());
        assert!(ApiError::Http { status: 502 }.is_retryable());
        assert!(!ApiError::Http { status: 404 }.is_retryable());
        assert!(!ApiError::Timeout.is_retryable());
        assert!(ApiError::Timeout.is_abort());
        assert!(ApiError::Aborted.is_abort());
    }
}
