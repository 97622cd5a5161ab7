//! 协调器错误类型
//!
//! 后端失败在协调器内部已经记录日志并回退到 idle，返回的错误只用于通知调用方。

use thiserror::Error;

use crate::api::ApiError;
use crate::core::Phase;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    /// 已有流程在执行（单流程令牌被占用）
    #[error("Coordinator busy (phase: {phase})")]
    Busy { phase: Phase },

    #[error("Unknown hurdle: {0}")]
    UnknownHurdle(String),

    #[error("Backend call failed: {0}")]
    Api(#[from] ApiError),

    /// 流程被更高优先级的触发（紧急广播）抢占
    #[error("Flow superseded")]
    Cancelled,
}
