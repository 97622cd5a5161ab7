//! 后端 API 层：传输抽象、重试客户端、端点封装与 JSON 结构

pub mod client;
pub mod endpoints;
pub mod error;
pub mod mock;
pub mod transport;
pub mod types;

pub use client::{ApiClient, FetchResult, RetryPolicy, DEFAULT_BASE_URL, HEALTH_TIMEOUT};
pub use endpoints::CLEAR_SENTINEL;
pub use error::ApiError;
pub use mock::{MockTransport, RecordedCall};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport};
pub use types::{
    DecisionRequest, DecisionResponse, DemoEvent, DemoEvents, HurdleResponse, KpiSample, Policy,
};
