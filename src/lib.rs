//! airwave - 广播网络控制台
//!
//! 模块划分：
//! - **api**: 后端 REST 客户端（传输抽象、重试策略、端点封装、脚本化传输）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 阶段状态机（SystemCoordinator）、流程监管、紧急计数器
//! - **dashboard**: 装配客户端 / 协调器 / 面板 / 视图，运行命令调度任务
//! - **observability**: tracing 初始化
//! - **panels**: 障碍与场景触发面板、自动播放
//! - **prefs**: 深色模式偏好持久化
//! - **ui**: Ratatui TUI 界面
//! - **views**: 遥测 / KPI / 演示事件轮询与数据导出

pub mod api;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod observability;
pub mod panels;
pub mod prefs;
pub mod ui;
pub mod views;

pub use crate::api::{ApiClient, ApiError, RetryPolicy};
pub use crate::core::{CoordinatorError, Phase, SystemCoordinator, SystemSnapshot};
