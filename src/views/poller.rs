//! 通用轮询器：按固定间隔拉取一个端点，结果发布到 watch 通道
//!
//! 拉取失败时保留上一次的数据，只更新 error；令牌取消后任务退出。

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;

/// 视图状态：最近一次成功的数据 + 最近一次错误
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    /// 最近一次成功拉取的时间
    pub updated_at: Option<DateTime<Local>>,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
        }
    }
}

impl<T> ViewState<T> {
    /// 合并一次拉取结果：成功替换数据并清空错误，失败保留旧数据
    pub fn apply(&mut self, result: Result<T, ApiError>) {
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                self.updated_at = Some(Local::now());
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    pub fn is_stale(&self) -> bool {
        self.error.is_some() && self.data.is_some()
    }
}

/// 轮询间隔下限；tokio interval 不接受零周期
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 轮询任务句柄；任务退出后发送端随之关闭
pub struct Poller<T> {
    rx: watch::Receiver<ViewState<T>>,
}

impl<T> Poller<T>
where
    T: Send + Sync + 'static,
{
    /// 立即拉取一次，之后每隔 interval 拉取
    pub fn spawn<F, Fut>(
        name: &'static str,
        interval: Duration,
        token: CancellationToken,
        mut fetch: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send,
    {
        let (tx, rx) = watch::channel(ViewState::default());
        let interval = interval.max(MIN_POLL_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let result = tokio::select! {
                    _ = token.cancelled() => break,
                    r = fetch() => r,
                };
                if let Err(e) = &result {
                    tracing::debug!(view = name, error = %e, "poll failed, keeping previous data");
                }
                tx.send_modify(|state| state.apply(result));
            }
            tracing::debug!(view = name, "poller stopped");
        });
        Self { rx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<T>> {
        self.rx.clone()
    }
}
