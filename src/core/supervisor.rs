//! 流程监管：单流程令牌、抢占与取消
//!
//! 同一时刻只允许一个触发流程在执行。普通触发在令牌被占用时被拒绝，
//! 紧急类触发会取消正在执行的流程并接管令牌。每个流程的步骤都通过 FlowTicket
//! 等待，令牌被取消后在下一个步骤处停止，不会留下孤立的定时器。

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::CoordinatorError;

/// 流程类型（用于日志与抢占判断）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowKind {
    Intent,
    Hurdle,
    Emergency,
    CancelEmergency,
}

#[derive(Debug)]
struct ActiveFlow {
    id: u64,
    kind: FlowKind,
    token: CancellationToken,
}

/// 流程监管器：持有根取消令牌与当前流程槽
#[derive(Debug)]
pub struct FlowSupervisor {
    /// 关闭时取消，所有流程、定时任务随之停止
    root: CancellationToken,
    slot: Arc<Mutex<Option<ActiveFlow>>>,
    /// 最近一次开始的流程 id；延迟回调据此判断自己是否已过期
    latest: AtomicU64,
}

impl FlowSupervisor {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            slot: Arc::new(Mutex::new(None)),
            latest: AtomicU64::new(0),
        }
    }

    /// 开始一个流程；preempt 为 false 且已有流程在执行时返回 None
    pub fn begin(&self, kind: FlowKind, preempt: bool) -> Option<FlowTicket> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(active) = slot.as_ref() {
            if !preempt {
                tracing::debug!(running = ?active.kind, rejected = ?kind, "flow rejected, coordinator busy");
                return None;
            }
            tracing::info!(running = ?active.kind, preempted_by = ?kind, "preempting in-flight flow");
            active.token.cancel();
        }

        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.root.child_token();
        *slot = Some(ActiveFlow {
            id,
            kind,
            token: token.clone(),
        });
        Some(FlowTicket {
            id,
            token,
            slot: Arc::clone(&self.slot),
        })
    }

    /// 当前是否有流程在执行
    pub fn is_busy(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// id 是否仍是最近开始的流程
    pub fn is_latest(&self, id: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == id
    }

    /// 派生子令牌（后台定时任务使用）
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// 取消所有流程与后台任务
    pub fn shutdown(&self) {
        self.root.cancel();
    }
}

impl Default for FlowSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// 单个流程的执行凭证；Drop 时释放流程槽（若仍由自己占用）
#[derive(Debug)]
pub struct FlowTicket {
    id: u64,
    token: CancellationToken,
    slot: Arc<Mutex<Option<ActiveFlow>>>,
}

impl FlowTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 模拟流水线停留；被抢占时返回 Cancelled
    pub async fn dwell(&self, duration: Duration) -> Result<(), CoordinatorError> {
        tokio::select! {
            _ = self.token.cancelled() => Err(CoordinatorError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// 在可取消的前提下等待一个后端调用
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, CoordinatorError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            _ = self.token.cancelled() => Err(CoordinatorError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

impl Drop for FlowTicket {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().map(|a| a.id) == Some(self.id) {
            *slot = None;
        }
    }
}
