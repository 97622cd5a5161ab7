//! 系统协调器：阶段状态机
//!
//! 负责：按固定停留时间推进 parsing → optimizing → safety_check → reconfiguring → broadcasting，
//! 调用后端注入障碍 / 请求 AI 决策 / 重置环境，生成滚动日志与适应说明，并管理紧急广播。
//!
//! 状态只在本模块内被修改：每次修改都是一次短临界区，随后把快照发布到 watch 通道，
//! 并把阶段变化、日志、说明变化推送到 broadcast 事件通道。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, RetryPolicy, CLEAR_SENTINEL};
use crate::core::supervisor::{FlowKind, FlowSupervisor, FlowTicket};
use crate::core::ticker::{next_reach, spawn_ticker, REACH_TICK};
use crate::core::{
    AdaptationExplanation, CoordinatorError, Hurdle, HurdleCommand, Phase, SystemEvent,
    SystemSnapshot, RECEIVERS_FLOOR,
};

/// 未设置意图时使用的默认优化目标
pub const DEFAULT_INTENT: &str = "maximize_coverage";
/// 紧急模式下的意图标记
pub const EMERGENCY_INTENT: &str = "EMERGENCY_BROADCAST";
/// 请求 AI 决策时的目标值
pub const DECISION_TARGET: f64 = 0.95;
/// 适应说明中固定的安全结论
pub const SAFETY_STATEMENT: &str =
    "Safety shield verified: emergency alert reliability maintained at 99.9%";

const PARSING_DWELL: Duration = Duration::from_millis(800);
const OPTIMIZING_DWELL: Duration = Duration::from_millis(1500);
const SAFETY_CHECK_DWELL: Duration = Duration::from_millis(800);
const RECONFIGURING_DWELL: Duration = Duration::from_millis(1200);
/// 意图流程进入 broadcasting 后自动回到 idle
const INTENT_IDLE_DELAY: Duration = Duration::from_millis(3000);

const HURDLE_SETTLE: Duration = Duration::from_millis(600);
const HURDLE_SAFETY_DWELL: Duration = Duration::from_millis(500);
const HURDLE_RECONFIGURE_DWELL: Duration = Duration::from_millis(800);
/// 适应说明的展示时长
const EXPLANATION_TTL: Duration = Duration::from_millis(12_000);

const EMERGENCY_STEP: Duration = Duration::from_millis(400);
const EMERGENCY_CANCEL_DELAY: Duration = Duration::from_millis(1500);

/// 事件通道容量；慢消费者落后时丢弃最旧事件
const EVENT_CAPACITY: usize = 256;

struct Inner {
    state: Mutex<SystemSnapshot>,
    state_tx: watch::Sender<SystemSnapshot>,
    events_tx: broadcast::Sender<SystemEvent>,
    api: ApiClient,
    /// 协调器的后端调用一律单次尝试，失败即回退 idle
    policy: RetryPolicy,
    flows: FlowSupervisor,
    reach_ticker: Mutex<Option<CancellationToken>>,
    default_intent: String,
}

/// 协调器句柄：可克隆，注入到面板、视图与 TUI 调度任务中
#[derive(Clone)]
pub struct SystemCoordinator {
    inner: Arc<Inner>,
}

impl SystemCoordinator {
    pub fn new(api: ApiClient) -> Self {
        Self::with_default_intent(api, DEFAULT_INTENT)
    }

    pub fn with_default_intent(api: ApiClient, default_intent: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(SystemSnapshot::default());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SystemSnapshot::default()),
                state_tx,
                events_tx,
                api,
                policy: RetryPolicy::one_shot(),
                flows: FlowSupervisor::new(),
                reach_ticker: Mutex::new(None),
                default_intent: default_intent.into(),
            }),
        }
    }

    /// 当前状态的克隆
    pub fn snapshot(&self) -> SystemSnapshot {
        self.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// 订阅状态快照（UI 渲染用，可能合并中间状态）
    pub fn subscribe(&self) -> watch::Receiver<SystemSnapshot> {
        self.inner.state_tx.subscribe()
    }

    /// 订阅事件流（不合并，保留完整阶段序列）
    pub fn events(&self) -> broadcast::Receiver<SystemEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// 取消所有流程与后台任务（退出时调用）
    pub fn shutdown(&self) {
        self.inner.flows.shutdown();
        self.stop_reach_ticker();
    }

    /// 追加一条日志（最新在前，最多 50 条）
    pub fn add_log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "airwave::log", "{}", message);
        let entry = self.update(|s| s.logs.push(message));
        self.emit(SystemEvent::Logged(entry));
    }

    /// 提交意图并模拟完整的优化流水线；到达 broadcasting 后 3s 自动回到 idle
    pub async fn trigger_intent(&self, intent: &str) -> Result<(), CoordinatorError> {
        let ticket = self.begin(FlowKind::Intent, false)?;
        self.run_intent(&ticket, intent).await
    }

    /// 注入障碍，或执行 reset / clear
    pub async fn trigger_hurdle(&self, command: HurdleCommand) -> Result<(), CoordinatorError> {
        let ticket = self.begin(FlowKind::Hurdle, false)?;
        match command {
            HurdleCommand::Reset => self.run_reset(&ticket).await,
            HurdleCommand::Clear => self.run_clear(&ticket).await,
            HurdleCommand::Inject(hurdle) => self.run_hurdle(&ticket, hurdle).await,
        }
    }

    /// 按后端 id 触发（面板与 TUI 使用）
    pub async fn trigger_hurdle_id(&self, id: &str) -> Result<(), CoordinatorError> {
        let command = id
            .parse::<HurdleCommand>()
            .map_err(CoordinatorError::UnknownHurdle)?;
        self.trigger_hurdle(command).await
    }

    /// 紧急广播：抢占任何进行中的流程，不会被拒绝
    pub async fn trigger_emergency(&self) -> Result<(), CoordinatorError> {
        let ticket = self.begin(FlowKind::Emergency, true)?;

        self.add_log("CRITICAL: Emergency broadcast requested");
        self.set_phase(Phase::Parsing);
        ticket.dwell(EMERGENCY_STEP).await?;

        self.set_phase(Phase::SafetyCheck);
        self.update(|s| s.safety_lock = true);
        self.add_log("Safety override granted: emergency alert takes priority");
        ticket.dwell(EMERGENCY_STEP).await?;

        self.set_phase(Phase::Emergency);
        self.update(|s| {
            s.active_intent = Some(EMERGENCY_INTENT.to_string());
            s.last_decision_at = Some(Local::now());
            s.receivers_reached = RECEIVERS_FLOOR;
        });
        self.add_log("PLP preemption active: emergency alert on all transmitters");
        self.start_reach_ticker();
        Ok(())
    }

    /// 取消紧急广播：reconfiguring 1.5s 后回到 idle
    pub async fn cancel_emergency(&self) -> Result<(), CoordinatorError> {
        let ticket = self.begin(FlowKind::CancelEmergency, true)?;

        self.set_phase(Phase::Reconfiguring);
        self.update(|s| {
            s.safety_lock = false;
            s.active_hurdle = None;
        });
        self.add_log("Cancelling emergency: restoring normal programming");
        ticket.dwell(EMERGENCY_CANCEL_DELAY).await?;

        self.set_phase(Phase::Idle);
        self.update(|s| s.active_intent = None);
        self.add_log("Emergency cancelled, system idle");
        Ok(())
    }

    async fn run_intent(&self, ticket: &FlowTicket, intent: &str) -> Result<(), CoordinatorError> {
        self.update(|s| s.active_intent = Some(intent.to_string()));
        self.add_log(format!("Intent received: {}", intent));

        self.set_phase(Phase::Parsing);
        self.add_log("Parsing intent into network policy");
        ticket.dwell(PARSING_DWELL).await?;

        self.set_phase(Phase::Optimizing);
        self.add_log("AI optimizing transmitter configuration");
        ticket.dwell(OPTIMIZING_DWELL).await?;

        self.set_phase(Phase::SafetyCheck);
        self.add_log("Safety shield validating proposed configuration");
        ticket.dwell(SAFETY_CHECK_DWELL).await?;

        self.set_phase(Phase::Reconfiguring);
        self.add_log("Reconfiguring transmitters");
        ticket.dwell(RECONFIGURING_DWELL).await?;

        self.set_phase(Phase::Broadcasting);
        self.add_log("Broadcasting with optimized configuration");
        self.schedule_idle(ticket.id());
        Ok(())
    }

    async fn run_reset(&self, ticket: &FlowTicket) -> Result<(), CoordinatorError> {
        let api = self.inner.api.clone();
        let policy = self.inner.policy;
        if let Err(e) = ticket.guard(api.reset_environment(policy)).await? {
            tracing::warn!(error = %e, "environment reset failed");
            self.add_log(format!("Reset failed: {}", e));
            return Err(e.into());
        }

        let previous_intent = self.update(|s| {
            s.active_hurdle = None;
            s.adaptation_explanation = None;
            s.active_intent.clone()
        });
        self.emit(SystemEvent::ExplanationChanged(None));
        self.add_log("Environment reset to nominal conditions");

        let intent = previous_intent.unwrap_or_else(|| self.inner.default_intent.clone());
        self.run_intent(ticket, &intent).await
    }

    async fn run_clear(&self, ticket: &FlowTicket) -> Result<(), CoordinatorError> {
        let api = self.inner.api.clone();
        let policy = self.inner.policy;
        if let Err(e) = ticket.guard(api.inject_hurdle(CLEAR_SENTINEL, policy)).await? {
            tracing::warn!(error = %e, "hurdle clear failed");
            self.add_log(format!("Clearing hurdle failed: {}", e));
            return Err(e.into());
        }
        self.update(|s| {
            s.active_hurdle = None;
            s.adaptation_explanation = None;
        });
        self.emit(SystemEvent::ExplanationChanged(None));
        self.add_log("Hurdle cleared, nominal conditions restored");
        self.set_phase(Phase::Idle);
        Ok(())
    }

    async fn run_hurdle(&self, ticket: &FlowTicket, hurdle: Hurdle) -> Result<(), CoordinatorError> {
        let api = self.inner.api.clone();
        let policy = self.inner.policy;

        // 同一时刻只保留一个障碍：切换前先在后端清除上一个
        let previous = self.lock().active_hurdle;
        if let Some(prev) = previous.filter(|p| *p != hurdle) {
            self.add_log(format!("Clearing previous hurdle: {}", prev));
            if let Err(e) = ticket.guard(api.inject_hurdle(CLEAR_SENTINEL, policy)).await? {
                tracing::warn!(hurdle = %prev, error = %e, "failed to clear previous hurdle");
                self.add_log(format!("Failed to clear {}: {}", prev, e));
                return Err(e.into());
            }
            self.update(|s| s.active_hurdle = None);
        }

        self.update(|s| s.active_hurdle = Some(hurdle));
        self.add_log(format!("Hurdle injected: {}", hurdle));
        self.set_phase(Phase::Parsing);

        let env = match ticket.guard(api.inject_hurdle(hurdle.id(), policy)).await? {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(hurdle = %hurdle, error = %e, "hurdle injection failed");
                self.add_log(format!("Hurdle injection failed: {}", e));
                self.update(|s| s.active_hurdle = None);
                self.set_phase(Phase::Idle);
                return Err(e.into());
            }
        };
        let changed = if env.environment_change.trim().is_empty() {
            format!("{} detected", hurdle)
        } else {
            env.environment_change
        };
        self.add_log(format!("Environment change: {}", changed));
        ticket.dwell(HURDLE_SETTLE).await?;

        self.set_phase(Phase::Optimizing);
        self.add_log("AI detected degraded conditions, computing adaptation");

        let intent = self
            .lock()
            .active_intent
            .clone()
            .unwrap_or_else(|| self.inner.default_intent.clone());
        let decision = match ticket
            .guard(api.ai_decision(&intent, DECISION_TARGET, policy))
            .await?
        {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(hurdle = %hurdle, error = %e, "AI decision failed");
                self.add_log(format!("AI decision failed: {}", e));
                self.set_phase(Phase::Idle);
                return Err(e.into());
            }
        };

        self.set_phase(Phase::SafetyCheck);
        self.add_log("Safety shield validating adaptation");
        ticket.dwell(HURDLE_SAFETY_DWELL).await?;

        self.set_phase(Phase::Reconfiguring);
        let action = if decision.explanation.trim().is_empty() {
            "Reconfigured transmission parameters".to_string()
        } else {
            decision.explanation
        };
        let explanation = AdaptationExplanation::new(changed, action.clone(), SAFETY_STATEMENT);
        let explanation_id = explanation.id;
        self.update(|s| s.adaptation_explanation = Some(explanation.clone()));
        self.emit(SystemEvent::ExplanationChanged(Some(explanation)));
        self.add_log(format!("AI adapted: {}", action));
        ticket.dwell(HURDLE_RECONFIGURE_DWELL).await?;

        self.set_phase(Phase::Broadcasting);
        self.update(|s| s.last_decision_at = Some(Local::now()));
        self.add_log("Network stabilized under new conditions");
        self.schedule_explanation_clear(explanation_id);
        Ok(())
    }

    /// 紧急广播持续期间只接受紧急类触发；safety_lock 只由 cancel_emergency 解除
    fn begin(&self, kind: FlowKind, preempt: bool) -> Result<FlowTicket, CoordinatorError> {
        if !preempt && self.phase() == Phase::Emergency {
            tracing::debug!(rejected = ?kind, "trigger rejected during emergency broadcast");
            return Err(CoordinatorError::Busy { phase: Phase::Emergency });
        }
        self.inner
            .flows
            .begin(kind, preempt)
            .ok_or_else(|| CoordinatorError::Busy { phase: self.phase() })
    }

    /// 意图流程的自动回退：期间若有新流程开始则放弃
    fn schedule_idle(&self, flow_id: u64) {
        let this = self.clone();
        let token = self.inner.flows.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(INTENT_IDLE_DELAY) => {
                    if this.inner.flows.is_latest(flow_id) && this.phase() == Phase::Broadcasting {
                        this.set_phase(Phase::Idle);
                    }
                }
            }
        });
    }

    /// 适应说明到期清除：只清除自己安排的那一条
    fn schedule_explanation_clear(&self, id: uuid::Uuid) {
        let this = self.clone();
        let token = self.inner.flows.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(EXPLANATION_TTL) => {
                    let cleared = this.update(|s| {
                        if s.adaptation_explanation.as_ref().map(|e| e.id) == Some(id) {
                            s.adaptation_explanation = None;
                            true
                        } else {
                            false
                        }
                    });
                    if cleared {
                        this.emit(SystemEvent::ExplanationChanged(None));
                    }
                }
            }
        });
    }

    fn start_reach_ticker(&self) {
        let token = self.inner.flows.child_token();
        if let Some(old) = self.ticker_slot().replace(token.clone()) {
            old.cancel();
        }
        let this = self.clone();
        spawn_ticker(REACH_TICK, token, move || this.bump_reach());
    }

    fn stop_reach_ticker(&self) {
        if let Some(token) = self.ticker_slot().take() {
            token.cancel();
        }
    }

    /// 紧急模式下增加覆盖人数；已离开紧急模式时返回 false 结束计时
    fn bump_reach(&self) -> bool {
        self.update(|s| {
            if s.phase != Phase::Emergency {
                return false;
            }
            s.receivers_reached = next_reach(s.receivers_reached, &mut rand::thread_rng());
            true
        })
    }

    fn set_phase(&self, phase: Phase) {
        let previous = self.update(|s| std::mem::replace(&mut s.phase, phase));
        if previous == phase {
            return;
        }
        tracing::debug!(from = %previous, to = %phase, "phase transition");
        if previous == Phase::Emergency {
            self.stop_reach_ticker();
        }
        self.emit(SystemEvent::PhaseChanged(phase));
    }

    /// 在锁内修改状态并发布快照；发布也在锁内，watch 上的快照顺序与修改顺序一致
    fn update<R>(&self, f: impl FnOnce(&mut SystemSnapshot) -> R) -> R {
        let mut state = self.lock();
        let out = f(&mut state);
        self.inner.state_tx.send_replace(state.clone());
        out
    }

    fn emit(&self, event: SystemEvent) {
        let _ = self.inner.events_tx.send(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SystemSnapshot> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ticker_slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.inner.reach_ticker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiResponse, Method, MockTransport};
    use crate::core::LOG_CAPACITY;
    use serde_json::json;

    fn backend() -> MockTransport {
        MockTransport::new()
            .on(Method::Post, "/env/reset", json!({"status": "ok"}))
            .on(
                Method::Post,
                "/env/hurdle",
                json!({"environment_change": "Coverage dropped 30% in sector 4"}),
            )
            .on(
                Method::Post,
                "/ai/decision",
                json!({"explanation": "Raised transmit power on towers 3 and 7"}),
            )
    }

    fn coordinator(t: MockTransport) -> (SystemCoordinator, Arc<MockTransport>) {
        let t = Arc::new(t);
        (SystemCoordinator::new(ApiClient::new(t.clone())), t)
    }

    fn phases(rx: &mut broadcast::Receiver<SystemEvent>) -> Vec<Phase> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SystemEvent::PhaseChanged(p) = event {
                out.push(p);
            }
        }
        out
    }

    fn logged(rx: &mut broadcast::Receiver<SystemEvent>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SystemEvent::Logged(entry) = event {
                out.push(entry.message);
            }
        }
        out
    }

    #[test]
    fn test_add_log_keeps_most_recent_fifty() {
        let (c, _t) = coordinator(MockTransport::new());
        for i in 0..60 {
            c.add_log(format!("line {}", i));
        }
        let snap = c.snapshot();
        assert_eq!(snap.logs.len(), LOG_CAPACITY);
        assert_eq!(snap.logs.latest().unwrap().message, "line 59");
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_runs_full_pipeline_then_idles() {
        let (c, t) = coordinator(MockTransport::new());
        let mut events = c.events();

        c.trigger_intent("maximize_coverage").await.unwrap();
        assert_eq!(c.phase(), Phase::Broadcasting);
        assert_eq!(c.snapshot().active_intent.as_deref(), Some("maximize_coverage"));

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(
            phases(&mut events),
            vec![
                Phase::Parsing,
                Phase::Optimizing,
                Phase::SafetyCheck,
                Phase::Reconfiguring,
                Phase::Broadcasting,
                Phase::Idle,
            ]
        );
        assert!(t.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_dwell_times() {
        let (c, _t) = coordinator(MockTransport::new());
        let start = tokio::time::Instant::now();
        c.trigger_intent("maximize_capacity").await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(800 + 1500 + 800 + 1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_trigger_rejected_while_busy() {
        let (c, _t) = coordinator(backend());
        let runner = c.clone();
        let flow = tokio::spawn(async move { runner.trigger_intent("maximize_coverage").await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = c.trigger_hurdle(Hurdle::Interference.into()).await.unwrap_err();
        assert_eq!(err, CoordinatorError::Busy { phase: Phase::Parsing });
        assert_eq!(
            c.trigger_intent("other").await,
            Err(CoordinatorError::Busy { phase: Phase::Parsing })
        );

        flow.await.unwrap().unwrap();
        assert_eq!(c.phase(), Phase::Broadcasting);
        assert_eq!(c.snapshot().active_intent.as_deref(), Some("maximize_coverage"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hurdle_flow_stays_broadcasting_and_clears_explanation() {
        for hurdle in Hurdle::ALL {
            let (c, t) = coordinator(backend());
            let mut events = c.events();

            c.trigger_hurdle(hurdle.into()).await.unwrap();
            let snap = c.snapshot();
            assert_eq!(snap.phase, Phase::Broadcasting);
            assert_eq!(snap.active_hurdle, Some(hurdle));
            assert!(snap.last_decision_at.is_some());
            let explanation = snap.adaptation_explanation.unwrap();
            assert_eq!(explanation.changed, "Coverage dropped 30% in sector 4");
            assert_eq!(explanation.action, "Raised transmit power on towers 3 and 7");
            assert_eq!(explanation.safe, SAFETY_STATEMENT);

            assert_eq!(
                phases(&mut events),
                vec![
                    Phase::Parsing,
                    Phase::Optimizing,
                    Phase::SafetyCheck,
                    Phase::Reconfiguring,
                    Phase::Broadcasting,
                ]
            );

            tokio::time::sleep(Duration::from_millis(12_100)).await;
            let snap = c.snapshot();
            assert!(snap.adaptation_explanation.is_none());
            assert_eq!(snap.phase, Phase::Broadcasting);

            assert_eq!(
                t.call_log(),
                vec![
                    format!("POST /env/hurdle {}", hurdle),
                    "POST /ai/decision".to_string(),
                ]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_hurdle_clears_previous_first() {
        let (c, t) = coordinator(backend());
        c.trigger_hurdle(Hurdle::CoverageDrop.into()).await.unwrap();
        c.trigger_hurdle(Hurdle::Interference.into()).await.unwrap();

        assert_eq!(
            t.call_log(),
            vec![
                "POST /env/hurdle coverage_drop",
                "POST /ai/decision",
                "POST /env/hurdle clear",
                "POST /env/hurdle interference",
                "POST /ai/decision",
            ]
        );
        assert_eq!(c.snapshot().active_hurdle, Some(Hurdle::Interference));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_hurdle_does_not_clear() {
        let (c, t) = coordinator(backend());
        c.trigger_hurdle(Hurdle::TrafficSurge.into()).await.unwrap();
        c.trigger_hurdle(Hurdle::TrafficSurge.into()).await.unwrap();
        assert_eq!(t.count(Method::Post, "/env/hurdle"), 2);
        assert!(!t.call_log().contains(&"POST /env/hurdle clear".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hurdle_injection_failure_reverts_to_idle() {
        let (c, _t) = coordinator(
            MockTransport::new().on_status(Method::Post, "/env/hurdle", 500, json!({})),
        );
        let err = c.trigger_hurdle(Hurdle::SpectrumReduction.into()).await.unwrap_err();
        assert_eq!(err, CoordinatorError::Api(ApiError::Http { status: 500 }));
        let snap = c.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(snap.active_hurdle.is_none());
        assert!(snap.logs.latest().unwrap().message.contains("Hurdle injection failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decision_failure_reverts_to_idle() {
        let (c, _t) = coordinator(
            MockTransport::new()
                .on(Method::Post, "/env/hurdle", json!({"environment_change": "x"}))
                .enqueue(Method::Post, "/ai/decision", Err(ApiError::Network("refused".into()))),
        );
        let err = c.trigger_hurdle(Hurdle::MobilitySurge.into()).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Api(ApiError::Network(_))));
        let snap = c.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(snap.adaptation_explanation.is_none());
        assert!(snap.logs.latest().unwrap().message.starts_with("AI decision failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_is_idempotent() {
        let (c, t) = coordinator(backend());
        c.trigger_hurdle(HurdleCommand::Reset).await.unwrap();
        assert!(c.snapshot().active_hurdle.is_none());
        c.trigger_hurdle(HurdleCommand::Reset).await.unwrap();
        assert!(c.snapshot().active_hurdle.is_none());
        assert_eq!(t.count(Method::Post, "/env/reset"), 2);
        assert_eq!(c.snapshot().active_intent.as_deref(), Some(DEFAULT_INTENT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_reoptimizes_previous_intent() {
        let (c, _t) = coordinator(backend());
        c.trigger_intent("minimize_latency").await.unwrap();
        c.trigger_hurdle(Hurdle::CoverageDrop.into()).await.unwrap();
        c.trigger_hurdle(HurdleCommand::Reset).await.unwrap();
        let snap = c.snapshot();
        assert!(snap.active_hurdle.is_none());
        assert!(snap.adaptation_explanation.is_none());
        assert_eq!(snap.active_intent.as_deref(), Some("minimize_latency"));
        assert_eq!(snap.phase, Phase::Broadcasting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_failure_leaves_state_unchanged() {
        let (c, _t) = coordinator(
            backend().enqueue(Method::Post, "/env/reset", Ok(ApiResponse::new(503, ""))),
        );
        c.trigger_hurdle(Hurdle::CoverageDrop.into()).await.unwrap();
        let mut events = c.events();
        assert!(c.trigger_hurdle(HurdleCommand::Reset).await.is_err());
        let snap = c.snapshot();
        assert_eq!(snap.active_hurdle, Some(Hurdle::CoverageDrop));
        assert_eq!(snap.phase, Phase::Broadcasting);
        assert!(phases(&mut events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_sentinel() {
        let (c, t) = coordinator(backend());
        c.trigger_hurdle(Hurdle::Interference.into()).await.unwrap();
        c.trigger_hurdle_id("clear").await.unwrap();
        let snap = c.snapshot();
        assert!(snap.active_hurdle.is_none());
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(t.call_log().last().map(String::as_str), Some("POST /env/hurdle clear"));
        assert_eq!(
            c.trigger_hurdle_id("solar_flare").await,
            Err(CoordinatorError::UnknownHurdle("solar_flare".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_ticker_bounds_and_stops() {
        let (c, _t) = coordinator(MockTransport::new());
        c.trigger_emergency().await.unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.phase, Phase::Emergency);
        assert!(snap.safety_lock);
        assert_eq!(snap.active_intent.as_deref(), Some(EMERGENCY_INTENT));
        assert_eq!(snap.receivers_reached, RECEIVERS_FLOOR);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let reached = c.snapshot().receivers_reached;
        assert!((12_000..=12_200).contains(&reached), "reached = {}", reached);

        c.cancel_emergency().await.unwrap();
        let stopped_at = c.snapshot().receivers_reached;
        tokio::time::sleep(Duration::from_millis(2000)).await;
        let snap = c.snapshot();
        assert_eq!(snap.receivers_reached, stopped_at);
        assert_eq!(snap.phase, Phase::Idle);
        assert!(!snap.safety_lock);
        assert!(snap.active_intent.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_preempts_intent_flow() {
        let (c, _t) = coordinator(MockTransport::new());
        let runner = c.clone();
        let flow = tokio::spawn(async move { runner.trigger_intent("maximize_coverage").await });
        tokio::time::sleep(Duration::from_millis(1000)).await;

        c.trigger_emergency().await.unwrap();
        assert_eq!(flow.await.unwrap(), Err(CoordinatorError::Cancelled));

        // 被抢占的意图流程不会再推进阶段
        tokio::time::sleep(Duration::from_millis(6000)).await;
        assert_eq!(c.phase(), Phase::Emergency);
        c.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_intent_idle_does_not_clobber_new_flow() {
        let (c, _t) = coordinator(backend());
        c.trigger_intent("maximize_coverage").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        // 新的障碍流程在旧的 3s 回退到期前开始
        c.trigger_hurdle(Hurdle::CoverageDrop.into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(c.phase(), Phase::Broadcasting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_watch_tracks_phase() {
        let (c, _t) = coordinator(MockTransport::new());
        let rx = c.subscribe();
        let mut events = c.events();
        c.trigger_intent("maximize_coverage").await.unwrap();
        assert_eq!(rx.borrow().phase, Phase::Broadcasting);
        assert_eq!(
            logged(&mut events),
            vec![
                "Intent received: maximize_coverage",
                "Parsing intent into network policy",
                "AI optimizing transmitter configuration",
                "Safety shield validating proposed configuration",
                "Reconfiguring transmitters",
                "Broadcasting with optimized configuration",
            ]
        );
        assert_eq!(
            rx.borrow().logs.latest().map(|l| l.message.as_str()),
            Some("Broadcasting with optimized configuration")
        );
    }

    #[test]
    fn test_concurrent_writers_publish_final_state() {
        let (c, _t) = coordinator(MockTransport::new());
        let rx = c.subscribe();
        for round in 0..20 {
            let writers: Vec<_> = (0..4)
                .map(|w| {
                    let c = c.clone();
                    std::thread::spawn(move || {
                        for i in 0..50 {
                            c.add_log(format!("{}-{}-{}", round, w, i));
                        }
                    })
                })
                .collect();
            for w in writers {
                w.join().unwrap();
            }
            let published = rx.borrow().logs.latest().cloned();
            assert_eq!(published.as_ref(), c.snapshot().logs.latest(), "round {}", round);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_rejects_normal_triggers_until_cancelled() {
        let (c, t) = coordinator(backend());
        c.trigger_emergency().await.unwrap();

        let busy = Err(CoordinatorError::Busy { phase: Phase::Emergency });
        assert_eq!(c.trigger_hurdle(HurdleCommand::Clear).await, busy);
        assert_eq!(c.trigger_hurdle(HurdleCommand::Reset).await, busy);
        assert_eq!(c.trigger_hurdle(Hurdle::Interference.into()).await, busy);
        assert_eq!(c.trigger_intent("maximize_coverage").await, busy);
        assert!(t.calls().is_empty());

        let snap = c.snapshot();
        assert_eq!(snap.phase, Phase::Emergency);
        assert!(snap.safety_lock);
        assert_eq!(snap.active_intent.as_deref(), Some(EMERGENCY_INTENT));

        c.cancel_emergency().await.unwrap();
        c.trigger_intent("maximize_coverage").await.unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.phase, Phase::Broadcasting);
        assert!(!snap.safety_lock);
    }
}
