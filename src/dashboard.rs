//! 控制台装配：创建 API 客户端、协调器、面板与视图轮询，并运行命令调度任务
//!
//! 与 TUI 之间三类通道：UI -> 调度器的 Command（mpsc）；协调器快照（watch）；
//! 视图、场景面板与自动播放状态（watch）。每条命令在独立任务中执行，
//! 长时间的阶段流程不会阻塞紧急广播等后续命令。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ReqwestTransport};
use crate::config::AppConfig;
use crate::core::{HurdleCommand, SystemCoordinator, SystemSnapshot};
use crate::panels::{AutoPlay, HurdlePanel, ScenarioPanel, ScenarioStatus};
use crate::views::{spawn_views, ViewReceivers};

/// 连接建立超时；单次请求超时由 RetryPolicy 控制
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// 从 UI 发往调度器的命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// 触发第 n 个障碍（0 起）
    InjectHurdle(usize),
    /// 以默认意图运行优化流水线
    TriggerIntent(String),
    Reset,
    ClearHurdle,
    Emergency,
    CancelEmergency,
    NextScenario,
    ClearScenario,
    ToggleAutoPlay,
    ToggleDemoMode,
    /// 仿真速度切换到下一档
    CycleSpeed,
    SeedLearningDemo,
    Quit,
}

/// 控制台句柄：TUI 持有的全部接收端
pub struct Dashboard {
    pub cmd_tx: mpsc::UnboundedSender<Command>,
    pub state_rx: watch::Receiver<SystemSnapshot>,
    pub scenario_rx: watch::Receiver<ScenarioStatus>,
    pub autoplay_rx: watch::Receiver<bool>,
    pub views: ViewReceivers,
    pub coordinator: SystemCoordinator,
    pub base_url: String,
    pub ws_url: String,
    pub default_intent: String,
    token: CancellationToken,
}

impl Dashboard {
    /// 停止调度器、视图轮询与协调器后台任务
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Quit);
        self.coordinator.shutdown();
        self.token.cancel();
    }
}

/// 基于配置创建真实后端的控制台；HTTP 客户端构建失败时返回错误
pub fn create_dashboard(cfg: &AppConfig) -> Result<Dashboard, reqwest::Error> {
    let base_url = cfg.api.resolved_base_url();
    let transport = Arc::new(ReqwestTransport::new(&base_url, CONNECT_TIMEOUT)?);
    let api = ApiClient::new(transport).with_policy(cfg.api.retry_policy());
    tracing::info!(%base_url, ws_url = %cfg.api.resolved_ws_url(), "dashboard backend resolved");
    Ok(create_dashboard_with_client(cfg, api))
}

/// 使用给定客户端创建控制台（测试注入脚本化传输）
pub fn create_dashboard_with_client(cfg: &AppConfig, api: ApiClient) -> Dashboard {
    let token = CancellationToken::new();
    let coordinator = SystemCoordinator::with_default_intent(api.clone(), cfg.ui.default_intent.clone());
    let hurdles = Arc::new(HurdlePanel::new(coordinator.clone()));
    let scenarios = Arc::new(ScenarioPanel::new(coordinator.clone()));
    let views = spawn_views(&api, &cfg.views, &token);

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (autoplay_tx, autoplay_rx) = watch::channel(false);
    let autoplay = AutoPlay::new(Duration::from_millis(cfg.ui.autoplay_interval_ms));

    let dispatcher = Dispatcher {
        coordinator: coordinator.clone(),
        hurdles,
        scenarios: scenarios.clone(),
        autoplay,
        autoplay_tx,
    };
    tokio::spawn(dispatcher.run(cmd_rx, token.clone()));

    Dashboard {
        cmd_tx,
        state_rx: coordinator.subscribe(),
        scenario_rx: scenarios.subscribe(),
        autoplay_rx,
        views,
        coordinator,
        base_url: cfg.api.resolved_base_url(),
        ws_url: cfg.api.resolved_ws_url(),
        default_intent: cfg.ui.default_intent.clone(),
        token,
    }
}

struct Dispatcher {
    coordinator: SystemCoordinator,
    hurdles: Arc<HurdlePanel>,
    scenarios: Arc<ScenarioPanel>,
    autoplay: AutoPlay,
    autoplay_tx: watch::Sender<bool>,
}

impl Dispatcher {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Quit) | None => break,
                    Some(cmd) => self.dispatch(cmd),
                },
            }
        }
        self.autoplay.stop();
        tracing::debug!("dashboard dispatcher stopped");
    }

    fn dispatch(&mut self, cmd: Command) {
        tracing::debug!(?cmd, "dispatching command");
        match cmd {
            Command::InjectHurdle(index) => {
                let panel = self.hurdles.clone();
                spawn_logged("hurdle", async move { panel.trigger(index).await });
            }
            Command::TriggerIntent(intent) => {
                let c = self.coordinator.clone();
                spawn_logged("intent", async move { c.trigger_intent(&intent).await });
            }
            Command::Reset => {
                let c = self.coordinator.clone();
                spawn_logged("reset", async move { c.trigger_hurdle(HurdleCommand::Reset).await });
            }
            Command::ClearHurdle => {
                let c = self.coordinator.clone();
                spawn_logged("clear", async move { c.trigger_hurdle(HurdleCommand::Clear).await });
            }
            Command::Emergency => {
                let c = self.coordinator.clone();
                spawn_logged("emergency", async move { c.trigger_emergency().await });
            }
            Command::CancelEmergency => {
                let c = self.coordinator.clone();
                spawn_logged("cancel_emergency", async move { c.cancel_emergency().await });
            }
            Command::NextScenario => {
                let panel = self.scenarios.clone();
                spawn_logged("scenario", async move { panel.activate_next().await });
            }
            Command::ClearScenario => {
                let panel = self.scenarios.clone();
                spawn_logged("clear_scenario", async move { panel.clear().await });
            }
            Command::ToggleDemoMode => {
                let panel = self.scenarios.clone();
                spawn_logged("demo_mode", async move { panel.toggle_demo_mode().await });
            }
            Command::CycleSpeed => {
                let panel = self.scenarios.clone();
                spawn_logged("speed", async move { panel.cycle_speed().await });
            }
            Command::SeedLearningDemo => {
                let panel = self.scenarios.clone();
                spawn_logged("seed_learning_demo", async move { panel.seed_learning_demo().await });
            }
            Command::ToggleAutoPlay => {
                let running = self.autoplay.toggle(self.scenarios.clone());
                self.coordinator.add_log(if running {
                    "Auto-play started"
                } else {
                    "Auto-play stopped"
                });
                self.autoplay_tx.send_replace(running);
            }
            Command::Quit => {}
        }
    }
}

/// 在独立任务中执行命令；失败已由协调器写入日志，这里只记录 tracing
fn spawn_logged<F, T, E>(name: &'static str, fut: F)
where
    F: std::future::Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            tracing::warn!(command = name, error = %e, "command failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, MockTransport, RetryPolicy};
    use crate::core::Phase;
    use serde_json::json;

    fn dashboard() -> (Dashboard, Arc<MockTransport>) {
        let t = Arc::new(
            MockTransport::new()
                .on(Method::Post, "/env/hurdle", json!({"environment_change": "Coverage dropped 30%"}))
                .on(Method::Post, "/ai/decision", json!({"explanation": "Raised power on TX-2"}))
                .on(Method::Post, "/ai/inject-scenario", json!({"ok": true}))
                .on(Method::Post, "/env/demo-mode", json!({"ok": true}))
                .on(Method::Post, "/env/speed", json!({"ok": true}))
                .on(Method::Post, "/learning/seed-demo", json!({"seeded": 12})),
        );
        let api = ApiClient::new(t.clone()).with_policy(RetryPolicy::one_shot());
        (create_dashboard_with_client(&AppConfig::default(), api), t)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hurdle_command_runs_flow() {
        let (d, t) = dashboard();
        d.cmd_tx.send(Command::InjectHurdle(0)).unwrap();
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        let snap = d.state_rx.borrow().clone();
        assert_eq!(snap.phase, Phase::Broadcasting);
        assert!(snap.adaptation_explanation.is_some());
        assert_eq!(t.count(Method::Post, "/ai/decision"), 1);
        d.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_not_blocked_by_running_flow() {
        let (d, _t) = dashboard();
        d.cmd_tx.send(Command::TriggerIntent("maximize_coverage".into())).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        d.cmd_tx.send(Command::Emergency).unwrap();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(d.state_rx.borrow().phase, Phase::Emergency);
        d.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_and_autoplay_status() {
        let (d, t) = dashboard();
        d.cmd_tx.send(Command::NextScenario).unwrap();
        d.cmd_tx.send(Command::ToggleDemoMode).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let status = *d.scenario_rx.borrow();
        assert_eq!(status.active, Some("stadium_event"));
        assert!(status.demo_mode);

        d.cmd_tx.send(Command::CycleSpeed).unwrap();
        d.cmd_tx.send(Command::SeedLearningDemo).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(d.scenario_rx.borrow().speed, 2.0);
        assert_eq!(t.count(Method::Post, "/learning/seed-demo"), 1);

        d.cmd_tx.send(Command::ToggleAutoPlay).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(*d.autoplay_rx.borrow());
        d.cmd_tx.send(Command::ToggleAutoPlay).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!*d.autoplay_rx.borrow());
        d.shutdown();
    }
}
