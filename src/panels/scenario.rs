//! 场景面板：注入演示场景、切换演示模式与仿真速度
//!
//! 场景直接调用 /ai/inject-scenario，不经过协调器的阶段流程；切换到不同场景前
//! 先向后端发送 clear。结果写入协调器日志，状态条由此更新。

use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::api::{ApiClient, ApiError, RetryPolicy, CLEAR_SENTINEL};
use crate::core::{Phase, SystemCoordinator};
use crate::panels::catalog::{find_scenario, CatalogEntry, SCENARIOS};
use crate::panels::hurdle::{trigger_enabled, PanelItem};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PanelError {
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Panel disabled while coordinator is busy (phase: {phase})")]
    Busy { phase: Phase },

    #[error("Backend call failed: {0}")]
    Api(#[from] ApiError),
}

/// 仿真速度档位（`f` 键循环）
pub const SPEED_STEPS: [f64; 4] = [1.0, 2.0, 5.0, 10.0];

#[derive(Debug)]
struct ScenarioState {
    active: Option<&'static CatalogEntry>,
    demo_mode: bool,
    speed: f64,
}

impl Default for ScenarioState {
    fn default() -> Self {
        Self {
            active: None,
            demo_mode: false,
            speed: SPEED_STEPS[0],
        }
    }
}

/// 对外发布的面板状态（TUI 订阅）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioStatus {
    pub active: Option<&'static str>,
    pub demo_mode: bool,
    pub speed: f64,
}

impl Default for ScenarioStatus {
    fn default() -> Self {
        Self {
            active: None,
            demo_mode: false,
            speed: SPEED_STEPS[0],
        }
    }
}

pub struct ScenarioPanel {
    coordinator: SystemCoordinator,
    api: ApiClient,
    policy: RetryPolicy,
    /// 串行化 activate / clear，保证 clear 与下一次注入不交错
    state: Mutex<ScenarioState>,
    status_tx: watch::Sender<ScenarioStatus>,
}

impl ScenarioPanel {
    /// 使用客户端默认（带重试）策略
    pub fn new(coordinator: SystemCoordinator) -> Self {
        let api = coordinator.api().clone();
        let policy = api.policy();
        let (status_tx, _) = watch::channel(ScenarioStatus::default());
        Self {
            coordinator,
            api,
            policy,
            state: Mutex::new(ScenarioState::default()),
            status_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ScenarioStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> ScenarioStatus {
        *self.status_tx.borrow()
    }

    pub fn active(&self) -> Option<&'static str> {
        self.status().active
    }

    pub fn demo_mode(&self) -> bool {
        self.status().demo_mode
    }

    fn publish(&self, state: &ScenarioState) {
        self.status_tx.send_replace(ScenarioStatus {
            active: state.active.map(|s| s.id),
            demo_mode: state.demo_mode,
            speed: state.speed,
        });
    }

    /// 渲染用：紧急模式下场景面板仍可用
    pub fn items(&self, phase: Phase) -> Vec<PanelItem> {
        scenario_items(phase, self.active())
    }

    /// 注入场景；若已有不同的场景激活，先清除
    pub async fn activate(&self, id: &str) -> Result<(), PanelError> {
        let scenario = find_scenario(id).ok_or_else(|| PanelError::UnknownScenario(id.to_string()))?;
        let mut state = self.state.lock().await;

        let phase = self.coordinator.phase();
        let is_active = state.active.map(|s| s.id) == Some(scenario.id);
        if !trigger_enabled(phase, is_active, true) {
            return Err(PanelError::Busy { phase });
        }

        if let Some(previous) = state.active.filter(|p| p.id != scenario.id) {
            if let Err(e) = self.api.inject_scenario(CLEAR_SENTINEL, self.policy).await {
                tracing::warn!(scenario = previous.id, error = %e, "failed to clear scenario");
                self.coordinator
                    .add_log(format!("Failed to clear scenario {}: {}", previous.label, e));
                return Err(e.into());
            }
            state.active = None;
            self.publish(&state);
        }

        match self.api.inject_scenario(scenario.id, self.policy).await {
            Ok(_) => {
                state.active = Some(scenario);
                self.publish(&state);
                tracing::info!(scenario = scenario.id, "scenario injected");
                self.coordinator
                    .add_log(format!("Scenario injected: {}", scenario.label));
                Ok(())
            }
            Err(e) => {
                self.coordinator
                    .add_log(format!("Scenario {} failed: {}", scenario.label, e));
                Err(e.into())
            }
        }
    }

    /// 清除当前场景（无激活场景时不发请求）
    pub async fn clear(&self) -> Result<(), PanelError> {
        let mut state = self.state.lock().await;
        let Some(previous) = state.active else {
            return Ok(());
        };
        self.api.inject_scenario(CLEAR_SENTINEL, self.policy).await?;
        state.active = None;
        self.publish(&state);
        self.coordinator
            .add_log(format!("Scenario cleared: {}", previous.label));
        Ok(())
    }

    /// 激活目录中的下一个场景（TUI 快捷键使用）
    pub async fn activate_next(&self) -> Result<(), PanelError> {
        let current = self.active();
        let next = match current.and_then(|id| SCENARIOS.iter().position(|s| s.id == id)) {
            Some(i) => &SCENARIOS[(i + 1) % SCENARIOS.len()],
            None => &SCENARIOS[0],
        };
        self.activate(next.id).await
    }

    pub async fn set_demo_mode(&self, enabled: bool) -> Result<(), PanelError> {
        let mut state = self.state.lock().await;
        self.api.set_demo_mode(enabled, self.policy).await?;
        state.demo_mode = enabled;
        self.publish(&state);
        self.coordinator.add_log(if enabled {
            "Demo mode enabled"
        } else {
            "Demo mode disabled"
        });
        Ok(())
    }

    pub async fn toggle_demo_mode(&self) -> Result<bool, PanelError> {
        let enabled = !self.demo_mode();
        self.set_demo_mode(enabled).await?;
        Ok(enabled)
    }

    pub async fn set_speed(&self, speed: f64) -> Result<(), PanelError> {
        let mut state = self.state.lock().await;
        self.api.set_speed(speed, self.policy).await?;
        state.speed = speed;
        self.publish(&state);
        self.coordinator
            .add_log(format!("Simulation speed set to {}x", speed));
        Ok(())
    }

    /// 切换到下一档速度，返回新速度
    pub async fn cycle_speed(&self) -> Result<f64, PanelError> {
        let speed = next_speed(self.status().speed);
        self.set_speed(speed).await?;
        Ok(speed)
    }

    /// 让后端生成学习时间线的演示数据
    pub async fn seed_learning_demo(&self) -> Result<(), PanelError> {
        if let Err(e) = self.api.seed_learning_demo(self.policy).await {
            self.coordinator
                .add_log(format!("Seeding learning demo failed: {}", e));
            return Err(e.into());
        }
        self.coordinator.add_log("Learning demo data seeded");
        Ok(())
    }
}

/// 档位表中的下一档；不在表中的速度回到第一档
pub fn next_speed(current: f64) -> f64 {
    match SPEED_STEPS.iter().position(|s| *s == current) {
        Some(i) => SPEED_STEPS[(i + 1) % SPEED_STEPS.len()],
        None => SPEED_STEPS[0],
    }
}

/// 场景按钮的渲染状态
pub fn scenario_items(phase: Phase, active: Option<&str>) -> Vec<PanelItem> {
    SCENARIOS
        .iter()
        .map(|entry| {
            let is_active = active == Some(entry.id);
            PanelItem {
                entry: *entry,
                enabled: trigger_enabled(phase, is_active, true),
                active: is_active,
            }
        })
        .collect()
}
