//! 障碍面板：每个障碍一个按钮，忙碌阶段禁用
//!
//! 当前激活的障碍按钮保持可用，用于显示反馈；真正的重复触发仍由协调器的流程令牌把关。

use crate::core::{CoordinatorError, Hurdle, Phase, SystemCoordinator, SystemSnapshot};
use crate::panels::catalog::{hurdle_entry, CatalogEntry};

/// 面板按钮的渲染状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelItem {
    pub entry: CatalogEntry,
    pub enabled: bool,
    pub active: bool,
}

/// 按钮是否可用：非忙碌阶段可用；忙碌时只有当前激活项可用
pub fn trigger_enabled(phase: Phase, is_active: bool, allow_emergency: bool) -> bool {
    is_active || !phase.is_busy(allow_emergency)
}

pub struct HurdlePanel {
    coordinator: SystemCoordinator,
}

impl HurdlePanel {
    pub fn new(coordinator: SystemCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn items(&self, snapshot: &SystemSnapshot) -> Vec<PanelItem> {
        Hurdle::ALL
            .into_iter()
            .map(|hurdle| {
                let active = snapshot.active_hurdle == Some(hurdle);
                PanelItem {
                    entry: *hurdle_entry(hurdle),
                    enabled: trigger_enabled(snapshot.phase, active, false),
                    active,
                }
            })
            .collect()
    }

    /// 触发第 index 个障碍
    pub async fn trigger(&self, index: usize) -> Result<(), CoordinatorError> {
        let hurdle = Hurdle::ALL
            .get(index)
            .copied()
            .ok_or_else(|| CoordinatorError::UnknownHurdle(format!("#{}", index + 1)))?;
        let snapshot = self.coordinator.snapshot();
        let active = snapshot.active_hurdle == Some(hurdle);
        if !trigger_enabled(snapshot.phase, active, false) {
            return Err(CoordinatorError::Busy { phase: snapshot.phase });
        }
        self.coordinator.trigger_hurdle(hurdle.into()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::{ApiClient, Method, MockTransport};
    use serde_json::json;

    #[test]
    fn test_trigger_enabled_truth_table() {
        assert!(trigger_enabled(Phase::Idle, false, false));
        assert!(trigger_enabled(Phase::Broadcasting, false, false));
        assert!(!trigger_enabled(Phase::Optimizing, false, false));
        assert!(trigger_enabled(Phase::Optimizing, true, false));
        assert!(!trigger_enabled(Phase::Emergency, false, false));
        assert!(trigger_enabled(Phase::Emergency, false, true));
        assert!(!trigger_enabled(Phase::SafetyCheck, false, true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_reflect_active_hurdle() {
        let t = Arc::new(
            MockTransport::new()
                .on(Method::Post, "/env/hurdle", json!({"environment_change": "x"}))
                .on(Method::Post, "/ai/decision", json!({"explanation": "y"})),
        );
        let coordinator = SystemCoordinator::new(ApiClient::new(t));
        let panel = HurdlePanel::new(coordinator.clone());

        panel.trigger(1).await.unwrap();
        let items = panel.items(&coordinator.snapshot());
        assert_eq!(items.len(), 7);
        assert!(items[1].active);
        assert!(items.iter().all(|i| i.enabled));
        assert!(panel.trigger(42).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_phase_disables_other_items() {
        let coordinator = SystemCoordinator::new(ApiClient::new(Arc::new(MockTransport::new())));
        let runner = coordinator.clone();
        let flow = tokio::spawn(async move { runner.trigger_intent("maximize_coverage").await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let panel = HurdlePanel::new(coordinator.clone());
        let items = panel.items(&coordinator.snapshot());
        assert!(items.iter().all(|i| !i.enabled));
        assert_eq!(
            panel.trigger(0).await,
            Err(CoordinatorError::Busy { phase: Phase::Parsing })
        );
        flow.await.unwrap().unwrap();
    }
}
