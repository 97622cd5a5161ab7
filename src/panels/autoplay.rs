//! 自动播放：立即触发第一个场景，之后按固定间隔循环整个场景目录
//!
//! 关闭或面板销毁（Drop）时取消定时任务。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::panels::catalog::SCENARIOS;
use crate::panels::ScenarioPanel;

pub const DEFAULT_AUTOPLAY_INTERVAL: Duration = Duration::from_millis(8000);

pub struct AutoPlay {
    interval: Duration,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl AutoPlay {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// 启动；已在运行时不做任何事
    pub fn start(&mut self, panel: Arc<ScenarioPanel>) {
        if self.running.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let child = token.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            let mut index = 0usize;
            loop {
                let scenario = &SCENARIOS[index % SCENARIOS.len()];
                if let Err(e) = panel.activate(scenario.id).await {
                    tracing::warn!(scenario = scenario.id, error = %e, "auto-play step failed");
                }
                index += 1;
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::debug!("auto-play stopped");
        });
        self.running = Some((token, handle));
    }

    pub fn stop(&mut self) {
        if let Some((token, _handle)) = self.running.take() {
            token.cancel();
        }
    }

    /// 切换开关，返回切换后的状态
    pub fn toggle(&mut self, panel: Arc<ScenarioPanel>) -> bool {
        if self.is_running() {
            self.stop();
        } else {
            self.start(panel);
        }
        self.is_running()
    }
}

impl Default for AutoPlay {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOPLAY_INTERVAL)
    }
}

impl Drop for AutoPlay {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, Method, MockTransport};
    use crate::core::SystemCoordinator;
    use serde_json::json;

    fn panel() -> (Arc<ScenarioPanel>, Arc<MockTransport>) {
        let t = Arc::new(MockTransport::new().on(
            Method::Post,
            "/ai/inject-scenario",
            json!({"ok": true}),
        ));
        let coordinator = SystemCoordinator::new(ApiClient::new(t.clone()));
        (Arc::new(ScenarioPanel::new(coordinator)), t)
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoplay_cycles_and_stops() {
        let (p, t) = panel();
        let mut auto = AutoPlay::default();
        auto.start(p.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(p.active(), Some(SCENARIOS[0].id));
        assert_eq!(t.calls().len(), 1);

        tokio::time::sleep(Duration::from_millis(8000)).await;
        assert_eq!(p.active(), Some(SCENARIOS[1].id));
        assert_eq!(
            t.call_log()[1..],
            [
                "POST /ai/inject-scenario clear".to_string(),
                format!("POST /ai/inject-scenario {}", SCENARIOS[1].id),
            ]
        );

        auto.stop();
        assert!(!auto.is_running());
        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(t.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let (p, t) = panel();
        {
            let mut auto = AutoPlay::default();
            assert!(auto.toggle(p.clone()));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(30_000)).await;
        assert_eq!(t.calls().len(), 1);
    }
}
