//! TUI 应用主循环
//!
//! 进入全屏/原始模式，每帧读取协调器快照与各视图状态并渲染；
//! 按键经 EventHandler 转为 Command 发送给调度器，深色模式切换写回偏好文件。

use std::io::{self, Stdout};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::dashboard::Dashboard;
use crate::panels::HurdlePanel;
use crate::prefs::PrefsStore;
use crate::ui::event::{AppEvent, EventHandler};
use crate::ui::render::{draw, DashboardFrame};

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端并停止后台任务
pub async fn run_app(dashboard: Dashboard, mut prefs: PrefsStore) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &dashboard, &mut prefs).await;

    dashboard.shutdown();
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    dashboard: &Dashboard,
    prefs: &mut PrefsStore,
) -> anyhow::Result<()> {
    let events = EventHandler::new(dashboard.cmd_tx.clone(), dashboard.default_intent.clone());
    let hurdle_panel = HurdlePanel::new(dashboard.coordinator.clone());
    let views = &dashboard.views;

    loop {
        let snapshot = dashboard.state_rx.borrow().clone();
        let hurdles = hurdle_panel.items(&snapshot);
        let telemetry = views.telemetry.borrow().clone();
        let offloading = views.offloading.borrow().clone();
        let learning = views.learning.borrow().clone();
        let kpi = views.kpi.borrow().clone();
        let demo_events = views.demo_events.borrow().clone();
        let health = views.health.borrow().clone();
        let frame = DashboardFrame {
            snapshot: &snapshot,
            hurdles: &hurdles,
            scenario: *dashboard.scenario_rx.borrow(),
            autoplay: *dashboard.autoplay_rx.borrow(),
            telemetry: &telemetry,
            offloading: &offloading,
            learning: &learning,
            kpi: &kpi,
            demo_events: &demo_events,
            health: &health,
            base_url: &dashboard.base_url,
            dark_mode: prefs.get().dark_mode,
        };
        terminal.draw(|f| draw(f, &frame))?;

        match events.poll()? {
            Some(AppEvent::Quit) => break,
            Some(AppEvent::ToggleDarkMode) => {
                if let Err(e) = prefs.toggle_dark_mode() {
                    tracing::warn!(path = %prefs.path().display(), error = %e, "failed to save preferences");
                }
            }
            Some(AppEvent::Command(_)) | None => {}
        }

        tokio::task::yield_now().await;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
