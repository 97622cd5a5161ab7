//! 事件处理
//!
//! 轮询 crossterm 键盘事件：数字键触发障碍，字母键转为 Command 发送给调度器；
//! 深色模式与退出由 run_app 本地处理。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use crate::dashboard::Command;

/// 应用事件
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// 已发送给调度器的命令
    Command(Command),
    ToggleDarkMode,
    Quit,
}

/// 按键到事件的映射（不含副作用，便于测试）
pub fn map_key(key: KeyEvent, default_intent: &str) -> Option<AppEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') => Some(AppEvent::Quit),
            _ => None,
        };
    }
    let cmd = match key.code {
        KeyCode::Esc | KeyCode::Char('q') => return Some(AppEvent::Quit),
        KeyCode::Char('t') => return Some(AppEvent::ToggleDarkMode),
        KeyCode::Char(c @ '1'..='7') => Command::InjectHurdle(c as usize - '1' as usize),
        KeyCode::Char('i') => Command::TriggerIntent(default_intent.to_string()),
        KeyCode::Char('r') => Command::Reset,
        KeyCode::Char('c') => Command::ClearHurdle,
        KeyCode::Char('e') => Command::Emergency,
        KeyCode::Char('x') => Command::CancelEmergency,
        KeyCode::Char('s') => Command::NextScenario,
        KeyCode::Char('S') => Command::ClearScenario,
        KeyCode::Char('a') => Command::ToggleAutoPlay,
        KeyCode::Char('d') => Command::ToggleDemoMode,
        KeyCode::Char('f') => Command::CycleSpeed,
        KeyCode::Char('l') => Command::SeedLearningDemo,
        _ => return None,
    };
    Some(AppEvent::Command(cmd))
}

/// 事件处理器：持有 cmd_tx，poll 时读键盘，命令类事件直接转发
pub struct EventHandler {
    cmd_tx: mpsc::UnboundedSender<Command>,
    default_intent: String,
}

impl EventHandler {
    pub fn new(cmd_tx: mpsc::UnboundedSender<Command>, default_intent: impl Into<String>) -> Self {
        Self {
            cmd_tx,
            default_intent: default_intent.into(),
        }
    }

    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(self.handle_key(key));
                }
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent) -> Option<AppEvent> {
        let ev = map_key(key, &self.default_intent)?;
        if let AppEvent::Command(cmd) = &ev {
            let _ = self.cmd_tx.send(cmd.clone());
        }
        Some(ev)
    }
}
