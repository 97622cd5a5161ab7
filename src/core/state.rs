//! 状态定义：阶段、障碍、适应说明、日志与 SystemSnapshot 投影
//!
//! 协调器内部持有完整的 SystemSnapshot，每次变更后通过 watch 发布给 UI；
//! 需要精确顺序的消费者（进度条、测试）订阅 SystemEvent 广播。

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

/// 日志条数上限，超出丢弃最旧的
pub const LOG_CAPACITY: usize = 50;
/// 紧急模式下覆盖人数的起点
pub const RECEIVERS_FLOOR: u32 = 12_000;
/// 紧急模式下覆盖人数的上限
pub const RECEIVERS_CAP: u32 = 25_000;

/// 协调器所处阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Parsing,
    Optimizing,
    SafetyCheck,
    Reconfiguring,
    Broadcasting,
    Emergency,
}

impl Phase {
    /// 面板是否应禁用触发按钮；allow_emergency 为 true 的面板在紧急模式下仍可操作
    pub fn is_busy(self, allow_emergency: bool) -> bool {
        match self {
            Phase::Idle | Phase::Broadcasting => false,
            Phase::Emergency => !allow_emergency,
            _ => true,
        }
    }

    /// 常规流水线中的序号（1..=5），用于进度指示；Idle / Emergency 不在流水线中
    pub fn pipeline_step(self) -> Option<usize> {
        match self {
            Phase::Parsing => Some(1),
            Phase::Optimizing => Some(2),
            Phase::SafetyCheck => Some(3),
            Phase::Reconfiguring => Some(4),
            Phase::Broadcasting => Some(5),
            Phase::Idle | Phase::Emergency => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Parsing => "parsing",
            Phase::Optimizing => "optimizing",
            Phase::SafetyCheck => "safety_check",
            Phase::Reconfiguring => "reconfiguring",
            Phase::Broadcasting => "broadcasting",
            Phase::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 可注入的环境障碍
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hurdle {
    CoverageDrop,
    Interference,
    SpectrumReduction,
    TrafficSurge,
    EmergencyEscalation,
    CellularCongestion,
    MobilitySurge,
}

impl Hurdle {
    pub const ALL: [Hurdle; 7] = [
        Hurdle::CoverageDrop,
        Hurdle::Interference,
        Hurdle::SpectrumReduction,
        Hurdle::TrafficSurge,
        Hurdle::EmergencyEscalation,
        Hurdle::CellularCongestion,
        Hurdle::MobilitySurge,
    ];

    /// 后端使用的 id
    pub fn id(self) -> &'static str {
        match self {
            Hurdle::CoverageDrop => "coverage_drop",
            Hurdle::Interference => "interference",
            Hurdle::SpectrumReduction => "spectrum_reduction",
            Hurdle::TrafficSurge => "traffic_surge",
            Hurdle::EmergencyEscalation => "emergency_escalation",
            Hurdle::CellularCongestion => "cellular_congestion",
            Hurdle::MobilitySurge => "mobility_surge",
        }
    }
}

impl fmt::Display for Hurdle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// trigger_hurdle 的输入：注入某个障碍，或 reset / clear 两个哨兵
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HurdleCommand {
    Reset,
    Clear,
    Inject(Hurdle),
}

impl FromStr for HurdleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reset" => Ok(HurdleCommand::Reset),
            "clear" => Ok(HurdleCommand::Clear),
            id => Hurdle::ALL
                .into_iter()
                .find(|h| h.id() == id)
                .map(HurdleCommand::Inject)
                .ok_or_else(|| id.to_string()),
        }
    }
}

impl fmt::Display for HurdleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HurdleCommand::Reset => f.write_str("reset"),
            HurdleCommand::Clear => f.write_str("clear"),
            HurdleCommand::Inject(h) => f.write_str(h.id()),
        }
    }
}

impl From<Hurdle> for HurdleCommand {
    fn from(h: Hurdle) -> Self {
        HurdleCommand::Inject(h)
    }
}

/// 最近一次「环境变化 → AI 动作 → 安全结论」摘要，定时自动清除
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdaptationExplanation {
    /// 自动清除时据此判断是否仍是同一条
    pub id: Uuid,
    pub changed: String,
    pub action: String,
    pub safe: String,
    pub created_at: DateTime<Local>,
}

impl AdaptationExplanation {
    pub fn new(changed: impl Into<String>, action: impl Into<String>, safe: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            changed: changed.into(),
            action: action.into(),
            safe: safe.into(),
            created_at: Local::now(),
        }
    }
}

/// 带时间戳的日志行
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// 最新在前、容量固定的日志序列
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Local::now(),
            message: message.into(),
        };
        self.entries.push_front(entry.clone());
        self.entries.truncate(LOG_CAPACITY);
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 最新一条（状态条显示）
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&LogEntry> {
        self.entries.get(index)
    }
}

/// 协调器完整状态；UI 通过 watch 拿到它的克隆
#[derive(Clone, Debug, Default, Serialize)]
pub struct SystemSnapshot {
    pub phase: Phase,
    pub active_hurdle: Option<Hurdle>,
    pub active_intent: Option<String>,
    pub adaptation_explanation: Option<AdaptationExplanation>,
    pub logs: LogBuffer,
    pub safety_lock: bool,
    pub receivers_reached: u32,
    pub last_decision_at: Option<DateTime<Local>>,
}

/// 协调器事件：广播通道不合并，消费者可看到完整的阶段序列
#[derive(Clone, Debug, PartialEq)]
pub enum SystemEvent {
    PhaseChanged(Phase),
    Logged(LogEntry),
    ExplanationChanged(Option<AdaptationExplanation>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_buffer_caps_at_capacity() {
        let mut logs = LogBuffer::new();
        for i in 0..75 {
            logs.push(format!("entry {}", i));
        }
        assert_eq!(logs.len(), LOG_CAPACITY);
        assert_eq!(logs.latest().unwrap().message, "entry 74");
        assert_eq!(logs.get(LOG_CAPACITY - 1).unwrap().message, "entry 25");
    }

    #[test]
    fn test_log_entry_format() {
        let mut logs = LogBuffer::new();
        let entry = logs.push("Intent received");
        let rendered = entry.to_string();
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] Intent received"));
    }

    #[test]
    fn test_hurdle_command_parse() {
        assert_eq!("reset".parse::<HurdleCommand>(), Ok(HurdleCommand::Reset));
        assert_eq!("clear".parse::<HurdleCommand>(), Ok(HurdleCommand::Clear));
        assert_eq!(
            "mobility_surge".parse::<HurdleCommand>(),
            Ok(HurdleCommand::Inject(Hurdle::MobilitySurge))
        );
        assert_eq!("meteor".parse::<HurdleCommand>(), Err("meteor".to_string()));
        for h in Hurdle::ALL {
            assert_eq!(h.id().parse::<HurdleCommand>(), Ok(HurdleCommand::Inject(h)));
        }
    }

    #[test]
    fn test_phase_busy_rule() {
        assert!(!Phase::Idle.is_busy(false));
        assert!(!Phase::Broadcasting.is_busy(false));
        assert!(Phase::Emergency.is_busy(false));
        assert!(!Phase::Emergency.is_busy(true));
        for p in [Phase::Parsing, Phase::Optimizing, Phase::SafetyCheck, Phase::Reconfiguring] {
            assert!(p.is_busy(true));
        }
    }

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(serde_json::to_value(Phase::SafetyCheck).unwrap(), "safety_check");
        assert_eq!(Phase::Broadcasting.to_string(), "broadcasting");
    }
}
