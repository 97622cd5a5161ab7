//! 触发面板：障碍 / 场景目录、按钮可用规则、自动播放

pub mod autoplay;
pub mod catalog;
pub mod hurdle;
pub mod scenario;

pub use autoplay::{AutoPlay, DEFAULT_AUTOPLAY_INTERVAL};
pub use catalog::{find_scenario, hurdle_entry, CatalogEntry, HURDLES, SCENARIOS};
pub use hurdle::{trigger_enabled, HurdlePanel, PanelItem};
pub use scenario::{
    next_speed, scenario_items, PanelError, ScenarioPanel, ScenarioStatus, SPEED_STEPS,
};
