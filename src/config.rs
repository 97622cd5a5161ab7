//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AIRWAVE__*` 覆盖（双下划线表示嵌套，如 `AIRWAVE__API__BASE_URL=http://10.0.0.2:8000`）。
//! 另外 `AIRWAVE_API_URL` / `AIRWAVE_WS_URL` 作为最高优先级的地址覆盖。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::api::{RetryPolicy, DEFAULT_BASE_URL};

/// 后端 HTTP 地址覆盖
pub const API_URL_ENV: &str = "AIRWAVE_API_URL";
/// WebSocket 地址覆盖（仅展示，核心流程不使用）
pub const WS_URL_ENV: &str = "AIRWAVE_WS_URL";
/// 轮询间隔下限（秒）
pub const MIN_POLL_SECS: u64 = 1;
/// 自动播放间隔下限（毫秒）
pub const MIN_AUTOPLAY_INTERVAL_MS: u64 = 1000;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub views: ViewsSection,
    #[serde(default)]
    pub ui: UiSection,
}

impl AppConfig {
    /// 零间隔会让轮询任务 panic、让自动播放空转；低于下限的取值抬到下限
    pub fn sanitized(mut self) -> Self {
        let v = &mut self.views;
        let intervals = [
            ("views.telemetry_secs", &mut v.telemetry_secs),
            ("views.offloading_secs", &mut v.offloading_secs),
            ("views.kpi_secs", &mut v.kpi_secs),
            ("views.demo_events_secs", &mut v.demo_events_secs),
            ("views.learning_secs", &mut v.learning_secs),
            ("views.health_secs", &mut v.health_secs),
        ];
        for (key, secs) in intervals {
            if *secs < MIN_POLL_SECS {
                tracing::warn!(key, value = *secs, min = MIN_POLL_SECS, "poll interval too small, clamped");
                *secs = MIN_POLL_SECS;
            }
        }
        if self.ui.autoplay_interval_ms < MIN_AUTOPLAY_INTERVAL_MS {
            tracing::warn!(
                key = "ui.autoplay_interval_ms",
                value = self.ui.autoplay_interval_ms,
                min = MIN_AUTOPLAY_INTERVAL_MS,
                "auto-play interval too small, clamped"
            );
            self.ui.autoplay_interval_ms = MIN_AUTOPLAY_INTERVAL_MS;
        }
        self
    }
}

/// [api] 段：后端地址与重试策略
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// 单次尝试超时（秒）
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8000".to_string()
}

fn default_attempt_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: default_ws_url(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl ApiSection {
    /// 实际使用的 HTTP 地址：AIRWAVE_API_URL > 配置 > 默认
    pub fn resolved_base_url(&self) -> String {
        resolve_url(std::env::var(API_URL_ENV).ok(), &self.base_url, DEFAULT_BASE_URL)
    }

    pub fn resolved_ws_url(&self) -> String {
        resolve_url(std::env::var(WS_URL_ENV).ok(), &self.ws_url, "ws://localhost:8000")
    }

    /// 视图轮询使用的默认重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

fn resolve_url(env_override: Option<String>, configured: &str, fallback: &str) -> String {
    env_override
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| Some(configured.trim().to_string()).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| fallback.to_string())
}

/// [views] 段：各视图轮询间隔（秒）
#[derive(Debug, Clone, Deserialize)]
pub struct ViewsSection {
    #[serde(default = "default_telemetry_secs")]
    pub telemetry_secs: u64,
    #[serde(default = "default_offloading_secs")]
    pub offloading_secs: u64,
    #[serde(default = "default_kpi_secs")]
    pub kpi_secs: u64,
    /// KPI 一次拉取的采样条数
    #[serde(default = "default_kpi_limit")]
    pub kpi_limit: usize,
    #[serde(default = "default_demo_events_secs")]
    pub demo_events_secs: u64,
    #[serde(default = "default_learning_secs")]
    pub learning_secs: u64,
    #[serde(default = "default_health_secs")]
    pub health_secs: u64,
}

fn default_telemetry_secs() -> u64 {
    2
}

fn default_offloading_secs() -> u64 {
    5
}

fn default_kpi_secs() -> u64 {
    5
}

fn default_kpi_limit() -> usize {
    20
}

fn default_demo_events_secs() -> u64 {
    3
}

fn default_learning_secs() -> u64 {
    30
}

fn default_health_secs() -> u64 {
    10
}

impl Default for ViewsSection {
    fn default() -> Self {
        Self {
            telemetry_secs: default_telemetry_secs(),
            offloading_secs: default_offloading_secs(),
            kpi_secs: default_kpi_secs(),
            kpi_limit: default_kpi_limit(),
            demo_events_secs: default_demo_events_secs(),
            learning_secs: default_learning_secs(),
            health_secs: default_health_secs(),
        }
    }
}

/// [ui] 段：偏好文件、日志文件、自动播放间隔
#[derive(Debug, Clone, Deserialize)]
pub struct UiSection {
    #[serde(default = "default_prefs_path")]
    pub prefs_path: PathBuf,
    /// TUI 占用终端，日志写入文件
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(default = "default_autoplay_interval_ms")]
    pub autoplay_interval_ms: u64,
    #[serde(default = "default_intent")]
    pub default_intent: String,
}

fn default_prefs_path() -> PathBuf {
    PathBuf::from(".airwave/prefs.toml")
}

fn default_log_path() -> PathBuf {
    PathBuf::from(".airwave/airwave.log")
}

fn default_autoplay_interval_ms() -> u64 {
    8000
}

fn default_intent() -> String {
    crate::core::DEFAULT_INTENT.to_string()
}

impl Default for UiSection {
    fn default() -> Self {
        Self {
            prefs_path: default_prefs_path(),
            log_path: default_log_path(),
            autoplay_interval_ms: default_autoplay_interval_ms(),
            default_intent: default_intent(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 AIRWAVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AIRWAVE__*（双下划线表示嵌套键）
/// 4. 过小的轮询 / 自动播放间隔被抬到下限
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AIRWAVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize::<AppConfig>().map(AppConfig::sanitized)
}

/// 重新从磁盘与环境变量加载配置
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.api.base_url, "http://localhost:8000");
        assert_eq!(cfg.api.retry_policy(), RetryPolicy::default());
        assert_eq!(cfg.views.telemetry_secs, 2);
        assert_eq!(cfg.ui.autoplay_interval_ms, 8000);
        assert_eq!(cfg.ui.default_intent, "maximize_coverage");
    }

    #[test]
    fn test_resolve_url_priority() {
        assert_eq!(
            resolve_url(Some("http://override:9000".into()), "http://cfg:8000", "http://d"),
            "http://override:9000"
        );
        assert_eq!(resolve_url(Some("  ".into()), "http://cfg:8000", "http://d"), "http://cfg:8000");
        assert_eq!(resolve_url(None, "", "http://d"), "http://d");
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airwave.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[api]\nbase_url = \"http://10.1.1.1:8000\"\nmax_retries = 5\n\n[views]\nkpi_limit = 50").unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.api.base_url, "http://10.1.1.1:8000");
        assert_eq!(cfg.api.max_retries, 5);
        assert_eq!(cfg.api.base_delay_ms, 500);
        assert_eq!(cfg.views.kpi_limit, 50);
        assert_eq!(cfg.views.kpi_secs, 5);
    }

    #[test]
    fn test_zero_intervals_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airwave.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[views]\ntelemetry_secs = 0\nhealth_secs = 0\n\n[ui]\nautoplay_interval_ms = 0").unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.views.telemetry_secs, MIN_POLL_SECS);
        assert_eq!(cfg.views.health_secs, MIN_POLL_SECS);
        assert_eq!(cfg.views.kpi_secs, 5);
        assert_eq!(cfg.ui.autoplay_interval_ms, MIN_AUTOPLAY_INTERVAL_MS);
    }

    #[test]
    fn test_sanitized_keeps_valid_values() {
        let cfg = AppConfig::default().sanitized();
        assert_eq!(cfg.views.learning_secs, 30);
        assert_eq!(cfg.ui.autoplay_interval_ms, 8000);
    }
}
