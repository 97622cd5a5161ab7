//! 界面渲染
//!
//! 布局：标题栏（阶段、后端地址、连接状态）、流水线进度条、左侧障碍与场景面板、
//! 右侧系统状态 / KPI / 遥测 / 卸载 / 学习时间线、底部滚动日志。存在适应说明时以浮层显示。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;

use crate::api::{DemoEvents, KpiSample};
use crate::core::{Phase, SystemSnapshot};
use crate::panels::{scenario_items, PanelItem, ScenarioStatus};
use crate::views::{latest_readings, ViewState};

/// 流水线总步数（parsing..broadcasting）
const PIPELINE_STEPS: usize = 5;
/// JSON 视图最多显示的行数
const MAX_VIEW_ROWS: usize = 8;

/// 一帧所需的全部数据（均为克隆，渲染期间不持锁）
pub struct DashboardFrame<'a> {
    pub snapshot: &'a SystemSnapshot,
    pub hurdles: &'a [PanelItem],
    pub scenario: ScenarioStatus,
    pub autoplay: bool,
    pub telemetry: &'a ViewState<Value>,
    pub offloading: &'a ViewState<Value>,
    pub learning: &'a ViewState<Value>,
    pub kpi: &'a ViewState<Vec<KpiSample>>,
    pub demo_events: &'a ViewState<DemoEvents>,
    pub health: &'a ViewState<bool>,
    pub base_url: &'a str,
    pub dark_mode: bool,
}

/// 配色
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub fg: Color,
    pub bg: Color,
    pub accent: Color,
    pub muted: Color,
    pub alert: Color,
    pub ok: Color,
}

impl Palette {
    pub fn for_mode(dark_mode: bool) -> Self {
        if dark_mode {
            Self {
                fg: Color::Gray,
                bg: Color::Black,
                accent: Color::Cyan,
                muted: Color::DarkGray,
                alert: Color::LightRed,
                ok: Color::LightGreen,
            }
        } else {
            Self {
                fg: Color::Black,
                bg: Color::White,
                accent: Color::Blue,
                muted: Color::Gray,
                alert: Color::Red,
                ok: Color::Green,
            }
        }
    }
}

/// 连接丢失：最近一次探测明确失败
pub fn connection_lost(health: &ViewState<bool>) -> bool {
    health.data == Some(false)
}

/// 进度条比例与标签
pub fn pipeline_progress(phase: Phase) -> (f64, String) {
    match phase.pipeline_step() {
        Some(step) => (
            step as f64 / PIPELINE_STEPS as f64,
            format!("{} ({}/{})", phase, step, PIPELINE_STEPS),
        ),
        None if phase == Phase::Emergency => (1.0, "EMERGENCY BROADCAST".to_string()),
        None => (0.0, "idle".to_string()),
    }
}

fn format_trend(trend: Option<f64>) -> String {
    match trend {
        Some(t) if t >= 0.0 => format!("▲ {:.1}%", t),
        Some(t) => format!("▼ {:.1}%", t.abs()),
        None => "-".to_string(),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() != 0.0 => format!("{:.3}", f),
            _ => n.to_string(),
        },
        Value::Null => "-".to_string(),
        Value::Object(map) => format!("{{{} fields}}", map.len()),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Bool(b) => b.to_string(),
    }
}

/// JSON 视图的摘要行：对象逐字段显示；数组显示条数，最新一项为对象时展开其字段
pub fn summary_rows(value: &Value, max: usize) -> Vec<String> {
    let fields = |map: &serde_json::Map<String, Value>, max: usize| -> Vec<String> {
        map.iter()
            .take(max)
            .map(|(k, v)| format!("{:<22} {}", k, format_value(v)))
            .collect()
    };
    match value {
        Value::Object(map) => fields(map, max),
        Value::Array(items) => {
            let mut rows = vec![format!("{} entries", items.len())];
            match items.last() {
                Some(Value::Object(map)) => rows.extend(fields(map, max.saturating_sub(1))),
                Some(last) => rows.push(format!("latest: {}", format_value(last))),
                None => {}
            }
            rows
        }
        other => vec![format_value(other)],
    }
}

/// 绘制一帧
pub fn draw(f: &mut Frame, view: &DashboardFrame) {
    let palette = Palette::for_mode(view.dark_mode);
    let base = Style::default().fg(palette.fg).bg(palette.bg);
    f.render_widget(Block::default().style(base), f.area());

    let lost = connection_lost(view.health);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(if lost { 2 } else { 1 }),
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(9),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, rows[0], view, &palette, lost);
    draw_pipeline(f, rows[1], view.snapshot, &palette);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[2]);
    draw_panels(f, columns[0], view, &palette);
    draw_status(f, columns[1], view, &palette);
    draw_logs(f, rows[3], view.snapshot, &palette);

    let hint = " 1-7 障碍 │ i 意图 │ r 重置 │ c 清除 │ e 紧急 │ x 取消紧急 │ s/S 场景 │ a 自动 │ d 演示 │ f 速度 │ l 学习数据 │ t 深色 │ q 退出 ";
    f.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(palette.muted))),
        rows[4],
    );

    if let Some(expl) = &view.snapshot.adaptation_explanation {
        let area = centered(f.area(), 60, 9);
        let text = Text::from(vec![
            Line::from(vec![
                Span::styled("Changed: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(expl.changed.clone()),
            ]),
            Line::from(vec![
                Span::styled("Action:  ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(expl.action.clone()),
            ]),
            Line::from(vec![
                Span::styled("Safe:    ", Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(expl.safe.clone(), Style::default().fg(palette.ok)),
            ]),
        ]);
        let toast = Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .style(base)
            .block(
                Block::default()
                    .title(" AI adaptation ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.accent)),
            );
        f.render_widget(Clear, area);
        f.render_widget(toast, area);
    }
}

fn draw_header(f: &mut Frame, area: Rect, view: &DashboardFrame, p: &Palette, lost: bool) {
    let phase = view.snapshot.phase;
    let phase_color = match phase {
        Phase::Emergency => p.alert,
        Phase::Broadcasting => p.ok,
        Phase::Idle => p.muted,
        _ => p.accent,
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(" airwave ", Style::default().fg(p.accent).add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(phase.as_str(), Style::default().fg(phase_color).add_modifier(Modifier::BOLD)),
        Span::raw(" │ "),
        Span::styled(view.base_url, Style::default().fg(p.muted)),
    ])];
    if lost {
        lines.push(Line::from(Span::styled(
            " Connection lost: backend not responding, showing last known data ",
            Style::default().fg(Color::White).bg(p.alert).add_modifier(Modifier::BOLD),
        )));
    }
    f.render_widget(Paragraph::new(lines), area);
}

fn draw_pipeline(f: &mut Frame, area: Rect, snapshot: &SystemSnapshot, p: &Palette) {
    let (ratio, label) = pipeline_progress(snapshot.phase);
    let color = if snapshot.phase == Phase::Emergency {
        p.alert
    } else {
        p.accent
    };
    let gauge = Gauge::default()
        .block(Block::default().title(" Pipeline ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(label);
    f.render_widget(gauge, area);
}

fn panel_list<'a>(items: &'a [PanelItem], keys: &[String], p: &Palette) -> Vec<ListItem<'a>> {
    items
        .iter()
        .zip(keys)
        .map(|(item, key)| {
            let style = if item.active {
                Style::default().fg(p.ok).add_modifier(Modifier::BOLD)
            } else if item.enabled {
                Style::default().fg(p.fg)
            } else {
                Style::default().fg(p.muted).add_modifier(Modifier::DIM)
            };
            let marker = if item.active { "●" } else { " " };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} [{}] ", marker, key), style),
                Span::styled(item.entry.label, style),
                Span::styled(format!("  {}", item.entry.description), Style::default().fg(p.muted)),
            ]))
        })
        .collect()
}

fn draw_panels(f: &mut Frame, area: Rect, view: &DashboardFrame, p: &Palette) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(4)])
        .split(area);

    let hurdle_keys: Vec<String> = (1..=view.hurdles.len()).map(|i| i.to_string()).collect();
    let hurdles = List::new(panel_list(view.hurdles, &hurdle_keys, p))
        .block(Block::default().title(" Hurdles ").borders(Borders::ALL));
    f.render_widget(hurdles, parts[0]);

    let scenarios = scenario_items(view.snapshot.phase, view.scenario.active);
    let scenario_keys = vec!["s".to_string(); scenarios.len()];
    let title = format!(
        " Scenarios │ auto-play {} │ demo {} │ {}x ",
        if view.autoplay { "on" } else { "off" },
        if view.scenario.demo_mode { "on" } else { "off" },
        view.scenario.speed,
    );
    let mut list_items = panel_list(&scenarios, &scenario_keys, p);
    if let Some(events) = &view.demo_events.data {
        for ev in events.events.iter().rev().take(3) {
            list_items.push(ListItem::new(Span::styled(
                format!("  ↳ {}: {}", ev.event_type, ev.description),
                Style::default().fg(p.muted),
            )));
        }
    }
    let list = List::new(list_items).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(list, parts[1]);
}

fn draw_status(f: &mut Frame, area: Rect, view: &DashboardFrame, p: &Palette) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Length(6), Constraint::Min(3)])
        .split(area);
    let s = view.snapshot;

    let mut status = vec![
        Line::from(format!("Intent:    {}", s.active_intent.as_deref().unwrap_or("-"))),
        Line::from(format!(
            "Hurdle:    {}",
            s.active_hurdle.map(|h| h.id()).unwrap_or("-")
        )),
        Line::from(vec![
            Span::raw("Safety:    "),
            if s.safety_lock {
                Span::styled("LOCKED", Style::default().fg(p.alert).add_modifier(Modifier::BOLD))
            } else {
                Span::styled("normal", Style::default().fg(p.ok))
            },
        ]),
        Line::from(format!(
            "Decision:  {}",
            s.last_decision_at
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        )),
    ];
    if s.phase == Phase::Emergency {
        status.push(Line::from(Span::styled(
            format!("Receivers: {}", s.receivers_reached),
            Style::default().fg(p.alert).add_modifier(Modifier::BOLD),
        )));
    }
    f.render_widget(
        Paragraph::new(status).block(Block::default().title(" System ").borders(Borders::ALL)),
        parts[0],
    );

    let samples = view.kpi.data.as_deref().unwrap_or(&[]);
    let kpi_lines: Vec<Line> = latest_readings(samples)
        .into_iter()
        .map(|r| {
            let value = r.value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
            Line::from(format!("{:<22} {:>10}  {}", r.metric, value, format_trend(r.trend)))
        })
        .collect();
    let kpi_title = match &view.kpi.error {
        Some(e) => format!(" KPI (stale: {}) ", e),
        None => " KPI ".to_string(),
    };
    f.render_widget(
        Paragraph::new(kpi_lines).block(Block::default().title(kpi_title).borders(Borders::ALL)),
        parts[1],
    );

    let feeds = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(parts[2]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(feeds[1]);
    draw_json_view(f, feeds[0], "Telemetry", view.telemetry, p);
    draw_json_view(f, side[0], "Offloading", view.offloading, p);
    draw_json_view(f, side[1], "Learning", view.learning, p);
}

fn draw_json_view(f: &mut Frame, area: Rect, name: &str, state: &ViewState<Value>, p: &Palette) {
    let lines: Vec<Line> = match &state.data {
        Some(value) => summary_rows(value, MAX_VIEW_ROWS)
            .into_iter()
            .map(Line::from)
            .collect(),
        None => vec![Line::from(Span::styled("waiting for data…", Style::default().fg(p.muted)))],
    };
    let title = match (&state.error, state.updated_at) {
        (Some(e), _) => format!(" {} (stale: {}) ", name, e),
        (None, Some(t)) => format!(" {} @ {} ", name, t.format("%H:%M:%S")),
        (None, None) => format!(" {} ", name),
    };
    f.render_widget(
        Paragraph::new(lines).block(Block::default().title(title).borders(Borders::ALL)),
        area,
    );
}

fn draw_logs(f: &mut Frame, area: Rect, snapshot: &SystemSnapshot, p: &Palette) {
    let status = snapshot
        .logs
        .latest()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "System ready".to_string());
    let items: Vec<ListItem> = snapshot
        .logs
        .iter()
        .skip(1)
        .map(|e| ListItem::new(Span::styled(e.to_string(), Style::default().fg(p.muted))))
        .collect();
    let list = List::new(items).block(
        Block::default()
            .title(Line::from(Span::styled(
                format!(" {} ", status),
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            )))
            .borders(Borders::ALL),
    );
    f.render_widget(list, area);
}

fn centered(area: Rect, width_pct: u16, height: u16) -> Rect {
    let width = area.width * width_pct / 100;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_progress() {
        assert_eq!(pipeline_progress(Phase::Idle).0, 0.0);
        let (ratio, label) = pipeline_progress(Phase::SafetyCheck);
        assert!((ratio - 0.6).abs() < 1e-9);
        assert_eq!(label, "safety_check (3/5)");
        assert_eq!(pipeline_progress(Phase::Emergency).1, "EMERGENCY BROADCAST");
    }

    #[test]
    fn test_connection_lost_only_on_failed_health_check() {
        let mut health = ViewState::<bool>::default();
        assert!(!connection_lost(&health));
        health.data = Some(true);
        assert!(!connection_lost(&health));
        health.data = Some(false);
        assert!(connection_lost(&health));
    }

    #[test]
    fn test_summary_rows() {
        let obj = serde_json::json!({"offload_ratio": 0.4123, "sessions": 12});
        assert_eq!(
            summary_rows(&obj, 8),
            vec![
                format!("{:<22} {}", "offload_ratio", "0.412"),
                format!("{:<22} {}", "sessions", "12"),
            ]
        );

        let timeline = serde_json::json!([{"gain": 1}, {"episode": 7, "gain": 3}]);
        let rows = summary_rows(&timeline, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "2 entries");
        assert!(rows[1].starts_with("episode"));

        assert_eq!(summary_rows(&serde_json::json!([]), 8), vec!["0 entries"]);
        assert_eq!(summary_rows(&serde_json::json!(["a", "b"]), 8), vec!["2 entries", "latest: b"]);
    }

    #[test]
    fn test_format_trend() {
        assert_eq!(format_trend(Some(12.345)), "▲ 12.3%");
        assert_eq!(format_trend(Some(-4.0)), "▼ 4.0%");
        assert_eq!(format_trend(None), "-");
    }
}
