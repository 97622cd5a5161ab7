//! 面板静态目录：障碍与场景的 id、标题、描述

use crate::core::Hurdle;

/// 目录中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// 压力测试障碍（与 Hurdle::ALL 顺序一致）
pub const HURDLES: [CatalogEntry; 7] = [
    CatalogEntry {
        id: "coverage_drop",
        label: "Coverage Drop",
        description: "A transmitter loses 30% of its service area",
    },
    CatalogEntry {
        id: "interference",
        label: "Interference",
        description: "Co-channel interference from a neighbouring market",
    },
    CatalogEntry {
        id: "spectrum_reduction",
        label: "Spectrum Reduction",
        description: "Available bandwidth is cut by a regulator reallocation",
    },
    CatalogEntry {
        id: "traffic_surge",
        label: "Traffic Surge",
        description: "Demand spikes for live content in a metro area",
    },
    CatalogEntry {
        id: "emergency_escalation",
        label: "Emergency Escalation",
        description: "A regional alert escalates and needs guaranteed delivery",
    },
    CatalogEntry {
        id: "cellular_congestion",
        label: "Cellular Congestion",
        description: "Unicast networks saturate and traffic offloads to broadcast",
    },
    CatalogEntry {
        id: "mobility_surge",
        label: "Mobility Surge",
        description: "Large numbers of receivers move at highway speed",
    },
];

/// 演示场景（场景面板与自动播放使用）
pub const SCENARIOS: [CatalogEntry; 5] = [
    CatalogEntry {
        id: "stadium_event",
        label: "Stadium Event",
        description: "70k viewers in one cell during a championship game",
    },
    CatalogEntry {
        id: "severe_weather",
        label: "Severe Weather",
        description: "Storm front degrades links while alerts go out",
    },
    CatalogEntry {
        id: "rush_hour",
        label: "Rush Hour",
        description: "Commuter mobility and cellular congestion combined",
    },
    CatalogEntry {
        id: "tower_outage",
        label: "Tower Outage",
        description: "A primary transmitter goes dark, neighbours must compensate",
    },
    CatalogEntry {
        id: "spectrum_auction",
        label: "Spectrum Auction",
        description: "Channel plan shrinks after a spectrum repack",
    },
];

pub fn hurdle_entry(hurdle: Hurdle) -> &'static CatalogEntry {
    let index = Hurdle::ALL.iter().position(|h| *h == hurdle).unwrap_or(0);
    &HURDLES[index]
}

pub fn find_scenario(id: &str) -> Option<&'static CatalogEntry> {
    SCENARIOS.iter().find(|s| s.id == id)
}
