//! 数据导出：并发拉取各统计端点，序列化为 JSON 或 CSV 并写入文件
//!
//! 单个端点失败不影响其它部分，错误消息随该部分一起导出。

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use futures_util::future::{join_all, BoxFuture};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::api::{ApiClient, ApiError};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown export format: {0} (expected json or csv)")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 导出中的一个部分（对应一个端点）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSection {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportBundle {
    pub generated_at: DateTime<Local>,
    pub sections: Vec<ExportSection>,
}

/// 并发拉取所有导出部分
pub async fn collect_export(client: &ApiClient, kpi_limit: usize) -> ExportBundle {
    let policy = client.policy();
    let jobs: Vec<(&'static str, BoxFuture<'_, Result<Value, ApiError>>)> = vec![
        ("telemetry", Box::pin(client.telemetry_all(policy))),
        (
            "kpi",
            Box::pin(async move {
                let samples = client.kpi(kpi_limit, policy).await?;
                Ok::<_, ApiError>(serde_json::to_value(samples)?)
            }),
        ),
        ("learning_improvements", Box::pin(client.learning_improvements(policy))),
        ("learning_before_after", Box::pin(client.learning_before_after(policy))),
        ("bootstrap_analysis", Box::pin(client.bootstrap_analysis(policy))),
        ("bootstrap_diagnostics", Box::pin(client.bootstrap_diagnostics(policy))),
        ("broadcast_statistics", Box::pin(client.broadcast_statistics(policy))),
    ];

    let (names, futures): (Vec<_>, Vec<_>) = jobs.into_iter().unzip();
    let results = join_all(futures).await;

    let sections = names
        .into_iter()
        .zip(results)
        .map(|(name, result)| match result {
            Ok(data) => ExportSection {
                name,
                data: Some(data),
                error: None,
            },
            Err(e) => {
                tracing::warn!(section = name, error = %e, "export section failed");
                ExportSection {
                    name,
                    data: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    ExportBundle {
        generated_at: Local::now(),
        sections,
    }
}

pub fn to_json(bundle: &ExportBundle) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(bundle)?)
}

/// 展平为 section,key,value 三列；嵌套键以 `.` 连接，数组元素以下标为键
pub fn to_csv(bundle: &ExportBundle) -> String {
    let mut out = String::from("section,key,value\n");
    let mut push_row = |section: &str, key: &str, value: &str| {
        out.push_str(&csv_field(section));
        out.push(',');
        out.push_str(&csv_field(key));
        out.push(',');
        out.push_str(&csv_field(value));
        out.push('\n');
    };

    for section in &bundle.sections {
        if let Some(err) = &section.error {
            push_row(section.name, "error", err);
        }
        if let Some(data) = &section.data {
            let mut rows = Vec::new();
            flatten("", data, &mut rows);
            for (key, value) in rows {
                let key = if key.is_empty() { "value".to_string() } else { key };
                push_row(section.name, &key, &value);
            }
        }
    }
    out
}

fn flatten(prefix: &str, value: &Value, rows: &mut Vec<(String, String)>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        }
    };
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                flatten(&join(key), item, rows);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(&join(&i.to_string()), item, rows);
            }
        }
        Value::Null => rows.push((prefix.to_string(), String::new())),
        Value::String(s) => rows.push((prefix.to_string(), s.clone())),
        other => rows.push((prefix.to_string(), other.to_string())),
    }
}

/// RFC 4180：含逗号、引号或换行的字段用双引号包裹，内部引号加倍
pub fn csv_field(field: &str) -> String {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 导出文件名：airwave-export-<YYYYmmdd-HHMMSS>.<ext>
pub fn export_file_name(at: &DateTime<Local>, format: ExportFormat) -> String {
    format!("airwave-export-{}.{}", at.format("%Y%m%d-%H%M%S"), format.extension())
}

/// 写入 dir 下的导出文件，返回完整路径
pub fn write_export(
    bundle: &ExportBundle,
    dir: &Path,
    format: ExportFormat,
) -> Result<PathBuf, ExportError> {
    let content = match format {
        ExportFormat::Json => to_json(bundle)?,
        ExportFormat::Csv => to_csv(bundle),
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(&bundle.generated_at, format));
    std::fs::write(&path, content)?;
    tracing::info!(path = %path.display(), %format, "export written");
    Ok(path)
}
