//! CLI 명령 구현
//!
//! `scan`은 플러그인 코드를 실행하지 않는다. 디스크립터 검증과 설정의 활성화 여부만 본다.

use harbor_core::{ManifestLoader, PluginDiscovery, PluginType};
use harbor_foundation::SettingsProvider;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// 스캔 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Valid,
    Disabled,
    Invalid,
}

impl ScanStatus {
    fn label(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Disabled => "disabled",
            Self::Invalid => "invalid",
        }
    }
}

/// 플러그인 디렉토리 하나의 스캔 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEntry {
    pub id: String,
    pub status: ScanStatus,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub plugin_type: Option<PluginType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub permissions: Vec<String>,
    pub services: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 플러그인 루트 스캔
pub async fn scan(
    plugins_dir: &Path,
    settings: &dyn SettingsProvider,
) -> harbor_foundation::Result<Vec<ScanEntry>> {
    let discovery = PluginDiscovery::new(plugins_dir);
    let loader = ManifestLoader::new(plugins_dir);
    let mut entries = Vec::new();

    for id in discovery.candidates().await? {
        let entry = match loader.load(&id).await {
            Ok(manifest) => {
                let status = if settings.is_enabled(&manifest.id) {
                    ScanStatus::Valid
                } else {
                    ScanStatus::Disabled
                };
                ScanEntry {
                    id: manifest.id.clone(),
                    status,
                    plugin_type: Some(manifest.plugin_type),
                    version: Some(manifest.version.clone()),
                    permissions: manifest.permissions.to_strings(),
                    services: manifest
                        .services
                        .iter()
                        .map(|s| format!("{}@{}", s.name, s.version))
                        .collect(),
                    error: None,
                }
            }
            Err(e) => ScanEntry {
                id: id.clone(),
                status: ScanStatus::Invalid,
                plugin_type: None,
                version: None,
                permissions: vec![],
                services: vec![],
                error: Some(e.to_string()),
            },
        };
        debug!("Scanned {}: {}", entry.id, entry.status.label());
        entries.push(entry);
    }

    Ok(entries)
}

/// 사람이 읽는 표 형식
pub fn render_table(entries: &[ScanEntry]) -> String {
    if entries.is_empty() {
        return "No plugins found.\n".to_string();
    }

    let width = entries.iter().map(|e| e.id.len()).max().unwrap_or(0).max(2);
    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:<8}  {:<10}  {:<8}  DETAILS", "ID", "STATUS", "TYPE", "VERSION");

    for entry in entries {
        let plugin_type = entry.plugin_type.map(|t| t.as_str()).unwrap_or("-");
        let version = entry.version.as_deref().unwrap_or("-");
        let details = match &entry.error {
            Some(error) => error.clone(),
            None if entry.permissions.is_empty() => "no permissions".to_string(),
            None => entry.permissions.join(", "),
        };
        let _ = writeln!(
            out,
            "{:<width$}  {:<8}  {:<10}  {:<8}  {}",
            entry.id,
            entry.status.label(),
            plugin_type,
            version,
            details
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_foundation::MemorySettings;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, id: &str, body: &str) {
        fs::create_dir_all(dir.join(id)).unwrap();
        fs::write(dir.join(id).join("plugin.json"), body).unwrap();
    }

    #[tokio::test]
    async fn test_scan_reports_each_directory() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "clock",
            r#"{"id":"clock","name":"Clock","version":"1.0.0","type":"advanced","main":"index.js","permissions":["settings:read"]}"#,
        );
        write(
            temp.path(),
            "evil",
            r#"{"id":"evil","name":"Evil","version":"1.0.0","type":"simple","main":"index.js","permissions":["root:all"]}"#,
        );
        write(
            temp.path(),
            "quiet",
            r#"{"id":"quiet","name":"Quiet","version":"0.1.0","type":"simple","main":"index.js"}"#,
        );

        let settings = MemorySettings::new().disabled("quiet");
        let entries = scan(temp.path(), &settings).await.unwrap();

        let statuses: Vec<_> = entries.iter().map(|e| (e.id.as_str(), e.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("clock", ScanStatus::Valid),
                ("evil", ScanStatus::Invalid),
                ("quiet", ScanStatus::Disabled)
            ]
        );
        assert!(entries[1].error.as_deref().unwrap().contains("root:all"));

        let table = render_table(&entries);
        assert!(table.contains("settings:read"));
        assert!(table.contains("root:all"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_table(&[]), "No plugins found.\n");
    }
}
