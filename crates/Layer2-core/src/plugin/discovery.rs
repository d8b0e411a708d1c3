//! Plugin Discovery - 플러그인 후보 디렉토리 열거
//!
//! 플러그인 루트의 직계 하위 디렉토리 하나가 플러그인 후보 하나다.
//! 숨김 디렉토리와 일반 파일은 무시하며, 결과는 이름순으로 정렬된다.

use harbor_foundation::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// 플러그인 후보 열거기
#[derive(Debug, Clone)]
pub struct PluginDiscovery {
    plugins_dir: PathBuf,
}

impl PluginDiscovery {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// 후보 플러그인 ID 목록 (이름순)
    ///
    /// 루트가 없으면 빈 목록, 읽을 수 없으면 에러.
    pub async fn candidates(&self) -> Result<Vec<String>> {
        if !fs::try_exists(&self.plugins_dir).await.unwrap_or(false) {
            info!("Plugin directory {:?} does not exist", self.plugins_dir);
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.plugins_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                debug!("Skipping hidden directory {}", name);
                continue;
            }
            ids.push(name);
        }

        ids.sort();
        debug!("Found {} plugin candidate(s) in {:?}", ids.len(), self.plugins_dir);
        Ok(ids)
    }
}
