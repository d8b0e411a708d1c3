//! Plugin Manifest - 플러그인 메타데이터 정의 및 검증
//!
//! `plugin.json` 디스크립터를 읽어 [`PluginManifest`]로 변환한다.
//! 필수 필드 누락/파싱 실패는 `Error::Manifest`, 화이트리스트 밖의 권한은
//! `Error::Permission`으로 거부되며 이 단계에서는 어떤 플러그인 코드도 실행되지 않는다.

use harbor_foundation::config::strip_json_comments;
use harbor_foundation::{Error, Permission, PermissionSet, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, warn};

/// 매니페스트 파일 이름
pub const MANIFEST_FILE: &str = "plugin.json";

// ============================================================================
// PluginVersion
// ============================================================================

/// 플러그인 버전 (semver 코어 부분)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PluginVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// 버전 문자열 파싱 (예: "1.2.3", "1.2.3-beta.1", "1.2.3+build")
    pub fn parse(s: &str) -> Option<Self> {
        let core = s.trim().split(['-', '+']).next()?;
        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return None;
        }

        Some(Self {
            major: parts[0].parse().ok()?,
            minor: parts[1].parse().ok()?,
            patch: parts[2].parse().ok()?,
        })
    }
}

impl std::fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ============================================================================
// PluginType
// ============================================================================

/// 플러그인 타입 - 초기화 전략을 결정하는 닫힌 집합
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    /// component만 제공
    Simple,

    /// component + 기본 설정
    Configured,

    /// 서비스 제공 (로드 시 즉시 등록), headless 가능
    Advanced,

    /// component/서비스 모두 선택, 서비스는 호스트 요청 시 등록
    Hybrid,
}

impl PluginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Configured => "configured",
            Self::Advanced => "advanced",
            Self::Hybrid => "hybrid",
        }
    }

    /// 언로드 시 stop 훅을 호출하는 타입인지
    pub fn has_lifecycle_hooks(&self) -> bool {
        matches!(self, Self::Advanced | Self::Hybrid)
    }
}

impl FromStr for PluginType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "configured" => Ok(Self::Configured),
            "advanced" => Ok(Self::Advanced),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!(
                "unknown plugin type '{}' (expected simple, configured, advanced or hybrid)",
                other
            )),
        }
    }
}

impl std::fmt::Display for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ServiceDefinition
// ============================================================================

/// 서비스 메서드 정의
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMethod {
    /// 설명
    #[serde(default)]
    pub description: String,

    /// 파라미터 형태 (스키마 성격의 자유 형식)
    #[serde(default)]
    pub parameters: serde_json::Value,

    /// 반환 형태
    #[serde(default)]
    pub returns: serde_json::Value,

    /// 호출자에게 요구되는 권한
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_permission: Option<Permission>,
}

impl ServiceMethod {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// 빌더 패턴: 호출 권한 요구
    pub fn requires(mut self, permission: Permission) -> Self {
        self.requires_permission = Some(permission);
        self
    }
}

/// 플러그인이 제공하려는 서비스 정의
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub methods: BTreeMap<String, ServiceMethod>,
    /// 등록에 필요한 권한
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            methods: BTreeMap::new(),
            permissions: PermissionSet::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, method: ServiceMethod) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }
}

// ============================================================================
// PluginManifest
// ============================================================================

/// 플러그인 매니페스트 - 검증을 통과한 디스크립터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// 고유 플러그인 ID
    pub id: String,

    /// 표시 이름
    pub name: String,

    /// 버전 (semver 문자열)
    pub version: String,

    /// 설명
    #[serde(default)]
    pub description: String,

    /// 작성자
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// 플러그인 타입
    #[serde(rename = "type")]
    pub plugin_type: PluginType,

    /// 진입점 (플러그인 디렉토리 기준 상대 경로)
    pub main: String,

    /// 요청 권한 (화이트리스트 부분집합)
    #[serde(default)]
    pub permissions: PermissionSet,

    /// 선언된 의존성 (강제되지 않음)
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// 제공하려는 서비스
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,

    /// 설정 스키마 경로
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<String>,
}

impl PluginManifest {
    /// 새 매니페스트 생성 (버전 1.0.0, 권한 없음)
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        plugin_type: PluginType,
        main: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "1.0.0".to_string(),
            description: String::new(),
            author: None,
            plugin_type,
            main: main.into(),
            permissions: PermissionSet::new(),
            dependencies: vec![],
            services: vec![],
            config_schema: None,
        }
    }

    /// 빌더 패턴: 버전 설정
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 빌더 패턴: 설명 설정
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// 빌더 패턴: 권한 설정
    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    /// 빌더 패턴: 의존성 추가
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// 빌더 패턴: 서비스 추가
    pub fn with_service(mut self, service: ServiceDefinition) -> Self {
        self.services.push(service);
        self
    }
}

// ============================================================================
// ManifestLoader
// ============================================================================

/// 매니페스트 로더 - `<plugins_dir>/<id>/plugin.json`을 읽고 검증
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    plugins_dir: PathBuf,
}

impl ManifestLoader {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
        }
    }

    /// 플러그인 디렉토리 경로
    pub fn plugin_dir(&self, plugin_id: &str) -> PathBuf {
        self.plugins_dir.join(plugin_id)
    }

    /// 매니페스트 로드 및 검증
    pub async fn load(&self, plugin_id: &str) -> Result<PluginManifest> {
        self.load_draft(plugin_id).await?.into_result()
    }

    /// 구조 검증까지만 수행한 디스크립터 로드
    ///
    /// 권한/버전 결함은 `ManifestDraft::defect`로 돌려준다. 레코드를 만들 수 없는
    /// 실패(파일 없음, 파싱 실패, 필수 필드 누락, 알 수 없는 타입)만 `Err`다.
    pub async fn load_draft(&self, plugin_id: &str) -> Result<ManifestDraft> {
        let path = self.plugin_dir(plugin_id).join(MANIFEST_FILE);
        read_draft(plugin_id, &path).await
    }
}

/// 임의 경로의 디스크립터 검증 (CLI `validate`용)
///
/// 기대 ID는 디스크립터가 위치한 디렉토리 이름이다.
pub async fn validate_manifest_file(path: &Path) -> Result<PluginManifest> {
    let dir_id = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_draft(&dir_id, path).await?.into_result()
}

async fn read_draft(plugin_id: &str, path: &Path) -> Result<ManifestDraft> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::manifest(
                plugin_id,
                format!("descriptor not found at {}", path.display()),
            ));
        }
        Err(e) => {
            return Err(Error::manifest(
                plugin_id,
                format!("cannot read {}: {}", path.display(), e),
            ));
        }
    };

    let draft = parse_draft(plugin_id, &content)?;
    debug!(
        "Parsed manifest {} (v{}) from {:?}",
        draft.manifest.id, draft.manifest.version, path
    );
    Ok(draft)
}

/// 디스크립터 문자열 파싱 및 검증 (순수 함수)
pub fn parse_manifest(plugin_id: &str, content: &str) -> Result<PluginManifest> {
    parse_draft(plugin_id, content)?.into_result()
}

/// 디스크립터 문자열의 구조 검증
pub fn parse_draft(plugin_id: &str, content: &str) -> Result<ManifestDraft> {
    let content = strip_json_comments(content);
    let file: PluginJsonFile = serde_json::from_str(&content)
        .map_err(|e| Error::manifest(plugin_id, format!("unparsable descriptor: {}", e)))?;

    let draft = file.into_draft(plugin_id)?;
    if draft.manifest.id != plugin_id {
        warn!(
            "Plugin directory '{}' declares a different id '{}'",
            plugin_id, draft.manifest.id
        );
    }
    Ok(draft)
}

// ============================================================================
// ManifestDraft
// ============================================================================

/// 구조 검증을 통과한 디스크립터
///
/// 필수 필드와 타입은 갖춰져 레코드를 만들 수 있지만, 버전 형식이나 권한에
/// 결함이 있을 수 있다. 결함이 있으면 `manifest`에는 유효한 항목만 남는다.
#[derive(Debug)]
pub struct ManifestDraft {
    pub manifest: PluginManifest,
    pub defect: Option<Error>,
}

impl ManifestDraft {
    /// 결함이 없을 때만 매니페스트 반환
    pub fn into_result(self) -> Result<PluginManifest> {
        match self.defect {
            Some(defect) => Err(defect),
            None => Ok(self.manifest),
        }
    }
}

// ============================================================================
// PluginJsonFile - plugin.json 파일 구조
// ============================================================================

/// plugin.json 원본 구조 (검증 전)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PluginJsonFile {
    id: Option<String>,
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    author: Option<String>,
    r#type: Option<String>,
    main: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    services: Vec<ServiceJson>,
    config_schema: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceJson {
    name: String,
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    methods: BTreeMap<String, MethodJson>,
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MethodJson {
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: serde_json::Value,
    #[serde(default)]
    returns: serde_json::Value,
    requires_permission: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 화이트리스트 안의 권한만 남기고 나머지는 `invalid`에 모은다
fn keep_whitelisted<'a>(
    names: impl IntoIterator<Item = &'a String>,
    invalid: &mut Vec<String>,
) -> Vec<Permission> {
    let mut valid = Vec::new();
    for name in names {
        match name.parse::<Permission>() {
            Ok(permission) => valid.push(permission),
            Err(bad) => {
                if !invalid.contains(&bad) {
                    invalid.push(bad);
                }
            }
        }
    }
    valid
}

impl PluginJsonFile {
    /// 구조 검증 후 ManifestDraft로 변환
    fn into_draft(self, plugin_id: &str) -> Result<ManifestDraft> {
        let id = non_empty(self.id);
        let name = non_empty(self.name);
        let version = non_empty(self.version);
        let plugin_type = non_empty(self.r#type);
        let main = non_empty(self.main);

        let missing: Vec<&str> = [
            ("id", id.is_none()),
            ("name", name.is_none()),
            ("version", version.is_none()),
            ("type", plugin_type.is_none()),
            ("main", main.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(field, _)| *field)
        .collect();

        let (Some(id), Some(name), Some(version), Some(plugin_type), Some(main)) =
            (id, name, version, plugin_type, main)
        else {
            return Err(Error::manifest(
                plugin_id,
                format!("missing required fields: {}", missing.join(", ")),
            ));
        };

        let plugin_type: PluginType = plugin_type
            .parse()
            .map_err(|e: String| Error::manifest(&id, e))?;

        // 권한 검증: 플러그인 권한 + 서비스 권한 + 메서드 요구 권한을 한 번에 모은다
        let mut invalid: Vec<String> = Vec::new();
        let permissions = keep_whitelisted(&self.permissions, &mut invalid)
            .into_iter()
            .collect();

        let mut services = Vec::with_capacity(self.services.len());
        let mut malformed_service = false;
        for service in self.services {
            if service.name.trim().is_empty() || service.version.trim().is_empty() {
                malformed_service = true;
                continue;
            }
            services.push(service.into_definition(&mut invalid));
        }

        let defect = if PluginVersion::parse(&version).is_none() {
            Some(Error::manifest(
                &id,
                format!("version '{}' is not a valid semver string", version),
            ))
        } else if !invalid.is_empty() {
            Some(Error::Permission {
                plugin_id: id.clone(),
                invalid,
            })
        } else if malformed_service {
            Some(Error::manifest(
                &id,
                "service definitions require a name and a version",
            ))
        } else {
            None
        };

        Ok(ManifestDraft {
            manifest: PluginManifest {
                id,
                name,
                version,
                description: self.description.unwrap_or_default(),
                author: non_empty(self.author),
                plugin_type,
                main,
                permissions,
                dependencies: self.dependencies,
                services,
                config_schema: non_empty(self.config_schema),
            },
            defect,
        })
    }
}

impl ServiceJson {
    fn into_definition(self, invalid: &mut Vec<String>) -> ServiceDefinition {
        let permissions = keep_whitelisted(&self.permissions, invalid)
            .into_iter()
            .collect();

        let mut methods = BTreeMap::new();
        for (name, method) in self.methods {
            let requires_permission = keep_whitelisted(&method.requires_permission, invalid)
                .into_iter()
                .next();
            methods.insert(
                name,
                ServiceMethod {
                    description: method.description,
                    parameters: method.parameters,
                    returns: method.returns,
                    requires_permission,
                },
            );
        }

        ServiceDefinition {
            name: self.name,
            version: self.version,
            description: self.description,
            methods,
            permissions,
        }
    }
}

// ============================================================================
// 테스트
// ============================================================================
