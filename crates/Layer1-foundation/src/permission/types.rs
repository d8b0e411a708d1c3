//! 권한 타입 정의 (고정 화이트리스트)
//!
//! 플러그인이 요청할 수 있는 권한은 시스템이 정한 7개뿐이며 런타임에 확장되지 않는다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// 시스템 권한 화이트리스트 (문자열 형태)
pub const PERMISSION_WHITELIST: [&str; 7] = [
    "filesystem:read",
    "filesystem:write",
    "network:http",
    "system:exec",
    "plugins:communicate",
    "settings:read",
    "settings:write",
];

/// 플러그인 권한 (capability token)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "filesystem:read")]
    FilesystemRead,
    #[serde(rename = "filesystem:write")]
    FilesystemWrite,
    #[serde(rename = "network:http")]
    NetworkHttp,
    #[serde(rename = "system:exec")]
    SystemExec,
    #[serde(rename = "plugins:communicate")]
    PluginsCommunicate,
    #[serde(rename = "settings:read")]
    SettingsRead,
    #[serde(rename = "settings:write")]
    SettingsWrite,
}

impl Permission {
    /// 모든 권한 (화이트리스트 순서)
    pub const ALL: [Permission; 7] = [
        Permission::FilesystemRead,
        Permission::FilesystemWrite,
        Permission::NetworkHttp,
        Permission::SystemExec,
        Permission::PluginsCommunicate,
        Permission::SettingsRead,
        Permission::SettingsWrite,
    ];

    /// 와이어 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FilesystemRead => "filesystem:read",
            Self::FilesystemWrite => "filesystem:write",
            Self::NetworkHttp => "network:http",
            Self::SystemExec => "system:exec",
            Self::PluginsCommunicate => "plugins:communicate",
            Self::SettingsRead => "settings:read",
            Self::SettingsWrite => "settings:write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| s.to_string())
    }
}

/// 화이트리스트 포함 여부
pub fn is_whitelisted(name: &str) -> bool {
    PERMISSION_WHITELIST.contains(&name)
}

// ============================================================================
// PermissionSet
// ============================================================================

/// 권한 집합 (정렬된 불변 집합)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// 빈 집합
    pub fn new() -> Self {
        Self::default()
    }

    /// 문자열 목록을 파싱. 화이트리스트 밖의 항목은 모두 모아서 돌려준다.
    pub fn parse<I, S>(names: I) -> Result<Self, Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        let mut invalid = Vec::new();

        for name in names {
            match name.as_ref().parse::<Permission>() {
                Ok(p) => {
                    set.insert(p);
                }
                Err(bad) => {
                    if !invalid.contains(&bad) {
                        invalid.push(bad);
                    }
                }
            }
        }

        if invalid.is_empty() {
            Ok(Self(set))
        } else {
            Err(invalid)
        }
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// self ⊇ other
    pub fn is_superset(&self, other: &PermissionSet) -> bool {
        self.0.is_superset(&other.0)
    }

    /// other에는 있지만 self에는 없는 권한
    pub fn missing_from(&self, other: &PermissionSet) -> Vec<Permission> {
        other.0.difference(&self.0).copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 문자열 목록으로 변환 (이벤트/스냅샷용)
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Permission> for PermissionSet {
    fn from(p: Permission) -> Self {
        std::iter::once(p).collect()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.to_strings().join(", "))
    }
}
