//! Permission system for Harbor
//!
//! - `types`: 고정 권한 화이트리스트 (Permission, PermissionSet)
//!
//! 플러그인 매니페스트의 `permissions`는 반드시 화이트리스트의 부분집합이어야 하고,
//! 서비스 메서드 호출 시 소비자의 권한 집합이 `requiresPermission`을 포함해야 한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use harbor_foundation::permission::{Permission, PermissionSet};
//!
//! let granted = PermissionSet::parse(["filesystem:read"])?;
//! assert!(!granted.contains(Permission::SystemExec));
//! ```

mod types;

pub use types::{is_whitelisted, Permission, PermissionSet, PERMISSION_WHITELIST};
