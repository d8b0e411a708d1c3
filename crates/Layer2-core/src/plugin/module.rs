//! Plugin module - 진입점 모듈 임포트와 모듈 형태 정규화
//!
//! 플러그인의 `main` 진입점은 [`ModuleImporter`]를 통해 임포트된다.
//! 임포트 결과는 default export 또는 namespace export 중 하나이며,
//! default가 있으면 default를 우선한다. 어느 쪽이든 이후 단계는
//! 동일한 [`PluginModule`] 인터페이스로만 접근한다.

use super::context::PluginContext;
use super::manifest::PluginManifest;
use async_trait::async_trait;
use futures::FutureExt;
use harbor_foundation::{Error, Result};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

// ============================================================================
// Component
// ============================================================================

/// 호스트가 렌더링하는 UI 컴포넌트 핸들 (불투명 값)
#[derive(Clone)]
pub struct Component {
    name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Component {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component").field("name", &self.name).finish()
    }
}

// ============================================================================
// ServiceHandler
// ============================================================================

/// 서비스 구현체
///
/// 권한 검사는 레지스트리가 호출 전에 수행한다.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    async fn call(&self, method: &str, args: Value) -> Result<Value>;
}

type ServiceFn = dyn Fn(&str, Value) -> Result<Value> + Send + Sync;

/// 동기 클로저 기반 서비스 구현
pub struct FnService {
    handler: Box<ServiceFn>,
}

impl FnService {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl ServiceHandler for FnService {
    async fn call(&self, method: &str, args: Value) -> Result<Value> {
        (self.handler)(method, args)
    }
}

// ============================================================================
// PluginModule
// ============================================================================

/// 임포트된 플러그인 모듈
///
/// 어떤 export가 의미를 가지는지는 매니페스트의 `type`이 결정한다.
/// 필요 없는 항목은 기본 구현(없음 / no-op)을 그대로 둔다.
#[async_trait]
pub trait PluginModule: Send + Sync {
    /// UI 컴포넌트
    fn component(&self) -> Option<Component> {
        None
    }

    /// 기본 설정 (configured 타입)
    fn default_config(&self) -> Option<Map<String, Value>> {
        None
    }

    /// 이름으로 서비스 구현 조회
    fn service(&self, _name: &str) -> Option<Arc<dyn ServiceHandler>> {
        None
    }

    /// 초기화 훅
    async fn init(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// 정지 훅
    async fn stop(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }
}

/// 레코드가 보유하는 모듈 핸들
pub type ModuleHandle = Arc<dyn PluginModule>;

/// 정적 export 묶음 (훅이 필요 없는 모듈용)
#[derive(Default)]
pub struct ModuleExports {
    component: Option<Component>,
    default_config: Option<Map<String, Value>>,
    services: HashMap<String, Arc<dyn ServiceHandler>>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.component = Some(component);
        self
    }

    pub fn with_default_config(mut self, config: Map<String, Value>) -> Self {
        self.default_config = Some(config);
        self
    }

    pub fn with_service(mut self, name: impl Into<String>, handler: Arc<dyn ServiceHandler>) -> Self {
        self.services.insert(name.into(), handler);
        self
    }
}

#[async_trait]
impl PluginModule for ModuleExports {
    fn component(&self) -> Option<Component> {
        self.component.clone()
    }

    fn default_config(&self) -> Option<Map<String, Value>> {
        self.default_config.clone()
    }

    fn service(&self, name: &str) -> Option<Arc<dyn ServiceHandler>> {
        self.services.get(name).cloned()
    }
}

// ============================================================================
// ImportedModule / ModuleImporter
// ============================================================================

/// 임포트 직후의 모듈 형태
#[derive(Clone, Default)]
pub struct ImportedModule {
    /// default export
    pub default_export: Option<ModuleHandle>,
    /// namespace (named exports)
    pub namespace: Option<ModuleHandle>,
}

impl ImportedModule {
    pub fn with_default(module: impl PluginModule + 'static) -> Self {
        Self {
            default_export: Some(Arc::new(module)),
            namespace: None,
        }
    }

    pub fn with_namespace(module: impl PluginModule + 'static) -> Self {
        Self {
            default_export: None,
            namespace: Some(Arc::new(module)),
        }
    }

    /// default 우선 정규화
    pub fn normalize(self) -> Option<ModuleHandle> {
        self.default_export.or(self.namespace)
    }
}

/// 진입점 임포터
#[async_trait]
pub trait ModuleImporter: Send + Sync {
    async fn import(&self, entry: &Path) -> Result<ImportedModule>;
}

type ModuleFactory = Arc<dyn Fn() -> Result<ImportedModule> + Send + Sync>;

/// 컴파일 타임에 링크된 모듈을 진입점 경로로 제공하는 임포터
#[derive(Default)]
pub struct StaticModuleImporter {
    factories: RwLock<HashMap<PathBuf, ModuleFactory>>,
}

impl StaticModuleImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 진입점 경로에 모듈 팩토리 등록
    pub async fn register<F>(&self, entry: impl AsRef<Path>, factory: F)
    where
        F: Fn() -> Result<ImportedModule> + Send + Sync + 'static,
    {
        let key = normalize_entry(entry.as_ref());
        self.factories.write().await.insert(key, Arc::new(factory));
    }

    pub async fn len(&self) -> usize {
        self.factories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.factories.read().await.is_empty()
    }
}

#[async_trait]
impl ModuleImporter for StaticModuleImporter {
    async fn import(&self, entry: &Path) -> Result<ImportedModule> {
        let factory = self
            .factories
            .read()
            .await
            .get(&normalize_entry(entry))
            .cloned()
            .ok_or_else(|| {
                Error::module_load(entry.display().to_string(), "Cannot find module")
            })?;

        factory()
    }
}

// ============================================================================
// ModuleLoader
// ============================================================================

/// 진입점 해석, 임포트, 정규화를 담당
pub struct ModuleLoader {
    importer: Arc<dyn ModuleImporter>,
    timeout: Option<Duration>,
}

impl ModuleLoader {
    pub fn new(importer: Arc<dyn ModuleImporter>) -> Self {
        Self {
            importer,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// 진입점 경로 해석 (플러그인 디렉토리를 벗어나는 경로 거부)
    pub fn resolve_entry(plugin_dir: &Path, manifest: &PluginManifest) -> Result<PathBuf> {
        let main = Path::new(&manifest.main);
        let escapes = main.is_absolute()
            || main.components().any(|c| {
                matches!(
                    c,
                    PathComponent::ParentDir | PathComponent::RootDir | PathComponent::Prefix(_)
                )
            });

        if escapes {
            return Err(Error::module_load(
                &manifest.main,
                "entry point must stay inside the plugin directory",
            ));
        }

        Ok(normalize_entry(&plugin_dir.join(main)))
    }

    /// 모듈 임포트
    ///
    /// 임포터의 실패와 패닉은 모두 `Error::ModuleLoad`로 보고된다.
    pub async fn load(&self, plugin_dir: &Path, manifest: &PluginManifest) -> Result<ModuleHandle> {
        let entry = Self::resolve_entry(plugin_dir, manifest)?;
        let path = entry.display().to_string();
        debug!("Importing {} for plugin {}", path, manifest.id);

        let imported = guarded(
            self.timeout,
            || format!("importing '{}'", path),
            |panic| Error::module_load(&path, format!("module panicked: {}", panic)),
            self.importer.import(&entry),
        )
        .await
        .map_err(|e| match e {
            Error::ModuleLoad { .. } | Error::Timeout(_) => e,
            other => Error::module_load(&path, other.to_string()),
        })?;

        imported
            .normalize()
            .ok_or_else(|| Error::module_load(&path, "module has no exports"))
    }
}

// ============================================================================
// 유틸리티
// ============================================================================

/// `.` 구성요소 제거
fn normalize_entry(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, PathComponent::CurDir))
        .collect()
}

/// 패닉 메시지 추출
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 플러그인 코드 실행 래퍼: 패닉 격리 + 선택적 데드라인
pub(crate) async fn guarded<T, F>(
    deadline: Option<Duration>,
    what: impl FnOnce() -> String,
    on_panic: impl FnOnce(String) -> Error,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let caught = AssertUnwindSafe(fut).catch_unwind();

    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, caught).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(Error::Timeout(format!(
                    "{} did not finish within {}ms",
                    what(),
                    limit.as_millis()
                )));
            }
        },
        None => caught.await,
    };

    outcome.map_err(|payload| on_panic(panic_message(payload)))?
}

/// 동기 훅 실행 래퍼: 패닉을 `Error::Internal`로 변환
pub(crate) fn guarded_sync<T>(
    what: impl FnOnce() -> String,
    hook: impl FnOnce() -> T,
) -> Result<T> {
    std::panic::catch_unwind(AssertUnwindSafe(hook)).map_err(|payload| {
        Error::Internal(format!("{} panicked: {}", what(), panic_message(payload)))
    })
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::PluginType;
    use serde_json::json;

    struct Named(&'static str);

    #[async_trait]
    impl PluginModule for Named {
        fn component(&self) -> Option<Component> {
            Some(Component::new(self.0, self.0))
        }
    }

    fn manifest(main: &str) -> PluginManifest {
        PluginManifest::new("demo", "Demo", PluginType::Simple, main)
    }

    #[test]
    fn test_default_export_wins() {
        let imported = ImportedModule {
            default_export: Some(Arc::new(Named("default"))),
            namespace: Some(Arc::new(Named("namespace"))),
        };
        let module = imported.normalize().unwrap();
        assert_eq!(module.component().unwrap().name(), "default");

        let module = ImportedModule::with_namespace(Named("namespace"))
            .normalize()
            .unwrap();
        assert_eq!(module.component().unwrap().name(), "namespace");

        assert!(ImportedModule::default().normalize().is_none());
    }

    #[test]
    fn test_resolve_entry() {
        let dir = Path::new("/plugins/demo");
        assert_eq!(
            ModuleLoader::resolve_entry(dir, &manifest("./dist/index.js")).unwrap(),
            PathBuf::from("/plugins/demo/dist/index.js")
        );
        assert!(ModuleLoader::resolve_entry(dir, &manifest("../other/index.js")).is_err());
        assert!(ModuleLoader::resolve_entry(dir, &manifest("/etc/passwd")).is_err());
    }

    #[test]
    fn test_component_downcast() {
        let component = Component::new("panel", 42u32);
        assert_eq!(component.downcast_ref::<u32>(), Some(&42));
        assert!(component.downcast_ref::<String>().is_none());
    }

    #[tokio::test]
    async fn test_fn_service() {
        let service = FnService::new(|method, args| Ok(json!({ "method": method, "args": args })));
        let out = service.call("echo", json!([1])).await.unwrap();
        assert_eq!(out["method"], "echo");
    }

    #[tokio::test]
    async fn test_static_importer_and_loader() {
        let importer = Arc::new(StaticModuleImporter::new());
        importer
            .register("/plugins/demo/./index.js", || {
                Ok(ImportedModule::with_default(Named("demo")))
            })
            .await;
        importer
            .register("/plugins/broken/index.js", || {
                Err(Error::Internal("SyntaxError: unexpected token".into()))
            })
            .await;
        importer
            .register("/plugins/panics/index.js", || panic!("top-level code threw"))
            .await;
        importer
            .register("/plugins/empty/index.js", || Ok(ImportedModule::default()))
            .await;
        assert_eq!(importer.len().await, 4);

        let loader = ModuleLoader::new(importer);

        let module = loader
            .load(Path::new("/plugins/demo"), &manifest("index.js"))
            .await
            .unwrap();
        assert_eq!(module.component().unwrap().name(), "demo");

        for dir in ["/plugins/broken", "/plugins/panics", "/plugins/empty", "/plugins/missing"] {
            let err = loader
                .load(Path::new(dir), &manifest("index.js"))
                .await
                .err()
                .unwrap();
            assert!(matches!(err, Error::ModuleLoad { .. }), "{}: {:?}", dir, err);
        }
    }

    #[tokio::test]
    async fn test_guarded_timeout() {
        let result: Result<()> = guarded(
            Some(Duration::from_millis(20)),
            || "init".to_string(),
            Error::Internal,
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
