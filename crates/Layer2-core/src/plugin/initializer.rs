//! Type initializer - 플러그인 타입별 초기화 전략
//!
//! | type       | 로드 시                                   | 언로드 시 |
//! |------------|-------------------------------------------|-----------|
//! | simple     | component 필수                            | -         |
//! | configured | component 필수, 기본 설정 ⊕ 사용자 설정   | -         |
//! | advanced   | 서비스 등록 후 init                       | stop      |
//! | hybrid     | 없음 (서비스는 `initialize_services`에서) | stop      |

use super::context::PluginContext;
use super::manifest::{PluginManifest, PluginType};
use super::module::{guarded, guarded_sync, Component, PluginModule};
use harbor_foundation::{Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// 로드 단계 초기화
///
/// 성공하면 모듈이 export한 컴포넌트를 돌려준다. 레코드는 이 값을 보관하고
/// 이후 조회에서 플러그인 코드를 다시 호출하지 않는다.
pub async fn initialize(
    manifest: &PluginManifest,
    module: &dyn PluginModule,
    ctx: &PluginContext,
    deadline: Option<Duration>,
) -> Result<Option<Component>> {
    match manifest.plugin_type {
        PluginType::Simple => init_simple(manifest, module).map(Some),
        PluginType::Configured => init_configured(manifest, module, ctx).await.map(Some),
        PluginType::Advanced => init_advanced(manifest, module, ctx, deadline).await,
        PluginType::Hybrid => init_hybrid(manifest, module),
    }
}

fn init_simple(manifest: &PluginManifest, module: &dyn PluginModule) -> Result<Component> {
    exported_component(manifest, module)?
        .ok_or_else(|| Error::contract("Simple plugin must export a component"))
}

async fn init_configured(
    manifest: &PluginManifest,
    module: &dyn PluginModule,
    ctx: &PluginContext,
) -> Result<Component> {
    let component = exported_component(manifest, module)?
        .ok_or_else(|| Error::contract("Configured plugin must export a component"))?;

    // 사용자 설정이 기본값을 덮어쓴다
    let defaults = guarded_sync(
        || format!("default_config of plugin '{}'", manifest.id),
        || module.default_config(),
    )?;
    let mut merged = defaults.unwrap_or_default();
    merged.extend(ctx.config().await);
    ctx.load_config(merged).await;
    Ok(component)
}

async fn init_advanced(
    manifest: &PluginManifest,
    module: &dyn PluginModule,
    ctx: &PluginContext,
    deadline: Option<Duration>,
) -> Result<Option<Component>> {
    let component = exported_component(manifest, module)?;
    register_declared_services(manifest, module, ctx).await?;
    run_init(manifest, module, ctx, deadline).await?;
    Ok(component)
}

fn init_hybrid(manifest: &PluginManifest, module: &dyn PluginModule) -> Result<Option<Component>> {
    let component = exported_component(manifest, module)?;
    debug!(
        "Hybrid plugin {} loaded (component: {}, declared services: {})",
        manifest.id,
        component.is_some(),
        manifest.services.len()
    );
    Ok(component)
}

fn exported_component(manifest: &PluginManifest, module: &dyn PluginModule) -> Result<Option<Component>> {
    guarded_sync(
        || format!("component of plugin '{}'", manifest.id),
        || module.component(),
    )
}

/// hybrid 플러그인의 지연 서비스 초기화
pub async fn initialize_hybrid_services(
    manifest: &PluginManifest,
    module: &dyn PluginModule,
    ctx: &PluginContext,
    deadline: Option<Duration>,
) -> Result<()> {
    register_declared_services(manifest, module, ctx).await?;
    run_init(manifest, module, ctx, deadline).await
}

/// 매니페스트에 선언되고 모듈이 export한 서비스를 등록
///
/// 선언만 되고 export되지 않은 서비스는 경고 후 건너뛴다.
async fn register_declared_services(
    manifest: &PluginManifest,
    module: &dyn PluginModule,
    ctx: &PluginContext,
) -> Result<()> {
    for definition in &manifest.services {
        let exported = guarded_sync(
            || format!("service '{}' of plugin '{}'", definition.name, manifest.id),
            || module.service(&definition.name),
        )?;
        match exported {
            Some(implementation) => {
                ctx.register_service(definition.clone(), implementation).await?;
            }
            None => {
                warn!(
                    "Plugin {} declares service {}@{} but does not export it",
                    manifest.id, definition.name, definition.version
                );
            }
        }
    }
    Ok(())
}

async fn run_init(
    manifest: &PluginManifest,
    module: &dyn PluginModule,
    ctx: &PluginContext,
    deadline: Option<Duration>,
) -> Result<()> {
    guarded(
        deadline,
        || format!("init of plugin '{}'", manifest.id),
        |panic| Error::Internal(format!("init of plugin '{}' panicked: {}", manifest.id, panic)),
        module.init(ctx),
    )
    .await
}

/// 언로드 단계 정지 훅 (advanced / hybrid만)
pub async fn shutdown(
    manifest: &PluginManifest,
    module: &dyn PluginModule,
    ctx: &PluginContext,
    deadline: Option<Duration>,
) -> Result<()> {
    if !manifest.plugin_type.has_lifecycle_hooks() {
        return Ok(());
    }

    guarded(
        deadline,
        || format!("stop of plugin '{}'", manifest.id),
        |panic| Error::Internal(format!("stop of plugin '{}' panicked: {}", manifest.id, panic)),
        module.stop(ctx),
    )
    .await
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::context::ContextFactory;
    use crate::plugin::manifest::ServiceDefinition;
    use crate::plugin::module::{FnService, ModuleExports, ServiceHandler};
    use crate::plugin::service::ServiceRegistry;
    use async_trait::async_trait;
    use harbor_foundation::EventBus;
    use serde_json::{json, Map, Value};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn context(manifest: &PluginManifest, config: Map<String, Value>) -> PluginContext {
        ContextFactory::new(Arc::new(EventBus::new()), Arc::new(ServiceRegistry::new())).build(
            manifest,
            Path::new("/plugins").join(&manifest.id).as_path(),
            config,
        )
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn test_simple_requires_component() {
        let manifest = PluginManifest::new("demo", "Demo", PluginType::Simple, "index.js");
        let ctx = context(&manifest, Map::new());

        let err = initialize(&manifest, &ModuleExports::new(), &ctx, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Simple plugin must export a component");

        let module = ModuleExports::new().with_component(Component::new("panel", ()));
        let component = initialize(&manifest, &module, &ctx, None).await.unwrap();
        assert_eq!(component.map(|c| c.name().to_string()), Some("panel".to_string()));
    }

    #[tokio::test]
    async fn test_panicking_sync_hooks_become_errors() {
        struct Broken;

        #[async_trait]
        impl PluginModule for Broken {
            fn component(&self) -> Option<Component> {
                panic!("no canvas")
            }

            fn service(&self, _name: &str) -> Option<Arc<dyn ServiceHandler>> {
                panic!("no services today")
            }
        }

        let manifest = PluginManifest::new("broken", "Broken", PluginType::Simple, "index.js");
        let ctx = context(&manifest, Map::new());
        let err = initialize(&manifest, &Broken, &ctx, None).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Internal error: component of plugin 'broken' panicked: no canvas"
        );

        let manifest = PluginManifest::new("broken", "Broken", PluginType::Hybrid, "index.js")
            .with_service(ServiceDefinition::new("clock", "1.0.0"));
        let err = initialize_hybrid_services(&manifest, &Broken, &ctx, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no services today"));
    }

    #[tokio::test]
    async fn test_configured_merges_user_over_defaults() {
        let manifest = PluginManifest::new("theme", "Theme", PluginType::Configured, "index.js");
        let ctx = context(&manifest, object(json!({ "color": "red" })));

        let err = initialize(&manifest, &ModuleExports::new(), &ctx, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Configured plugin must export a component");

        let module = ModuleExports::new()
            .with_component(Component::new("theme", ()))
            .with_default_config(object(json!({ "color": "blue", "size": 12 })));
        initialize(&manifest, &module, &ctx, None).await.unwrap();

        assert_eq!(ctx.get_config("color").await, Some(json!("red")));
        assert_eq!(ctx.get_config("size").await, Some(json!(12)));
    }

    struct Counting {
        inits: Arc<AtomicUsize>,
        service: Arc<dyn ServiceHandler>,
        fail: bool,
    }

    #[async_trait]
    impl PluginModule for Counting {
        fn service(&self, name: &str) -> Option<Arc<dyn ServiceHandler>> {
            (name == "clock").then(|| Arc::clone(&self.service))
        }

        async fn init(&self, ctx: &PluginContext) -> Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            // init 시점에는 이미 서비스가 등록되어 있어야 한다
            if ctx.resolve_service("clock", None).await.is_none() {
                return Err(Error::Internal("clock missing during init".into()));
            }
            if self.fail {
                return Err(Error::Internal("init exploded".into()));
            }
            Ok(())
        }
    }

    fn counting(fail: bool) -> (Counting, Arc<AtomicUsize>) {
        let inits = Arc::new(AtomicUsize::new(0));
        let module = Counting {
            inits: Arc::clone(&inits),
            service: Arc::new(FnService::new(|_, _| Ok(json!(0)))),
            fail,
        };
        (module, inits)
    }

    fn advanced(plugin_type: PluginType) -> PluginManifest {
        PluginManifest::new("clock", "Clock", plugin_type, "index.js")
            .with_service(ServiceDefinition::new("clock", "1.0.0"))
            .with_service(ServiceDefinition::new("alarm", "1.0.0"))
    }

    #[tokio::test]
    async fn test_advanced_registers_then_inits() {
        let manifest = advanced(PluginType::Advanced);
        let ctx = context(&manifest, Map::new());
        let (module, inits) = counting(false);

        initialize(&manifest, &module, &ctx, None).await.unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 1);

        // 선언만 된 alarm은 건너뜀
        let services = ctx.services().list().await;
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "clock");
    }

    #[tokio::test]
    async fn test_advanced_init_failure_keeps_services() {
        let manifest = advanced(PluginType::Advanced);
        let ctx = context(&manifest, Map::new());
        let (module, _) = counting(true);

        let err = initialize(&manifest, &module, &ctx, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Internal error: init exploded");
        assert!(ctx.services().contains("clock", "1.0.0").await);
    }

    #[tokio::test]
    async fn test_hybrid_is_lazy() {
        let manifest = advanced(PluginType::Hybrid);
        let ctx = context(&manifest, Map::new());
        let (module, inits) = counting(false);

        initialize(&manifest, &module, &ctx, None).await.unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 0);
        assert!(ctx.services().is_empty().await);

        initialize_hybrid_services(&manifest, &module, &ctx, None)
            .await
            .unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(ctx.services().contains("clock", "1.0.0").await);
    }

    #[tokio::test]
    async fn test_shutdown_only_for_hooked_types() {
        struct Stubborn;

        #[async_trait]
        impl PluginModule for Stubborn {
            async fn stop(&self, _ctx: &PluginContext) -> Result<()> {
                Err(Error::Internal("refusing to stop".into()))
            }
        }

        let simple = PluginManifest::new("s", "S", PluginType::Simple, "index.js");
        let ctx = context(&simple, Map::new());
        assert!(shutdown(&simple, &Stubborn, &ctx, None).await.is_ok());

        let advanced = PluginManifest::new("a", "A", PluginType::Advanced, "index.js");
        assert!(shutdown(&advanced, &Stubborn, &ctx, None).await.is_err());
    }
}
