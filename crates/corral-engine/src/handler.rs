//! Template resolution, build, customization and decoration in one call

use corral_core::{LabelSchema, TemplateProvider};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::builder::ManifestBuilder;
use crate::customize::Customizer;
use crate::decorate::{Decorator, ImageRegistry};
use crate::error::{EngineError, Result};
use crate::manifest::AppManifests;
use crate::spec::{AppSpec, CapsuleSpec, TemplateRef};

/// Turns an [`AppSpec`] into the manifests to apply
#[derive(Clone)]
pub struct AppHandler {
    provider: Arc<dyn TemplateProvider>,
    builder: ManifestBuilder,
    customizer: Customizer,
    decorators: Vec<Arc<dyn Decorator>>,
}

impl AppHandler {
    pub fn new(provider: Arc<dyn TemplateProvider>, labels: LabelSchema) -> Self {
        Self {
            provider,
            builder: ManifestBuilder::new(labels.clone()),
            customizer: Customizer::new(labels),
            decorators: Vec::new(),
        }
    }

    /// Add a decorator run on every handled app, in registration order
    pub fn with_decorator(mut self, decorator: impl Decorator + 'static) -> Self {
        self.decorators.push(Arc::new(decorator));
        self
    }

    /// Resolve the app's template, build, customize and decorate it.
    ///
    /// The app's registry, when set, is applied after the shared decorators.
    pub fn handle(&self, app: &AppSpec) -> Result<AppManifests> {
        let mut manifests = self.build(&app.template)?;
        self.customizer.customize(&mut manifests, app)?;

        for decorator in &self.decorators {
            decorator.decorate(&mut manifests);
        }
        if let Some(registry) = app.registry.as_deref().filter(|r| !r.is_empty()) {
            ImageRegistry::new(registry).decorate(&mut manifests);
        }

        debug!(
            app = %app.name,
            template = %app.template.display(),
            resources = manifests.resources().len(),
            "handled app"
        );
        Ok(manifests)
    }

    /// Capsules only get their ConfigMaps and Secrets customized
    pub fn handle_capsule(&self, capsule: &CapsuleSpec) -> Result<AppManifests> {
        let app = capsule.to_app_spec();
        let mut manifests = self.build(&app.template)?;
        self.customizer.customize(&mut manifests, &app)?;
        Ok(manifests)
    }

    fn build(&self, template: &TemplateRef) -> Result<AppManifests> {
        let version = template.version.as_deref();
        let Some(resolved) = self.provider.resolve(&template.name, version) else {
            warn!(template = %template.display(), "template not found");
            return Err(EngineError::template_not_found(&template.name, version));
        };
        self.builder.build(&resolved)
    }
}

impl std::fmt::Debug for AppHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppHandler")
            .field("decorators", &self.decorators.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorate::ClusterNameEnv;
    use crate::manifest::Workload;
    use corral_core::AppTemplate;
    use std::collections::HashMap;

    const DEPLOY: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: worker
spec:
  replicas: 1
  selector:
    matchLabels:
      app: demo
  template:
    metadata:
      labels:
        app: demo
    spec:
      containers:
        - name: worker
          image: quay.io/demo/worker:1
"#;
    const CM: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: dashboards\ndata:\n  a: b\n";

    #[derive(Default)]
    struct StaticProvider {
        templates: HashMap<String, Arc<AppTemplate>>,
    }

    impl StaticProvider {
        fn with(mut self, template: AppTemplate) -> Self {
            self.templates.insert(template.key(), Arc::new(template));
            self
        }
    }

    impl TemplateProvider for StaticProvider {
        fn get_template(&self, name: &str, version: &str) -> Option<Arc<AppTemplate>> {
            self.templates.get(&corral_core::template_key(name, version)).cloned()
        }

        fn get_latest_template(&self, name: &str) -> Option<Arc<AppTemplate>> {
            let versions = self
                .templates
                .values()
                .filter(|t| t.name() == name)
                .map(|t| t.version());
            let latest = corral_core::version::latest(versions)?;
            self.get_template(name, latest)
        }
    }

    fn handler() -> AppHandler {
        let provider = StaticProvider::default()
            .with(AppTemplate::new("demo", "1.0.0").with_workload_file("worker", "worker_deploy.yaml", DEPLOY))
            .with(AppTemplate::new("dashboards", "2.0.0").with_file("dashboards_cm.yaml", CM));
        AppHandler::new(Arc::new(provider), LabelSchema::default())
    }

    fn replicas_and_image(manifests: &AppManifests) -> (Option<i32>, String) {
        let Some(Workload::Deployment(d)) = &manifests.components[0].workload else {
            panic!("expected a deployment");
        };
        let spec = d.spec.as_ref().unwrap();
        let image = spec.template.spec.as_ref().unwrap().containers[0]
            .image
            .clone()
            .unwrap();
        (spec.replicas, image)
    }

    #[test]
    fn test_handle_end_to_end() {
        let app: AppSpec = serde_yaml::from_str(
            r#"
name: web
namespace: prod
registry: mirror.local
template: { name: demo, version: 1.0.0 }
components:
  worker:
    deployment:
      replicas: 3
"#,
        )
        .unwrap();

        let handler = handler().with_decorator(ClusterNameEnv::new("east-1"));
        let manifests = handler.handle(&app).unwrap();

        let (replicas, image) = replicas_and_image(&manifests);
        assert_eq!(replicas, Some(3));
        assert_eq!(image, "mirror.local/demo/worker:1");

        let Some(Workload::Deployment(d)) = &manifests.components[0].workload else {
            unreachable!()
        };
        assert_eq!(d.metadata.namespace.as_deref(), Some("prod"));
        let labels = d.metadata.labels.as_ref().unwrap();
        assert_eq!(labels["app.kubernetes.io/instance"], "web");
        assert_eq!(labels["app.kubernetes.io/version"], "1.0.0");
        assert_eq!(labels["component"], "worker");

        let env = d.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
            .env
            .clone()
            .unwrap();
        assert_eq!(env[0].name, "K8S_CLUSTER_NAME");
    }

    #[test]
    fn test_handle_latest_version() {
        let app = AppSpec::new("web", TemplateRef::new("demo", None));
        let manifests = handler().handle(&app).unwrap();
        assert_eq!(manifests.version, "1.0.0");
        let (replicas, _) = replicas_and_image(&manifests);
        assert_eq!(replicas, Some(1));
    }

    #[test]
    fn test_handle_missing_template() {
        let app = AppSpec::new("web", TemplateRef::new("demo", Some("9.9.9")));
        let err = handler().handle(&app).unwrap_err();
        assert!(matches!(
            err,
            EngineError::TemplateNotFound { ref version, .. } if version == "9.9.9"
        ));

        let app = AppSpec::new("web", TemplateRef::new("nope", None));
        let err = handler().handle(&app).unwrap_err();
        assert_eq!(err.to_string(), "template nope:latest not found");
    }

    #[test]
    fn test_handle_capsule() {
        let capsule: CapsuleSpec = serde_yaml::from_str(
            r#"
name: web-dashboards
namespace: prod
template: { name: dashboards }
configmaps:
  dashboards:
    data: { a: c }
"#,
        )
        .unwrap();

        let manifests = handler().handle_capsule(&capsule).unwrap();
        let cm = &manifests.manifests.config_maps[0];
        assert_eq!(cm.data.as_ref().unwrap()["a"], "c");
        assert_eq!(
            cm.metadata.labels.as_ref().unwrap()["app.kubernetes.io/instance"],
            "web-dashboards"
        );
    }
}
