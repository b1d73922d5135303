//! Controller tests against the in-memory cluster

use corral_core::{AppTemplate, LabelSchema, TemplateProvider, template_key, version};
use corral_engine::{AppHandler, AppsSpec, ResourceKind};
use corral_kube::{AppsController, MockCluster, ObjectKey, Outcome, Reconciler};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

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
          image: demo/worker:1
"#;
const SVC: &str = "apiVersion: v1\nkind: Service\nmetadata:\n  name: demo\nspec:\n  ports:\n    - port: 80\n";
const DASHBOARDS: &str =
    "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: dashboards\ndata:\n  main.json: \"{}\"\n";

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
        self.templates.get(&template_key(name, version)).cloned()
    }

    fn get_latest_template(&self, name: &str) -> Option<Arc<AppTemplate>> {
        let versions = self
            .templates
            .values()
            .filter(|t| t.name() == name)
            .map(|t| t.version());
        let latest = version::latest(versions)?;
        self.get_template(name, latest)
    }
}

fn controller(cluster: &MockCluster) -> AppsController {
    let apps = StaticProvider::default().with(
        AppTemplate::new("demo", "1.0.0")
            .with_file("demo_svc.yaml", SVC)
            .with_workload_file("worker", "worker_deploy.yaml", DEPLOY),
    );
    let capsules =
        StaticProvider::default().with(AppTemplate::new("dashboards", "2.0.0").with_file("dashboards_cm.yaml", DASHBOARDS));

    AppsController::new(
        AppHandler::new(Arc::new(apps), LabelSchema::default()),
        AppHandler::new(Arc::new(capsules), LabelSchema::default()),
        Reconciler::new(Arc::new(cluster.clone())),
    )
}

/// `count` apps of the demo template, each in its own namespace
fn apps(count: usize) -> AppsSpec {
    let mut yaml = String::from("name: platform\napps:\n");
    for i in 0..count {
        yaml.push_str(&format!(
            "  app{i}:\n    namespace: ns{i}\n    template:\n      name: demo\n      version: 1.0.0\n"
        ));
    }
    serde_yaml::from_str(&yaml).unwrap()
}

#[tokio::test]
async fn test_capsules_are_reconciled_first() {
    let cluster = MockCluster::new();
    let spec: AppsSpec = serde_yaml::from_str(
        r#"
name: platform
namespace: team-a
apps:
  web:
    template:
      name: demo
    components:
      worker:
        deployment:
          replicas: 3
    dependencies:
      capsules:
        dash:
          template:
            name: dashboards
"#,
    )
    .unwrap();

    let report = controller(&cluster).reconcile(&spec).await;
    assert!(report.is_success(), "{:?}", report.failed);

    let (name, applied) = &report.succeeded[0];
    assert_eq!(name, "web");
    let kinds: Vec<ResourceKind> = applied.resources.iter().map(|(k, _)| k.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::ConfigMap,
            ResourceKind::Service,
            ResourceKind::Deployment
        ]
    );

    let key = ObjectKey::new(ResourceKind::Deployment, Some("team-a"), "worker");
    let Some(corral_engine::Resource::Deployment(deployment)) = cluster.object(&key) else {
        panic!("deployment not applied in the group namespace");
    };
    assert_eq!(deployment.spec.unwrap().replicas, Some(3));
}

#[tokio::test]
async fn test_failures_are_isolated() {
    let cluster = MockCluster::new();
    let mut spec = apps(3);
    spec.apps.get_mut("app1").unwrap().template.name = "missing".to_string();

    let report = controller(&cluster).reconcile(&spec).await;

    let succeeded: Vec<&str> = report.succeeded.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(succeeded, vec!["app0", "app2"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "app1");
    assert!(report.failed[0].1.contains("missing:latest"));
}

#[tokio::test]
async fn test_cluster_failure_aborts_only_that_app() {
    let cluster = MockCluster::new();
    cluster.fail_namespace("ns1");

    let report = controller(&cluster).reconcile(&apps(3)).await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "app1");
    assert_eq!(report.succeeded.len(), 2);

    let key = ObjectKey::new(ResourceKind::Deployment, Some("ns2"), "worker");
    assert!(cluster.object(&key).is_some());
    assert!(cluster.objects().iter().all(|o| o.namespace() != Some("ns1")));
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let cluster = MockCluster::new().with_latency(Duration::from_millis(20));
    let controller = controller(&cluster).with_concurrency(2);

    let report = controller.reconcile(&apps(6)).await;
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.succeeded.len(), 6);
    assert_eq!(cluster.peak_concurrency(), 2);
}

#[tokio::test]
async fn test_default_concurrency_is_three() {
    let cluster = MockCluster::new().with_latency(Duration::from_millis(20));
    let controller = controller(&cluster);
    assert_eq!(controller.concurrency(), 3);

    controller.reconcile(&apps(5)).await;
    assert_eq!(cluster.peak_concurrency(), 3);
}

#[tokio::test]
async fn test_second_pass_only_updates() {
    let cluster = MockCluster::new();
    let controller = controller(&cluster);
    let spec = apps(2);

    let first = controller.reconcile(&spec).await;
    assert!(first.is_success());
    let created = cluster.operation_counts().creates;
    assert_eq!(created, 4);

    let second = controller.reconcile(&spec).await;
    assert!(second.is_success());
    for (_, applied) in &second.succeeded {
        assert_eq!(applied.count(Outcome::Updated), applied.len());
    }
    assert_eq!(cluster.operation_counts().creates, created);
    assert_eq!(cluster.operation_counts().deletes, 0);
}
