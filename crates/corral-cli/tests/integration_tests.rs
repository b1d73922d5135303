//! Integration tests for CLI commands

use std::path::{Path, PathBuf};
use std::process::Command;

use corral_core::ArchiveFormat;
use corral_core::archive::create_archive;
use tempfile::TempDir;

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

const APPS: &str = r#"
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
"#;

/// A store with two demo versions and one capsule, plus a config file
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let apps = dir.path().join("store").join("apps");
        let capsules = dir.path().join("store").join("capsules");
        std::fs::create_dir_all(&apps).unwrap();
        std::fs::create_dir_all(&capsules).unwrap();

        for version in ["1.0.0", "1.1.0"] {
            let stem = format!("demo_v{}", version);
            let svc = format!("{}/demo_svc.yaml", stem);
            let deploy = format!("{}/worker/worker_deploy.yaml", stem);
            create_archive(
                &[(svc.as_str(), SVC.as_bytes()), (deploy.as_str(), DEPLOY.as_bytes())],
                ArchiveFormat::TarGz,
                &apps.join(format!("{}.tgz", stem)),
            )
            .unwrap();
        }
        create_archive(
            &[("dashboards_cm.yaml", DASHBOARDS.as_bytes())],
            ArchiveFormat::Zip,
            &capsules.join("dashboards_v2.0.0.zip"),
        )
        .unwrap();

        std::fs::write(
            dir.path().join("config.yaml"),
            "store:\n  watch: false\ncontroller:\n  clusterName: test-cluster\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("apps.yaml"), APPS).unwrap();

        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Run corral against this workspace's config and store
    fn corral(&self, args: &[&str]) -> std::process::Output {
        corral_in(self.dir.path(), args)
    }
}

fn corral_in(root: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_corral"))
        .arg("--config")
        .arg(root.join("config.yaml"))
        .arg("--store")
        .arg(root.join("store"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute corral")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

mod templates_command {
    use super::*;

    #[test]
    fn test_list_shows_every_category() {
        let ws = Workspace::new();
        let output = ws.corral(&["templates", "list"]);

        assert!(output.status.success());
        let out = stdout(&output);
        assert!(out.contains("demo"));
        assert!(out.contains("1.1.0"));
        assert!(out.contains("dashboards"));
    }

    #[test]
    fn test_list_unknown_category() {
        let ws = Workspace::new();
        let output = ws.corral(&["templates", "list", "--category", "nope"]);
        assert!(!output.status.success());
    }

    #[test]
    fn test_show_defaults_to_latest() {
        let ws = Workspace::new();
        let output = ws.corral(&["templates", "show", "demo"]);

        assert!(output.status.success());
        let out = stdout(&output);
        assert!(out.contains("demo_1.1.0"));
        assert!(out.contains("worker_deploy.yaml"));
    }

    #[test]
    fn test_show_missing_template_exit_code() {
        let ws = Workspace::new();
        let output = ws.corral(&["templates", "show", "demo", "--version", "9.9.9"]);
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_search() {
        let ws = Workspace::new();
        let output = ws.corral(&["templates", "search", "dash"]);

        assert!(output.status.success());
        let out = stdout(&output);
        assert!(out.contains("dashboards"));
        assert!(!out.contains("demo"));
    }
}

mod render_command {
    use super::*;

    #[test]
    fn test_render_capsule_then_app() {
        let ws = Workspace::new();
        let apps = ws.path("apps.yaml");
        let output = ws.corral(&["render", "-f", apps.to_str().unwrap()]);

        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let out = stdout(&output);

        let capsule = out.find("kind: ConfigMap").expect("capsule rendered");
        let workload = out.find("kind: Deployment").expect("workload rendered");
        assert!(capsule < workload);
        assert!(out.contains("namespace: team-a"));
        assert!(out.contains("replicas: 3"));
        assert!(out.contains("K8S_CLUSTER_NAME"));
        assert!(out.contains("test-cluster"));
    }

    #[test]
    fn test_render_unknown_app() {
        let ws = Workspace::new();
        let apps = ws.path("apps.yaml");
        let output = ws.corral(&["render", "-f", apps.to_str().unwrap(), "--app", "nope"]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_render_missing_template_exit_code() {
        let ws = Workspace::new();
        let apps = ws.path("apps.yaml");
        std::fs::write(
            &apps,
            "name: platform\napps:\n  web:\n    template:\n      name: missing\n",
        )
        .unwrap();

        let output = ws.corral(&["render", "-f", apps.to_str().unwrap()]);
        assert_eq!(output.status.code(), Some(3));
        assert!(String::from_utf8_lossy(&output.stderr).contains("missing:latest"));
    }

    #[test]
    fn test_render_malformed_apps_file() {
        let ws = Workspace::new();
        let apps = ws.path("apps.yaml");
        std::fs::write(&apps, "apps: [1, 2, 3]").unwrap();

        let output = ws.corral(&["render", "-f", apps.to_str().unwrap()]);
        assert_eq!(output.status.code(), Some(2));
    }
}

mod package_command {
    use super::*;

    #[test]
    fn test_package_then_list() {
        let ws = Workspace::new();
        let src = ws.path("src");
        std::fs::create_dir_all(src.join("api")).unwrap();
        std::fs::write(src.join("api").join("api_deploy.yaml"), DEPLOY).unwrap();

        let out_dir = ws.path("store").join("apps");
        let output = ws.corral(&[
            "package",
            src.to_str().unwrap(),
            "--name",
            "backend",
            "--version",
            "0.3.0",
            "--output",
            out_dir.to_str().unwrap(),
        ]);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        assert!(out_dir.join("backend_v0.3.0.tgz").exists());

        let listed = stdout(&ws.corral(&["templates", "list", "--category", "apps"]));
        assert!(listed.contains("backend"));
    }

    #[test]
    fn test_package_rejects_bad_name() {
        let ws = Workspace::new();
        let output = ws.corral(&[
            "package",
            ws.path("store").to_str().unwrap(),
            "--name",
            "bad_name",
            "--version",
            "1.0.0",
        ]);
        assert_eq!(output.status.code(), Some(3));
    }
}

mod sync_command {
    use super::*;

    #[test]
    fn test_sync_without_address_is_config_error() {
        let ws = Workspace::new();
        let output = ws.corral(&["sync"]);
        assert_eq!(output.status.code(), Some(78));
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let output = corral_in(dir.path(), &["templates", "list"]);
        assert_eq!(output.status.code(), Some(78));
    }
}
