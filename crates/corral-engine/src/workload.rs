//! Workload and pod template customization

use k8s_openapi::api::core::v1::PodTemplateSpec;
use tracing::warn;

use crate::customize::Context;
use crate::error::Result;
use crate::list_merge::{merge_containers, merge_volumes};
use crate::manifest::Workload;
use crate::overlay::{add_missing, apply_meta_override, merge_object_meta, overlay_opt};
use crate::spec;

/// Apply instance labels and the matching workload override
pub(crate) fn customize_workload(
    workload: &mut Workload,
    patch: &spec::WorkloadSpec,
    ctx: &Context<'_>,
) -> Result<()> {
    warn_mismatched(workload, patch, ctx);
    let id = ctx.owner;

    match workload {
        Workload::Deployment(deployment) => {
            merge_object_meta(&mut deployment.metadata, ctx.namespace, &ctx.labels);
            let patch = patch.deployment.as_ref();
            if let Some(patch) = patch {
                overlay_opt(&mut deployment.spec, &patch.fields, id)?;
            }
            if let Some(spec) = deployment.spec.as_mut() {
                customize_pod_template(&mut spec.template, patch.and_then(|p| p.template.as_ref()), ctx)?;
            }
        }
        Workload::DaemonSet(daemon_set) => {
            merge_object_meta(&mut daemon_set.metadata, ctx.namespace, &ctx.labels);
            let patch = patch.daemonset.as_ref();
            if let Some(patch) = patch {
                overlay_opt(&mut daemon_set.spec, &patch.fields, id)?;
            }
            if let Some(spec) = daemon_set.spec.as_mut() {
                customize_pod_template(&mut spec.template, patch.and_then(|p| p.template.as_ref()), ctx)?;
            }
        }
        Workload::StatefulSet(stateful_set) => {
            merge_object_meta(&mut stateful_set.metadata, ctx.namespace, &ctx.labels);
            let patch = patch.statefulset.as_ref();
            if let Some(patch) = patch {
                overlay_opt(&mut stateful_set.spec, &patch.fields, id)?;
            }
            if let Some(spec) = stateful_set.spec.as_mut() {
                customize_pod_template(&mut spec.template, patch.and_then(|p| p.template.as_ref()), ctx)?;
            }
        }
        Workload::ReplicaSet(replica_set) => {
            merge_object_meta(&mut replica_set.metadata, ctx.namespace, &ctx.labels);
            let patch = patch.replicaset.as_ref();
            if let Some(patch) = patch {
                overlay_opt(&mut replica_set.spec, &patch.fields, id)?;
            }
            let template_patch = patch.and_then(|p| p.template.as_ref());
            if let Some(spec) = replica_set.spec.as_mut() {
                if spec.template.is_some() || template_patch.is_some() {
                    let template = spec.template.get_or_insert_default();
                    customize_pod_template(template, template_patch, ctx)?;
                }
            }
        }
        Workload::Job(job) => {
            merge_object_meta(&mut job.metadata, ctx.namespace, &ctx.labels);
            if let Some((template, template_patch)) =
                customize_job_spec(&mut job.spec, patch.job.as_ref(), ctx)?
            {
                customize_pod_template(template, template_patch, ctx)?;
            }
        }
        Workload::CronJob(cron_job) => {
            merge_object_meta(&mut cron_job.metadata, ctx.namespace, &ctx.labels);
            let patch = patch.cronjob.as_ref();
            if let Some(patch) = patch {
                overlay_opt(&mut cron_job.spec, &patch.fields, id)?;
            }
            if let Some(spec) = cron_job.spec.as_mut() {
                let job_patch = patch.and_then(|p| p.job_template.as_ref());
                let job_template = &mut spec.job_template;

                let meta = job_template.metadata.get_or_insert_default();
                add_missing(meta.labels.get_or_insert_default(), &ctx.labels);
                if let Some(meta_patch) = job_patch.and_then(|p| p.metadata.as_ref()) {
                    apply_meta_override(meta, meta_patch);
                }

                let spec_patch = job_patch.and_then(|p| p.spec.as_ref());
                if let Some((template, template_patch)) =
                    customize_job_spec(&mut job_template.spec, spec_patch, ctx)?
                {
                    customize_pod_template(template, template_patch, ctx)?;
                }
            }
        }
    }

    Ok(())
}

type PodTemplatePair<'t, 'p> = (&'t mut PodTemplateSpec, Option<&'p spec::PodTemplateSpec>);

fn customize_job_spec<'t, 'p>(
    target: &'t mut Option<k8s_openapi::api::batch::v1::JobSpec>,
    patch: Option<&'p spec::JobSpec>,
    ctx: &Context<'_>,
) -> Result<Option<PodTemplatePair<'t, 'p>>> {
    if let Some(patch) = patch {
        overlay_opt(target, &patch.fields, ctx.owner)?;
    }
    Ok(target
        .as_mut()
        .map(|spec| (&mut spec.template, patch.and_then(|p| p.template.as_ref()))))
}

/// Selector labels on the pod template, then the pod override.
///
/// Containers and volumes merge by name; other pod fields are replaced when
/// set.
pub(crate) fn customize_pod_template(
    template: &mut PodTemplateSpec,
    patch: Option<&spec::PodTemplateSpec>,
    ctx: &Context<'_>,
) -> Result<()> {
    let meta = template.metadata.get_or_insert_default();
    add_missing(meta.labels.get_or_insert_default(), &ctx.selector);

    let Some(patch) = patch else {
        return Ok(());
    };
    if let Some(meta_patch) = &patch.metadata {
        apply_meta_override(meta, meta_patch);
    }

    let Some(spec_patch) = &patch.spec else {
        return Ok(());
    };
    let pod = template.spec.get_or_insert_default();

    if let Some(containers) = &spec_patch.containers {
        pod.containers = merge_containers(&pod.containers, containers)?;
    }
    if let Some(init_containers) = &spec_patch.init_containers {
        let base = pod.init_containers.as_deref().unwrap_or_default();
        pod.init_containers = Some(merge_containers(base, init_containers)?);
    }
    if let Some(volumes) = &spec_patch.volumes {
        let base = pod.volumes.as_deref().unwrap_or_default();
        pod.volumes = Some(merge_volumes(base, volumes)?);
    }

    crate::overlay::overlay(pod, &spec_patch.fields, ctx.owner)
}

fn warn_mismatched(workload: &Workload, patch: &spec::WorkloadSpec, ctx: &Context<'_>) {
    let declared = [
        ("deployment", patch.deployment.is_some(), matches!(workload, Workload::Deployment(_))),
        ("daemonset", patch.daemonset.is_some(), matches!(workload, Workload::DaemonSet(_))),
        ("statefulset", patch.statefulset.is_some(), matches!(workload, Workload::StatefulSet(_))),
        ("replicaset", patch.replicaset.is_some(), matches!(workload, Workload::ReplicaSet(_))),
        ("job", patch.job.is_some(), matches!(workload, Workload::Job(_))),
        ("cronjob", patch.cronjob.is_some(), matches!(workload, Workload::CronJob(_))),
    ];
    for (key, present, matching) in declared {
        if present && !matching {
            warn!(
                component = ctx.owner,
                workload = %workload.kind(),
                override_key = key,
                "override does not match the component workload, ignoring it"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_core::{LabelSchema, Labels};
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
    use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
    use k8s_openapi::api::core::v1::{Container, PodSpec};

    fn context(schema: &LabelSchema) -> Context<'static> {
        let labels = schema.component_instance_labels("web", "demo", "1.0.0", "worker");
        Context::new("web-worker", Some("prod"), labels, schema)
    }

    fn pod(containers: &[(&str, &str)]) -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: None,
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|(name, image)| Container {
                        name: name.to_string(),
                        image: Some(image.to_string()),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
        }
    }

    fn deployment() -> Workload {
        Workload::Deployment(Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                template: pod(&[("worker", "worker:1")]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    #[test]
    fn test_labels_without_override() {
        let schema = LabelSchema::default();
        let ctx = context(&schema);
        let mut workload = deployment();

        customize_workload(&mut workload, &spec::WorkloadSpec::default(), &ctx).unwrap();

        let Workload::Deployment(d) = &workload else { unreachable!() };
        assert_eq!(d.metadata.namespace.as_deref(), Some("prod"));
        let meta_labels = d.metadata.labels.as_ref().unwrap();
        assert_eq!(meta_labels["app.kubernetes.io/version"], "1.0.0");

        let pod_labels = d.spec.as_ref().unwrap().template.metadata.as_ref().unwrap().labels.as_ref().unwrap();
        assert_eq!(pod_labels["app.kubernetes.io/instance"], "web");
        assert!(!pod_labels.contains_key("app.kubernetes.io/version"));
        assert!(!pod_labels.contains_key("app.kubernetes.io/managed-by"));
        assert_eq!(d.spec.as_ref().unwrap().replicas, Some(1));
    }

    #[test]
    fn test_deployment_override() {
        let schema = LabelSchema::default();
        let ctx = context(&schema);
        let mut workload = deployment();

        let patch: spec::WorkloadSpec = serde_yaml::from_str(
            r#"
deployment:
  replicas: 3
  template:
    metadata:
      annotations:
        rollout: "2"
    spec:
      serviceAccountName: runner
      containers:
        - name: worker
          image: worker:2
        - name: sidecar
          image: proxy:1
"#,
        )
        .unwrap();

        customize_workload(&mut workload, &patch, &ctx).unwrap();

        let Workload::Deployment(d) = &workload else { unreachable!() };
        let spec = d.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(3));
        let pod = spec.template.spec.as_ref().unwrap();
        assert_eq!(pod.service_account_name.as_deref(), Some("runner"));
        let images: Vec<_> = pod.containers.iter().map(|c| c.image.as_deref().unwrap()).collect();
        assert_eq!(images, vec!["worker:2", "proxy:1"]);
        let annotations = spec.template.metadata.as_ref().unwrap().annotations.as_ref().unwrap();
        assert_eq!(annotations["rollout"], "2");
    }

    #[test]
    fn test_mismatched_override_ignored() {
        let schema = LabelSchema::default();
        let ctx = context(&schema);
        let mut workload = Workload::StatefulSet(StatefulSet {
            spec: Some(StatefulSetSpec {
                replicas: Some(1),
                template: pod(&[("db", "db:1")]),
                ..Default::default()
            }),
            ..Default::default()
        });

        let patch = spec::WorkloadSpec {
            deployment: Some(spec::DeploymentSpec {
                fields: spec::DeploymentFields {
                    replicas: Some(5),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        customize_workload(&mut workload, &patch, &ctx).unwrap();
        let Workload::StatefulSet(s) = &workload else { unreachable!() };
        assert_eq!(s.spec.as_ref().unwrap().replicas, Some(1));
    }

    #[test]
    fn test_cronjob_nested_job_template() {
        let schema = LabelSchema::default();
        let ctx = context(&schema);
        let mut workload = Workload::CronJob(CronJob {
            spec: Some(CronJobSpec {
                schedule: "0 * * * *".to_string(),
                job_template: JobTemplateSpec {
                    metadata: None,
                    spec: Some(JobSpec {
                        backoff_limit: Some(1),
                        template: pod(&[("task", "task:1")]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        });

        let patch: spec::WorkloadSpec = serde_yaml::from_str(
            r#"
cronjob:
  schedule: "*/5 * * * *"
  jobTemplate:
    spec:
      backoffLimit: 4
      template:
        spec:
          containers:
            - name: task
              image: task:2
"#,
        )
        .unwrap();

        customize_workload(&mut workload, &patch, &ctx).unwrap();

        let Workload::CronJob(c) = &workload else { unreachable!() };
        let spec = c.spec.as_ref().unwrap();
        assert_eq!(spec.schedule, "*/5 * * * *");
        let job_labels: &Labels = spec.job_template.metadata.as_ref().unwrap().labels.as_ref().unwrap();
        assert_eq!(job_labels["app.kubernetes.io/component"], "worker");
        let job = spec.job_template.spec.as_ref().unwrap();
        assert_eq!(job.backoff_limit, Some(4));
        assert_eq!(
            job.template.spec.as_ref().unwrap().containers[0].image.as_deref(),
            Some("task:2")
        );
    }
}
