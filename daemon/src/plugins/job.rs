use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, PodSpec, PodTemplateSpec, Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use krang_types::PluginRegistration;
use kube::api::Resource;
use std::collections::BTreeMap;

/// Name of the per-(registration, node) install Job. Unique per node so
/// concurrent installers never race on the same object.
pub fn job_name(registration_name: &str, node_name: &str) -> String {
    format!("krang-install-{registration_name}-{node_name}")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Builds the privileged, node-pinned install Job that copies
/// `spec.binaryPath` out of `spec.image` onto this node's `/opt/cni/bin`.
pub fn build_install_job(registration: &PluginRegistration, node_name: &str) -> Job {
    let reg_name = registration.meta().name.clone().unwrap_or_default();
    let namespace = registration.meta().namespace.clone();
    let name = job_name(&reg_name, node_name);
    let dest = format!("/host/opt/cni/bin/{reg_name}");

    let mut labels = BTreeMap::new();
    labels.insert("krang-install".to_string(), reg_name.clone());
    labels.insert("krang-node".to_string(), node_name.to_string());

    let mut node_selector = BTreeMap::new();
    node_selector.insert("kubernetes.io/hostname".to_string(), node_name.to_string());

    Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace,
            labels: Some(labels),
            owner_references: registration
                .controller_owner_ref(&())
                .map(|oref| vec![oref]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            ttl_seconds_after_finished: Some(60),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta::default()),
                spec: Some(PodSpec {
                    host_pid: Some(true),
                    host_network: Some(true),
                    node_selector: Some(node_selector),
                    restart_policy: Some("OnFailure".to_string()),
                    tolerations: Some(vec![Toleration {
                        key: Some("node-role.kubernetes.io/control-plane".to_string()),
                        operator: Some("Exists".to_string()),
                        effect: Some("NoSchedule".to_string()),
                        ..Default::default()
                    }]),
                    containers: vec![Container {
                        name: "install".to_string(),
                        image: Some(registration.spec.image.clone()),
                        command: Some(vec![
                            "cp".to_string(),
                            registration.spec.binary_path.clone(),
                            dest,
                        ]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: "cni-bin".to_string(),
                            mount_path: "/host/opt/cni/bin".to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: "cni-bin".to_string(),
                        host_path: Some(HostPathVolumeSource {
                            path: "/opt/cni/bin".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

/// Returns `true` once the Job's `JobComplete` condition is `True`.
pub fn is_complete(job: &Job) -> bool {
    job.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == "Complete" && c.status == "True")
        })
}

/// The local binary path an install Job produces for a given registration.
pub fn installed_binary_path(registration: &PluginRegistration) -> String {
    format!("/opt/cni/bin/{}", basename(&registration.spec.binary_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(name: &str) -> PluginRegistration {
        let mut reg = PluginRegistration::new(name, Default::default());
        reg.spec.image = "busybox".to_string();
        reg.spec.binary_path = "/usr/src/bin/cni/tuning".to_string();
        reg.meta_mut().namespace = Some("kube-system".to_string());
        reg
    }

    #[test]
    fn job_name_encodes_node_identity() {
        assert_eq!(job_name("tuning", "test-node"), "krang-install-tuning-test-node");
    }

    #[test]
    fn build_install_job_uses_spec_image_and_binary_path() {
        let reg = registration("tuning");
        let job = build_install_job(&reg, "test-node");
        assert_eq!(job.metadata.name.as_deref(), Some("krang-install-tuning-test-node"));
        let container = &job.spec.unwrap().template.spec.unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("busybox"));
        assert_eq!(
            container.command.as_ref().unwrap(),
            &vec!["cp", "/usr/src/bin/cni/tuning", "/host/opt/cni/bin/tuning"]
        );
    }

    #[test]
    fn installed_binary_path_uses_basename() {
        let reg = registration("tuning");
        assert_eq!(installed_binary_path(&reg), "/opt/cni/bin/tuning");
    }

    #[test]
    fn is_complete_requires_true_complete_condition() {
        use k8s_openapi::api::batch::v1::{JobCondition, JobStatus};
        let mut job = build_install_job(&registration("tuning"), "test-node");
        assert!(!is_complete(&job));
        job.status = Some(JobStatus {
            conditions: Some(vec![JobCondition {
                type_: "Complete".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert!(is_complete(&job));
    }
}
