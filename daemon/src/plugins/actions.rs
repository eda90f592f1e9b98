use kube::{
    Api, Client, Resource, ResourceExt,
    api::{Patch, PatchParams},
};
use krang_types::{PLUGIN_CLEANUP_FINALIZER, PluginPhase, PluginRegistration};
use serde_json::json;

use super::job;
use crate::util::{Error, MANAGER_NAME, patch::upsert_node_status};

fn instance_namespace(instance: &PluginRegistration) -> Result<&str, Error> {
    instance
        .meta()
        .namespace
        .as_deref()
        .ok_or_else(|| Error::UserInput("PluginRegistration is missing metadata.namespace".into()))
}

/// Appends the cleanup finalizer if it isn't present yet.
pub async fn ensure_finalizer(client: Client, instance: &PluginRegistration) -> Result<(), Error> {
    if instance
        .finalizers()
        .iter()
        .any(|f| f == PLUGIN_CLEANUP_FINALIZER)
    {
        return Ok(());
    }
    let api: Api<PluginRegistration> =
        Api::namespaced(client, instance_namespace(instance)?);
    let mut finalizers = instance.finalizers().to_vec();
    finalizers.push(PLUGIN_CLEANUP_FINALIZER.to_string());
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(
        &instance.name_any(),
        &PatchParams::apply(MANAGER_NAME),
        &Patch::Merge(patch),
    )
    .await?;
    Ok(())
}

/// Removes the cleanup finalizer now that this node's binary is gone.
pub async fn remove_finalizer(client: Client, instance: &PluginRegistration) -> Result<(), Error> {
    let remaining: Vec<&String> = instance
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != PLUGIN_CLEANUP_FINALIZER)
        .collect();
    let api: Api<PluginRegistration> =
        Api::namespaced(client, instance_namespace(instance)?);
    let patch = json!({ "metadata": { "finalizers": remaining } });
    api.patch(
        &instance.name_any(),
        &PatchParams::apply(MANAGER_NAME),
        &Patch::Merge(patch),
    )
    .await?;
    Ok(())
}

/// Unlinks this node's installed binary, tolerating "not found".
pub fn remove_binary(instance: &PluginRegistration) -> Result<(), Error> {
    match std::fs::remove_file(job::installed_binary_path(instance)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::from(e)),
    }
}

/// Upserts this node's slot in `Status.Nodes`, retrying on conflict.
pub async fn set_node_status(
    client: Client,
    instance: &PluginRegistration,
    node_name: &str,
    phase: PluginPhase,
    ready: bool,
    message: Option<String>,
) -> Result<(), Error> {
    upsert_node_status(
        client,
        instance_namespace(instance)?,
        &instance.name_any(),
        node_name,
        phase,
        ready,
        message,
    )
    .await
    .map_err(Error::from)
}

/// Creates the install Job for this node, tolerating a lost `Create` race.
pub async fn create_install_job(
    client: Client,
    instance: &PluginRegistration,
    node_name: &str,
) -> Result<(), Error> {
    let jobs: Api<k8s_openapi::api::batch::v1::Job> =
        Api::namespaced(client, instance_namespace(instance)?);
    let job = job::build_install_job(instance, node_name);
    match jobs.create(&Default::default(), &job).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(e) => Err(Error::from(e)),
    }
}

pub async fn get_install_job(
    client: Client,
    instance: &PluginRegistration,
    node_name: &str,
) -> Result<Option<k8s_openapi::api::batch::v1::Job>, Error> {
    let jobs: Api<k8s_openapi::api::batch::v1::Job> =
        Api::namespaced(client, instance_namespace(instance)?);
    match jobs.get(&job::job_name(&instance.name_any(), node_name)).await {
        Ok(job) => Ok(Some(job)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(Error::from(e)),
    }
}
