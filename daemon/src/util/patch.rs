use super::MANAGER_NAME;
use k8s_openapi::{apimachinery::pkg::apis::meta::v1::Time, jiff::Timestamp};
use kube::{
    Api, Client, Error,
    api::{Patch, PatchParams, PostParams, Resource},
    core::NamespaceResourceScope,
};
use krang_types::{NodePluginStatus, PluginPhase, PluginRegistration, Validation, ValidationStatus};
use serde::{Serialize, de::DeserializeOwned};
use std::{clone::Clone, fmt::Debug, time::Duration};
use tokio::time::sleep;

pub trait Object<S> {
    /// Returns a mutable reference to the status object, initializing it
    /// with the default value if it does not exist.
    fn mut_status(&mut self) -> &mut S;
}

impl Object<ValidationStatus> for Validation {
    fn mut_status(&mut self) -> &mut ValidationStatus {
        self.status.get_or_insert_with(Default::default)
    }
}

/// Patches a single-writer status subresource via a JSON diff against the
/// in-memory instance. Safe for resources with exactly one writer (the
/// leader-elected Validation controller); resources with N concurrent
/// per-node writers must use [`upsert_node_status`] instead.
pub async fn patch_status<S, T>(
    client: Client,
    instance: &T,
    f: impl FnOnce(&mut S),
) -> Result<T, Error>
where
    <T as Resource>::DynamicType: Default,
    T: Clone
        + Resource
        + Object<S>
        + Serialize
        + DeserializeOwned
        + Debug
        + Resource<Scope = NamespaceResourceScope>,
{
    let patch = Patch::Json::<T>({
        let mut modified = instance.clone();
        let status = modified.mut_status();
        f(status);
        json_patch::diff(
            &serde_json::to_value(instance).unwrap(),
            &serde_json::to_value(&modified).unwrap(),
        )
    });
    let name = instance.meta().name.as_deref().unwrap();
    let namespace = instance.meta().namespace.as_deref().unwrap();
    let api: Api<T> = Api::namespaced(client, namespace);
    api.patch_status(name, &PatchParams::apply(MANAGER_NAME), &patch)
        .await
}

/// Upserts this node's [`NodePluginStatus`] entry into a `PluginRegistration`,
/// touching no other node's entry.
///
/// The status list is concurrently mutated by every node's Plugin Installer.
/// Each writer fetches the latest object, replaces only its own slot, and
/// retries with backoff on optimistic-concurrency conflict (`replace_status`
/// sends the fetched `resourceVersion`, so a 409 means another node's write
/// raced ours and we must re-read before trying again).
pub async fn upsert_node_status(
    client: Client,
    namespace: &str,
    name: &str,
    node_name: &str,
    phase: PluginPhase,
    ready: bool,
    message: Option<String>,
) -> Result<(), Error> {
    const MAX_ATTEMPTS: u32 = 5;
    let api: Api<PluginRegistration> = Api::namespaced(client, namespace);

    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut current = api.get(name).await?;
        let status = current.status.get_or_insert_with(Default::default);

        let entry = NodePluginStatus {
            node_name: node_name.to_string(),
            phase,
            ready,
            message: message.clone(),
            updated_at: Some(Time(Timestamp::now())),
        };
        match status.nodes.iter_mut().find(|n| n.node_name == node_name) {
            Some(slot) => *slot = entry,
            None => status.nodes.push(entry),
        }

        match api
            .replace_status(
                name,
                &PostParams::default(),
                serde_json::to_vec(&current).unwrap(),
            )
            .await
        {
            Ok(_) => return Ok(()),
            Err(Error::Api(ae)) if ae.code == 409 && attempt < MAX_ATTEMPTS => {
                sleep(Duration::from_millis(50 * attempt as u64)).await;
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}
