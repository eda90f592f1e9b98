use k8s_openapi::api::core::v1::ObjectReference;
use kube::{
    Api, Client,
    api::{ApiResource, DynamicObject, GroupVersionKind},
};

use crate::util::Error;

/// GVK for the Network-Attachment-Definition Definition CRD, as shipped by
/// the Multus project. Not owned by this controller; resolved dynamically
/// since krangd carries no typed bindings for it.
fn nad_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind {
            group: "k8s.cni.cncf.io".to_string(),
            version: "v1".to_string(),
            kind: "NetworkAttachmentDefinition".to_string(),
        },
        "network-attachment-definitions",
    )
}

/// Fetches the NAD referenced by `network_ref` and returns its
/// `spec.config` string.
pub async fn fetch_config(client: Client, network_ref: &ObjectReference) -> Result<String, Error> {
    let name = network_ref
        .name
        .as_deref()
        .ok_or_else(|| Error::UserInput("networkRef is missing a name".into()))?;
    let namespace = network_ref
        .namespace
        .as_deref()
        .ok_or_else(|| Error::UserInput("networkRef is missing a namespace".into()))?;

    let resource = nad_resource();
    let api: Api<DynamicObject> = Api::namespaced_with(client, namespace, &resource);
    let nad = api.get(name).await?;

    nad.data
        .get("spec")
        .and_then(|spec| spec.get("config"))
        .and_then(|config| config.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::UserInput(format!(
                "NetworkAttachmentDefinition '{namespace}/{name}' has no spec.config"
            ))
        })
}
