use kube::{Api, Client};
use krang_types::{PluginRegistration, Validation, ValidationPhase, ValidationStatus};
use std::collections::BTreeSet;

use super::{nad, walk};
use crate::util::{Error, patch::patch_status};

const PLUGIN_NAMESPACE: &str = "kube-system";

/// Resolves the referenced NAD and extracts the plugin type names found in
/// its config, in traversal order with duplicates preserved.
pub async fn resolve_plugin_types(client: Client, instance: &Validation) -> Result<Vec<String>, Error> {
    let config = nad::fetch_config(client, &instance.spec.network_ref).await?;
    let tree: serde_json::Value = serde_json::from_str(&config)?;
    Ok(walk::collect_type_values(&tree))
}

/// True iff, for every distinct plugin type in `types_found`, the
/// PluginRegistration exists and none of its recorded nodes has `ready=false`.
/// A registration with no recorded nodes yet is vacuously ready, matching the
/// literal "iff any node has ready=false" definition.
pub async fn plugins_ready(client: Client, types_found: &[String]) -> Result<bool, Error> {
    let distinct: BTreeSet<&String> = types_found.iter().collect();
    let api: Api<PluginRegistration> = Api::namespaced(client, PLUGIN_NAMESPACE);
    for t in distinct {
        let Ok(registration) = api.get(t).await else {
            return Ok(false);
        };
        let no_node_unready = registration
            .status
            .as_ref()
            .is_none_or(|status| status.nodes.iter().all(|n| n.ready));
        if !no_node_unready {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Records a failed resolution (e.g. missing NAD) without re-queueing.
pub async fn fail(client: Client, instance: &Validation, message: String) -> Result<(), Error> {
    patch_status::<ValidationStatus, Validation>(client, instance, |status| {
        status.phase = ValidationPhase::Failed;
        status.message = Some(message);
    })
    .await?;
    Ok(())
}

/// Records a completed validation pass.
pub async fn complete(
    client: Client,
    instance: &Validation,
    types_found: Vec<String>,
    plugins_installed: bool,
) -> Result<(), Error> {
    patch_status::<ValidationStatus, Validation>(client, instance, |status| {
        status.phase = ValidationPhase::Complete;
        status.config_valid = true;
        status.plugins_installed = plugins_installed;
        status.plugin_types = types_found;
        status.message = Some("Validation completed".to_string());
    })
    .await?;
    Ok(())
}
