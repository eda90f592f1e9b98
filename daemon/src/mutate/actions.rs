use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde_json::Value;
use std::path::Path;

use crate::cni::{self, ConfList, RuntimeConf};
use crate::cni::resultcache::{self, CachedResult};
use crate::util::Error;

pub const RESULTS_DIR: &str = "/var/lib/cni/results";
pub const CNI_BIN_DIR: &str = "/opt/cni/bin";
pub const CNI_CONF_DIR: &str = "/etc/cni/net.d";
const DEFAULT_IFACE_SUFFIX: &str = "eth0";

/// Renders a `LabelSelector` into the query string the Kubernetes list API
/// expects, covering `matchLabels` and the common `matchExpressions`
/// operators.
pub fn selector_to_query(selector: &LabelSelector) -> String {
    let mut terms = Vec::new();

    if let Some(match_labels) = &selector.match_labels {
        for (k, v) in match_labels {
            terms.push(format!("{k}={v}"));
        }
    }

    if let Some(exprs) = &selector.match_expressions {
        for expr in exprs {
            let values = expr.values.clone().unwrap_or_default().join(",");
            match expr.operator.as_str() {
                "In" => terms.push(format!("{} in ({})", expr.key, values)),
                "NotIn" => terms.push(format!("{} notin ({})", expr.key, values)),
                "Exists" => terms.push(expr.key.clone()),
                "DoesNotExist" => terms.push(format!("!{}", expr.key)),
                _ => {}
            }
        }
    }

    terms.join(",")
}

/// Strips the `containerd://` runtime prefix CRI-O and Docker don't use.
/// Other runtime prefixes are deliberately left unstripped; preserving the
/// upstream behavior rather than generalizing it (see design notes).
pub fn strip_containerd_prefix(container_id: &str) -> &str {
    container_id
        .strip_prefix("containerd://")
        .unwrap_or(container_id)
}

/// Locates and parses this pod's CNI result-cache entry.
pub fn find_cached_result(
    pod_name: &str,
    pod_namespace: &str,
) -> Result<Option<CachedResult>, Error> {
    let Some(path) = resultcache::find_result_file(
        Path::new(RESULTS_DIR),
        DEFAULT_IFACE_SUFFIX,
        pod_name,
        pod_namespace,
    )?
    else {
        return Ok(None);
    };
    let contents = std::fs::read_to_string(&path)?;
    Ok(Some(
        resultcache::parse_cached_result(&contents).map_err(Error::from)?,
    ))
}

/// Executes the mutation's CNI ConfList ADD against a single pod's
/// namespace, having already resolved its cached `netns`/`ifName`.
pub async fn mutate_pod(
    container_id: &str,
    cached: &CachedResult,
    interface_override: &str,
    conf_list_json: &str,
) -> Result<Value, Error> {
    let ifname = if interface_override.is_empty() {
        cached.if_name.clone()
    } else {
        interface_override.to_string()
    };
    let rt = RuntimeConf {
        container_id: strip_containerd_prefix(container_id).to_string(),
        netns: cached.netns.clone(),
        ifname,
        args: Vec::new(),
    };
    let conflist = ConfList::from_json(conf_list_json)?;
    cni::add_network_list(&conflist, &rt, CNI_BIN_DIR, CNI_CONF_DIR).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn strips_containerd_prefix_only() {
        assert_eq!(strip_containerd_prefix("containerd://deadbeef"), "deadbeef");
        assert_eq!(strip_containerd_prefix("docker://deadbeef"), "docker://deadbeef");
    }

    #[test]
    fn selector_to_query_joins_match_labels() {
        let mut match_labels = BTreeMap::new();
        match_labels.insert("app".to_string(), "demotuning".to_string());
        let selector = LabelSelector {
            match_labels: Some(match_labels),
            match_expressions: None,
        };
        assert_eq!(selector_to_query(&selector), "app=demotuning");
    }
}
