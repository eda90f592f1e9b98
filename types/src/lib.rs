use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, LabelSelector, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Finalizer placed on a [`PluginRegistration`] for its entire non-deleting
/// lifetime, removed only once this node's binary has been cleaned up.
pub const PLUGIN_CLEANUP_FINALIZER: &str = "krangd.k8s.cni.cncf.io/plugin-cleanup";

fn default_interface() -> String {
    String::new()
}

// ---------------------------------------------------------------------
// PluginRegistration
// ---------------------------------------------------------------------

#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "k8s.cni.cncf.io",
    version = "v1alpha1",
    kind = "PluginRegistration",
    plural = "pluginregistrations",
    derive = "PartialEq",
    status = "PluginRegistrationStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".spec.cniType\", \"name\": \"TYPE\", \"type\": \"string\" }"
)]
#[serde(rename_all = "camelCase")]
pub struct PluginRegistrationSpec {
    /// Free-form plugin identifier, e.g. "tuning".
    pub cni_type: String,

    /// Container image producing the binary.
    pub image: String,

    /// Path to the binary inside that image.
    pub binary_path: String,

    /// Raw CNI JSON configuration. Informational only; the installer never
    /// interprets it.
    #[serde(default)]
    pub config: String,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PluginPhase {
    Installing,
    Ready,
    Removing,
    Failed,
}

impl Default for PluginPhase {
    fn default() -> Self {
        Self::Installing
    }
}

impl fmt::Display for PluginPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Ready => write!(f, "ready"),
            Self::Removing => write!(f, "removing"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePluginStatus {
    #[serde(rename = "node")]
    pub node_name: String,
    pub phase: PluginPhase,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Time>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct PluginRegistrationStatus {
    #[serde(default)]
    pub nodes: Vec<NodePluginStatus>,
}

// ---------------------------------------------------------------------
// MutationRequest
// ---------------------------------------------------------------------

#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "k8s.cni.cncf.io",
    version = "v1alpha1",
    kind = "MutationRequest",
    plural = "mutationrequests",
    derive = "PartialEq",
    status = "MutationRequestStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[serde(rename_all = "camelCase")]
pub struct MutationRequestSpec {
    pub pod_selector: LabelSelector,

    pub cni_type: String,

    /// Override for the target interface name. Blank means "use the
    /// interface recorded in the node's CNI result cache".
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Raw CNI ConfList JSON to execute against the matched pods.
    pub config: String,

    /// Opaque plugin-specific data, passed through uninterpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum MutationPhase {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl Default for MutationPhase {
    fn default() -> Self {
        Self::Pending
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct MutationRequestStatus {
    #[serde(default)]
    pub phase: MutationPhase,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// ---------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------

#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "k8s.cni.cncf.io",
    version = "v1alpha1",
    kind = "Validation",
    plural = "validations",
    derive = "PartialEq",
    status = "ValidationStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.phase\", \"name\": \"PHASE\", \"type\": \"string\" }"
)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSpec {
    /// Reference to the NetworkAttachmentDefinition to validate.
    pub network_ref: ObjectReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary_ref: Option<ObjectReference>,

    /// Overrides the config resolved from the NetAttachDef when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_override: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ValidationPhase {
    Pending,
    Validating,
    Complete,
    Failed,
}

impl Default for ValidationPhase {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Validating => write!(f, "Validating"),
            Self::Complete => write!(f, "Complete"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatus {
    #[serde(default)]
    pub phase: ValidationPhase,
    #[serde(default)]
    pub plugins_installed: bool,
    #[serde(default)]
    pub config_valid: bool,
    #[serde(default)]
    pub config_tested: bool,
    #[serde(default)]
    pub plugin_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<Time>,
}
