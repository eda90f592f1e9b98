use crate::util::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A CNI configuration list: an ordered chain of plugins sharing a network
/// name and CNI spec version.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConfList {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    pub name: String,
    pub plugins: Vec<Value>,
}

impl ConfList {
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(Error::from)
    }

    /// Builds the per-plugin configuration document handed to a single
    /// plugin in the chain: the plugin's own JSON object with the list's
    /// `cniVersion`/`name` merged in, plus the previous plugin's result
    /// under `prevResult` when chaining.
    pub fn plugin_config(&self, index: usize, prev_result: Option<&Value>) -> Result<Value, Error> {
        let mut config = self
            .plugins
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Cni(format!("plugin index {index} out of range")))?;
        let Value::Object(map) = &mut config else {
            return Err(Error::Cni(format!(
                "plugin {index} configuration is not a JSON object"
            )));
        };
        map.insert(
            "cniVersion".to_string(),
            Value::String(self.cni_version.clone()),
        );
        map.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(prev) = prev_result {
            map.insert("prevResult".to_string(), prev.clone());
        }
        Ok(config)
    }

    pub fn plugin_type(&self, index: usize) -> Result<&str, Error> {
        self.plugins
            .get(index)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Cni(format!("plugin {index} is missing a \"type\" field")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_conflist() {
        let raw = r#"{"cniVersion":"0.4.0","name":"mutate","plugins":[{"type":"noop"}]}"#;
        let list = ConfList::from_json(raw).unwrap();
        assert_eq!(list.name, "mutate");
        assert_eq!(list.plugins.len(), 1);
        assert_eq!(list.plugin_type(0).unwrap(), "noop");
    }

    #[test]
    fn plugin_config_merges_list_fields_and_chains_prev_result() {
        let raw = r#"{"cniVersion":"0.4.0","name":"mutate","plugins":[{"type":"a"},{"type":"b"}]}"#;
        let list = ConfList::from_json(raw).unwrap();
        let first = list.plugin_config(0, None).unwrap();
        assert_eq!(first["cniVersion"], "0.4.0");
        assert_eq!(first["name"], "mutate");
        assert!(first.get("prevResult").is_none());

        let prev = serde_json::json!({"ips": []});
        let second = list.plugin_config(1, Some(&prev)).unwrap();
        assert_eq!(second["prevResult"], prev);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let list = ConfList::from_json(r#"{"cniVersion":"0.4.0","name":"n","plugins":[]}"#).unwrap();
        assert!(list.plugin_config(0, None).is_err());
    }
}
