use serde_json::Value;

/// Depth-first walk over a JSON tree (through both objects and arrays),
/// collecting every string value found under a `"type"` key.
///
/// Duplicates are preserved in traversal order; callers that only care
/// about plugin identity should compare the result as a set.
pub fn collect_type_values(root: &Value) -> Vec<String> {
    let mut found = Vec::new();
    let mut stack = vec![root];

    while let Some(value) = stack.pop() {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if key == "type"
                        && let Value::String(s) = child
                    {
                        found.push(s.clone());
                    }
                    stack.push(child);
                }
            }
            Value::Array(items) => {
                for item in items {
                    stack.push(item);
                }
            }
            _ => {}
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collects_nested_plugin_types() {
        let config = json!({"type": "A", "plugins": [{"type": "B"}, {"type": "C"}]});
        let mut found = collect_type_values(&config);
        found.sort();
        assert_eq!(found, vec!["A", "B", "C"]);
    }

    #[test]
    fn ignores_non_string_type_values() {
        let config = json!({"type": 42, "nested": {"type": "real"}});
        assert_eq!(collect_type_values(&config), vec!["real"]);
    }

    #[test]
    fn empty_tree_yields_no_types() {
        assert!(collect_type_values(&json!({})).is_empty());
    }
}
