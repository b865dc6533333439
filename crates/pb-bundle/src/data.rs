// data.rs — Data documents.
//
// Data files (`data.json`, `data.yaml`, `data.yml`) are merged into one
// JSON tree. Each document is mounted at a path: the directory it was
// found in (bundle mode) or the root. Objects merge recursively; any other
// overlap is a conflict.

use serde_json::{Map, Value};

use crate::error::BundleError;

pub const DATA_FILE_NAMES: &[&str] = &["data.json", "data.yaml", "data.yml"];

pub fn is_data_file(name: &str) -> bool {
    DATA_FILE_NAMES.contains(&name)
}

/// Parse a data document by file name.
pub fn parse_document(path: &str, bytes: &[u8]) -> Result<Value, BundleError> {
    let parse_error = |detail: String| BundleError::DataParse {
        path: path.to_string(),
        detail,
    };
    if path.ends_with(".json") {
        serde_json::from_slice(bytes).map_err(|e| parse_error(e.to_string()))
    } else {
        serde_yaml::from_slice::<Value>(bytes).map_err(|e| parse_error(e.to_string()))
    }
}

/// The merged data tree of a build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTree {
    root: Map<String, Value>,
}

impl DataTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    /// Mount `value` at `path` (empty path = root).
    ///
    /// A document mounted at the root must be an object.
    pub fn mount(&mut self, path: &[String], value: Value, origin: &str) -> Result<(), BundleError> {
        let Some((last, parents)) = path.split_last() else {
            return match value {
                Value::Object(map) => merge_maps(&mut self.root, map, &mut Vec::new()),
                Value::Null => Ok(()),
                _ => Err(BundleError::DataParse {
                    path: origin.to_string(),
                    detail: "document at the data root must be an object".to_string(),
                }),
            };
        };

        let mut key_path: Vec<String> = Vec::new();
        let mut node = &mut self.root;
        for segment in parents {
            key_path.push(segment.clone());
            let child = node
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            node = match child {
                Value::Object(map) => map,
                _ => {
                    return Err(BundleError::MergeConflict {
                        key: key_path.join("/"),
                    })
                }
            };
        }

        key_path.push(last.clone());
        merge_value(node, last, value, &mut key_path)
    }
}

fn merge_value(
    target: &mut Map<String, Value>,
    key: &str,
    value: Value,
    key_path: &mut Vec<String>,
) -> Result<(), BundleError> {
    if let Some(existing) = target.get_mut(key) {
        return match (existing, value) {
            (Value::Object(existing), Value::Object(incoming)) => {
                merge_maps(existing, incoming, key_path)
            }
            _ => Err(BundleError::MergeConflict {
                key: key_path.join("/"),
            }),
        };
    }
    target.insert(key.to_string(), value);
    Ok(())
}

fn merge_maps(
    target: &mut Map<String, Value>,
    incoming: Map<String, Value>,
    key_path: &mut Vec<String>,
) -> Result<(), BundleError> {
    for (key, value) in incoming {
        key_path.push(key.clone());
        merge_value(target, &key, value, key_path)?;
        key_path.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> Vec<String> {
        p.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
    }

    #[test]
    fn merges_disjoint_documents() {
        let mut tree = DataTree::new();
        tree.mount(&[], json!({"a": {"x": 1}}), "data.json").unwrap();
        tree.mount(&path("a"), json!({"y": 2}), "a/data.json").unwrap();
        tree.mount(&path("b/c"), json!([1, 2]), "b/c/data.json").unwrap();
        assert_eq!(
            tree.into_value(),
            json!({"a": {"x": 1, "y": 2}, "b": {"c": [1, 2]}})
        );
    }

    #[test]
    fn conflicting_key_is_reported() {
        let mut tree = DataTree::new();
        tree.mount(&[], json!({"roles": {"admin": true}}), "data.json").unwrap();
        let err = tree
            .mount(&[], json!({"roles": {"admin": false}}), "other/data.json")
            .unwrap_err();
        assert_eq!(err.to_string(), "merge error: conflicting key roles/admin");
    }

    #[test]
    fn scalar_under_mount_path_conflicts() {
        let mut tree = DataTree::new();
        tree.mount(&[], json!({"a": 1}), "data.json").unwrap();
        let err = tree.mount(&path("a/b"), json!({}), "a/b/data.json").unwrap_err();
        assert!(matches!(err, BundleError::MergeConflict { key } if key == "a"));
    }

    #[test]
    fn root_document_must_be_object() {
        let mut tree = DataTree::new();
        let err = tree.mount(&[], json!([1]), "data.json").unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn parses_yaml_and_json() {
        let v = parse_document("data.yaml", b"users:\n  - alice\n").unwrap();
        assert_eq!(v, json!({"users": ["alice"]}));
        let v = parse_document("data.json", br#"{"k": 1}"#).unwrap();
        assert_eq!(v, json!({"k": 1}));
        let err = parse_document("data.json", b"{").unwrap_err();
        assert!(matches!(err, BundleError::DataParse { .. }));
    }
}
