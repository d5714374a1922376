//! # Config Tree Walks
//!
//! A policy config is a JSON tree of blocks: each block is an object with an
//! `id`, a `blockType`, and optionally `children`. Schema, token and artifact
//! references live in block properties at any depth.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

/// Block properties that hold schema IRIs.
pub const SCHEMA_FIELDS: &[&str] = &["schema", "inputSchema", "outputSchema", "presetSchema"];

/// Block properties that hold token ids.
pub const TOKEN_FIELDS: &[&str] = &["tokenId"];

/// Give every block in the tree a fresh id.
pub fn regenerate_ids(block: &mut Value) {
    let Some(obj) = block.as_object_mut() else {
        return;
    };
    obj.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    if let Some(Value::Array(children)) = obj.get_mut("children") {
        for child in children {
            regenerate_ids(child);
        }
    }
}

/// Distinct string values of `keys` anywhere in the tree, first-seen order.
pub fn find_all_entities(tree: &Value, keys: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    collect(tree, keys, &mut found);
    found
}

fn collect(node: &Value, keys: &[&str], found: &mut Vec<String>) {
    match node {
        Value::Object(obj) => {
            for (k, v) in obj {
                if let (true, Value::String(s)) = (keys.contains(&k.as_str()), v) {
                    if !found.contains(s) {
                        found.push(s.clone());
                    }
                } else {
                    collect(v, keys, found);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, keys, found);
            }
        }
        _ => {}
    }
}

/// Replace every `keys` value equal to `old` with `new`. Returns the number
/// of replacements.
pub fn replace_all_entities(tree: &mut Value, keys: &[&str], old: &str, new: &str) -> usize {
    match tree {
        Value::Object(obj) => obj
            .iter_mut()
            .map(|(k, v)| match v {
                Value::String(s) if keys.contains(&k.as_str()) && *s == old => {
                    *s = new.to_string();
                    1
                }
                _ => replace_all_entities(v, keys, old, new),
            })
            .sum(),
        Value::Array(items) => items
            .iter_mut()
            .map(|item| replace_all_entities(item, keys, old, new))
            .sum(),
        _ => 0,
    }
}

/// Rewrite the `uuid` of every entry of every block's `artifacts` list
/// through `map`. Entries not in `map` are left alone.
pub fn replace_artifact_uuids(tree: &mut Value, map: &HashMap<String, String>) {
    match tree {
        Value::Object(obj) => {
            for (k, v) in obj.iter_mut() {
                match v {
                    Value::Array(entries) if k == "artifacts" => {
                        for entry in entries.iter_mut() {
                            if let Some(Value::String(uuid)) = entry.get_mut("uuid") {
                                if let Some(new) = map.get(uuid.as_str()) {
                                    *uuid = new.clone();
                                }
                            }
                        }
                    }
                    _ => replace_artifact_uuids(v, map),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                replace_artifact_uuids(item, map);
            }
        }
        _ => {}
    }
}
