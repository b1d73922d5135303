//! Field overlay helpers shared by the customizer and the list merge
//!
//! Overrides are serialized with every unset field skipped, so a JSON object
//! of an override holds exactly the fields to replace.

use corral_core::Labels;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};

/// Replace every top-level field of `target` that `patch` sets.
///
/// Fields are replaced whole, nested objects are not merged.
pub fn overlay<T, P>(target: &mut T, patch: &P, identity: &str) -> Result<()>
where
    T: Serialize + DeserializeOwned,
    P: Serialize,
{
    let JsonValue::Object(fields) =
        serde_json::to_value(patch).map_err(|e| EngineError::merge(identity, e))?
    else {
        return Ok(());
    };
    if fields.is_empty() {
        return Ok(());
    }

    let mut current = serde_json::to_value(&*target).map_err(|e| EngineError::merge(identity, e))?;
    let JsonValue::Object(map) = &mut current else {
        return Err(EngineError::merge(identity, "target is not an object"));
    };
    for (key, value) in fields {
        if !value.is_null() {
            map.insert(key, value);
        }
    }

    *target = serde_json::from_value(current).map_err(|e| EngineError::merge(identity, e))?;
    Ok(())
}

/// [`overlay`] onto an optional target, creating it when the patch sets anything
pub fn overlay_opt<T, P>(target: &mut Option<T>, patch: &P, identity: &str) -> Result<()>
where
    T: Serialize + DeserializeOwned + Default,
    P: Serialize,
{
    if is_empty_patch(patch) {
        return Ok(());
    }
    overlay(target.get_or_insert_with(T::default), patch, identity)
}

fn is_empty_patch<P: Serialize>(patch: &P) -> bool {
    match serde_json::to_value(patch) {
        Ok(JsonValue::Object(fields)) => fields.values().all(JsonValue::is_null),
        Ok(JsonValue::Null) => true,
        _ => false,
    }
}

/// Recursive JSON merge: objects merge key by key, anything else is replaced.
/// A null in `overlay` removes the key.
pub fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                if overlay_value.is_null() {
                    base_map.remove(key);
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Add labels absent from `target`; existing keys keep their values
pub fn add_missing(target: &mut BTreeMap<String, String>, labels: &Labels) {
    for (key, value) in labels {
        target.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// Set the namespace (when given) and add missing instance labels
pub fn merge_object_meta(meta: &mut ObjectMeta, namespace: Option<&str>, labels: &Labels) {
    if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
        meta.namespace = Some(ns.to_string());
    }
    add_missing(meta.labels.get_or_insert_with(BTreeMap::new), labels);
}

/// Labels minus the keys that must stay out of selectors
pub fn selector_labels(labels: &Labels, ignored: impl Fn(&str) -> bool) -> Labels {
    labels
        .iter()
        .filter(|(key, _)| !ignored(key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Copy labels and annotations of an override's metadata, override wins
pub fn apply_meta_override(meta: &mut ObjectMeta, patch: &ObjectMeta) {
    if let Some(labels) = &patch.labels {
        meta.labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(annotations) = &patch.annotations {
        meta.annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}
