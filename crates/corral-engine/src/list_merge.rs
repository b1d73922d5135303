//! Strategic merge of named lists (containers, volumes)
//!
//! Elements are matched by identity. A matched element is rebuilt from a
//! zero-valued element, the base element and the patch, in that order, so
//! the patch only touches the fields it sets. Patches without a match are
//! appended after the base elements.

use indexmap::IndexMap;
use k8s_openapi::api::core::v1::{Container, Volume};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{EngineError, Result};
use crate::overlay::deep_merge;

/// Merge `patches` into `base` by identity.
///
/// Base order is kept. Unmatched patches are appended in the order they were
/// given; when several patches share an identity the last one is used.
pub fn merge_patch_list<T, I, N>(base: &[T], patches: &[T], identify: I, create: N) -> Result<Vec<T>>
where
    T: Serialize + DeserializeOwned + Clone,
    I: Fn(&T) -> String,
    N: Fn() -> T,
{
    let mut pending: IndexMap<String, &T> = IndexMap::with_capacity(patches.len());
    for patch in patches {
        pending.insert(identify(patch), patch);
    }

    let mut merged = Vec::with_capacity(base.len() + pending.len());
    for element in base {
        let identity = identify(element);
        match pending.shift_remove(&identity) {
            Some(patch) => merged.push(merge_element(element, patch, &create, &identity)?),
            None => merged.push(element.clone()),
        }
    }
    merged.extend(pending.into_values().cloned());

    Ok(merged)
}

fn merge_element<T, N>(base: &T, patch: &T, create: &N, identity: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    N: Fn() -> T,
{
    let to_value = |value: &T| serde_json::to_value(value).map_err(|e| EngineError::merge(identity, e));

    let mut document = to_value(&create())?;
    deep_merge(&mut document, &to_value(base)?);
    deep_merge(&mut document, &to_value(patch)?);

    serde_json::from_value(document).map_err(|e| EngineError::merge(identity, e))
}

pub fn merge_containers(base: &[Container], patches: &[Container]) -> Result<Vec<Container>> {
    merge_patch_list(base, patches, |c| c.name.clone(), Container::default)
}

pub fn merge_volumes(base: &[Volume], patches: &[Volume]) -> Result<Vec<Volume>> {
    merge_patch_list(base, patches, |v| v.name.clone(), Volume::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ConfigMapVolumeSource, EmptyDirVolumeSource, EnvVar};

    fn container(name: &str, image: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_preserves_order_and_appends() {
        let base = vec![container("a", "a:1"), container("b", "b:1")];
        let patches = vec![container("c", "c:1"), container("a", "a:2")];

        let merged = merge_containers(&base, &patches).unwrap();
        let names: Vec<&str> = merged.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(merged[0].image.as_deref(), Some("a:2"));
        assert_eq!(merged[1].image.as_deref(), Some("b:1"));
    }

    #[test]
    fn test_patch_touches_only_set_fields() {
        let base = vec![Container {
            name: "app".to_string(),
            image: Some("app:1".to_string()),
            args: Some(vec!["--serve".to_string()]),
            env: Some(vec![EnvVar {
                name: "MODE".to_string(),
                value: Some("slow".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }];
        let patches = vec![Container {
            name: "app".to_string(),
            image: Some("app:2".to_string()),
            ..Default::default()
        }];

        let merged = merge_containers(&base, &patches).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].image.as_deref(), Some("app:2"));
        assert_eq!(merged[0].args, base[0].args);
        assert_eq!(merged[0].env, base[0].env);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let base = vec![container("a", "a:1"), container("b", "b:1")];

        let merged = merge_containers(&base, &base).unwrap();
        assert_eq!(merged, base);
    }

    #[test]
    fn test_duplicate_patch_identity_last_wins() {
        let base = vec![container("a", "a:1")];
        let patches = vec![container("n", "n:1"), container("n", "n:2")];

        let merged = merge_containers(&base, &patches).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].image.as_deref(), Some("n:2"));
    }

    #[test]
    fn test_empty_inputs() {
        let base = vec![container("a", "a:1")];
        assert_eq!(merge_containers(&base, &[]).unwrap(), base);
        assert_eq!(merge_containers(&[], &base).unwrap(), base);
    }

    #[test]
    fn test_merge_volumes_appends_new_name() {
        let base = vec![Volume {
            name: "data".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }];
        let patches = vec![Volume {
            name: "config".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                optional: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }];

        let merged = merge_volumes(&base, &patches).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged[0].empty_dir.is_some());
        assert_eq!(merged[1].config_map.as_ref().unwrap().optional, Some(true));
    }
}
