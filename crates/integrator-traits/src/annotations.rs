//! Annotation transfer from integrations to generated resources.

use std::collections::BTreeMap;

const NON_TRANSFERABLE_PREFIXES: &[&str] = &["kubectl.kubernetes.io/"];

/// Annotations of a workload that may be copied onto generated resources.
pub fn filter_transferable(annotations: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    annotations
        .iter()
        .filter(|(k, _)| is_transferable(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn is_transferable(key: &str) -> bool {
    !NON_TRANSFERABLE_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}
