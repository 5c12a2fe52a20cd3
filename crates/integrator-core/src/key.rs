//! Namespace-qualified resource identity.

use derive_more::Display;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

/// Identity of a namespaced resource. Immutable once the resource exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{namespace}/{name}")]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing object. Objects without a namespace land in `default`.
    pub fn of<K: ResourceExt>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace().unwrap_or_else(|| "default".to_string()),
            name: obj.name_any(),
        }
    }
}

impl std::str::FromStr for ObjectKey {
    type Err = crate::Error;

    /// Parses `namespace/name`; a bare `name` lands in `default`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (namespace, name) = match s.split_once('/') {
            Some((ns, name)) => (ns, name),
            None => ("default", s),
        };
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return Err(crate::Error::InvalidInput(format!(
                "invalid object key: {s}"
            )));
        }
        Ok(Self::new(namespace, name))
    }
}
