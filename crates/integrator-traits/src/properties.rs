//! Typed access to a trait's string property bag.

use integrator_core::{Error, Result};
use std::collections::BTreeMap;

/// Properties configured for one trait.
///
/// Every accessor returns `None` for an unset property, keeping "not
/// configured" distinct from an explicit value.
#[derive(Debug, Clone, Copy)]
pub struct TraitProperties<'a> {
    id: &'a str,
    values: &'a BTreeMap<String, String>,
}

impl<'a> TraitProperties<'a> {
    pub fn new(id: &'a str, values: &'a BTreeMap<String, String>) -> Self {
        Self { id, values }
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.string(key) {
            None => Ok(None),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(self.invalid(key, &v, "boolean")),
            },
        }
    }

    pub fn int(&self, key: &str) -> Result<Option<i32>> {
        match self.string(key) {
            None => Ok(None),
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(key, &v, "integer")),
        }
    }

    /// The `enabled` property shared by every trait.
    pub fn enabled(&self) -> Result<Option<bool>> {
        self.bool("enabled")
    }

    fn invalid(&self, key: &str, value: &str, expected: &str) -> Error {
        Error::InvalidInput(format!(
            "trait {}: property {key} must be a valid {expected}, got '{value}'",
            self.id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unset_is_none() {
        let v = values(&[]);
        let props = TraitProperties::new("knative-service", &v);
        assert_eq!(props.bool("auto").unwrap(), None);
        assert_eq!(props.int("min-scale").unwrap(), None);
        assert_eq!(props.string("autoscaling-class"), None);
    }

    #[test]
    fn test_typed_values() {
        let v = values(&[("auto", "False"), ("min-scale", " 2 "), ("enabled", "true")]);
        let props = TraitProperties::new("knative-service", &v);
        assert_eq!(props.bool("auto").unwrap(), Some(false));
        assert_eq!(props.int("min-scale").unwrap(), Some(2));
        assert_eq!(props.enabled().unwrap(), Some(true));
    }

    #[test]
    fn test_invalid_value_names_trait_and_property() {
        let v = values(&[("max-scale", "lots")]);
        let err = TraitProperties::new("knative-service", &v)
            .int("max-scale")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("knative-service"));
        assert!(msg.contains("max-scale"));
    }
}
