//! Helpers for container environment variable lists.
//!
//! Setting a variable that already exists replaces it in place, so the last
//! writer wins while the original position is kept.

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector};

pub fn get<'a>(vars: &'a [EnvVar], name: &str) -> Option<&'a EnvVar> {
    vars.iter().find(|v| v.name == name)
}

/// Set a literal value.
pub fn set_val(vars: &mut Vec<EnvVar>, name: impl Into<String>, value: impl Into<String>) {
    set_var(
        vars,
        EnvVar {
            name: name.into(),
            value: Some(value.into()),
            ..Default::default()
        },
    );
}

pub fn set_var(vars: &mut Vec<EnvVar>, var: EnvVar) {
    match vars.iter_mut().find(|v| v.name == var.name) {
        Some(existing) => *existing = var,
        None => vars.push(var),
    }
}

/// Variable resolved from a field of the pod running the container.
pub fn field_ref(name: impl Into<String>, field_path: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.into(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut vars = Vec::new();
        set_val(&mut vars, "A", "1");
        set_val(&mut vars, "B", "2");
        set_val(&mut vars, "A", "3");

        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].name, "A");
        assert_eq!(vars[0].value.as_deref(), Some("3"));
    }

    #[test]
    fn test_set_var_replaces_literal_with_reference() {
        let mut vars = Vec::new();
        set_val(&mut vars, "NAMESPACE", "default");
        set_var(&mut vars, field_ref("NAMESPACE", "metadata.namespace"));

        let var = get(&vars, "NAMESPACE").unwrap();
        assert!(var.value.is_none());
        assert!(var.value_from.is_some());
    }
}
