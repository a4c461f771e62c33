use std::sync::OnceLock;

use serde::Deserialize;

use super::FieldSpecs;

const NAMESPACE: &str = include_str!("namespace.yaml");

/// Field specs kustomize applies by default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Builtin {
    pub namespace: FieldSpecs,
}

impl Builtin {
    pub fn get() -> &'static Self {
        static INSTANCE: OnceLock<Builtin> = OnceLock::new();
        INSTANCE.get_or_init(|| serde_yaml::from_str(NAMESPACE).expect("valid namespace.yaml"))
    }
}

#[cfg(test)]
#[test]
fn ensure_builtin_fieldspecs_valid() {
    let builtin = Builtin::get();
    assert!(
        builtin
            .namespace
            .iter()
            .any(|spec| spec.path.is("metadata/namespace") && spec.create)
    );
}
