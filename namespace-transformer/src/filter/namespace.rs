use std::{fmt, str::FromStr, sync::LazyLock};

use anyhow::{Context as _, bail};
use serde_json::Value;

use crate::{
    fieldspec::{FieldSpec, FieldSpecs},
    manifest::{Str, Symbol, apiversion, kind},
    resource::{GvkMatcher, Object, Resource},
};

use super::Filter;

static METADATA_NAMESPACE: LazyLock<FieldSpec> = LazyLock::new(|| {
    FieldSpec::new(
        GvkMatcher::default(),
        "metadata/namespace".parse().expect("valid field path"),
        true,
    )
});

static SUBJECTS: LazyLock<FieldSpec> = LazyLock::new(|| {
    FieldSpec::new(
        GvkMatcher::default(),
        "subjects[]".parse().expect("valid field path"),
        false,
    )
});

/// Which (cluster) role binding subjects get their namespace set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubjectMode {
    /// Only service account subjects that have no namespace yet.
    #[default]
    DefaultOnly,
    /// Every service account subject, whatever its namespace.
    AllServiceAccounts,
    /// Subjects are left alone.
    None,
}

impl SubjectMode {
    pub const ALL: [SubjectMode; 3] = [
        SubjectMode::DefaultOnly,
        SubjectMode::None,
        SubjectMode::AllServiceAccounts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectMode::DefaultOnly => "defaultOnly",
            SubjectMode::AllServiceAccounts => "allServiceAccounts",
            SubjectMode::None => "none",
        }
    }
}

impl fmt::Display for SubjectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "invalid value `{value}` for setRoleBindingSubjects: must be one of `defaultOnly`, `none` or `allServiceAccounts`"
)]
pub struct InvalidSubjectMode {
    pub value: Str,
}

impl FromStr for SubjectMode {
    type Err = InvalidSubjectMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubjectMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| InvalidSubjectMode { value: s.into() })
    }
}

/// Sets the namespace of a resource along with any other fields that refer to it.
#[derive(Debug, Clone, Copy)]
pub struct NamespaceFilter<'a> {
    pub namespace: &'a str,
    pub field_specs: &'a FieldSpecs,
    pub subject_mode: SubjectMode,
    /// Only fill in namespaces that are currently unset.
    pub unset_only: bool,
}

impl Filter for NamespaceFilter<'_> {
    const NAME: &'static str = "namespace";

    #[tracing::instrument(skip_all, level = "debug", fields(resource = %resource.id()))]
    fn filter(&self, resource: &mut Resource) -> anyhow::Result<()> {
        let gvk = resource.gvk().clone();

        // `metadata.namespace` is handled here rather than through field specs so that
        // cluster-scoped resources never gain one.
        if !gvk.is_cluster_scoped() {
            METADATA_NAMESPACE.apply::<Value>(resource, &mut |ns| self.set(ns))?;
        }

        let is_role_binding =
            kind::RoleBinding == *gvk.kind || kind::ClusterRoleBinding == *gvk.kind;
        if is_role_binding {
            self.set_subjects(resource)
                .context("setting namespace on (cluster)role binding subjects")?;
        }

        // Only core `Namespace` objects are renamed, other kinds called `Namespace` are left alone.
        let is_core = apiversion::V1 == *gvk.api_version();
        for spec in self.field_specs.iter() {
            if spec.path.is("metadata/namespace")
                || (spec.path.is("metadata/name") && !is_core)
                || (is_role_binding && spec.path.root_field() == Some("subjects"))
            {
                continue;
            }

            spec.apply::<Value>(resource, &mut |value| self.set(value))
                .context("namespace field specs")?;
        }

        Ok(())
    }
}

impl NamespaceFilter<'_> {
    fn set(&self, value: &mut Value) -> anyhow::Result<()> {
        match value {
            Value::Null => *value = Value::String(self.namespace.to_string()),
            Value::String(current) => {
                if !self.unset_only || current.is_empty() {
                    *current = self.namespace.to_string();
                }
            }
            _ => bail!("expected a string namespace but found a value of different type"),
        }
        Ok(())
    }

    fn set_subjects(&self, resource: &mut Resource) -> anyhow::Result<()> {
        if self.subject_mode == SubjectMode::None {
            return Ok(());
        }

        SUBJECTS.apply::<Object>(resource, &mut |subject| {
            if subject.get("kind").and_then(Value::as_str) != Some(kind::ServiceAccount::VALUE) {
                return Ok(());
            }

            let is_unset = match subject.get("namespace") {
                None | Some(Value::Null) => true,
                Some(Value::String(ns)) => ns.is_empty(),
                Some(_) => bail!("expected subject namespace to be a string"),
            };

            let update = match self.subject_mode {
                SubjectMode::DefaultOnly => is_unset,
                SubjectMode::AllServiceAccounts => is_unset || !self.unset_only,
                SubjectMode::None => false,
            };

            if update {
                subject.insert(
                    "namespace".to_string(),
                    Value::String(self.namespace.to_string()),
                );
            }
            Ok(())
        })
    }
}
