use serde::Deserialize;

use crate::{
    fieldspec::{self, FieldSpecs},
    filter::{FilterError, InvalidSubjectMode, NamespaceFilter, SubjectMode},
    manifest::{Str, Symbol, TypeMeta, apiversion, kind},
    resmap::ResourceMap,
    resource::ResId,
};

use super::Transformer;

/// Changes or sets the namespace of namespace-scoped resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTransformer {
    namespace: Str,
    field_specs: FieldSpecs,
    unset_only: bool,
    subject_mode: SubjectMode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Config {
    #[serde(flatten)]
    _type_meta: TypeMeta<apiversion::Builtin, kind::NamespaceTransformer>,
    #[serde(default)]
    metadata: ConfigMetadata,
    #[serde(default)]
    field_specs: FieldSpecs,
    #[serde(default)]
    unset_only: bool,
    #[serde(default)]
    set_role_binding_subjects: Str,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigMetadata {
    #[serde(default)]
    namespace: Str,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unmarshalling {artifact} config")]
    Parse {
        artifact: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    InvalidSubjectMode(#[from] InvalidSubjectMode),
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("storing previous id of `{id}`")]
    PreviousId {
        id: ResId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("namespace transformation produces ID conflict: {matches:?}")]
    IdConflict { id: ResId, matches: Vec<ResId> },
}

impl NamespaceTransformer {
    /// Parses and validates a `NamespaceTransformer` config document.
    pub fn from_config(config: &[u8]) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_slice(config).map_err(|source| ConfigError::Parse {
            artifact: kind::NamespaceTransformer::VALUE,
            source,
        })?;

        // An unspecified mode is resolved here so the transform always sees a concrete one.
        let subject_mode = match config.set_role_binding_subjects.as_str() {
            "" => SubjectMode::DefaultOnly,
            mode => mode.parse()?,
        };

        Ok(NamespaceTransformer {
            namespace: config.metadata.namespace,
            field_specs: config.field_specs,
            unset_only: config.unset_only,
            subject_mode,
        })
    }

    /// Replaces the whole configuration, nothing from a previous config is retained.
    /// A rejected config leaves the transformer reset, and so a no-op.
    pub fn configure(&mut self, config: &[u8]) -> Result<(), ConfigError> {
        *self = Self::default();
        *self = Self::from_config(config)?;
        Ok(())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn field_specs(&self) -> &FieldSpecs {
        &self.field_specs
    }

    pub fn unset_only(&self) -> bool {
        self.unset_only
    }

    pub fn subject_mode(&self) -> SubjectMode {
        self.subject_mode
    }

    pub fn extend_field_specs(&mut self, specs: FieldSpecs) -> Result<(), fieldspec::Conflict> {
        self.field_specs.merge(specs)
    }

    /// Applies the namespace to every resource in order, stopping at the first error.
    /// Resources handled before a failure stay modified.
    #[tracing::instrument(skip_all, name = "namespace_transform", fields(namespace = %self.namespace))]
    pub fn apply(&self, resources: &mut ResourceMap) -> Result<(), TransformError> {
        if self.namespace.is_empty() {
            return Ok(());
        }

        let filter = NamespaceFilter {
            namespace: &self.namespace,
            field_specs: &self.field_specs,
            subject_mode: self.subject_mode,
            unset_only: self.unset_only,
        };

        for idx in 0..resources.len() {
            let resource = &mut resources[idx];
            if resource.is_empty() {
                continue;
            }

            match resource.origin() {
                Err(err) => {
                    tracing::warn!(resource = %resource.id(), error = %err, "unable to get origin")
                }
                Ok(Some(origin)) => {
                    tracing::debug!(
                        resource = %resource.id(),
                        configured_by = %origin.configured_by.kind,
                        "found origin"
                    );
                    if origin.configured_by.kind == kind::HelmChartInflationGenerator::VALUE {
                        tracing::info!(
                            resource = %resource.id(),
                            "skipping resource configured by {}",
                            kind::HelmChartInflationGenerator::VALUE
                        );
                        continue;
                    }
                }
                Ok(None) => tracing::debug!(resource = %resource.id(), "no origin found"),
            }

            resource
                .store_previous_id()
                .map_err(|source| TransformError::PreviousId {
                    id: resource.id().clone(),
                    source: source.into(),
                })?;
            resource.apply_filter(&filter)?;

            let id = resource.id().clone();
            let matches = resources.get_matching_by_current_id(|other| other.equivalent(&id));
            if matches.len() != 1 {
                return Err(TransformError::IdConflict {
                    matches: matches.into_iter().map(|r| r.id().clone()).collect(),
                    id,
                });
            }
        }

        Ok(())
    }
}

impl Transformer for NamespaceTransformer {
    fn transform(&mut self, resources: &mut ResourceMap) -> anyhow::Result<()> {
        Ok(self.apply(resources)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fieldspec::Builtin,
        load_resources,
        resource::{Resource, annotation},
    };

    fn transformer(config: &str) -> NamespaceTransformer {
        NamespaceTransformer::from_config(config.as_bytes()).unwrap()
    }

    #[test]
    fn unspecified_subject_mode_defaults() {
        let t = transformer("apiVersion: builtin\nkind: NamespaceTransformer\nmetadata:\n  namespace: prod\n");
        assert_eq!(t.namespace(), "prod");
        assert_eq!(t.subject_mode(), SubjectMode::DefaultOnly);
        assert!(!t.unset_only());

        let t = transformer("metadata:\n  namespace: prod\nsetRoleBindingSubjects: \"\"\n");
        assert_eq!(t.subject_mode(), SubjectMode::DefaultOnly);

        let t = transformer("metadata:\n  namespace: prod\nsetRoleBindingSubjects: allServiceAccounts\n");
        assert_eq!(t.subject_mode(), SubjectMode::AllServiceAccounts);
    }

    #[test]
    fn invalid_subject_mode() {
        let err = NamespaceTransformer::from_config(b"setRoleBindingSubjects: some\n").unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::InvalidSubjectMode(InvalidSubjectMode { value }) if value == "some"
        ));
        assert!(err.to_string().contains("`defaultOnly`, `none` or `allServiceAccounts`"));
    }

    #[test]
    fn malformed_config() {
        let err = NamespaceTransformer::from_config(b"unsetOnly: [1, 2]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { artifact: "NamespaceTransformer", .. }));
        assert_eq!(err.to_string(), "unmarshalling NamespaceTransformer config");

        let err = NamespaceTransformer::from_config(b"kind: LabelTransformer\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn extend_with_builtin_field_specs() -> anyhow::Result<()> {
        let builtin = &Builtin::get().namespace;
        let mut t = transformer(
            "metadata:\n  namespace: prod\nfieldSpecs:\n- path: spec/targetNamespace\n  group: example.com\n  kind: Widget\n  create: true\n- path: metadata/namespace\n  create: true\n",
        );
        t.extend_field_specs(builtin.clone())?;
        // The identical `metadata/namespace` spec is only kept once.
        assert_eq!(t.field_specs().len(), builtin.len() + 1);

        let mut resources = load_resources(
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: old\n---\napiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: w\n",
        )?;
        t.apply(&mut resources)?;
        assert_eq!(resources[0].name(), "prod");
        assert_eq!(resources[1].root()["spec"]["targetNamespace"], "prod");
        Ok(())
    }

    #[test]
    fn builtin_field_specs_conflict_with_config() {
        let mut t = transformer("metadata:\n  namespace: prod\nfieldSpecs:\n- path: metadata/namespace\n");
        let conflict = t
            .extend_field_specs(Builtin::get().namespace.clone())
            .unwrap_err();
        assert!(conflict.conflicts_with.path.is("metadata/namespace"));
        assert!(!conflict.conflicts_with.create);
        assert!(conflict.field_spec.create);
        assert_eq!(t.field_specs().len(), 1);
    }

    #[test]
    fn configure_resets_previous_state() {
        let mut t = transformer(
            "metadata:\n  namespace: prod\nunsetOnly: true\nfieldSpecs:\n- path: spec/ns\n  create: true\n",
        );
        assert_eq!(t.field_specs().len(), 1);

        t.configure(b"metadata:\n  namespace: dev\n").unwrap();
        assert_eq!(t.namespace(), "dev");
        assert!(t.field_specs().is_empty());
        assert!(!t.unset_only());

        assert!(t.configure(b"setRoleBindingSubjects: bogus\n").is_err());
        assert_eq!(t, NamespaceTransformer::default());
    }

    #[test]
    fn empty_namespace_is_a_noop() -> anyhow::Result<()> {
        let t = transformer("metadata:\n  name: noop\n");
        let mut resources = load_resources(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: x\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: b\n",
        )?;
        let before = resources.clone();
        t.apply(&mut resources)?;
        assert_eq!(resources, before);
        Ok(())
    }

    #[test]
    fn empty_resources_are_skipped() -> anyhow::Result<()> {
        let t = transformer("metadata:\n  namespace: prod\n");
        let mut resources = ResourceMap::default();
        resources.insert(Resource::default())?;
        t.apply(&mut resources)?;
        assert!(resources[0].is_empty());
        Ok(())
    }

    #[test]
    fn previous_id_is_recorded() -> anyhow::Result<()> {
        let t = transformer("metadata:\n  namespace: prod\n");
        let mut resources = load_resources(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  namespace: dev\n",
        )?;
        let before = resources[0].id().clone();
        t.apply(&mut resources)?;

        let resource = &resources[0];
        assert_eq!(resource.namespace().map(|ns| ns.as_str()), Some("prod"));
        assert_eq!(resource.previous_ids()?.last(), Some(&before));
        Ok(())
    }

    #[test]
    fn helm_generated_resources_are_skipped() -> anyhow::Result<()> {
        let t = transformer("metadata:\n  namespace: prod\n");
        let mut resources = load_resources(
            r#"
apiVersion: v1
kind: Service
metadata:
  name: chart
  namespace: charts
  annotations:
    config.kubernetes.io/origin: |
      configuredIn: kustomization.yaml
      configuredBy:
        apiVersion: builtin
        kind: HelmChartInflationGenerator
---
apiVersion: v1
kind: Service
metadata:
  name: generated
  annotations:
    config.kubernetes.io/origin: |
      configuredBy:
        kind: ConfigMapGenerator
---
apiVersion: v1
kind: Service
metadata:
  name: broken
  annotations:
    config.kubernetes.io/origin: "configuredBy: ["
"#,
        )?;
        let helm = resources[0].clone();
        t.apply(&mut resources)?;

        assert_eq!(resources[0], helm);
        assert!(!resources[0].annotations().unwrap().has(annotation::PREVIOUS_NAMES));
        assert_eq!(resources[1].namespace().map(|ns| ns.as_str()), Some("prod"));
        // A malformed origin does not prevent the transformation.
        assert_eq!(resources[2].namespace().map(|ns| ns.as_str()), Some("prod"));
        Ok(())
    }

    #[test]
    fn no_subjects_mode_leaves_subjects_alone() -> anyhow::Result<()> {
        let t = transformer("metadata:\n  namespace: prod\nsetRoleBindingSubjects: none\n");
        let mut resources = load_resources(
            r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: binding
  namespace: dev
subjects:
- kind: ServiceAccount
  name: default
"#,
        )?;
        let subjects = resources[0].root()["subjects"].clone();
        t.apply(&mut resources)?;
        assert_eq!(resources[0].namespace().map(|ns| ns.as_str()), Some("prod"));
        assert_eq!(resources[0].root()["subjects"], subjects);
        Ok(())
    }

    #[test]
    fn conflicting_ids_abort() -> anyhow::Result<()> {
        let t = transformer("metadata:\n  namespace: prod\n");
        let mut resources = load_resources(
            r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: app
  namespace: a
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: app
  namespace: b
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: later
"#,
        )?;
        let later = resources[2].clone();

        let err = t.apply(&mut resources).unwrap_err();
        let TransformError::IdConflict { id, matches } = &err else {
            panic!("expected an id conflict, got {err:?}");
        };
        assert_eq!(id.to_string(), "ConfigMap.v1/app.prod");
        assert_eq!(matches.len(), 2);
        assert_eq!(
            err.to_string(),
            "namespace transformation produces ID conflict: [ConfigMap.v1/app.prod, ConfigMap.v1/app.prod]"
        );

        // Nothing after the conflicting resource is touched, earlier ones stay mutated.
        assert_eq!(resources[2], later);
        assert_eq!(resources[0].namespace().map(|ns| ns.as_str()), Some("prod"));
        Ok(())
    }

    #[test]
    fn filter_errors_abort() -> anyhow::Result<()> {
        let t = transformer("metadata:\n  namespace: prod\n");
        let mut resources = load_resources(
            r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: first
---
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: binding
subjects: 3
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: last
"#,
        )?;

        let err = t.apply(&mut resources).unwrap_err();
        let TransformError::Filter(err) = err else {
            panic!("expected a filter error, got {err:?}");
        };
        assert_eq!(err.id.to_string(), "RoleBinding.v1.rbac.authorization.k8s.io/binding");
        assert_eq!(resources[0].namespace().map(|ns| ns.as_str()), Some("prod"));
        assert_eq!(resources[2].namespace(), None);
        Ok(())
    }

    #[test]
    fn transformer_trait_preserves_error() -> anyhow::Result<()> {
        let mut t = transformer("metadata:\n  namespace: prod\n");
        let mut resources = load_resources(
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: s\n---\napiVersion: v1\nkind: Secret\nmetadata:\n  name: s\n  namespace: prod\n",
        )?;
        let err = t.transform(&mut resources).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TransformError>(),
            Some(TransformError::IdConflict { .. })
        ));
        Ok(())
    }
}
