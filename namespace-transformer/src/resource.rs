mod origin;
mod scope;
mod view;

use std::{fmt, ops::Deref};

use anyhow::{bail, ensure};
use compact_str::format_compact;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    filter::{Filter, FilterError},
    manifest::Str,
};

pub use self::origin::{Origin, OriginError, ResourceRef};
pub use self::view::{AnnotationsView, AnnotationsViewMut, MetadataView, MetadataViewMut};

pub type Object = serde_json::Map<String, Value>;

pub mod annotation {
    pub const ORIGIN: &str = "config.kubernetes.io/origin";
    pub const PREVIOUS_NAMES: &str = "internal.config.kubernetes.io/previousNames";
    pub const PREVIOUS_NAMESPACES: &str = "internal.config.kubernetes.io/previousNamespaces";
    pub const PREVIOUS_KINDS: &str = "internal.config.kubernetes.io/previousKinds";
}

/// Namespace assumed for namespace-scoped resources that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Effective namespace shared by all cluster-scoped resources.
pub const CLUSTER_SCOPED_NAMESPACE: &str = "_non_namespaceable_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Gvk {
    pub group: Str,
    pub version: Str,
    pub kind: Str,
}

impl Gvk {
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = api_version
            .split_once('/')
            .map_or(("", api_version), |(g, v)| (g, v));
        Gvk {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    pub fn api_version(&self) -> Str {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format_compact!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}.{}", self.kind, self.version)
        } else {
            write!(f, "{}.{}.{}", self.kind, self.version, self.group)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct GvkMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Str>,
}

impl fmt::Display for GvkMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = &self.kind {
            write!(f, "{kind}.")?;
        }

        if let Some(version) = &self.version {
            write!(f, "{version}.")?;
        }

        if let Some(group) = &self.group {
            write!(f, "{group}")
        } else {
            write!(f, "*")
        }
    }
}

impl GvkMatcher {
    pub fn matches(&self, gvk: &Gvk) -> bool {
        (self.group.is_none() || self.group.as_ref() == Some(&gvk.group))
            && (self.version.is_none() || self.version.as_ref() == Some(&gvk.version))
            && (self.kind.is_none() || self.kind.as_ref() == Some(&gvk.kind))
    }

    pub fn overlaps_with(&self, other: &GvkMatcher) -> bool {
        (self.group.is_none() || other.group.is_none() || self.group == other.group)
            && (self.version.is_none() || other.version.is_none() || self.version == other.version)
            && (self.kind.is_none() || other.kind.is_none() || self.kind == other.kind)
    }
}

#[derive(Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResId {
    #[serde(flatten)]
    pub gvk: Gvk,
    pub name: Str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Str>,
}

impl Deref for ResId {
    type Target = Gvk;

    fn deref(&self) -> &Self::Target {
        &self.gvk
    }
}

impl fmt::Debug for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(f, "{}/{}.{namespace}", self.gvk, self.name)?;
        } else {
            write!(f, "{}/{}", self.gvk, self.name)?;
        }
        Ok(())
    }
}

impl ResId {
    fn from_root(root: &Object) -> anyhow::Result<Self> {
        let gvk = Gvk::from_api_version(
            string_field(root, "apiVersion")?,
            string_field(root, "kind")?,
        );

        let (name, namespace) = match root.get("metadata") {
            None | Some(Value::Null) => ("", ""),
            Some(Value::Object(metadata)) => (
                string_field(metadata, "name")?,
                string_field(metadata, "namespace")?,
            ),
            Some(_) => bail!("expected `metadata` to be a mapping"),
        };

        Ok(ResId {
            gvk,
            name: name.into(),
            namespace: (!namespace.is_empty()).then(|| namespace.into()),
        })
    }

    /// The namespace used when comparing ids.
    /// Cluster-scoped resources all share one namespace, and an unset namespace means `default`.
    pub fn effective_namespace(&self) -> &str {
        if self.is_cluster_scoped() {
            return CLUSTER_SCOPED_NAMESPACE;
        }

        match self.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => namespace,
            _ => DEFAULT_NAMESPACE,
        }
    }

    /// Whether two ids refer to the same resource, comparing effective namespaces.
    pub fn equivalent(&self, other: &ResId) -> bool {
        self.gvk == other.gvk
            && self.name == other.name
            && self.effective_namespace() == other.effective_namespace()
    }
}

fn string_field<'a>(obj: &'a Object, key: &str) -> anyhow::Result<&'a str> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(""),
        Some(Value::String(s)) => Ok(s),
        Some(_) => bail!("expected `{key}` to be a string"),
    }
}

/// A single structured document along with the identity derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resource {
    id: ResId,
    root: Object,
}

impl Resource {
    pub fn new(root: Object) -> anyhow::Result<Self> {
        let id = ResId::from_root(&root)?;
        Ok(Resource { id, root })
    }

    pub fn id(&self) -> &ResId {
        &self.id
    }

    pub fn name(&self) -> &Str {
        &self.id.name
    }

    pub fn namespace(&self) -> Option<&Str> {
        self.id.namespace.as_ref()
    }

    pub fn gvk(&self) -> &Gvk {
        &self.id.gvk
    }

    pub fn root(&self) -> &Object {
        &self.root
    }

    /// Raw access to the document. The id is not re-derived afterwards, use
    /// [`Resource::apply_filter`] for changes that may affect identity.
    pub fn root_mut(&mut self) -> &mut Object {
        &mut self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Runs `filter` over the document and re-derives the id from the result.
    pub fn apply_filter<F: Filter>(&mut self, filter: &F) -> Result<(), FilterError> {
        let wrap = |id: &ResId, source: anyhow::Error| FilterError {
            filter: F::NAME,
            id: id.clone(),
            source: source.into(),
        };

        filter
            .filter(self)
            .map_err(|source| wrap(&self.id, source))?;
        self.id = ResId::from_root(&self.root).map_err(|source| wrap(&self.id, source))?;
        Ok(())
    }

    /// Appends the current id to the previous-id annotations.
    /// The namespace is recorded as the effective namespace, as kustomize does.
    pub fn store_previous_id(&mut self) -> anyhow::Result<()> {
        let id = self.id.clone();
        let mut metadata = self.make_metadata_mut();
        let mut annotations = metadata.make_annotations_mut()?;
        annotations.append_csv(annotation::PREVIOUS_NAMES, &id.name)?;
        annotations.append_csv(annotation::PREVIOUS_NAMESPACES, id.effective_namespace())?;
        annotations.append_csv(annotation::PREVIOUS_KINDS, &id.kind)?;
        Ok(())
    }

    /// Ids recorded by [`Resource::store_previous_id`], oldest first.
    pub fn previous_ids(&self) -> anyhow::Result<Vec<ResId>> {
        let Some(annotations) = self.annotations() else {
            return Ok(vec![]);
        };

        let (Some(names), Some(namespaces), Some(kinds)) = (
            annotations.get(annotation::PREVIOUS_NAMES),
            annotations.get(annotation::PREVIOUS_NAMESPACES),
            annotations.get(annotation::PREVIOUS_KINDS),
        ) else {
            return Ok(vec![]);
        };

        let names = names.split(',').collect::<Vec<_>>();
        let namespaces = namespaces.split(',').collect::<Vec<_>>();
        let kinds = kinds.split(',').collect::<Vec<_>>();
        ensure!(
            names.len() == namespaces.len() && names.len() == kinds.len(),
            "previous id annotations of `{}` have mismatched lengths",
            self.id
        );

        Ok(names
            .into_iter()
            .zip(namespaces)
            .zip(kinds)
            .map(|((name, namespace), kind)| ResId {
                gvk: Gvk {
                    group: self.id.group.clone(),
                    version: self.id.version.clone(),
                    kind: kind.into(),
                },
                name: name.into(),
                namespace: (!namespace.is_empty() && namespace != CLUSTER_SCOPED_NAMESPACE)
                    .then(|| namespace.into()),
            })
            .collect())
    }
}

impl Serialize for Resource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        self.root.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        // Empty documents deserialize to `null`.
        let root = Option::<Object>::deserialize(deserializer)
            .map_err(|err| serde::de::Error::custom(format!("parsing resource: {err}")))?
            .unwrap_or_default();

        Resource::new(root).map_err(serde::de::Error::custom)
    }
}
