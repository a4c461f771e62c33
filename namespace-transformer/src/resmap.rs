use core::fmt;
use std::{
    io,
    ops::{Index, IndexMut},
};

use crate::resource::{ResId, Resource};

/// An ordered collection of resources.
///
/// Resources are kept in insertion order rather than keyed by id as ids change while transforming.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResourceMap {
    resources: Vec<Resource>,
}

impl fmt::Debug for ResourceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.resources.iter().map(Resource::id)).finish()
    }
}

impl ResourceMap {
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Appends `resource`, rejecting it if an equivalent id is already present.
    /// Empty documents carry no identity and are always accepted.
    pub fn insert(&mut self, resource: Resource) -> Result<(), Conflict> {
        if !resource.is_empty()
            && self
                .resources
                .iter()
                .any(|r| !r.is_empty() && r.id().equivalent(resource.id()))
        {
            return Err(Conflict {
                resource: Box::new(resource),
            });
        }

        self.resources.push(resource);
        Ok(())
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Resource> + DoubleEndedIterator {
        self.resources.iter()
    }

    pub fn iter_mut(
        &mut self,
    ) -> impl ExactSizeIterator<Item = &mut Resource> + DoubleEndedIterator {
        self.resources.iter_mut()
    }

    /// In-place merge of two `ResourceMap`s, any conflicting resources will be an error
    pub fn merge(&mut self, other: ResourceMap) -> Result<(), Conflict> {
        for resource in other.resources {
            self.insert(resource)?;
        }
        Ok(())
    }

    /// Every non-empty resource whose current id satisfies `matches`, in order.
    pub fn get_matching_by_current_id(&self, mut matches: impl FnMut(&ResId) -> bool) -> Vec<&Resource> {
        self.resources
            .iter()
            .filter(|r| !r.is_empty() && matches(r.id()))
            .collect()
    }

    /// Writes the resources as a YAML stream.
    pub fn to_writer(&self, writer: &mut dyn io::Write) -> anyhow::Result<()> {
        for resource in self.iter() {
            if self.len() > 1 {
                writeln!(writer, "---")?;
            }
            serde_yaml::to_writer(&mut *writer, resource)?;
        }

        Ok(())
    }
}

impl Index<usize> for ResourceMap {
    type Output = Resource;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.resources[idx]
    }
}

impl IndexMut<usize> for ResourceMap {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.resources[idx]
    }
}

impl<'a> IntoIterator for &'a ResourceMap {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub resource: Box<Resource>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "may not add resource with an already registered id `{}`",
            self.resource.id()
        )
    }
}

impl std::error::Error for Conflict {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_resources;

    #[test]
    fn equivalent_ids_conflict() -> anyhow::Result<()> {
        let mut resources =
            load_resources("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: app\n")?;
        let other = load_resources(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: app\n  namespace: default\n",
        )?;

        let conflict = resources.merge(other).unwrap_err();
        assert_eq!(
            conflict.to_string(),
            "may not add resource with an already registered id `ConfigMap.v1/app.default`"
        );
        assert_eq!(resources.len(), 1);
        Ok(())
    }

    #[test]
    fn empty_documents_never_conflict() -> anyhow::Result<()> {
        let mut resources = ResourceMap::default();
        resources.insert(Resource::default())?;
        resources.insert(Resource::default())?;
        assert_eq!(resources.len(), 2);
        assert!(resources.get_matching_by_current_id(|_| true).is_empty());
        Ok(())
    }

    #[test]
    fn matching_by_current_id() -> anyhow::Result<()> {
        let resources = load_resources(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: Secret\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: b\n",
        )?;
        let matches = resources.get_matching_by_current_id(|id| id.kind == "ConfigMap");
        let names = matches.iter().map(|r| r.name().as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["a", "b"]);
        Ok(())
    }

    #[test]
    fn writes_yaml_stream() -> anyhow::Result<()> {
        let resources = load_resources(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: b\n",
        )?;
        let mut out = vec![];
        resources.to_writer(&mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: b\n"
        );

        let single = load_resources("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n")?;
        let mut out = vec![];
        single.to_writer(&mut out)?;
        assert_eq!(String::from_utf8(out)?, "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n");
        Ok(())
    }
}
