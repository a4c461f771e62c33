use anyhow::bail;
use serde_json::{Value, map::Entry};

use super::{Object, Resource, annotation};

impl Resource {
    pub fn metadata(&self) -> Option<MetadataView<'_>> {
        self.root
            .get("metadata")
            .and_then(|v| v.as_object())
            .map(MetadataView)
    }

    pub fn annotations(&self) -> Option<AnnotationsView<'_>> {
        self.metadata()?.annotations()
    }

    pub fn make_metadata_mut(&mut self) -> MetadataViewMut<'_> {
        let metadata = self
            .root
            .entry("metadata")
            .or_insert_with(|| Value::Object(Object::new()));
        // A resource with non-mapping metadata never gets an id, so this can only replace `null`.
        if !metadata.is_object() {
            *metadata = Value::Object(Object::new());
        }

        match metadata {
            Value::Object(obj) => MetadataViewMut(obj),
            _ => unreachable!(),
        }
    }

    pub fn metadata_mut(&mut self) -> Option<MetadataViewMut<'_>> {
        self.root
            .get_mut("metadata")
            .and_then(|v| v.as_object_mut())
            .map(MetadataViewMut)
    }
}

#[derive(Debug)]
pub struct MetadataView<'a>(&'a Object);

impl<'a> MetadataView<'a> {
    pub fn name(&self) -> Option<&'a str> {
        self.0.get("name").and_then(|v| v.as_str())
    }

    pub fn namespace(&self) -> Option<&'a str> {
        self.0.get("namespace").and_then(|v| v.as_str())
    }

    pub fn annotations(&self) -> Option<AnnotationsView<'a>> {
        self.0
            .get("annotations")
            .and_then(|v| v.as_object())
            .map(AnnotationsView)
    }
}

#[derive(Debug)]
pub struct AnnotationsView<'a>(&'a Object);

impl<'a> AnnotationsView<'a> {
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.0.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

#[derive(Debug)]
pub struct MetadataViewMut<'a>(&'a mut Object);

impl MetadataViewMut<'_> {
    pub fn make_annotations_mut(&mut self) -> anyhow::Result<AnnotationsViewMut<'_>> {
        let annotations = self
            .0
            .entry("annotations")
            .or_insert_with(|| Value::Object(Object::new()));
        if annotations.is_null() {
            *annotations = Value::Object(Object::new());
        }

        match annotations {
            Value::Object(obj) => Ok(AnnotationsViewMut(obj)),
            _ => bail!("expected `metadata.annotations` to be a mapping"),
        }
    }

    pub fn annotations_mut(&mut self) -> Option<AnnotationsViewMut<'_>> {
        self.0
            .get_mut("annotations")
            .and_then(|v| v.as_object_mut())
            .map(AnnotationsViewMut)
    }

    /// Removes bookkeeping annotations added while transforming.
    pub(crate) fn clear_internal_fields(&mut self) {
        let Some(mut annotations) = self.annotations_mut() else {
            return;
        };

        annotations.remove(annotation::PREVIOUS_NAMES);
        annotations.remove(annotation::PREVIOUS_NAMESPACES);
        annotations.remove(annotation::PREVIOUS_KINDS);
        if annotations.is_empty() {
            self.0.remove("annotations");
        }
    }
}

#[derive(Debug)]
pub struct AnnotationsViewMut<'a>(&'a mut Object);

impl AnnotationsViewMut<'_> {
    pub fn insert(&mut self, key: impl Into<String>, value: &str) {
        self.0
            .insert(key.into(), Value::String(value.to_string()));
    }

    /// Appends `value` to a comma-separated annotation, creating it if necessary.
    pub fn append_csv(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match self.0.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(Value::String(value.to_string()));
            }
            Entry::Occupied(entry) => match entry.into_mut() {
                Value::String(existing) => {
                    existing.push(',');
                    existing.push_str(value);
                }
                _ => bail!("expected annotation `{key}` to be a string"),
            },
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        match self.0.remove(key)? {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
