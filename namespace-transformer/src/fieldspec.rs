mod builtin;

use core::fmt;
use std::{ops::Deref, str::FromStr};

pub use self::builtin::Builtin;

use crate::{
    manifest::Str,
    resource::{GvkMatcher, Object, Resource},
};
use anyhow::{Context as _, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// See kustomize/api/konfig/builtinpluginconsts

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(flatten)]
    pub matcher: GvkMatcher,
    pub path: FieldPath,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    /// The `create` field indicates whether the field should be created if it does not exist.
    pub create: bool,
}

impl FieldSpec {
    pub fn new(matcher: GvkMatcher, path: FieldPath, create: bool) -> Self {
        Self {
            matcher,
            path,
            create,
        }
    }

    /// Whether both specs can select the same field of the same resource.
    pub fn overlaps_with(&self, other: &FieldSpec) -> bool {
        self.matcher.overlaps_with(&other.matcher) && self.path == other.path
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Box<[FieldPathSegment]>,
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#""{self}""#)
    }
}

impl AsRef<[FieldPathSegment]> for FieldPath {
    fn as_ref(&self) -> &[FieldPathSegment] {
        &self.segments
    }
}

impl Deref for FieldPath {
    type Target = [FieldPathSegment];

    fn deref(&self) -> &Self::Target {
        &self.segments
    }
}

pub type PathRef<'a> = &'a [FieldPathSegment];

impl FieldPath {
    /// Whether this path is exactly `path`, e.g. `metadata/namespace`.
    pub fn is(&self, path: &str) -> bool {
        self.segments.len() == path.split('/').count()
            && self
                .segments
                .iter()
                .zip(path.split('/'))
                .all(|(segment, s)| segment.to_string() == s)
    }

    /// The field name the path starts with, ignoring any `[]` suffix.
    pub fn root_field(&self) -> Option<&str> {
        self.segments.first().and_then(FieldPathSegment::field)
    }
}

impl FromStr for FieldPath {
    type Err = anyhow::Error;

    // TODO Need to handle escaping of '/' by '\'
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            bail!("path cannot be empty");
        }

        let segments = s
            .split('/')
            .map(|segment| segment.parse::<FieldPathSegment>())
            .collect::<Result<Box<_>, _>>()
            .with_context(|| format!("invalid field path `{s}`"))?;

        Ok(FieldPath { segments })
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let path: Str = Deserialize::deserialize(deserializer)?;
        path.parse().map_err(|err| serde::de::Error::custom(format!("{err:#}")))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.segments
                .iter()
                .map(|segment| segment.to_string())
                .collect::<Vec<_>>()
                .join("/")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPathSegment {
    Field(Str),
    /// `field[]`, every element of the sequence at `field`.
    Array(Str),
    /// `*`, every value of a mapping or every element of a sequence.
    Wildcard,
}

impl FieldPathSegment {
    pub fn field(&self) -> Option<&str> {
        match self {
            FieldPathSegment::Field(field) | FieldPathSegment::Array(field) => Some(field),
            FieldPathSegment::Wildcard => None,
        }
    }
}

impl fmt::Display for FieldPathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPathSegment::Field(field) => write!(f, "{field}"),
            FieldPathSegment::Array(field) => write!(f, "{field}[]"),
            FieldPathSegment::Wildcard => write!(f, "*"),
        }
    }
}

impl FromStr for FieldPathSegment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => bail!("path segments cannot be empty"),
            "*" => Ok(FieldPathSegment::Wildcard),
            _ => match s.strip_suffix("[]") {
                Some("") => bail!("missing field name before `[]`"),
                Some(field) => Ok(FieldPathSegment::Array(field.into())),
                None => Ok(FieldPathSegment::Field(s.into())),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSpecs {
    specs: Vec<FieldSpec>,
}

impl Deref for FieldSpecs {
    type Target = [FieldSpec];

    fn deref(&self) -> &Self::Target {
        &self.specs
    }
}

#[derive(Debug)]
pub struct Conflict {
    pub conflicts_with: Box<FieldSpec>,
    pub field_spec: Box<FieldSpec>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot add field spec `{}` `{}` because it conflicts with existing field spec `{}` `{}`",
            self.field_spec.matcher,
            self.field_spec.path,
            self.conflicts_with.matcher,
            self.conflicts_with.path
        )
    }
}

impl std::error::Error for Conflict {}

impl FieldSpecs {
    pub fn merge(&mut self, other: FieldSpecs) -> Result<(), Conflict> {
        for spec in other.specs {
            self.add(spec)?;
        }

        Ok(())
    }

    /// Adds `spec` unless an identical spec is already present. A spec selecting the same
    /// field as an existing one but disagreeing on `create` is a conflict.
    pub fn add(&mut self, spec: FieldSpec) -> Result<(), Conflict> {
        if self.specs.contains(&spec) {
            return Ok(());
        }

        if let Some(conflicts_with) = self
            .specs
            .iter()
            .find(|s| s.overlaps_with(&spec) && s.create != spec.create)
        {
            return Err(Conflict {
                conflicts_with: Box::new(conflicts_with.clone()),
                field_spec: Box::new(spec),
            });
        }

        self.specs.push(spec);
        Ok(())
    }
}

impl FieldSpec {
    /// Calls `f` on every field of `resource` selected by this spec.
    /// Missing fields are skipped, or created with `T::default()` when `create` is set.
    pub fn apply<T>(
        &self,
        resource: &mut Resource,
        f: &mut impl FnMut(&mut T) -> anyhow::Result<()>,
    ) -> anyhow::Result<()>
    where
        T: JsonValue,
    {
        if !self.matcher.matches(resource.gvk()) {
            return Ok(());
        }

        fn go<T>(
            curr: &mut Value,
            path: PathRef<'_>,
            f: &mut impl FnMut(&mut T) -> anyhow::Result<()>,
            create: bool,
        ) -> anyhow::Result<()>
        where
            T: JsonValue,
        {
            let Some((segment, rest)) = path.split_first() else {
                return f(T::try_as_mut(curr)?);
            };

            if curr.is_null() {
                if !create {
                    return Ok(());
                }
                *curr = Value::Object(Object::new());
            }

            match segment {
                FieldPathSegment::Field(field) => {
                    let obj = curr
                        .as_object_mut()
                        .ok_or_else(|| anyhow::anyhow!("expected a mapping at `{field}`"))?;

                    if !obj.contains_key(field.as_str()) {
                        if !create {
                            return Ok(());
                        }

                        let value = if rest.is_empty() {
                            T::default().into_value()
                        } else {
                            Value::Object(Object::new())
                        };
                        obj.insert(field.to_string(), value);
                    }

                    match obj.get_mut(field.as_str()) {
                        Some(next) => go(next, rest, f, create),
                        None => Ok(()),
                    }
                }
                FieldPathSegment::Array(field) => {
                    let obj = curr
                        .as_object_mut()
                        .ok_or_else(|| anyhow::anyhow!("expected a mapping at `{field}[]`"))?;

                    match obj.get_mut(field.as_str()) {
                        None | Some(Value::Null) => Ok(()),
                        Some(Value::Array(seq)) => {
                            for item in seq {
                                go(item, rest, f, create)?;
                            }
                            Ok(())
                        }
                        Some(_) => bail!(
                            "expected a sequence at `{field}` but found a value of different type"
                        ),
                    }
                }
                FieldPathSegment::Wildcard => match curr {
                    Value::Object(obj) => {
                        for value in obj.values_mut() {
                            go(value, rest, f, create)?;
                        }
                        Ok(())
                    }
                    Value::Array(seq) => {
                        for item in seq {
                            go(item, rest, f, create)?;
                        }
                        Ok(())
                    }
                    _ => bail!("expected a mapping or sequence at `*`"),
                },
            }
        }

        let id = resource.id().clone();
        let mut root = Value::Object(std::mem::take(resource.root_mut()));
        let result = go(&mut root, &self.path, f, self.create);
        if let Value::Object(obj) = root {
            *resource.root_mut() = obj;
        }

        result.with_context(|| {
            format!(
                "applying field spec `{}` `{}` to resource {id}",
                self.matcher, self.path,
            )
        })
    }
}

pub trait JsonValue: Default {
    fn try_as_mut(value: &mut Value) -> anyhow::Result<&mut Self>;

    fn into_value(self) -> Value
    where
        Self: Sized;
}

impl JsonValue for Value {
    fn try_as_mut(value: &mut Value) -> anyhow::Result<&mut Self> {
        Ok(value)
    }

    fn into_value(self) -> Value {
        self
    }
}

impl JsonValue for Object {
    fn try_as_mut(value: &mut Value) -> anyhow::Result<&mut Self> {
        match value {
            Value::Object(obj) => Ok(obj),
            _ => bail!("expected an object but found a different type"),
        }
    }

    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl JsonValue for String {
    fn try_as_mut(value: &mut Value) -> anyhow::Result<&mut Self> {
        match value {
            Value::String(s) => Ok(s),
            _ => bail!("expected a string but found a different type"),
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}
