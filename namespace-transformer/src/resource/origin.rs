use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manifest::Str;

use super::{Resource, annotation};

/// Where a resource came from, as recorded in its `config.kubernetes.io/origin` annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    #[serde(default, skip_serializing_if = "Str::is_empty")]
    pub path: Str,
    #[serde(default, skip_serializing_if = "Str::is_empty")]
    pub repo: Str,
    #[serde(default, rename = "ref", skip_serializing_if = "Str::is_empty")]
    pub reference: Str,
    #[serde(default, skip_serializing_if = "Str::is_empty")]
    pub configured_in: Str,
    /// The generator or transformer that produced the resource.
    #[serde(default)]
    pub configured_by: ResourceRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    #[serde(default, skip_serializing_if = "Str::is_empty")]
    pub api_version: Str,
    #[serde(default, skip_serializing_if = "Str::is_empty")]
    pub kind: Str,
    #[serde(default, skip_serializing_if = "Str::is_empty")]
    pub name: Str,
    #[serde(default, skip_serializing_if = "Str::is_empty")]
    pub namespace: Str,
}

#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("`config.kubernetes.io/origin` annotation is not a string")]
    NotAString,
    #[error("parsing `config.kubernetes.io/origin` annotation")]
    Parse(#[source] serde_yaml::Error),
}

impl Resource {
    /// `Ok(None)` when no origin was recorded.
    pub fn origin(&self) -> Result<Option<Origin>, OriginError> {
        let Some(annotations) = self.annotations() else {
            return Ok(None);
        };

        match annotations.raw(annotation::ORIGIN) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(yaml)) => serde_yaml::from_str(yaml)
                .map(Some)
                .map_err(OriginError::Parse),
            Some(_) => Err(OriginError::NotAString),
        }
    }
}
