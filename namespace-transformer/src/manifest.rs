use core::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

pub type Str = CompactString;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta<V, K> {
    pub api_version: Option<V>,
    pub kind: Option<K>,
}

impl<V, K> Default for TypeMeta<V, K>
where
    V: Default,
    K: Default,
{
    fn default() -> Self {
        Self {
            api_version: Some(V::default()),
            kind: Some(K::default()),
        }
    }
}

pub mod kind {
    use super::define_symbol;

    define_symbol!(NamespaceTransformer = "NamespaceTransformer");
    define_symbol!(HelmChartInflationGenerator = "HelmChartInflationGenerator");
    define_symbol!(ServiceAccount = "ServiceAccount");
    define_symbol!(Namespace = "Namespace");
    define_symbol!(RoleBinding = "RoleBinding");
    define_symbol!(ClusterRoleBinding = "ClusterRoleBinding");
}

pub mod apiversion {
    use super::define_symbol;

    define_symbol!(Builtin = "builtin");
    define_symbol!(V1 = "v1");
}

macro_rules! define_symbol {
    ($name:ident = $value:literal) => {
        #[derive(Clone, PartialEq, Eq, Hash, Default)]
        #[allow(non_camel_case_types)]
        pub struct $name;

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", $value)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", $value)
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str($value)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value: $crate::manifest::Str = ::serde::Deserialize::deserialize(deserializer)?;
                if value == $value {
                    Ok($name)
                } else {
                    Err(serde::de::Error::custom(format!(
                        "expected `{}`, found `{value}`",
                        $value
                    )))
                }
            }
        }

        impl $crate::manifest::Symbol for $name {
            const VALUE: &'static str = $value;
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                other == $value
            }
        }
    };
}

use define_symbol;

pub trait Symbol: fmt::Debug + Send + Sync {
    const VALUE: &'static str;
}

#[cfg(test)]
mod tests {
    use super::{Symbol, TypeMeta, apiversion, kind};

    #[test]
    fn symbols_round_trip_through_yaml() {
        let meta: TypeMeta<apiversion::Builtin, kind::NamespaceTransformer> =
            serde_yaml::from_str("apiVersion: builtin\nkind: NamespaceTransformer\n").unwrap();
        assert_eq!(meta, TypeMeta::default());
        assert_eq!(kind::HelmChartInflationGenerator::VALUE, "HelmChartInflationGenerator");
    }

    #[test]
    fn symbol_rejects_other_values() {
        let err = serde_yaml::from_str::<kind::NamespaceTransformer>("LabelTransformer")
            .unwrap_err()
            .to_string();
        assert!(err.contains("expected `NamespaceTransformer`, found `LabelTransformer`"));
    }
}
