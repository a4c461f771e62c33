pub mod fieldspec;
pub mod filter;
pub mod manifest;
pub mod resmap;
pub mod resource;
pub mod transform;

use anyhow::Context as _;
use serde::Deserialize;

pub use self::resmap::ResourceMap;
pub use self::resource::{ResId, Resource};
pub use self::transform::{CleanupTransformer, NamespaceTransformer, Transformer};

/// Parses a multi-document YAML stream into a `ResourceMap`, keeping document order.
/// Empty documents between separators are kept as empty resources.
pub fn load_resources(yaml: &str) -> anyhow::Result<ResourceMap> {
    let mut resources = ResourceMap::default();
    let mut documents = serde_yaml::Deserializer::from_str(yaml).enumerate().peekable();
    while let Some((i, document)) = documents.next() {
        let resource = Option::<Resource>::deserialize(document)
            .with_context(|| format!("parsing document {i}"))?;
        let resource = match resource {
            Some(resource) => resource,
            // Empty input or a trailing `---` yields a null document that was never written.
            None if documents.peek().is_none() => break,
            None => Resource::default(),
        };
        resources.insert(resource)?;
    }

    Ok(resources)
}

/// Configures a `NamespaceTransformer` from `config` and applies it to the resources in `input`.
pub fn transform(config: &[u8], input: &str) -> anyhow::Result<ResourceMap> {
    let transformer = NamespaceTransformer::from_config(config)?;
    let mut resources = load_resources(input)?;
    transformer.apply(&mut resources)?;
    Ok(resources)
}
