mod cleanup;
mod namespace;

pub use self::cleanup::CleanupTransformer;
pub use self::namespace::{ConfigError, NamespaceTransformer, TransformError};

use crate::resmap::ResourceMap;

pub trait Transformer {
    fn transform(&mut self, resources: &mut ResourceMap) -> anyhow::Result<()>;
}
