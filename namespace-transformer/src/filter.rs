mod namespace;

pub use self::namespace::{InvalidSubjectMode, NamespaceFilter, SubjectMode};

use crate::resource::{ResId, Resource};

/// An in-place mutation of a single resource.
pub trait Filter {
    /// Used to name the filter in errors.
    const NAME: &'static str;

    fn filter(&self, resource: &mut Resource) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
#[error("applying {filter} filter to resource `{id}`")]
pub struct FilterError {
    pub filter: &'static str,
    pub id: ResId,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}
