use crate::resmap::ResourceMap;

use super::Transformer;

/// Strips bookkeeping annotations before resources are emitted.
#[derive(Default)]
pub struct CleanupTransformer(());

impl Transformer for CleanupTransformer {
    #[tracing::instrument(skip_all)]
    fn transform(&mut self, resources: &mut ResourceMap) -> anyhow::Result<()> {
        for resource in resources.iter_mut() {
            if let Some(mut metadata) = resource.metadata_mut() {
                metadata.clear_internal_fields();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[test]
fn cleanup_removes_previous_ids() -> anyhow::Result<()> {
    let mut resources = crate::load_resources(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: b\n",
    )?;
    let original = resources.clone();
    for resource in resources.iter_mut() {
        resource.store_previous_id()?;
    }

    CleanupTransformer::default().transform(&mut resources)?;
    assert_eq!(resources, original);
    Ok(())
}
