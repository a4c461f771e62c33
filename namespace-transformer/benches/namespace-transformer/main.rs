use std::fmt::Write as _;

use namespace_transformer::{NamespaceTransformer, ResourceMap, fieldspec::Builtin, load_resources};

fn main() {
    divan::main();
}

fn resources(n: usize) -> ResourceMap {
    let mut yaml = String::new();
    for i in 0..n {
        let _ = write!(
            yaml,
            "---\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web-{i}\n  namespace: dev\nspec:\n  replicas: 1\n---\napiVersion: rbac.authorization.k8s.io/v1\nkind: RoleBinding\nmetadata:\n  name: binding-{i}\nsubjects:\n- kind: ServiceAccount\n  name: default\n- kind: User\n  name: user-{i}\n"
        );
    }
    load_resources(&yaml).unwrap()
}

fn transformer() -> NamespaceTransformer {
    let mut transformer =
        NamespaceTransformer::from_config(b"metadata:\n  namespace: prod\n").unwrap();
    transformer
        .extend_field_specs(Builtin::get().namespace.clone())
        .unwrap();
    transformer
}

#[divan::bench(args = [10, 100, 1000])]
fn apply(bencher: divan::Bencher, n: usize) {
    let transformer = transformer();
    bencher
        .with_inputs(|| resources(n))
        .bench_local_refs(|resources| transformer.apply(resources).unwrap());
}

#[divan::bench(args = [10, 100, 1000])]
fn load(bencher: divan::Bencher, n: usize) {
    bencher
        .with_inputs(|| {
            let mut yaml = String::new();
            for i in 0..n {
                let _ = write!(
                    yaml,
                    "---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: config-{i}\ndata:\n  key: value\n"
                );
            }
            yaml
        })
        .bench_local_refs(|yaml| load_resources(yaml).unwrap());
}
