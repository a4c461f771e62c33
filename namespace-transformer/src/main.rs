use std::{
    io::{self, Read as _},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use namespace_transformer::{
    CleanupTransformer, NamespaceTransformer, ResourceMap, Transformer, fieldspec::Builtin,
    load_resources,
};
use tracing_subscriber::EnvFilter;

/// Sets the namespace of Kubernetes resources read as a YAML stream.
#[derive(Parser)]
struct Args {
    /// `NamespaceTransformer` configuration file.
    #[clap(long)]
    config: PathBuf,
    /// Also apply the field specs kustomize uses by default.
    #[clap(long)]
    builtin_field_specs: bool,
    /// Keep the previous id annotations recorded while transforming.
    #[clap(long)]
    keep_internal_annotations: bool,
    /// Resource files, stdin is read if none are given.
    inputs: Vec<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_inputs(inputs: &[PathBuf]) -> anyhow::Result<ResourceMap> {
    if inputs.is_empty() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        return load_resources(&buf).context("loading resources from stdin");
    }

    let mut resources = ResourceMap::default();
    for path in inputs {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let loaded = load_resources(&yaml)
            .with_context(|| format!("loading resources from {}", path.display()))?;
        resources.merge(loaded)?;
    }
    Ok(resources)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = std::fs::read(&args.config)
        .with_context(|| format!("reading config {}", args.config.display()))?;
    let mut transformer = NamespaceTransformer::from_config(&config)?;
    if args.builtin_field_specs {
        transformer
            .extend_field_specs(Builtin::get().namespace.clone())
            .context("merging builtin field specs")?;
    }

    let mut resources = read_inputs(&args.inputs)?;
    tracing::debug!(count = resources.len(), "loaded resources");

    transformer.transform(&mut resources)?;
    if !args.keep_internal_annotations {
        CleanupTransformer::default().transform(&mut resources)?;
    }

    resources.to_writer(&mut io::stdout().lock())
}
