use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

datatest_stable::harness! {
    { test = test, root = "tests/namespace-transformer/testdata", pattern = r"config\.yaml$" },
}

fn test(path: &Path) -> datatest_stable::Result<()> {
    let dir = path.parent().context("config has no parent directory")?;
    let config = std::fs::read(path).context("reading config")?;
    let input = std::fs::read_to_string(dir.join("input.yaml")).context("reading input")?;

    match namespace_transformer::transform(&config, &input) {
        Ok(resources) => {
            let mut out = vec![];
            resources.to_writer(&mut out)?;
            let actual = String::from_utf8(out)?;
            snapshot(&dir.join("expected.yaml"), &actual, documents_eq)?;
        }
        Err(err) => {
            eprintln!("Error transforming {}: {err:#}", dir.display());
            snapshot(&dir.join("expected.stderr"), &format!("{err:#}\n"), |expected, actual| {
                expected.trim() == actual.trim()
            })?;
        }
    }
    Ok(())
}

/// Compares YAML streams document by document, ignoring formatting.
fn documents_eq(expected: &str, actual: &str) -> bool {
    fn parse(yaml: &str) -> Option<Vec<Value>> {
        serde_yaml::Deserializer::from_str(yaml)
            .map(Value::deserialize)
            .collect::<Result<_, _>>()
            .ok()
    }

    match (parse(expected), parse(actual)) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

fn snapshot(
    path: &Path,
    actual: &str,
    eq: impl Fn(&str, &str) -> bool,
) -> datatest_stable::Result<()> {
    if !path.exists() || std::env::var("UPDATE_SNAPSHOTS").is_ok() {
        std::fs::write(path, actual).context("writing snapshot")?;
        return Ok(());
    }

    let expected = std::fs::read_to_string(path).context("reading snapshot")?;
    if eq(&expected, actual) {
        return Ok(());
    }

    let formatted = format_chunks(dissimilar::diff(&expected, actual));
    eprintln!("Snapshot mismatch for {}:\n{}", path.display(), formatted);

    Err(format!("Snapshot mismatch for {}", path.display()).into())
}

fn format_chunks(chunks: Vec<dissimilar::Chunk>) -> String {
    let mut buf = String::new();
    for chunk in chunks {
        let formatted = match chunk {
            dissimilar::Chunk::Equal(text) => text.into(),
            dissimilar::Chunk::Delete(text) => format!("\x1b[4m\x1b[31m{text}\x1b[0m"),
            dissimilar::Chunk::Insert(text) => format!("\x1b[4m\x1b[32m{text}\x1b[0m"),
        };
        buf.push_str(&formatted);
    }
    buf
}
