//! CI step outputs.

use serde::Serialize;
use std::io::Write;
use testbed_core::{EnvSnapshot, Result};
use tracing::debug;

/// Publish `name=value` as a step output: appended to the file named by
/// `GITHUB_OUTPUT`, or printed when not running under CI.
pub fn gh_output(env: &EnvSnapshot, assignment: &str) -> Result<()> {
    match env.get("GITHUB_OUTPUT") {
        Some(path) => {
            debug!(path, assignment, "Writing step output");
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            writeln!(file, "{assignment}")?;
        }
        None => println!("{assignment}"),
    }
    Ok(())
}

#[derive(Serialize)]
struct Matrix<'a, T> {
    include: &'a [T],
}

/// Assignment of a CI job matrix: `name={"include": [...]}`.
pub fn matrix_assignment<T: Serialize>(name: &str, entries: &[T]) -> Result<String> {
    let json = serde_json::to_string(&Matrix { include: entries })?;
    Ok(format!("{name}={json}"))
}
