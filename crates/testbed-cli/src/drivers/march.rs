//! Micro-architecture lookup for CI job setup.

use crate::output::gh_output;
use testbed_core::{Catalog, EnvSnapshot, Result};

/// Publish `march=<value>` for `platform`. Returns the exit code: 1 for an
/// unknown platform.
pub fn run(catalog: &Catalog, env: &EnvSnapshot, platform: &str) -> Result<u8> {
    match catalog.get_case_insensitive(platform) {
        Some(plat) => {
            gh_output(env, &format!("march={}", plat.march))?;
            Ok(0)
        }
        None => {
            println!("Unknown platform: '{platform}'");
            Ok(1)
        }
    }
}
