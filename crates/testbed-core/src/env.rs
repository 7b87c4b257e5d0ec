//! Snapshot of the CI environment variables the farm reads.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Environment variables captured once at start-up.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `var`, treating an empty value as unset.
    pub fn get(&self, var: &str) -> Option<&str> {
        self.vars
            .get(var)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, var: &str) -> Result<&str> {
        self.get(var)
            .ok_or_else(|| Error::MissingEnv(var.to_string()))
    }

    /// Action input `INPUT_<NAME>`.
    pub fn input(&self, name: &str) -> Option<&str> {
        self.get(&format!("INPUT_{}", name.to_uppercase()))
    }

    /// `INPUT_INDEX` without its one-character prefix (e.g. `$03` gives
    /// `03`), as written. Unset means `0`.
    pub fn shard_label(&self) -> &str {
        self.input("index")
            .map_or("0", |raw| raw.get(1..).unwrap_or_default())
    }

    /// Job shard index parsed from [`shard_label`](Self::shard_label).
    pub fn shard_index(&self) -> Result<usize> {
        self.shard_label().parse().map_err(|_| Error::InvalidEnv {
            var: "INPUT_INDEX".to_string(),
            value: self.input("index").unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_index_strips_prefix() {
        let env = EnvSnapshot::from_pairs([("INPUT_INDEX", "$7")]);
        assert_eq!(env.shard_index().unwrap(), 7);
    }

    #[test]
    fn test_shard_label_keeps_leading_zeros() {
        let env = EnvSnapshot::from_pairs([("INPUT_INDEX", "$07")]);
        assert_eq!(env.shard_label(), "07");
        assert_eq!(env.shard_index().unwrap(), 7);
        assert_eq!(EnvSnapshot::default().shard_label(), "0");
    }

    #[test]
    fn test_shard_index_defaults_to_zero() {
        assert_eq!(EnvSnapshot::default().shard_index().unwrap(), 0);
    }

    #[test]
    fn test_shard_index_rejects_garbage() {
        let env = EnvSnapshot::from_pairs([("INPUT_INDEX", "$x")]);
        assert!(matches!(env.shard_index(), Err(Error::InvalidEnv { .. })));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let env = EnvSnapshot::from_pairs([("INPUT_PLATFORM", "")]);
        assert_eq!(env.input("platform"), None);
        assert!(env.require("INPUT_PLATFORM").is_err());
    }
}
