//! Declarative build filters.
//!
//! A filter list is an OR of filter sets; a filter set is an AND of
//! criteria, each an axis name with a list of allowed values.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use testbed_core::attributes::scalar_to_string;
use testbed_core::{Build, EnvSnapshot, Error, Result};

/// Axes that can be constrained through `INPUT_<AXIS>` variables.
pub const ENV_FILTER_AXES: [&str; 9] = [
    "march", "arch", "mode", "compiler", "debug", "platform", "name", "app", "req",
];

/// One conjunctive set of criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet(BTreeMap<String, Vec<String>>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, axis: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(axis, values);
        self
    }

    pub fn insert<I, S>(&mut self, axis: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(axis.into(), values.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if every criterion in the set holds for `build`.
    pub fn matches(&self, build: &Build) -> bool {
        self.0
            .iter()
            .all(|(axis, allowed)| criterion_holds(build, axis, allowed))
    }
}

fn contains(allowed: &[String], value: &str) -> bool {
    allowed.iter().any(|a| a == value)
}

/// A lone empty value marks a feature flag that must be absent.
fn flag_holds(allowed: &[String], enabled: bool) -> bool {
    let must_be_absent = allowed.iter().all(String::is_empty);
    must_be_absent != enabled
}

fn criterion_holds(build: &Build, axis: &str, allowed: &[String]) -> bool {
    let platform = build.platform();
    match axis {
        "arch" => contains(allowed, platform.arch.as_str()),
        "march" => contains(allowed, &platform.march),
        "platform" => allowed.iter().any(|p| p.eq_ignore_ascii_case(&platform.name)),
        "mode" => build
            .mode()
            .is_some_and(|m| allowed.iter().any(|a| a.parse::<u32>() == Ok(m))),
        "debug" => {
            (!build.is_debug() || contains(allowed, "debug"))
                && (!build.is_release() || contains(allowed, "release"))
                && (!build.is_verification() || contains(allowed, "verification"))
        }
        "compiler" => {
            if build.is_clang() {
                contains(allowed, "clang")
            } else {
                contains(allowed, "gcc")
            }
        }
        "mcs" => flag_holds(allowed, build.is_mcs()),
        "smp" => flag_holds(allowed, build.is_smp()),
        "hyp" => flag_holds(allowed, build.is_hyp()),
        "domains" => flag_holds(allowed, build.is_domains()),
        "req" => {
            let reqs = build.requirements();
            allowed.iter().all(|r| reqs.contains(r))
        }
        "name" => contains(allowed, build.name()),
        "app" => build.app.as_deref().is_some_and(|app| contains(allowed, app)),
        other => platform.attribute_set(other).unwrap_or(false),
    }
}

impl<'de> Deserialize<'de> for FilterSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error as _;

        let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
        let mut set = FilterSet::new();
        for (axis, value) in raw {
            let values = match &value {
                serde_yaml::Value::Sequence(items) => items.iter().map(scalar_to_string).collect(),
                scalar => scalar_to_string(scalar).map(|s| vec![s]),
            }
            .ok_or_else(|| D::Error::custom(format!("filter {axis}: values must be scalars")))?;
            set.0.insert(axis, values);
        }
        Ok(set)
    }
}

/// True if `build` matches at least one set. An empty list matches everything.
pub fn matches(build: &Build, sets: &[FilterSet]) -> bool {
    sets.is_empty() || sets.iter().any(|set| set.matches(build))
}

/// The single filter set built from `INPUT_<AXIS>` variables
/// (comma-separated value lists).
pub fn env_filter(env: &EnvSnapshot) -> Result<FilterSet> {
    let mut set = FilterSet::new();

    for axis in ENV_FILTER_AXES {
        let Some(raw) = env.input(axis) else {
            continue;
        };
        let values: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).collect();

        if axis == "mode" {
            for v in &values {
                v.parse::<u32>().map_err(|_| Error::InvalidEnv {
                    var: "INPUT_MODE".to_string(),
                    value: raw.to_string(),
                })?;
            }
        }
        set.insert(axis, values);
    }

    Ok(set)
}
