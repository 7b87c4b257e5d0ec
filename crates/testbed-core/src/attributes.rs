//! Typed build attributes as written in a build matrix document.
//!
//! Every key a build entry (or the `default` section) may carry is a named
//! field here. Unknown keys are rejected at parse time so a misspelt key
//! cannot silently turn into a no-op.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Machine requirement: a single tag or a list of tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    One(String),
    Many(Vec<String>),
}

impl Requirement {
    /// Requirement tags; an empty tag or list means no hardware is needed.
    pub fn tags(&self) -> Vec<String> {
        match self {
            Requirement::One(tag) if tag.is_empty() => vec![],
            Requirement::One(tag) => vec![tag.clone()],
            Requirement::Many(tags) => tags.clone(),
        }
    }

    pub fn is_sim(&self) -> bool {
        matches!(self, Requirement::One(tag) if tag == "sim")
    }
}

impl From<&str> for Requirement {
    fn from(tag: &str) -> Self {
        Requirement::One(tag.to_string())
    }
}

/// Attributes of a build entry before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildAttributes {
    pub platform: Option<String>,
    pub mode: Option<u32>,
    pub app: Option<String>,
    pub req: Option<Requirement>,
    /// Console marker of a passing run.
    pub success: Option<String>,
    /// Console marker of a failing run.
    pub error: Option<String>,
    #[serde(default, deserialize_with = "scalar_map")]
    pub settings: BTreeMap<String, String>,
    /// Hardware run timeout in seconds.
    pub timeout: Option<u64>,
    pub no_hw_test: Option<bool>,
    pub image_base_name: Option<String>,
    pub vm_platform: Option<String>,
    pub l4v_arch: Option<String>,
}

impl BuildAttributes {
    /// Lay `entry` over `self`: every field set in `entry` wins, settings are
    /// merged key by key with entry keys winning.
    pub fn overlay(&self, entry: &BuildAttributes) -> BuildAttributes {
        let mut settings = self.settings.clone();
        settings.extend(entry.settings.iter().map(|(k, v)| (k.clone(), v.clone())));

        BuildAttributes {
            platform: entry.platform.clone().or_else(|| self.platform.clone()),
            mode: entry.mode.or(self.mode),
            app: entry.app.clone().or_else(|| self.app.clone()),
            req: entry.req.clone().or_else(|| self.req.clone()),
            success: entry.success.clone().or_else(|| self.success.clone()),
            error: entry.error.clone().or_else(|| self.error.clone()),
            settings,
            timeout: entry.timeout.or(self.timeout),
            no_hw_test: entry.no_hw_test.or(self.no_hw_test),
            image_base_name: entry
                .image_base_name
                .clone()
                .or_else(|| self.image_base_name.clone()),
            vm_platform: entry.vm_platform.clone().or_else(|| self.vm_platform.clone()),
            l4v_arch: entry.l4v_arch.clone().or_else(|| self.l4v_arch.clone()),
        }
    }
}

/// String form of a YAML scalar. `null` becomes the empty string; sequences
/// and mappings have no scalar form.
pub fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(k, v)| match scalar_to_string(&v) {
            Some(s) => Ok((k, s)),
            None => Err(serde::de::Error::custom(format!(
                "setting {k} must be a scalar"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overlay_entry_wins_and_settings_merge() {
        let default: BuildAttributes = serde_yaml::from_str(
            r#"
image_base_name: sel4test-driver
success: All is well
settings:
  KernelPrinting: "ON"
  Sel4testAllowSettingsOverride: "TRUE"
"#,
        )
        .unwrap();
        let entry: BuildAttributes = serde_yaml::from_str(
            r#"
platform: TX2
success: Done
settings:
  KernelPrinting: "OFF"
"#,
        )
        .unwrap();

        let merged = default.overlay(&entry);
        assert_eq!(merged.platform.as_deref(), Some("TX2"));
        assert_eq!(merged.success.as_deref(), Some("Done"));
        assert_eq!(merged.image_base_name.as_deref(), Some("sel4test-driver"));
        assert_eq!(merged.settings["KernelPrinting"], "OFF");
        assert_eq!(merged.settings["Sel4testAllowSettingsOverride"], "TRUE");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let res: Result<BuildAttributes, _> = serde_yaml::from_str("platfrom: TX2\n");
        assert!(res.is_err());
    }

    #[test]
    fn test_numeric_settings_are_stringified() {
        let attrs: BuildAttributes =
            serde_yaml::from_str("settings:\n  KernelNumDomains: 16\n").unwrap();
        assert_eq!(attrs.settings["KernelNumDomains"], "16");
    }

    #[test]
    fn test_requirement_tags() {
        let one: Requirement = serde_yaml::from_str("tx2a").unwrap();
        let many: Requirement = serde_yaml::from_str("[odroidc2, odroidc2b]").unwrap();
        assert_eq!(one.tags(), vec!["tx2a".to_string()]);
        assert_eq!(many.tags().len(), 2);
        assert!(Requirement::from("").tags().is_empty());
        assert!(Requirement::from("sim").is_sim());
    }
}
