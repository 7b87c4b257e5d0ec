//! Driver configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use testbed_core::{EnvSnapshot, Error, Result};

/// Where the drivers find their inputs and how they talk to the lab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    /// Checkout in which builds run, in `<manifest_dir>/build`.
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,
    /// Platform catalog document.
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
    /// Directory holding one `<project>/builds.yml` per project.
    #[serde(default = "default_matrix_dir")]
    pub matrix_dir: PathBuf,
    /// Machine queue tool.
    #[serde(default = "default_mq_tool")]
    pub mq_tool: String,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_boot_backoff_secs")]
    pub boot_backoff_secs: u64,
    #[serde(default = "default_reclaim_timeout_secs")]
    pub reclaim_timeout_secs: u64,
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_catalog() -> PathBuf {
    PathBuf::from("seL4-platforms/platforms.yml")
}

fn default_matrix_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_mq_tool() -> String {
    "mq.sh".to_string()
}

fn default_attempts() -> u32 {
    testbed_runner::DEFAULT_ATTEMPTS
}

fn default_boot_backoff_secs() -> u64 {
    testbed_machine::BOOT_FAILURE_BACKOFF.as_secs()
}

fn default_reclaim_timeout_secs() -> u64 {
    testbed_machine::DEFAULT_RECLAIM_TIMEOUT_SECS
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            manifest_dir: default_manifest_dir(),
            catalog: default_catalog(),
            matrix_dir: default_matrix_dir(),
            mq_tool: default_mq_tool(),
            attempts: default_attempts(),
            boot_backoff_secs: default_boot_backoff_secs(),
            reclaim_timeout_secs: default_reclaim_timeout_secs(),
        }
    }
}

impl DriverConfig {
    /// Load from `path` if given, then apply `TESTBED_*` overrides from `env`.
    pub fn load(path: Option<&Path>, env: &EnvSnapshot) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                serde_yaml::from_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    fn apply_env(&mut self, env: &EnvSnapshot) -> Result<()> {
        if let Some(dir) = env.get("TESTBED_MANIFEST_DIR") {
            self.manifest_dir = PathBuf::from(dir);
        }
        if let Some(path) = env.get("TESTBED_CATALOG") {
            self.catalog = PathBuf::from(path);
        }
        if let Some(dir) = env.get("TESTBED_MATRIX_DIR") {
            self.matrix_dir = PathBuf::from(dir);
        }
        if let Some(tool) = env.get("TESTBED_MQ_TOOL") {
            self.mq_tool = tool.to_string();
        }
        if let Some(n) = parsed(env, "TESTBED_ATTEMPTS")? {
            self.attempts = n;
        }
        if let Some(secs) = parsed(env, "TESTBED_BOOT_BACKOFF_SECS")? {
            self.boot_backoff_secs = secs;
        }
        if let Some(secs) = parsed(env, "TESTBED_RECLAIM_TIMEOUT_SECS")? {
            self.reclaim_timeout_secs = secs;
        }
        Ok(())
    }

    pub fn boot_backoff(&self) -> Duration {
        Duration::from_secs(self.boot_backoff_secs)
    }

    /// Matrix document of the project living in `project_dir`.
    pub fn matrix_path(&self, project_dir: &str) -> PathBuf {
        self.matrix_dir.join(project_dir).join("builds.yml")
    }
}

fn parsed<T: std::str::FromStr>(env: &EnvSnapshot, var: &str) -> Result<Option<T>> {
    env.get(var)
        .map(|raw| {
            raw.parse().map_err(|_| Error::InvalidEnv {
                var: var.to_string(),
                value: raw.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::load(None, &EnvSnapshot::default()).unwrap();
        assert_eq!(config.mq_tool, "mq.sh");
        assert_eq!(config.attempts, 3);
        assert_eq!(config.boot_backoff(), Duration::from_secs(10));
        assert_eq!(config.reclaim_timeout_secs, 1800);
        assert_eq!(
            config.matrix_path("sel4test-hw"),
            PathBuf::from("./sel4test-hw/builds.yml")
        );
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mq_tool: /opt/mq/mq.sh\nattempts: 5\nmatrix_dir: ci").unwrap();
        let env = EnvSnapshot::from_pairs([("TESTBED_ATTEMPTS", "1")]);

        let config = DriverConfig::load(Some(file.path()), &env).unwrap();
        assert_eq!(config.mq_tool, "/opt/mq/mq.sh");
        assert_eq!(config.attempts, 1);
        assert_eq!(config.matrix_dir, PathBuf::from("ci"));
        assert_eq!(config.catalog, default_catalog());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mq-tool: mq.sh").unwrap();
        assert!(matches!(
            DriverConfig::load(Some(file.path()), &EnvSnapshot::default()),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_bad_env_value() {
        let env = EnvSnapshot::from_pairs([("TESTBED_BOOT_BACKOFF_SECS", "soon")]);
        assert!(matches!(
            DriverConfig::load(None, &env),
            Err(Error::InvalidEnv { var, .. }) if var == "TESTBED_BOOT_BACKOFF_SECS"
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = DriverConfig::load(Some(Path::new("/nonexistent/testbed.yml")), &EnvSnapshot::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
