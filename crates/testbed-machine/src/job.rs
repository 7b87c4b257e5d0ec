//! CI job identity and machine selection.

use testbed_core::{EnvSnapshot, Result};

/// Identity of the CI job this process runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    pub repository: String,
    pub workflow: String,
    pub run_id: String,
    pub job: String,
    /// Position of this job in the outer CI matrix.
    pub shard: usize,
    /// The shard as given in `INPUT_INDEX`; part of the lock owner key.
    pub shard_label: String,
}

impl JobIdentity {
    pub fn new(
        repository: impl Into<String>,
        workflow: impl Into<String>,
        run_id: impl Into<String>,
        job: impl Into<String>,
        shard: usize,
    ) -> Self {
        Self {
            repository: repository.into(),
            workflow: workflow.into(),
            run_id: run_id.into(),
            job: job.into(),
            shard,
            shard_label: shard.to_string(),
        }
    }

    /// Read the identity from `GITHUB_REPOSITORY`, `GITHUB_WORKFLOW`,
    /// `GITHUB_RUN_ID`, `GITHUB_JOB` and `INPUT_INDEX`.
    pub fn from_env(env: &EnvSnapshot) -> Result<Self> {
        Ok(Self {
            repository: env.require("GITHUB_REPOSITORY")?.to_string(),
            workflow: env.require("GITHUB_WORKFLOW")?.to_string(),
            run_id: env.require("GITHUB_RUN_ID")?.to_string(),
            job: env.require("GITHUB_JOB")?.to_string(),
            shard: env.shard_index()?,
            shard_label: env.shard_label().to_string(),
        })
    }

    /// Lock owner key. Stable across re-invocations of the same job and
    /// distinct between jobs. Other users of the queue derive the same key
    /// from the raw index text.
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.repository, self.workflow, self.run_id, self.job, self.shard_label
        )
    }

    pub fn select_machine<'a>(&self, reqs: &'a [String]) -> Option<&'a str> {
        select_machine(reqs, self.shard)
    }
}

/// Machine for shard `shard` out of the requirement tags `reqs`.
///
/// Assumes jobs for the same platform sit next to each other in the CI
/// matrix, so consecutive shards spread over the available machines.
pub fn select_machine(reqs: &[String], shard: usize) -> Option<&str> {
    if reqs.is_empty() {
        return None;
    }
    Some(reqs[shard % reqs.len()].as_str())
}
