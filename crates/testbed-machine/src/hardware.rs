//! Hardware test runs.

use crate::boot::{BOOT_FAILURE_BACKOFF, BootFailureCheck};
use crate::job::JobIdentity;
use crate::queue::{MachineQueue, RunRequest};
use std::time::Duration;
use testbed_core::Build;
use testbed_runner::{Named, Script, Step};

/// Machine access for this job: who we are and how to talk to the queue.
#[derive(Debug, Clone)]
pub struct Hardware {
    pub job: JobIdentity,
    pub queue: MachineQueue,
    pub boot_backoff: Duration,
}

impl Hardware {
    pub fn new(job: JobIdentity, tool: impl Into<String>) -> Self {
        let queue = MachineQueue::new(tool, job.key());
        Self {
            job,
            queue,
            boot_backoff: BOOT_FAILURE_BACKOFF,
        }
    }

    pub fn with_queue(mut self, queue: MachineQueue) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_boot_backoff(mut self, backoff: Duration) -> Self {
        self.boot_backoff = backoff;
        self
    }

    pub fn select_machine<'a>(&self, reqs: &'a [String]) -> Option<&'a str> {
        self.job.select_machine(reqs)
    }
}

/// One hardware test run of a build. A build can have several runs, which
/// differ only in name and machine requirement.
#[derive(Debug, Clone)]
pub struct Run<'a> {
    build: &'a Build,
    name: String,
    req: Option<Vec<String>>,
}

impl<'a> Run<'a> {
    pub fn new(build: &'a Build) -> Self {
        Self {
            build,
            name: build.name().to_string(),
            req: None,
        }
    }

    /// Run named `<build name><suffix>`.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.name = format!("{}{}", self.build.name(), suffix);
        self
    }

    pub fn with_req(mut self, req: Vec<String>) -> Self {
        self.req = Some(req);
        self
    }

    pub fn build(&self) -> &'a Build {
        self.build
    }

    /// The run's own requirement if set, else the build's.
    pub fn requirements(&self) -> Vec<String> {
        match &self.req {
            Some(req) if !req.is_empty() => req.clone(),
            _ => self.build.requirements(),
        }
    }

    /// Script booting the build's images on a machine and collecting the
    /// console output into `log`.
    ///
    /// The trailer checks the run's output for boot failures and releases
    /// the machine, also when the run itself failed.
    pub fn script(&self, hw: &Hardware, log: Option<&str>) -> Script {
        let build = self.build;
        if build.is_disabled() {
            return Script::new(vec![Step::skip()]);
        }

        let reqs = self.requirements();
        let Some(machine) = hw.select_machine(&reqs) else {
            return Script::new(vec![Step::fail(format!("No machine for {}.", self.name))]);
        };
        if machine.ends_with("_pool") {
            return Script::new(vec![Step::fail(format!(
                "Specify list of machines instead of pool for {}.",
                self.name
            ))]);
        }
        let Some(success) = build.success.as_deref() else {
            return Script::new(vec![Step::fail(format!(
                "No success marker for {}.",
                self.name
            ))]);
        };

        let request = RunRequest {
            completion_timeout: Some(build.timeout),
            log: log.map(str::to_string),
            lock_held: true,
            error: build.error.clone(),
            ..RunRequest::new(success, machine, build.files.clone())
        };

        Script::new(vec![
            Step::command([
                "tar".to_string(),
                "xvzf".to_string(),
                format!("../{}-images.tar.gz", build.name()),
            ]),
            Step::Command(hw.queue.status(machine)),
            Step::Command(hw.queue.lock(machine)),
            Step::Command(hw.queue.run(&request)),
        ])
        .with_final(vec![
            Step::hook(BootFailureCheck::new(hw.boot_backoff)),
            Step::Command(hw.queue.release(machine)),
        ])
    }
}

impl Named for Run<'_> {
    fn name(&self) -> &str {
        &self.name
    }
}
