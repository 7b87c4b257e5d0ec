//! Command lines for the machine queue tool.
//!
//! The queue holds one named lock per physical machine. This module only
//! builds the commands; running them is up to the caller.

/// Seconds after which a lock held by another job may be reclaimed.
pub const DEFAULT_RECLAIM_TIMEOUT_SECS: u64 = 1800;

const DEFAULT_LOCK_WAIT_SECS: u64 = 8;

/// A hardware execution request (`mq.sh run`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub success: String,
    pub machine: String,
    pub files: Vec<String>,
    /// Completion timeout in seconds; `None` lets the tool decide.
    pub completion_timeout: Option<u64>,
    /// Boot retries; `None` lets the tool decide.
    pub retries: Option<u32>,
    pub lock_wait: u64,
    pub log: Option<String>,
    pub lock_held: bool,
    pub keep_alive: bool,
    pub error: Option<String>,
}

impl RunRequest {
    pub fn new(success: impl Into<String>, machine: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            success: success.into(),
            machine: machine.into(),
            files,
            completion_timeout: None,
            retries: None,
            lock_wait: DEFAULT_LOCK_WAIT_SECS,
            log: None,
            lock_held: false,
            keep_alive: false,
            error: None,
        }
    }
}

fn or_unset<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-1".to_string(), |v| v.to_string())
}

/// Command builder for one job's use of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineQueue {
    tool: String,
    key: String,
    reclaim_timeout: u64,
}

impl MachineQueue {
    pub fn new(tool: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            key: key.into(),
            reclaim_timeout: DEFAULT_RECLAIM_TIMEOUT_SECS,
        }
    }

    pub fn reclaim_timeout(mut self, secs: u64) -> Self {
        self.reclaim_timeout = secs;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn command(&self, timed: bool, args: &[&str]) -> Vec<String> {
        let mut command = Vec::with_capacity(args.len() + 2);
        if timed {
            command.push("time".to_string());
        }
        command.push(self.tool.clone());
        command.extend(args.iter().map(|a| a.to_string()));
        command
    }

    /// Block until this job holds the lock on `machine`.
    pub fn lock(&self, machine: &str) -> Vec<String> {
        let timeout = self.reclaim_timeout.to_string();
        self.command(
            true,
            &["sem", "-wait", machine, "-k", self.key.as_str(), "-T", timeout.as_str()],
        )
    }

    pub fn release(&self, machine: &str) -> Vec<String> {
        self.command(false, &["sem", "-signal", machine, "-k", self.key.as_str()])
    }

    /// Cancel this job's pending wait for `machine`.
    pub fn cancel(&self, machine: &str) -> Vec<String> {
        self.command(false, &["sem", "-cancel", machine, "-k", self.key.as_str()])
    }

    /// Print who holds `machine`.
    pub fn status(&self, machine: &str) -> Vec<String> {
        self.command(false, &["sem", "-info", machine])
    }

    /// Submit a hardware run, tagged with this job's key.
    pub fn run(&self, request: &RunRequest) -> Vec<String> {
        let mut command = self.command(
            true,
            &[
                "run",
                "-c",
                request.success.as_str(),
                "-s",
                request.machine.as_str(),
                "-d",
                or_unset(request.completion_timeout).as_str(),
                "-t",
                or_unset(request.retries).as_str(),
                "-w",
                request.lock_wait.to_string().as_str(),
            ],
        );

        if let Some(log) = &request.log {
            command.extend(["-l".to_string(), log.clone()]);
        }
        if request.lock_held {
            command.push("-n".to_string());
        }
        if request.keep_alive {
            command.push("-a".to_string());
        }
        command.extend(["-k".to_string(), self.key.clone()]);
        if let Some(error) = &request.error {
            command.extend(["-e".to_string(), error.clone()]);
        }
        for file in &request.files {
            command.extend(["-f".to_string(), file.clone()]);
        }
        command
    }
}
