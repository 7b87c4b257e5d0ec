//! Scripts, steps and the command runner seam.

use crate::outcome::Outcome;
use async_trait::async_trait;
use std::path::Path;
use testbed_core::Result;

/// Outcome and captured stdout lines of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub outcome: Outcome,
    pub lines: Vec<String>,
}

impl StepOutput {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            lines: vec![],
        }
    }
}

/// Trait for executing external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` (program plus arguments) in `cwd`, echoing stdout as it
    /// arrives. Fails only if the process could not be run at all.
    async fn run(&self, command: &[String], cwd: &Path) -> Result<StepOutput>;
}

/// An in-process step. Receives the stdout lines captured by the step that
/// ran before it.
#[async_trait]
pub trait StepHook: Send + Sync {
    async fn call(&self, prior_output: &[String]) -> Outcome;

    fn name(&self) -> &str;
}

/// Hook backed by a plain closure.
pub struct FnHook<F> {
    name: String,
    func: F,
}

impl<F> FnHook<F>
where
    F: Fn(&[String]) -> Outcome + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> StepHook for FnHook<F>
where
    F: Fn(&[String]) -> Outcome + Send + Sync,
{
    async fn call(&self, prior_output: &[String]) -> Outcome {
        (self.func)(prior_output)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One step of a build script.
pub enum Step {
    Command(Vec<String>),
    Hook(Box<dyn StepHook>),
}

impl Step {
    pub fn command<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step::Command(args.into_iter().map(Into::into).collect())
    }

    pub fn hook(hook: impl StepHook + 'static) -> Self {
        Step::Hook(Box::new(hook))
    }

    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[String]) -> Outcome + Send + Sync + 'static,
    {
        Step::hook(FnHook::new(name, func))
    }

    /// Hook that always ends the run with `Outcome::Skip`.
    pub fn skip() -> Self {
        Step::from_fn("skip", |_| Outcome::Skip)
    }

    /// Hook that prints `message` as an error and fails.
    pub fn fail(message: impl Into<String>) -> Self {
        let message = message.into();
        Step::from_fn("fail", move |_| {
            crate::printer::error(&message);
            Outcome::Failure
        })
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Command(args) => f.debug_tuple("Command").field(args).finish(),
            Step::Hook(hook) => f.debug_tuple("Hook").field(&hook.name()).finish(),
        }
    }
}

/// A primary script and the trailer run after it.
#[derive(Debug, Default)]
pub struct Script {
    pub steps: Vec<Step>,
    /// Trailer steps. Run after `steps` whatever their outcome, unless the
    /// run was skipped.
    pub final_steps: Vec<Step>,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            final_steps: vec![],
        }
    }

    pub fn with_final(mut self, final_steps: Vec<Step>) -> Self {
        self.final_steps = final_steps;
        self
    }

    /// Literal commands of the primary script, hooks left out.
    pub fn commands(&self) -> impl Iterator<Item = &[String]> {
        self.steps.iter().filter_map(|step| match step {
            Step::Command(args) => Some(args.as_slice()),
            Step::Hook(_) => None,
        })
    }
}
