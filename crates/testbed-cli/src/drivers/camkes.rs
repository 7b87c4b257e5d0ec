//! CAmkES tests.
//!
//! Hardware builds come from the build matrix, filtered by the per-app
//! platform and mode tables in `apps`. Simulation runs are batches of the
//! CAmkES test suite listed explicitly under `sim`.

use super::{Context, HW_LOG, capdl_images, dump, images_script};
use crate::commands::{Mode, Project};
use crate::output::{gh_output, matrix_assignment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use testbed_core::{Arch, Build, Error, Result};
use testbed_runner::{Named, Outcome, Script, Step};
use tracing::warn;

/// Per-app build constraints and success marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct App {
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub arm_modes: Vec<u32>,
    #[serde(default)]
    pub x86_modes: Vec<u32>,
    #[serde(default)]
    pub success: Option<String>,
    #[serde(default)]
    pub has_cakeml: bool,
}

pub type Apps = BTreeMap<String, App>;

/// A slice of the CAmkES test suite run in simulation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "SimSection")]
pub struct SimBatch {
    pub name: String,
    /// Test name pattern.
    pub pattern: String,
    pub exclude: String,
    /// Range of test iterations.
    pub iterator: String,
}

#[derive(Deserialize)]
struct SimSection {
    #[serde(rename = "match")]
    pattern: String,
    #[serde(default)]
    exclude: String,
    #[serde(default)]
    iterator: String,
}

impl From<SimSection> for SimBatch {
    fn from(sim: SimSection) -> Self {
        // named after the pattern and the first character of the range
        let name = match sim.iterator.chars().next() {
            Some(first) => format!("{}_{first}", sim.pattern),
            None => sim.pattern.clone(),
        };
        Self {
            name,
            pattern: sim.pattern,
            exclude: sim.exclude,
            iterator: sim.iterator,
        }
    }
}

impl SimBatch {
    pub fn script(&self) -> Script {
        Script::new(vec![Step::command([
            "bash".to_string(),
            "-c".to_string(),
            format!(
                "cd ../projects/camkes/tests && SEL4_CACHE_DIR=~/.sel4_cache/ REGEX={} \
                 EXCLUDE_REGEX={} VERBOSE=-VV RANGE={} make run_tests",
                self.pattern, self.exclude, self.iterator
            ),
        ])])
    }
}

/// Anything this project runs.
#[derive(Debug, Clone)]
pub enum Job {
    Toolchain(Build),
    SimBatch(SimBatch),
}

impl Named for Job {
    fn name(&self) -> &str {
        match self {
            Job::Toolchain(build) => build.name(),
            Job::SimBatch(sim) => &sim.name,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Toolchain(build) => write!(f, "{build}"),
            Job::SimBatch(sim) => write!(
                f,
                "SimBuild('{}', {{'match': '{}', 'exclude': '{}', 'iterator': '{}'}})",
                sim.name, sim.pattern, sim.exclude, sim.iterator
            ),
        }
    }
}

#[derive(Serialize)]
struct MatrixEntry<'a> {
    name: &'a str,
    platform: &'a str,
}

pub async fn run(ctx: &Context, mode: Mode) -> Result<u8> {
    let doc = ctx.matrix(Project::Camkes)?;
    let apps: Apps = doc.section("apps")?.unwrap_or_default();
    let sims: Vec<SimBatch> = doc.section("sim")?.unwrap_or_default();

    let hw_builds = ctx.builds(&doc, |b| build_filter(&apps, b))?;
    let jobs: Vec<Job> = sims
        .into_iter()
        .filter(|sim| sim_filter(ctx.env.input("name"), ctx.env.input("platform"), sim))
        .map(Job::SimBatch)
        .chain(hw_builds.iter().cloned().map(Job::Toolchain))
        .collect();

    match mode {
        Mode::Dump => {
            dump(&jobs);
            Ok(0)
        }
        Mode::Matrix => {
            let entries: Vec<_> = jobs
                .iter()
                .map(|job| MatrixEntry {
                    name: job.name(),
                    platform: match job {
                        Job::Toolchain(build) => build.platform().name.as_str(),
                        Job::SimBatch(_) => "sim",
                    },
                })
                .collect();
            gh_output(&ctx.env, &matrix_assignment("matrix", &entries)?)?;
            Ok(0)
        }
        Mode::Hw => {
            let hw = ctx.hardware()?;
            let mut prepared = Vec::with_capacity(hw_builds.len());
            for build in &hw_builds {
                prepared.push(prepare_hw(&apps, build)?);
            }
            let summary = testbed_runner::run_all(&prepared, |build| {
                ctx.hw_run(&hw, build, HW_LOG, false)
            })
            .await;
            Ok(summary.exit_code())
        }
        Mode::Post => {
            ctx.post(&hw_builds).await?;
            Ok(0)
        }
        Mode::Build => {
            let summary = testbed_runner::run_all(&jobs, |job| {
                let script = job_script(&apps, job);
                async move {
                    match script {
                        Ok(script) => ctx.run(job.name(), &script, false).await,
                        Err(e) => {
                            warn!(job = job.name(), error = %e, "Cannot prepare job");
                            testbed_runner::printer::error(&format!("{}: {e}", job.name()));
                            Outcome::Failure
                        }
                    }
                }
            })
            .await;
            Ok(summary.exit_code())
        }
    }
}

/// Keep builds of a known app, on one of its platforms, in one of its modes.
pub fn build_filter(apps: &Apps, build: &Build) -> bool {
    let Some(app) = build.app.as_deref().and_then(|name| apps.get(name)) else {
        return false;
    };
    let plat = build.platform();
    if !app.platforms.contains(&plat.name) {
        return false;
    }
    let Some(mode) = build.mode() else {
        return false;
    };
    match plat.arch {
        Arch::Arm => app.arm_modes.contains(&mode),
        Arch::X86 => app.x86_modes.contains(&mode),
        Arch::Riscv => true,
    }
}

/// Simulation batches are selected by name, and only if the platform
/// input (when given) asks for simulation.
pub fn sim_filter(name: Option<&str>, platform: Option<&str>, sim: &SimBatch) -> bool {
    name.is_none_or(|n| n == sim.name) && platform.is_none_or(|p| p == "sim")
}

fn app_of<'a>(apps: &'a Apps, build: &Build) -> Result<(&'a str, &'a App)> {
    let name = build
        .app
        .as_deref()
        .ok_or_else(|| Error::Config(format!("build {} has no app", build.name())))?;
    apps.get_key_value(name)
        .map(|(k, v)| (k.as_str(), v))
        .ok_or_else(|| Error::Config(format!("unknown app {name}")))
}

fn prepare_hw(apps: &Apps, build: &Build) -> Result<Build> {
    let (_, app) = app_of(apps, build)?;
    let mut build = build.clone();
    build.success = app.success.clone();
    capdl_images(&mut build);
    Ok(build)
}

/// Toolchain build of an app, or a simulation batch.
pub fn job_script(apps: &Apps, job: &Job) -> Result<Script> {
    let build = match job {
        Job::SimBatch(sim) => return Ok(sim.script()),
        Job::Toolchain(build) => build,
    };
    let (name, app) = app_of(apps, build)?;

    let mut build = build.clone();
    capdl_images(&mut build);
    build.insert_setting("CAMKES_APP", name);
    if app.has_cakeml {
        build.insert_setting("CAKEMLDIR", "/cakeml");
        if let Some(mode) = build.mode() {
            build.insert_setting("CAKEML_BIN", format!("/cake-x64-{mode}/cake"));
        }
    }
    // not a toolchain setting
    build.remove_setting("BAMBOO");

    Ok(Script::new(images_script(&build)))
}
