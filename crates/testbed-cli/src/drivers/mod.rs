//! Per-project drivers and the context they share.

pub mod camkes;
pub mod camkes_vm;
pub mod cparser;
pub mod march;
pub mod rump_hello;
pub mod sel4test;
pub mod sel4test_sim;
pub mod tutorials;
pub mod webserver;

use crate::commands::{Mode, Project};
use crate::config::DriverConfig;
use testbed_core::{Build, Catalog, EnvSnapshot, Result};
use testbed_machine::{Hardware, JobIdentity, MachineQueue, Run, release_locks};
use testbed_matrix::{MatrixDocument, env_filter, load_builds};
use testbed_runner::{
    JUNIT_RESULTS, Named, Outcome, ProcessRunner, RunDriver, Script, Step, printer,
};
use tracing::info;

/// Console log of a hardware run without a test report.
pub const HW_LOG: &str = "log.txt";

/// Everything a driver needs: configuration, environment, catalog and the
/// run driver builds execute through.
pub struct Context {
    pub config: DriverConfig,
    pub env: EnvSnapshot,
    pub catalog: Catalog,
    driver: RunDriver,
}

impl Context {
    pub fn load(config: DriverConfig, env: EnvSnapshot) -> Result<Self> {
        let catalog = Catalog::from_file(&config.catalog)?;
        let driver = RunDriver::new(&config.manifest_dir).attempts(config.attempts);
        Ok(Self {
            config,
            env,
            catalog,
            driver,
        })
    }

    pub fn matrix(&self, project: Project) -> Result<MatrixDocument> {
        let path = self.config.matrix_path(project.dir());
        info!(project = %project, path = %path.display(), "Loading build matrix");
        MatrixDocument::from_file(&path)
    }

    /// Builds of `doc` narrowed by the `INPUT_*` filters and `extra`.
    pub fn builds<F>(&self, doc: &MatrixDocument, extra: F) -> Result<Vec<Build>>
    where
        F: Fn(&Build) -> bool,
    {
        let env = env_filter(&self.env)?;
        load_builds(doc, &self.catalog, &env, extra)
    }

    pub async fn run(&self, name: &str, script: &Script, junit: bool) -> Outcome {
        self.driver.run_build_script(name, script, junit).await
    }

    /// Machine access for this job.
    pub fn hardware(&self) -> Result<Hardware> {
        let job = JobIdentity::from_env(&self.env)?;
        let queue = MachineQueue::new(self.config.mq_tool.clone(), job.key())
            .reclaim_timeout(self.config.reclaim_timeout_secs);
        Ok(Hardware::new(job, self.config.mq_tool.clone())
            .with_queue(queue)
            .with_boot_backoff(self.config.boot_backoff()))
    }

    /// Run `build` on hardware, logging to `log`. A disabled build is
    /// skipped without touching the lab.
    pub async fn hw_run(&self, hw: &Hardware, build: &Build, log: &str, junit: bool) -> Outcome {
        if build.is_disabled() {
            println!("Build {} disabled, skipping.", build.name());
            return Outcome::Skip;
        }
        let run = Run::new(build);
        let script = run.script(hw, Some(log));
        self.run(run.name(), &script, junit).await
    }

    /// Release every machine lock the given builds may hold.
    pub async fn post<'a, I>(&self, builds: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Build>,
    {
        let hw = self.hardware()?;
        let reqs = builds.into_iter().map(Build::requirements);
        release_locks(&hw, &ProcessRunner, &self.config.manifest_dir, reqs).await;
        Ok(())
    }
}

/// Print one line per item.
pub fn dump<T: std::fmt::Display>(items: &[T]) {
    for item in items {
        println!("{item}");
    }
}

/// Configure, compile and pack the images for hardware runs.
pub fn images_script(build: &Build) -> Vec<Step> {
    vec![
        init_build(build),
        Step::command(["ninja"]),
        Step::command([
            "tar".to_string(),
            "czf".to_string(),
            format!("../{}-images.tar.gz", build.name()),
            "images/".to_string(),
        ]),
    ]
}

/// Boot images of a CAmkES system.
pub fn capdl_images(build: &mut Build) {
    if let Some(mode) = build.mode() {
        build.files = build.platform().image_names(mode, "capdl-loader");
    }
}

pub fn init_build(build: &Build) -> Step {
    Step::Command(
        std::iter::once("../init-build.sh".to_string())
            .chain(build.settings_args())
            .collect(),
    )
}

/// `command` with its output also written to the raw test report.
pub fn tee_report(command: &str) -> Step {
    Step::command([
        "bash".to_string(),
        "-c".to_string(),
        format!("{command} | tee {JUNIT_RESULTS}"),
    ])
}

/// Build `builds` with `script`, or run them on hardware, or release
/// their locks, whichever `mode` asks for. Shared by the projects whose
/// hardware runs need no per-project preparation beyond `prepare`.
pub async fn run_standard<S, P>(
    ctx: &Context,
    mode: Mode,
    builds: &[Build],
    prepare: P,
    script: S,
) -> Result<u8>
where
    P: Fn(&mut Build),
    S: Fn(&Build) -> Script,
{
    match mode {
        Mode::Dump => {
            dump(builds);
            Ok(0)
        }
        Mode::Hw => {
            let hw = ctx.hardware()?;
            let prepared = prepared(builds, &prepare);
            let summary = testbed_runner::run_all(&prepared, |build| {
                ctx.hw_run(&hw, build, HW_LOG, false)
            })
            .await;
            Ok(summary.exit_code())
        }
        Mode::Post => {
            ctx.post(builds).await?;
            Ok(0)
        }
        Mode::Build => {
            let prepared = prepared(builds, &prepare);
            let summary = testbed_runner::run_all(&prepared, |build| {
                let steps = script(build);
                async move { ctx.run(build.name(), &steps, false).await }
            })
            .await;
            Ok(summary.exit_code())
        }
        Mode::Matrix => {
            printer::error(&format!("{mode} is not available here"));
            Ok(1)
        }
    }
}

fn prepared<P: Fn(&mut Build)>(builds: &[Build], prepare: P) -> Vec<Build> {
    builds
        .iter()
        .cloned()
        .map(|mut build| {
            prepare(&mut build);
            build
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use testbed_core::{Build, BuildAttributes, Catalog};

    pub const CATALOG: &str = r#"
platforms:
  TX2:
    arch: arm
    modes: [64]
    smp: [64]
    aarch_hyp: [64]
    platform: tx2
    march: armv8a
    req: [tx2a, tx2b]
  RPI4:
    arch: arm
    modes: [32, 64]
    smp: [64]
    platform: bcm2711
    march: armv8a
    req: [rpi4]
  HIFIVE:
    arch: riscv
    modes: [64]
    smp: [64]
    platform: hifive
    march: rv64imac
    req: [hifive]
  PC99:
    arch: x86
    modes: [32, 64]
    smp: [64]
    platform: pc99
    march: nehalem
    req: [skylake]
    has_simulation: true
  QEMU_ARM_VIRT:
    arch: arm
    modes: [32, 64]
    platform: qemu-arm-virt
    march: armv8a
    no_hw_test: true
    has_simulation: true
  SPIKE:
    arch: riscv
    modes: [64]
    platform: spike
    march: rv64imac
    no_hw_build: true
    has_simulation: true
mcs_unsupported: [HIFIVE]
"#;

    pub fn catalog() -> Catalog {
        Catalog::from_yaml(CATALOG).unwrap()
    }

    pub fn build(name: &str, attrs: BuildAttributes) -> Build {
        Build::from_attributes(name, &attrs, &catalog()).unwrap()
    }

    /// Basic build of `platform` in `mode`.
    pub fn plain(platform: &str, mode: u32) -> Build {
        build(
            platform,
            BuildAttributes {
                platform: Some(platform.to_string()),
                mode: Some(mode),
                image_base_name: Some("sel4test-driver".to_string()),
                success: Some("All is well in the universe".to_string()),
                ..Default::default()
            },
        )
    }

    pub fn rendered(steps: &[testbed_runner::Step]) -> Vec<String> {
        steps
            .iter()
            .map(|s| match s {
                testbed_runner::Step::Command(args) => args.join(" "),
                testbed_runner::Step::Hook(h) => format!("<{}>", h.name()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use testbed_core::Error;

    const SEL4TEST_MATRIX: &str = r#"
default:
  image_base_name: sel4test-driver
  success: "All is well in the universe"
variants:
  compiler: [gcc, clang]
builds:
  - TX2:
      platform: TX2
  - HIFIVE:
      platform: HIFIVE
"#;

    fn context(dir: &Path, env: &[(&str, &str)]) -> Context {
        std::fs::write(dir.join("platforms.yml"), fixtures::CATALOG).unwrap();
        std::fs::create_dir_all(dir.join("sel4test-hw")).unwrap();
        std::fs::write(dir.join("sel4test-hw/builds.yml"), SEL4TEST_MATRIX).unwrap();

        let config = DriverConfig {
            manifest_dir: dir.to_path_buf(),
            catalog: dir.join("platforms.yml"),
            matrix_dir: dir.to_path_buf(),
            ..Default::default()
        };
        Context::load(config, EnvSnapshot::from_pairs(env.iter().copied())).unwrap()
    }

    #[test]
    fn test_project_builds_follow_input_filters() {
        let dir = tempfile::tempdir().unwrap();

        let ctx = context(dir.path(), &[]);
        let doc = ctx.matrix(Project::Sel4test).unwrap();
        let names: Vec<_> = ctx
            .builds(&doc, |_| true)
            .unwrap()
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(names, vec!["TX2_gcc", "TX2_clang", "HIFIVE_gcc", "HIFIVE_clang"]);

        let ctx = context(dir.path(), &[("INPUT_COMPILER", "clang"), ("INPUT_ARCH", "riscv")]);
        let doc = ctx.matrix(Project::Sel4test).unwrap();
        let builds = ctx.builds(&doc, |_| true).unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].name(), "HIFIVE_clang");
    }

    #[test]
    fn test_missing_matrix_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), &[]);
        assert!(matches!(ctx.matrix(Project::Tutorials), Err(Error::Io(_))));
    }

    #[test]
    fn test_hardware_needs_job_identity() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), &[("GITHUB_REPOSITORY", "seL4/sel4test")]);
        assert!(matches!(ctx.hardware(), Err(Error::MissingEnv(_))));

        let ctx = context(
            dir.path(),
            &[
                ("GITHUB_REPOSITORY", "seL4/sel4test"),
                ("GITHUB_WORKFLOW", "HW"),
                ("GITHUB_RUN_ID", "12"),
                ("GITHUB_JOB", "hw-run"),
                ("INPUT_INDEX", "$1"),
            ],
        );
        let hw = ctx.hardware().unwrap();
        assert_eq!(hw.queue.key(), "seL4/sel4test-HW-12-hw-run-1");
    }

    #[tokio::test]
    async fn test_disabled_build_skips_without_lab() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(
            dir.path(),
            &[
                ("GITHUB_REPOSITORY", "r"),
                ("GITHUB_WORKFLOW", "w"),
                ("GITHUB_RUN_ID", "1"),
                ("GITHUB_JOB", "j"),
            ],
        );
        let hw = ctx.hardware().unwrap();
        let build = fixtures::plain("QEMU_ARM_VIRT", 64);
        assert_eq!(ctx.hw_run(&hw, &build, HW_LOG, false).await, Outcome::Skip);
    }
}
