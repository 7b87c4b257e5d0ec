//! seL4 test suite on hardware.
//!
//! Builds run in one job per platform and compiler; the images are then
//! picked up by hardware-run jobs selected through `--matrix`.

use super::{Context, images_script, run_standard};
use crate::commands::{Mode, Project};
use crate::output::{gh_output, matrix_assignment};
use serde::Serialize;
use std::collections::BTreeMap;
use testbed_core::{Arch, Build, Result};
use testbed_runner::{JUNIT_RESULTS, Script, Step};

const MATRIX_COMPILERS: [&str; 2] = ["gcc", "clang"];

pub async fn run(ctx: &Context, mode: Mode) -> Result<u8> {
    let doc = ctx.matrix(Project::Sel4test)?;
    let builds = ctx.builds(&doc, build_filter)?;

    match mode {
        Mode::Matrix => {
            let assignment = matrix_assignment("matrix", &matrix_entries(&builds))?;
            gh_output(&ctx.env, &assignment)?;
            Ok(0)
        }
        Mode::Hw => {
            let hw = ctx.hardware()?;
            let summary = testbed_runner::run_all(&builds, |build| {
                ctx.hw_run(&hw, build, JUNIT_RESULTS, true)
            })
            .await;
            Ok(summary.exit_code())
        }
        _ => run_standard(ctx, mode, &builds, prepare, build_script).await,
    }
}

fn prepare(build: &mut Build) {
    // the RPI4 test boards have 4 GiB of memory
    if build.platform().name == "RPI4" {
        build.insert_setting("RPI4_MEMORY", "4096");
    }
}

/// Images plus the kernel ELF, both next to the build directory.
pub fn build_script(build: &Build) -> Script {
    let mut steps = images_script(build);
    steps.push(Step::command([
        "cp".to_string(),
        "kernel/kernel.elf".to_string(),
        format!("../{}-kernel.elf", build.name()),
    ]));
    Script::new(steps)
}

/// Configurations known to fail on particular boards, and combinations not
/// worth the machine time.
pub fn build_filter(build: &Build) -> bool {
    let plat = build.platform();
    let name = plat.name.as_str();
    let mode = build.mode();

    if plat.no_hw_build {
        return false;
    }

    match plat.arch {
        Arch::Arm => {
            if name == "HIKEY" && build.is_hyp() && mode == Some(64) && build.is_release() {
                return false;
            }
            // global timer platforms
            if name == "SABRE" && build.is_smp() && build.is_mcs() {
                return false;
            }
            if matches!(name, "TX1" | "TX2" | "ODROID_C4")
                && build.is_mcs()
                && build.is_smp()
                && build.is_hyp()
                && build.is_clang()
            {
                return false;
            }
            if name == "ODROID_XU4"
                && build.is_debug()
                && build.is_mcs()
                && build.is_hyp()
                && build.is_clang()
                && mode == Some(32)
            {
                return false;
            }
            if name == "IMX8MM_EVK" && build.is_mcs() && build.is_smp() {
                return false;
            }
            if matches!(name, "IMX8MQ_EVK" | "ZYNQMP" | "ZYNQMP106")
                && build.is_hyp()
                && build.is_smp()
                && build.is_clang()
            {
                return false;
            }
        }
        Arch::X86 => {
            if build.is_hyp() && (build.is_smp() || build.is_verification()) {
                return false;
            }
        }
        Arch::Riscv => {
            if name == "HIFIVE" && build.is_clang() && build.is_smp() && build.is_release() {
                return false;
            }
        }
    }

    // multiple domains only in release builds
    !(build.is_domains() && !build.is_release())
}

/// One job of the hardware-run matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixEntry {
    pub platform: String,
    pub march: String,
    pub compiler: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

/// Hardware-run jobs: per testable platform of `builds` one per compiler,
/// and for x86 also one per mode.
pub fn matrix_entries(builds: &[Build]) -> Vec<MatrixEntry> {
    let platforms: BTreeMap<&str, _> = builds
        .iter()
        .map(|b| (b.platform().name.as_str(), b.platform()))
        .collect();

    let mut entries = Vec::new();
    for plat in platforms.values() {
        if plat.no_hw_test || plat.no_hw_build {
            continue;
        }
        let modes: Vec<Option<u32>> = match plat.arch {
            Arch::X86 => plat.modes.iter().copied().map(Some).collect(),
            _ => vec![None],
        };
        for compiler in MATRIX_COMPILERS {
            for mode in &modes {
                entries.push(MatrixEntry {
                    platform: plat.name.clone(),
                    march: plat.march.clone(),
                    compiler,
                    mode: *mode,
                });
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::fixtures::{plain, rendered};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_script() {
        let mut build = plain("RPI4", 64);
        prepare(&mut build);
        let script = build_script(&build);
        let steps = rendered(&script.steps);

        assert!(steps[0].starts_with("../init-build.sh "));
        assert!(steps[0].contains("-DRPI4_MEMORY=4096"));
        assert!(steps[0].contains("-DAARCH64=TRUE"));
        assert_eq!(
            steps[1..].to_vec(),
            vec![
                "ninja".to_string(),
                "tar czf ../RPI4-images.tar.gz images/".to_string(),
                "cp kernel/kernel.elf ../RPI4-kernel.elf".to_string(),
            ]
        );
    }

    #[test]
    fn test_memory_setting_only_on_rpi4() {
        let mut build = plain("TX2", 64);
        prepare(&mut build);
        assert!(!build.settings.contains_key("RPI4_MEMORY"));
    }

    #[test]
    fn test_filter_tx2_mcs_smp_hyp_clang() {
        let mut build = plain("TX2", 64);
        build.set_mcs().unwrap();
        build.set_smp().unwrap();
        build.set_hyp().unwrap();
        assert!(build_filter(&build));

        build.set_clang().unwrap();
        assert!(!build_filter(&build));
    }

    #[test]
    fn test_filter_x86_hyp() {
        let mut build = plain("PC99", 64);
        build.set_hyp().unwrap();
        assert!(build_filter(&build));

        build.set_verification();
        assert!(!build_filter(&build));
    }

    #[test]
    fn test_filter_hifive_clang_smp_release() {
        let mut build = plain("HIFIVE", 64);
        build.set_clang().unwrap();
        build.set_smp().unwrap();
        assert!(build_filter(&build));

        build.set_release().unwrap();
        assert!(!build_filter(&build));
    }

    #[test]
    fn test_filter_domains_only_in_release() {
        let mut build = plain("TX2", 64);
        build.set_domains().unwrap();
        assert!(!build_filter(&build));

        build.set_release().unwrap();
        assert!(build_filter(&build));
    }

    #[test]
    fn test_filter_no_hw_build() {
        assert!(!build_filter(&plain("SPIKE", 64)));
    }

    #[test]
    fn test_matrix_entries() {
        let builds = vec![
            plain("TX2", 64),
            plain("TX2", 64).with_suffix("clang"),
            plain("PC99", 32),
            plain("QEMU_ARM_VIRT", 64),
        ];

        let entries = matrix_entries(&builds);
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.platform.as_str(), e.compiler, e.mode))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("PC99", "gcc", Some(32)),
                ("PC99", "gcc", Some(64)),
                ("PC99", "clang", Some(32)),
                ("PC99", "clang", Some(64)),
                ("TX2", "gcc", None),
                ("TX2", "clang", None),
            ]
        );

        let assignment = matrix_assignment("matrix", &entries[4..]).unwrap();
        assert_eq!(
            assignment,
            r#"matrix={"include":[{"platform":"TX2","march":"armv8a","compiler":"gcc"},{"platform":"TX2","march":"armv8a","compiler":"clang"}]}"#
        );
    }
}
