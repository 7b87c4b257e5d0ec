//! CAmkES VM applications.

use super::{Context, capdl_images, images_script, run_standard};
use crate::commands::{Mode, Project};
use testbed_core::{Arch, Build, Result};
use testbed_runner::{SIMULATION_TIMEOUT_SECS, Script, simulation_step};

pub async fn run(ctx: &Context, mode: Mode) -> Result<u8> {
    let doc = ctx.matrix(Project::CamkesVm)?;
    let builds = ctx.builds(&doc, |_| true)?;
    run_standard(ctx, mode, &builds, capdl_images, build_script).await
}

/// Images, then a simulation run where the platform has a simulator.
pub fn build_script(build: &Build) -> Script {
    let mut build = build.clone();
    let app = build.app.clone().unwrap_or_else(|| build.name().to_string());
    build.insert_setting("CAMKES_VM_APP", app);

    // init-build.sh knows some boards under a different name
    if let Some(vm_platform) = build.vm_platform.clone() {
        build.insert_setting("PLATFORM", vm_platform);
    }
    build.remove_setting("BAMBOO");
    if build.arch() == Arch::X86 {
        build.remove_setting("PLATFORM");
    }

    let mut steps = images_script(&build);
    let plat = build.platform();
    if plat.has_simulation && plat.name != "PC99" {
        if let Some(success) = build.success.as_deref() {
            steps.push(simulation_step(
                success,
                build.error.as_deref(),
                SIMULATION_TIMEOUT_SECS,
            ));
        }
    }
    Script::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::fixtures::{build, rendered};
    use pretty_assertions::assert_eq;
    use testbed_core::BuildAttributes;

    fn vm_build(platform: &str, mode: u32) -> Build {
        build(
            "vm_minimal",
            BuildAttributes {
                platform: Some(platform.to_string()),
                mode: Some(mode),
                success: Some("buildroot login:".to_string()),
                error: Some("Kernel panic".to_string()),
                vm_platform: (platform == "TX2").then(|| "tx2-vm".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_vm_platform_replaces_platform() {
        let steps = rendered(&build_script(&vm_build("TX2", 64)).steps);
        assert!(steps[0].contains("-DPLATFORM=tx2-vm"));
        assert!(steps[0].contains("-DCAMKES_VM_APP=vm_minimal"));
        assert_eq!(steps.len(), 3);
    }

    #[test]
    fn test_x86_drops_platform() {
        let steps = rendered(&build_script(&vm_build("PC99", 64)).steps);
        assert!(!steps[0].contains("-DPLATFORM="));
        // no simulation on PC99
        assert_eq!(steps.len(), 3);
    }

    #[test]
    fn test_simulation_with_failure_marker() {
        let steps = rendered(&build_script(&vm_build("QEMU_ARM_VIRT", 64)).steps);
        assert_eq!(steps.len(), 4);
        assert_eq!(
            steps[3],
            "expect -c spawn ./simulate; set timeout 1200; expect \"buildroot login:\" {exit 0} \
             \"Kernel panic\" {exit 1} timeout {exit 1}"
        );
    }

    #[test]
    fn test_capdl_images() {
        let mut build = vm_build("TX2", 64);
        capdl_images(&mut build);
        assert_eq!(build.files, vec!["images/capdl-loader-image-arm-tx2"]);
    }
}
