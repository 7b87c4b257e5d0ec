//! Build definitions.
//!
//! A `Build` is one buildable/testable unit: a platform, a word size, a set
//! of toolchain settings and the markers used to judge a test run. Feature
//! flags (MCS, SMP, hyp, ...) are stored as presence of a settings key and
//! each one has a capability predicate checked against the platform.

use crate::attributes::{BuildAttributes, Requirement};
use crate::error::{Error, Result};
use crate::platform::{Arch, Catalog, Platform};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default hardware run timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 900;

const TOOLCHAIN_FLAGS: [&str; 4] = ["AARCH32", "AARCH64", "RISCV32", "RISCV64"];

const VERIFICATION: &str = "VERIFICATION";
const RELEASE: &str = "RELEASE";
const ARM_HYP: &str = "ARM_HYP";
const VTX: &str = "KernelVTX";
const TRIPLE: &str = "TRIPLE";
const MCS: &str = "MCS";
const SMP: &str = "SMP";
const DOMAINS: &str = "DOMAINS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Build {
    name: String,
    #[serde(skip)]
    platform: Platform,
    /// Whether the platform supports the scheduling-context model.
    #[serde(skip)]
    mcs_capable: bool,
    pub mode: Option<u32>,
    pub app: Option<String>,
    pub req: Option<Requirement>,
    pub success: Option<String>,
    pub error: Option<String>,
    pub settings: BTreeMap<String, String>,
    pub timeout: u64,
    pub no_hw_test: bool,
    pub image_base_name: Option<String>,
    pub vm_platform: Option<String>,
    pub l4v_arch: Option<String>,
    /// Boot image files, relative to the build directory.
    pub files: Vec<String>,
}

impl Build {
    /// Construct a build from merged attributes. Fails if the name is empty
    /// or the platform is missing from the catalog.
    pub fn from_attributes(
        name: impl Into<String>,
        attrs: &BuildAttributes,
        catalog: &Catalog,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Config("build name must not be empty".to_string()));
        }
        let platform_name = attrs
            .platform
            .as_deref()
            .ok_or_else(|| Error::Config(format!("build {name} has no platform")))?;
        let platform = catalog.lookup(platform_name)?.clone();

        let mut build = Self {
            mcs_capable: catalog.can_mcs(&platform.name),
            platform,
            name,
            mode: attrs.mode,
            app: attrs.app.clone(),
            req: attrs.req.clone(),
            success: attrs.success.clone(),
            error: attrs.error.clone(),
            settings: attrs.settings.clone(),
            timeout: attrs.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            no_hw_test: attrs.no_hw_test.unwrap_or(false),
            image_base_name: attrs.image_base_name.clone(),
            vm_platform: attrs.vm_platform.clone(),
            l4v_arch: attrs.l4v_arch.clone(),
            files: vec![],
        };

        if build.mode().is_some() {
            build.update_settings();
        }
        Ok(build)
    }

    /// Copy of this build named `<name>_<suffix>`. An empty suffix keeps the name.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let mut build = self.clone();
        if !suffix.is_empty() {
            build.name = format!("{}_{}", self.name, suffix);
        }
        build
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Resolved word size: the build's own, else the platform's single mode.
    pub fn mode(&self) -> Option<u32> {
        self.mode.or_else(|| self.platform.default_mode())
    }

    /// Re-derive the mode-dependent settings and image names.
    pub fn update_settings(&mut self) {
        let Some(mode) = self.mode() else {
            return;
        };

        for flag in TOOLCHAIN_FLAGS {
            self.settings.remove(flag);
        }
        if let Some(flag) = self.platform.toolchain_setting(mode) {
            self.set(flag);
        }
        self.settings
            .insert("PLATFORM".to_string(), self.platform.cmake_platform().to_string());
        // parsable (xml) test output
        self.set("BAMBOO");

        self.files = match &self.image_base_name {
            Some(base) => self.platform.image_names(mode, base),
            None => vec![],
        };

        if self.req.as_ref().is_some_and(Requirement::is_sim) {
            self.set("SIMULATION");
        }
    }

    /// Toolchain arguments `-Dkey=value`; platform settings override build settings.
    pub fn settings_args(&self) -> Vec<String> {
        let mut all = self.settings.clone();
        all.extend(
            self.platform
                .settings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        all.iter().map(|(k, v)| format!("-D{k}={v}")).collect()
    }

    pub fn insert_setting(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn remove_setting(&mut self, key: &str) -> Option<String> {
        self.settings.remove(key)
    }

    fn set(&mut self, key: &str) {
        self.settings.insert(key.to_string(), "TRUE".to_string());
    }

    fn has(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    pub fn set_verification(&mut self) {
        self.set(VERIFICATION);
    }

    pub fn is_verification(&self) -> bool {
        self.has(VERIFICATION)
    }

    pub fn can_release(&self) -> bool {
        // release images do not boot on the RPI3 test boards
        self.platform.name != "RPI3"
    }

    pub fn set_release(&mut self) -> Result<()> {
        if !self.can_release() {
            return Err(Error::validation("release not supported"));
        }
        self.set(RELEASE);
        Ok(())
    }

    pub fn is_release(&self) -> bool {
        self.has(RELEASE)
    }

    pub fn is_debug(&self) -> bool {
        !self.is_release() && !self.is_verification()
    }

    pub fn can_hyp(&self) -> bool {
        self.platform.name == "PC99" || self.mode().is_some_and(|m| self.platform.aarch_hyp.contains(&m))
    }

    pub fn set_hyp(&mut self) -> Result<()> {
        if !self.can_hyp() {
            return Err(Error::validation("hyp mode not supported"));
        }
        if self.mode().is_some_and(|m| self.platform.aarch_hyp.contains(&m)) {
            self.set(ARM_HYP);
        } else {
            self.set(VTX);
        }
        Ok(())
    }

    pub fn is_hyp(&self) -> bool {
        self.has(ARM_HYP) || self.has(VTX)
    }

    pub fn set_clang(&mut self) -> Result<()> {
        let mode = self
            .mode()
            .ok_or_else(|| Error::validation("clang needs a resolved mode"))?;
        let triple = self.platform.triple(mode);
        self.settings.insert(TRIPLE.to_string(), triple.to_string());
        Ok(())
    }

    pub fn is_clang(&self) -> bool {
        self.has(TRIPLE)
    }

    pub fn is_gcc(&self) -> bool {
        !self.is_clang()
    }

    pub fn can_mcs(&self) -> bool {
        self.mcs_capable
    }

    pub fn set_mcs(&mut self) -> Result<()> {
        if !self.can_mcs() {
            return Err(Error::validation("MCS not supported"));
        }
        self.set(MCS);
        Ok(())
    }

    pub fn is_mcs(&self) -> bool {
        self.has(MCS)
    }

    /// SMP needs a multicore mode and excludes multiple scheduling domains.
    pub fn can_smp(&self) -> bool {
        self.mode().is_some_and(|m| self.platform.smp.contains(&m)) && !self.is_domains()
    }

    pub fn set_smp(&mut self) -> Result<()> {
        if !self.can_smp() {
            return Err(Error::validation("SMP not supported"));
        }
        self.set(SMP);
        Ok(())
    }

    pub fn is_smp(&self) -> bool {
        self.has(SMP)
    }

    pub fn can_domains(&self) -> bool {
        !self.is_smp()
    }

    pub fn set_domains(&mut self) -> Result<()> {
        if !self.can_domains() {
            return Err(Error::validation("domains not supported with SMP"));
        }
        self.set(DOMAINS);
        Ok(())
    }

    pub fn is_domains(&self) -> bool {
        self.has(DOMAINS)
    }

    /// Structural check plus a re-check of every enabled flag.
    pub fn validate(&self) -> Result<()> {
        if self.image_base_name.as_deref().is_none_or(str::is_empty) {
            return Err(Error::validation("no image base name"));
        }
        let Some(mode) = self.mode() else {
            return Err(Error::validation("no unique mode"));
        };
        if !self.platform.supports_mode(mode) {
            return Err(Error::validation(format!(
                "mode {mode} not supported by {}",
                self.platform.name
            )));
        }
        if self.is_mcs() && !self.can_mcs() {
            return Err(Error::validation("MCS not supported"));
        }
        if self.is_smp() && !self.mode().is_some_and(|m| self.platform.smp.contains(&m)) {
            return Err(Error::validation("SMP not supported"));
        }
        if self.is_release() && !self.can_release() {
            return Err(Error::validation("release not supported"));
        }
        if self.is_hyp() && !self.can_hyp() {
            return Err(Error::validation("hyp mode not supported"));
        }
        if self.is_domains() && !self.can_domains() {
            return Err(Error::validation("domains not supported with SMP"));
        }
        Ok(())
    }

    /// Hardware runs are off for this build or its whole platform.
    pub fn is_disabled(&self) -> bool {
        self.no_hw_test || self.platform.no_hw_test
    }

    /// Machine requirement tags: the build's own, else the platform's.
    pub fn requirements(&self) -> Vec<String> {
        match &self.req {
            Some(req) => {
                let tags = req.tags();
                if tags.is_empty() {
                    self.platform.req.clone()
                } else {
                    tags
                }
            }
            None => self.platform.req.clone(),
        }
    }

    pub fn isa(&self) -> Option<&'static str> {
        self.mode().map(|m| self.platform.isa(m))
    }

    pub fn arch(&self) -> Arch {
        self.platform.arch
    }
}

impl std::fmt::Display for Build {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Build('{}': {{'platform': {}, 'mode': {}, 'req': {:?}, 'app': {:?}, 'settings': {:?}, 'success': {:?}, 'base': {:?}}})",
            self.name,
            self.platform.name,
            self.mode().map_or_else(|| "None".to_string(), |m| m.to_string()),
            self.req,
            self.app,
            self.settings,
            self.success,
            self.image_base_name,
        )
    }
}
