//! Platform catalog.
//!
//! Static descriptors of the hardware platforms the farm builds for. The
//! catalog is loaded once at start-up and passed by reference; nothing in
//! the workspace keeps a global copy.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Instruction set family of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Arm,
    Riscv,
    X86,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            Arch::Riscv => "riscv",
            Arch::X86 => "x86",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of one hardware platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Platform {
    /// Catalog key, upper case (e.g. `TX2`). Filled in from the document key.
    #[serde(skip)]
    pub name: String,
    pub arch: Arch,
    /// Supported word sizes.
    pub modes: Vec<u32>,
    /// Word sizes in which SMP is available.
    #[serde(default)]
    pub smp: Vec<u32>,
    /// Word sizes in which the ARM hypervisor extensions are available.
    #[serde(default)]
    pub aarch_hyp: Vec<u32>,
    /// Platform identifier passed to the toolchain.
    pub platform: String,
    /// Platform part of boot image names, if different from `platform`.
    #[serde(default)]
    pub image_platform: Option<String>,
    pub march: String,
    /// Default machine requirement tags.
    #[serde(default)]
    pub req: Vec<String>,
    #[serde(default)]
    pub no_hw_test: bool,
    #[serde(default)]
    pub no_hw_build: bool,
    #[serde(default)]
    pub has_simulation: bool,
    /// Extra toolchain settings this platform always needs.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Platform {
    /// The mode of a single-mode platform.
    pub fn default_mode(&self) -> Option<u32> {
        match self.modes.as_slice() {
            [mode] => Some(*mode),
            _ => None,
        }
    }

    pub fn supports_mode(&self, mode: u32) -> bool {
        self.modes.contains(&mode)
    }

    /// Toolchain selection flag for the given mode. None for x86, which
    /// selects its toolchain from `PLATFORM` alone.
    pub fn toolchain_setting(&self, mode: u32) -> Option<&'static str> {
        match (self.arch, mode) {
            (Arch::Arm, 32) => Some("AARCH32"),
            (Arch::Arm, _) => Some("AARCH64"),
            (Arch::Riscv, 32) => Some("RISCV32"),
            (Arch::Riscv, _) => Some("RISCV64"),
            (Arch::X86, _) => None,
        }
    }

    pub fn cmake_platform(&self) -> &str {
        &self.platform
    }

    /// Compiler triple used when building with clang.
    pub fn triple(&self, mode: u32) -> &'static str {
        match (self.arch, mode) {
            (Arch::Arm, 32) => "arm-linux-gnueabi",
            (Arch::Arm, _) => "aarch64-linux-gnu",
            (Arch::Riscv, _) => "riscv64-unknown-linux-gnu",
            (Arch::X86, 32) => "i686-linux-gnu",
            (Arch::X86, _) => "x86_64-linux-gnu",
        }
    }

    pub fn isa(&self, mode: u32) -> &'static str {
        match (self.arch, mode) {
            (Arch::Arm, 32) => "arm",
            (Arch::Arm, _) => "aarch64",
            (Arch::Riscv, 32) => "riscv32",
            (Arch::Riscv, _) => "riscv64",
            (Arch::X86, 32) => "ia32",
            (Arch::X86, _) => "x86_64",
        }
    }

    /// Boot image files produced for `base` (e.g. `sel4test-driver`).
    pub fn image_names(&self, mode: u32, base: &str) -> Vec<String> {
        match self.arch {
            Arch::X86 => {
                let isa = self.isa(mode);
                vec![
                    format!("images/kernel-{isa}-pc99"),
                    format!("images/{base}-image-{isa}-pc99"),
                ]
            }
            arch => {
                let plat = self.image_platform.as_deref().unwrap_or(&self.platform);
                vec![format!("images/{base}-image-{arch}-{plat}")]
            }
        }
    }

    /// Truthiness of a named descriptor attribute; `None` if `key` is not an
    /// attribute of platforms at all.
    pub fn attribute_set(&self, key: &str) -> Option<bool> {
        let set = match key {
            "name" | "arch" | "platform" | "march" => true,
            "modes" => !self.modes.is_empty(),
            "smp" => !self.smp.is_empty(),
            "aarch_hyp" => !self.aarch_hyp.is_empty(),
            "image_platform" => self.image_platform.is_some(),
            "req" => !self.req.is_empty(),
            "no_hw_test" => self.no_hw_test,
            "no_hw_build" => self.no_hw_build,
            "has_simulation" => self.has_simulation,
            "settings" => !self.settings.is_empty(),
            _ => return None,
        };
        Some(set)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    platforms: serde_yaml::Mapping,
    #[serde(default)]
    mcs_unsupported: Vec<String>,
}

/// Immutable table of all known platforms, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    platforms: Vec<Platform>,
    mcs_unsupported: Vec<String>,
}

impl Catalog {
    pub fn new(platforms: Vec<Platform>, mcs_unsupported: Vec<String>) -> Self {
        Self {
            platforms,
            mcs_unsupported,
        }
    }

    /// Parse a catalog document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let doc: CatalogDocument = serde_yaml::from_str(content)?;
        let mut platforms = Vec::with_capacity(doc.platforms.len());

        for (key, value) in doc.platforms {
            let name = key
                .as_str()
                .ok_or_else(|| Error::Config(format!("platform key is not a string: {key:?}")))?
                .to_string();
            let mut platform: Platform = serde_yaml::from_value(value)?;
            if platform.modes.is_empty() {
                return Err(Error::Config(format!("platform {name} declares no modes")));
            }
            platform.name = name;
            platforms.push(platform);
        }

        debug!(platforms = platforms.len(), "Platform catalog loaded");
        Ok(Self::new(platforms, doc.mcs_unsupported))
    }

    /// Load a catalog from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn get(&self, name: &str) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.name == name)
    }

    pub fn get_case_insensitive(&self, name: &str) -> Option<&Platform> {
        self.platforms
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn lookup(&self, name: &str) -> Result<&Platform> {
        self.get(name)
            .ok_or_else(|| Error::UnknownPlatform(name.to_string()))
    }

    pub fn platforms(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.iter()
    }

    pub fn can_mcs(&self, platform: &str) -> bool {
        !self.mcs_unsupported.iter().any(|p| p == platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
platforms:
  TX2:
    arch: arm
    modes: [64]
    smp: [64]
    aarch_hyp: [64]
    platform: tx2
    march: armv8a
    req: [tx2a, tx2b]
  PC99:
    arch: x86
    modes: [32, 64]
    smp: [64]
    platform: pc99
    march: nehalem
    has_simulation: true
    no_hw_test: true
  HIFIVE:
    arch: riscv
    modes: [64]
    platform: hifive
    image_platform: hifive-unleashed
    march: rv64imac
mcs_unsupported: [HIFIVE]
"#;

    #[test]
    fn test_catalog_preserves_declaration_order() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        let names: Vec<_> = catalog.platforms().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["TX2", "PC99", "HIFIVE"]);
    }

    #[test]
    fn test_default_mode_only_for_single_mode_platforms() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        assert_eq!(catalog.get("TX2").unwrap().default_mode(), Some(64));
        assert_eq!(catalog.get("PC99").unwrap().default_mode(), None);
    }

    #[test]
    fn test_image_names() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        assert_eq!(
            catalog.get("PC99").unwrap().image_names(64, "sel4test-driver"),
            vec![
                "images/kernel-x86_64-pc99".to_string(),
                "images/sel4test-driver-image-x86_64-pc99".to_string(),
            ]
        );
        assert_eq!(
            catalog.get("HIFIVE").unwrap().image_names(64, "roottask"),
            vec!["images/roottask-image-riscv-hifive-unleashed".to_string()]
        );
    }

    #[test]
    fn test_toolchain_setting() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        assert_eq!(catalog.get("TX2").unwrap().toolchain_setting(64), Some("AARCH64"));
        assert_eq!(catalog.get("PC99").unwrap().toolchain_setting(64), None);
    }

    #[test]
    fn test_mcs_support_and_lookup() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        assert!(catalog.can_mcs("TX2"));
        assert!(!catalog.can_mcs("HIFIVE"));
        assert_eq!(catalog.get_case_insensitive("tx2").unwrap().name, "TX2");
        assert!(matches!(catalog.lookup("NOPE"), Err(Error::UnknownPlatform(_))));
    }

    #[test]
    fn test_attribute_set() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        let pc99 = catalog.get("PC99").unwrap();
        assert_eq!(pc99.attribute_set("has_simulation"), Some(true));
        assert_eq!(pc99.attribute_set("aarch_hyp"), Some(false));
        assert_eq!(pc99.attribute_set("colour"), None);
    }

    #[test]
    fn test_unknown_descriptor_field_rejected() {
        let doc = "platforms:\n  X:\n    arch: arm\n    modes: [32]\n    platform: x\n    march: a\n    colour: red\n";
        assert!(Catalog::from_yaml(doc).is_err());
    }
}
