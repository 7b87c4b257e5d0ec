//! CLI command definitions.

use clap::{ArgGroup, Args, Subcommand};
use std::fmt;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// seL4 test suite: hardware builds and runs
    Sel4test(ModeArgs),

    /// seL4 test suite in simulation
    #[command(name = "sel4test-sim")]
    Sel4testSim(ModeArgs),

    /// CAmkES tests: toolchain builds and simulation batches
    Camkes(ModeArgs),

    /// CAmkES VM applications
    #[command(name = "camkes-vm")]
    CamkesVm(ModeArgs),

    /// seL4 web server application
    Webserver(ModeArgs),

    /// Rumprun hello world
    #[command(name = "rump-hello")]
    RumpHello(ModeArgs),

    /// seL4 tutorials
    Tutorials(ModeArgs),

    /// C parser run on the preprocessed kernel
    Cparser(ModeArgs),

    /// Print the micro-architecture of a platform as step output
    March {
        /// Platform name, any case
        platform: String,
    },
}

/// What a command line asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    March(&'a str),
    Project(Project, Mode),
}

impl Commands {
    pub fn target(&self) -> Target<'_> {
        let (project, args) = match self {
            Commands::Sel4test(args) => (Project::Sel4test, args),
            Commands::Sel4testSim(args) => (Project::Sel4testSim, args),
            Commands::Camkes(args) => (Project::Camkes, args),
            Commands::CamkesVm(args) => (Project::CamkesVm, args),
            Commands::Webserver(args) => (Project::Webserver, args),
            Commands::RumpHello(args) => (Project::RumpHello, args),
            Commands::Tutorials(args) => (Project::Tutorials, args),
            Commands::Cparser(args) => (Project::Cparser, args),
            Commands::March { platform } => return Target::March(platform),
        };
        Target::Project(project, args.mode())
    }
}

/// What to do with the project's builds. At most one may be given.
#[derive(Args, Debug, Default)]
#[command(group(ArgGroup::new("mode").multiple(false)))]
pub struct ModeArgs {
    /// Print the resolved builds
    #[arg(long, group = "mode")]
    pub dump: bool,

    /// Publish the CI job matrix
    #[arg(long, group = "mode")]
    pub matrix: bool,

    /// Run the builds on hardware
    #[arg(long, group = "mode")]
    pub hw: bool,

    /// Release machine locks held by this job
    #[arg(long, group = "mode")]
    pub post: bool,

    /// Build (and simulate where supported); the default
    #[arg(long, group = "mode")]
    pub build: bool,
}

impl ModeArgs {
    pub fn mode(&self) -> Mode {
        if self.dump {
            Mode::Dump
        } else if self.matrix {
            Mode::Matrix
        } else if self.hw {
            Mode::Hw
        } else if self.post {
            Mode::Post
        } else {
            Mode::Build
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dump,
    Matrix,
    Hw,
    Post,
    Build,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = match self {
            Mode::Dump => "--dump",
            Mode::Matrix => "--matrix",
            Mode::Hw => "--hw",
            Mode::Post => "--post",
            Mode::Build => "--build",
        };
        f.write_str(flag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Project {
    Sel4test,
    Sel4testSim,
    Camkes,
    CamkesVm,
    Webserver,
    RumpHello,
    Tutorials,
    Cparser,
}

impl Project {
    /// Directory holding the project's `builds.yml`.
    pub fn dir(&self) -> &'static str {
        match self {
            Project::Sel4test => "sel4test-hw",
            Project::Sel4testSim => "sel4test-sim",
            Project::Camkes => "camkes-test",
            Project::CamkesVm => "camkes-vm",
            Project::Webserver => "webserver",
            Project::RumpHello => "rump-hello",
            Project::Tutorials => "tutorials",
            Project::Cparser => "cparser-run",
        }
    }

    pub fn supports(&self, mode: Mode) -> bool {
        use Mode::*;
        match self {
            Project::Sel4test | Project::Camkes => true,
            Project::CamkesVm | Project::Webserver | Project::RumpHello => {
                matches!(mode, Dump | Hw | Post | Build)
            }
            Project::Tutorials => matches!(mode, Dump | Matrix | Build),
            Project::Sel4testSim | Project::Cparser => matches!(mode, Dump | Build),
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Project::Sel4test => "sel4test",
            Project::Sel4testSim => "sel4test-sim",
            Project::Camkes => "camkes",
            Project::CamkesVm => "camkes-vm",
            Project::Webserver => "webserver",
            Project::RumpHello => "rump-hello",
            Project::Tutorials => "tutorials",
            Project::Cparser => "cparser",
        };
        f.write_str(name)
    }
}
