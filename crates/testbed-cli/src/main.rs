//! Testbed CLI entrypoint.

use anyhow::Context as _;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use testbed_core::EnvSnapshot;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod drivers;
mod output;

use commands::{Commands, Mode, Project, Target};
use config::DriverConfig;
use drivers::Context;

#[derive(Parser, Debug)]
#[command(name = "testbed")]
#[command(author, version, about = "Build, simulate and hardware-test seL4 projects", long_about = None)]
struct Cli {
    /// Driver configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit diagnostics as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // stdout belongs to the build output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_project(ctx: &Context, project: Project, mode: Mode) -> testbed_core::Result<u8> {
    match project {
        Project::Sel4test => drivers::sel4test::run(ctx, mode).await,
        Project::Sel4testSim => drivers::sel4test_sim::run(ctx, mode).await,
        Project::Camkes => drivers::camkes::run(ctx, mode).await,
        Project::CamkesVm => drivers::camkes_vm::run(ctx, mode).await,
        Project::Webserver => drivers::webserver::run(ctx, mode).await,
        Project::RumpHello => drivers::rump_hello::run(ctx, mode).await,
        Project::Tutorials => drivers::tutorials::run(ctx, mode).await,
        Project::Cparser => drivers::cparser::run(ctx, mode).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    if let Target::Project(project, mode) = cli.command.target() {
        if !project.supports(mode) {
            Cli::command()
                .error(
                    ErrorKind::ArgumentConflict,
                    format!("{mode} is not supported for {project}"),
                )
                .exit();
        }
    }

    let env = EnvSnapshot::capture();
    let config = DriverConfig::load(cli.config.as_deref(), &env)
        .context("Failed to load driver configuration")?;
    let catalog_path = config.catalog.clone();
    let ctx = Context::load(config, env)
        .with_context(|| format!("Failed to load platform catalog {}", catalog_path.display()))?;

    let code = match cli.command.target() {
        Target::March(platform) => drivers::march::run(&ctx.catalog, &ctx.env, platform)?,
        Target::Project(project, mode) => run_project(&ctx, project, mode)
            .await
            .with_context(|| format!("{project} {mode} failed"))?,
    };

    Ok(ExitCode::from(code))
}
