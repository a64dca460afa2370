// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! opsos - Infrastructure Stack Orchestrator CLI

use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use opsos::{CancelToken, Config, ProviderRegistry, StackProcessor};

mod cmd_describe;
mod cmd_list;
mod cmd_workspace;
mod output;

use cmd_describe::CmdDescribe;
use cmd_list::CmdList;
use cmd_workspace::CmdWorkspace;

#[derive(Parser)]
#[clap(
    name = "opsos",
    about = "Infrastructure stack orchestrator",
    version,
    long_about = "Resolve layered stack configuration for Terraform, Helmfile and kind components"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

impl Logging {
    /// Flags win; without any, the configured level applies.
    fn level(&self, configured: Option<&str>) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, 3..) => tracing::Level::TRACE,
            (false, 0) => configured
                .and_then(|level| level.parse().ok())
                .unwrap_or(tracing::Level::WARN),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List stacks
    List(CmdList),

    /// Show fully processed stacks and components
    Describe(CmdDescribe),

    /// Print the terraform workspace of a component
    Workspace(CmdWorkspace),
}

impl Opt {
    async fn run(self) -> Result<i32> {
        let config = Config::load()?;

        tracing_subscriber::fmt()
            .with_max_level(self.logging.level(config.logs.level.as_deref()))
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("using configuration {config:?}");

        let registry = Arc::new(ProviderRegistry::with_defaults(&config));
        let processor = StackProcessor::from_config(&config, registry);

        let cancel = CancelToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                on_interrupt.cancel();
            }
        });

        match self.cmd {
            Command::List(mut cmd) => cmd.run(&processor, &cancel).await,
            Command::Describe(mut cmd) => cmd.run(&processor, &cancel).await,
            Command::Workspace(mut cmd) => cmd.run(&processor, &cancel).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run().await?;
    std::process::exit(code);
}
