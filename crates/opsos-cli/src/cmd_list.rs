// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `opsos list` command.

use clap::{Args, Subcommand};
use colored::Colorize;
use miette::Result;
use opsos::{CancelToken, StackProcessor};

/// List stacks
#[derive(Debug, Args)]
pub struct CmdList {
    #[clap(subcommand)]
    target: ListTarget,
}

#[derive(Debug, Subcommand)]
enum ListTarget {
    /// List every stack by name
    Stacks {
        /// Show the stack file id next to each name
        #[clap(long)]
        ids: bool,
    },
}

impl CmdList {
    pub async fn run(&mut self, processor: &StackProcessor, cancel: &CancelToken) -> Result<i32> {
        match self.target {
            ListTarget::Stacks { ids } => {
                let stacks = processor.all_stacks(cancel).await?;
                if stacks.is_empty() {
                    println!("{}", "(no stacks)".dimmed());
                }
                for stack in stacks {
                    if ids && stack.id != stack.name {
                        println!("{} {}", stack.name.green(), stack.id.dimmed());
                    } else {
                        println!("{}", stack.name.green());
                    }
                }
            }
        }
        Ok(0)
    }
}
