// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `opsos workspace` command.

use clap::Args;
use miette::Result;
use opsos::{CancelToken, StackProcessor};

/// Print the terraform workspace of a component
#[derive(Debug, Args)]
pub struct CmdWorkspace {
    /// Name of the terraform component
    component: String,

    /// Stack holding the component (name or file id)
    #[clap(short, long)]
    stack: String,
}

impl CmdWorkspace {
    pub async fn run(&mut self, processor: &StackProcessor, cancel: &CancelToken) -> Result<i32> {
        let workspace = processor
            .workspace(&self.stack, &self.component, cancel)
            .await?;
        println!("{workspace}");
        Ok(0)
    }
}
