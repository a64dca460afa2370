// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `opsos describe` command.

use clap::{Args, Subcommand};
use miette::Result;
use opsos::{CancelToken, Mapping, StackProcessor, Value};

use crate::output::{Format, print};

/// Show fully processed stacks and components
#[derive(Debug, Args)]
pub struct CmdDescribe {
    #[clap(subcommand)]
    target: DescribeTarget,
}

#[derive(Debug, Subcommand)]
enum DescribeTarget {
    /// Show processed stacks, keyed by stack name
    Stacks {
        /// Only show this stack (name or file id)
        #[clap(short, long)]
        stack: Option<String>,

        /// Output format
        #[clap(long, value_enum, default_value_t)]
        format: Format,
    },

    /// Show the processed configuration of one component
    Component {
        /// Name of the component
        component: String,

        /// Stack holding the component (name or file id)
        #[clap(short, long)]
        stack: String,

        /// Component type; the first type declaring the component when omitted
        #[clap(short = 't', long = "type")]
        component_type: Option<String>,

        /// Output format
        #[clap(long, value_enum, default_value_t)]
        format: Format,
    },
}

impl CmdDescribe {
    pub async fn run(&mut self, processor: &StackProcessor, cancel: &CancelToken) -> Result<i32> {
        match &self.target {
            DescribeTarget::Stacks { stack, format } => {
                let stacks = match stack {
                    Some(stack) => vec![processor.find_stack(stack, cancel).await?],
                    None => processor.all_stacks(cancel).await?,
                };
                let mut described = Mapping::new();
                for stack in &stacks {
                    described.insert(stack.name.clone(), Value::from_serializable(stack)?);
                }
                print(&Value::Mapping(described), *format)?;
            }
            DescribeTarget::Component {
                component,
                stack,
                component_type,
                format,
            } => {
                let described = processor
                    .describe_component(stack, component_type.as_deref(), component, cancel)
                    .await?;
                print(&described, *format)?;
            }
        }
        Ok(0)
    }
}
