// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

use clap::ValueEnum;
use miette::Result;
use opsos::Value;

/// Output format of the describe commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

pub fn print(value: &Value, format: Format) -> Result<()> {
    let text = match format {
        Format::Yaml => serde_yaml::to_string(value)
            .map_err(|e| miette::miette!("Failed to render YAML: {e}"))?,
        Format::Json => serde_json::to_string_pretty(value)
            .map_err(|e| miette::miette!("Failed to render JSON: {e}"))?,
    };
    println!("{}", text.trim_end());
    Ok(())
}
