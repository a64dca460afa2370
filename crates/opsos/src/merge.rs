// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Deep merge of configuration mappings.
//!
//! Mappings are merged left to right. When both sides hold a mapping under
//! the same key the two are merged recursively, otherwise the later value
//! replaces the earlier one wholesale. Sequences are never concatenated and
//! an explicit null is an ordinary value: it overwrites, it never deletes.

use crate::value::{Mapping, Value};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./merge_test.rs"]
mod merge_test;

/// Merge `maps` in order, later maps taking precedence.
pub fn merge<'a, I>(maps: I) -> Mapping
where
    I: IntoIterator<Item = &'a Mapping>,
{
    let mut merged = Mapping::new();
    for map in maps {
        merge_into(&mut merged, map.clone());
    }
    merged
}

/// Overlay `layer` onto `target` in place.
pub fn merge_into(target: &mut Mapping, layer: Mapping) {
    for (key, value) in layer {
        match value {
            Value::Mapping(incoming) => match target.get_mut(&key) {
                Some(Value::Mapping(existing)) => merge_into(existing, incoming),
                _ => {
                    target.insert(key, Value::Mapping(incoming));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}

/// Merge a list of dynamic values that are expected to be mappings.
///
/// Null entries are skipped, as an empty document is a valid layer. Any
/// other non-mapping entry cannot take part in a structural merge.
pub fn merge_values(values: &[Value], context: &str) -> Result<Mapping> {
    let mut merged = Mapping::new();
    for (index, value) in values.iter().enumerate() {
        match value {
            Value::Null => {}
            Value::Mapping(map) => merge_into(&mut merged, map.clone()),
            other => {
                return Err(Error::MergeFailure {
                    context: context.to_string(),
                    reason: format!("layer {index} is a {}, expected a mapping", other.kind()),
                });
            }
        }
    }
    Ok(merged)
}
