// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Include/exclude path matching.

use glob::{MatchOptions, Pattern};

#[cfg(test)]
#[path = "./matcher_test.rs"]
mod matcher_test;

/// Options giving doublestar semantics: `*` stays within one path segment
/// while `**` spans any number of them.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Decides whether a slash separated relative path is selected.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    fn matches(&self, path: &str) -> bool;
}

/// Matches paths against one glob pattern.
///
/// A pattern that fails to compile never matches anything.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: Option<Pattern>,
}

impl Glob {
    /// Compile `pattern`, failing when it is not a valid glob.
    pub fn try_new(pattern: &str) -> std::result::Result<Self, glob::PatternError> {
        Ok(Self {
            pattern: Some(Pattern::new(pattern)?),
        })
    }

    pub fn new(pattern: &str) -> Self {
        let compiled = Pattern::new(pattern);
        if let Err(err) = &compiled {
            tracing::warn!("ignoring invalid glob pattern '{pattern}': {err}");
        }
        Self {
            pattern: compiled.ok(),
        }
    }
}

impl Matcher for Glob {
    fn matches(&self, path: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}

/// Inverts a matcher.
#[derive(Debug)]
pub struct Not(pub Box<dyn Matcher>);

impl Matcher for Not {
    fn matches(&self, path: &str) -> bool {
        !self.0.matches(path)
    }
}

/// Matches when every inner matcher does (vacuously true when empty).
#[derive(Debug)]
pub struct And(pub Vec<Box<dyn Matcher>>);

impl Matcher for And {
    fn matches(&self, path: &str) -> bool {
        self.0.iter().all(|m| m.matches(path))
    }
}

/// Matches when any inner matcher does (false when empty).
#[derive(Debug)]
pub struct Or(pub Vec<Box<dyn Matcher>>);

impl Matcher for Or {
    fn matches(&self, path: &str) -> bool {
        self.0.iter().any(|m| m.matches(path))
    }
}

/// Matches every path.
#[derive(Debug, Clone, Copy, Default)]
pub struct All;

impl Matcher for All {
    fn matches(&self, _path: &str) -> bool {
        true
    }
}

/// Build `included AND NOT excluded` from two lists of glob patterns.
///
/// An empty include list selects everything.
pub fn include_exclude<I, E>(included: I, excluded: E) -> Box<dyn Matcher>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
    E: IntoIterator,
    E::Item: AsRef<str>,
{
    let included: Vec<Box<dyn Matcher>> = globs(included);
    let excluded: Vec<Box<dyn Matcher>> = globs(excluded);

    let include: Box<dyn Matcher> = if included.is_empty() {
        Box::new(All)
    } else {
        Box::new(Or(included))
    };
    Box::new(And(vec![include, Box::new(Not(Box::new(Or(excluded))))]))
}

fn globs<I>(patterns: I) -> Vec<Box<dyn Matcher>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| Box::new(Glob::new(p.as_ref())) as Box<dyn Matcher>)
        .collect()
}

/// True when `pattern` contains glob metacharacters.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}
