// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Read-only filesystem views used to enumerate and read stack files.
//!
//! All paths handed to a [`Filesystem`] are relative, `/` separated names
//! such as `orgs/acme/dev.yaml`.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::matcher::Matcher;

#[cfg(test)]
#[path = "./fs_test.rs"]
mod fs_test;

/// Minimal filesystem abstraction consumed by the stack loader.
pub trait Filesystem: Send + Sync + std::fmt::Debug {
    /// Read the whole file at `path`.
    fn read_to_string(&self, path: &str) -> std::io::Result<String>;

    fn is_file(&self, path: &str) -> bool;

    fn is_dir(&self, path: &str) -> bool;

    /// Every regular file reachable from the root, sorted.
    fn list_files(&self) -> std::io::Result<Vec<String>>;

    /// Where `path` lives on disk, for diagnostics.
    fn display_path(&self, path: &str) -> PathBuf;
}

/// A directory on the local disk used as the filesystem root.
#[derive(Debug, Clone)]
pub struct BasePathFs {
    root: PathBuf,
}

impl BasePathFs {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            root: dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Filesystem for BasePathFs {
    fn read_to_string(&self, path: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.resolve(path))
    }

    fn is_file(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }

    fn list_files(&self) -> std::io::Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            files.push(to_slash(relative));
        }
        files.sort();
        Ok(files)
    }

    fn display_path(&self, path: &str) -> PathBuf {
        self.resolve(path)
    }
}

/// A view of another filesystem exposing only the files a matcher accepts.
///
/// Directories are always visible so that the tree can be traversed.
#[derive(Debug)]
pub struct MatcherFs<F> {
    source: F,
    matcher: Box<dyn Matcher>,
}

impl<F: Filesystem> MatcherFs<F> {
    pub fn new(source: F, matcher: Box<dyn Matcher>) -> Self {
        Self { source, matcher }
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    fn check(&self, path: &str) -> std::io::Result<()> {
        if self.matcher.matches(path) {
            Ok(())
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{path} is excluded by the path filters"),
            ))
        }
    }
}

impl<F: Filesystem> Filesystem for MatcherFs<F> {
    fn read_to_string(&self, path: &str) -> std::io::Result<String> {
        self.check(path)?;
        self.source.read_to_string(path)
    }

    fn is_file(&self, path: &str) -> bool {
        self.matcher.matches(path) && self.source.is_file(path)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.source.is_dir(path)
    }

    fn list_files(&self) -> std::io::Result<Vec<String>> {
        Ok(self
            .source
            .list_files()?
            .into_iter()
            .filter(|f| self.matcher.matches(f))
            .collect())
    }

    fn display_path(&self, path: &str) -> PathBuf {
        self.source.display_path(path)
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
