// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Loading of stack files and resolution of their imports.

use std::sync::Arc;

use dashmap::DashSet;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use tokio::sync::OnceCell;

use crate::cache::LoadingCache;
use crate::cancel::CancelToken;
use crate::fs::Filesystem;
use crate::matcher::{Glob, Matcher, is_glob};
use crate::merge::merge_into;
use crate::value::{Mapping, MappingExt, Value};
use crate::{DEFAULT_STACK_FILE_EXTENSION, Error, Result};

#[cfg(test)]
#[path = "./loader_test.rs"]
mod loader_test;

/// Key listing the files a stack file imports.
const IMPORT_KEY: &str = "import";

/// One parsed stack file, before its imports are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackDocument {
    /// Stack name: the file path relative to the stacks base, without extension.
    pub name: String,

    /// Import patterns in declaration order.
    pub imports: Vec<String>,

    /// Every other top-level key of the file.
    pub config: Mapping,
}

impl StackDocument {
    /// Parse a stack document from YAML text.
    ///
    /// `path` is only used for error reporting.
    pub fn from_yaml<S: AsRef<str>>(
        name: &str,
        yaml: S,
        path: &std::path::Path,
    ) -> Result<Self> {
        let raw: serde_yaml::Value =
            serde_yaml::from_str(yaml.as_ref()).map_err(|error| Error::InvalidYaml {
                path: path.to_path_buf(),
                error,
            })?;

        let mut config = match Value::from(raw) {
            Value::Null => Mapping::new(),
            Value::Mapping(map) => map,
            other => {
                return Err(Error::TypeMismatch {
                    path: name.to_string(),
                    expected: "mapping",
                    found: other.kind(),
                });
            }
        };

        let imports = config.get_string_list(name, IMPORT_KEY)?;
        config.shift_remove(IMPORT_KEY);

        Ok(Self {
            name: name.to_string(),
            imports,
            config,
        })
    }
}

/// Split a user supplied stack reference into its name and file path.
///
/// `orgs/acme/dev` and `orgs/acme/dev.yaml` both yield
/// `("orgs/acme/dev", "orgs/acme/dev.yaml")`. A trailing `**` selects every
/// stack file below the directory, so `catalog/**` names `catalog/**/*.yaml`.
pub fn stack_file_name(reference: &str) -> (String, String) {
    let reference = reference.trim_start_matches("./");
    for ext in [".yaml", ".yml"] {
        if let Some(name) = reference.strip_suffix(ext) {
            return (name.to_string(), reference.to_string());
        }
    }
    let file = if reference == "**" || reference.ends_with("/**") {
        format!("{reference}/*{DEFAULT_STACK_FILE_EXTENSION}")
    } else {
        format!("{reference}{DEFAULT_STACK_FILE_EXTENSION}")
    };
    (reference.to_string(), file)
}

/// Loads stack files and folds their imports, caching everything it reads.
///
/// Each file is read and parsed at most once for the lifetime of the loader,
/// and each file's imports are merged at most once, no matter how many
/// stacks import it or how many tasks ask for it at the same time.
#[derive(Debug)]
pub struct StackLoader {
    fs: Arc<dyn Filesystem>,
    documents: LoadingCache<String, Arc<StackDocument>>,
    resolved: LoadingCache<String, Arc<Mapping>>,
    /// Files whose whole import tree is known to be free of cycles.
    acyclic: DashSet<String>,
    listing: OnceCell<Arc<Vec<String>>>,
}

impl StackLoader {
    /// Create a loader reading files from `fs`.
    ///
    /// Imports may name any file of `fs`, so it should not be narrowed by
    /// the stack include/exclude filters.
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self {
            fs,
            documents: LoadingCache::new(),
            resolved: LoadingCache::new(),
            acyclic: DashSet::new(),
            listing: OnceCell::new(),
        }
    }

    /// Number of files read and parsed so far.
    pub fn documents_loaded(&self) -> usize {
        self.documents.len()
    }

    /// Load the stack `reference` with all of its imports merged in.
    ///
    /// Imports are merged in list order and the file's own values last, so a
    /// file always overrides what it imports.
    pub async fn load(&self, reference: &str, cancel: &CancelToken) -> Result<Arc<Mapping>> {
        let (_, file) = stack_file_name(reference);
        // a cycle must be rejected before any merge slot is entered, or two
        // tasks could end up waiting on each other's slot
        self.check_imports(file.clone(), Vec::new(), cancel.clone())
            .await?;
        self.resolve_file(file, cancel.clone()).await
    }

    /// Read and parse one file through the document cache.
    pub async fn document(&self, reference: &str, cancel: &CancelToken) -> Result<Arc<StackDocument>> {
        let (name, file) = stack_file_name(reference);
        self.documents
            .get_or_try_init(&file, || async {
                tracing::debug!("reading stack file {file}");
                let fs = Arc::clone(&self.fs);
                let path = file.clone();
                let content = cancel
                    .run(async move {
                        tokio::task::spawn_blocking(move || fs.read_to_string(&path))
                            .await
                            .map_err(|err| Error::TaskFailed(err.to_string()))
                    })
                    .await?
                    .map_err(|error| self.read_error(&name, &file, error))?;
                StackDocument::from_yaml(&name, content, &self.fs.display_path(&file))
                    .map(Arc::new)
            })
            .await
    }

    /// Walk the import tree of `file`, failing on the first cycle.
    fn check_imports(
        &self,
        file: String,
        chain: Vec<String>,
        cancel: CancelToken,
    ) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.acyclic.contains(&file) {
                return Ok(());
            }
            if chain.contains(&file) {
                let mut cycle = chain;
                cycle.push(file);
                return Err(Error::CyclicReference {
                    kind: "import",
                    chain: cycle,
                });
            }

            let document = self.document(&file, &cancel).await?;
            let imports = self.import_files(&document, &cancel).await?;

            let mut chain = chain;
            chain.push(file.clone());
            try_join_all(
                imports
                    .into_iter()
                    .map(|f| self.check_imports(f, chain.clone(), cancel.clone())),
            )
            .await?;
            self.acyclic.insert(file);
            Ok(())
        }
        .boxed()
    }

    /// Merge `file` over its imports through the resolution cache.
    ///
    /// The import tree of `file` must already have passed [`Self::check_imports`].
    fn resolve_file(&self, file: String, cancel: CancelToken) -> BoxFuture<'_, Result<Arc<Mapping>>> {
        async move {
            self.resolved
                .get_or_try_init(&file, || async {
                    tracing::trace!("merging imports of stack file {file}");
                    let document = self.document(&file, &cancel).await?;
                    let import_files = self.import_files(&document, &cancel).await?;
                    let imports = try_join_all(
                        import_files
                            .into_iter()
                            .map(|f| self.resolve_file(f, cancel.clone())),
                    )
                    .await?;

                    let mut merged = Mapping::new();
                    for import in imports {
                        merge_into(&mut merged, Mapping::clone(&import));
                    }
                    merge_into(&mut merged, document.config.clone());
                    Ok(Arc::new(merged))
                })
                .await
        }
        .boxed()
    }

    /// Every file imported by `document`, in merge order.
    async fn import_files(&self, document: &StackDocument, cancel: &CancelToken) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for pattern in &document.imports {
            files.extend(self.expand_import(pattern, &document.name, cancel).await?);
        }
        Ok(files)
    }

    /// Turn one import entry into the files it names, in a stable order.
    async fn expand_import(
        &self,
        pattern: &str,
        importer: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<String>> {
        let (name, file) = stack_file_name(pattern);
        if !is_glob(&file) {
            if !self.fs.is_file(&file) {
                return Err(Error::MissingStackFile {
                    name,
                    path: self.fs.display_path(&file),
                });
            }
            return Ok(vec![file]);
        }

        let glob = Glob::try_new(&file).map_err(|err| Error::GlobResolutionFailure {
            pattern: pattern.to_string(),
            importer: importer.to_string(),
            reason: format!("is not a valid pattern: {err}"),
        })?;
        let matches: Vec<String> = self
            .all_files(cancel)
            .await?
            .iter()
            .filter(|candidate| glob.matches(candidate))
            .cloned()
            .collect();
        if matches.is_empty() {
            return Err(Error::GlobResolutionFailure {
                pattern: pattern.to_string(),
                importer: importer.to_string(),
                reason: "does not match any file".to_string(),
            });
        }
        tracing::trace!("import '{pattern}' of {importer} matched {matches:?}");
        Ok(matches)
    }

    async fn all_files(&self, cancel: &CancelToken) -> Result<Arc<Vec<String>>> {
        self.listing
            .get_or_try_init(|| async {
                let fs = Arc::clone(&self.fs);
                let files = cancel
                    .run(async move {
                        tokio::task::spawn_blocking(move || fs.list_files())
                            .await
                            .map_err(|err| Error::TaskFailed(err.to_string()))
                    })
                    .await??;
                Ok::<_, Error>(Arc::new(files))
            })
            .await
            .cloned()
    }

    fn read_error(&self, name: &str, file: &str, error: std::io::Error) -> Error {
        let path = self.fs.display_path(file);
        if error.kind() == std::io::ErrorKind::NotFound {
            Error::MissingStackFile {
                name: name.to_string(),
                path,
            }
        } else {
            Error::ReadFailed { path, error }
        }
    }
}
