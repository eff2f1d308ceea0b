//! Target path checks run before any file is read or rewritten.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directories under the workspace root that are never patched.
const FORBIDDEN_IN_WORKSPACE: &[&str] = &["target", ".git"];

/// Directories under the user's home that hold toolchains and dependency sources.
const FORBIDDEN_IN_HOME: &[&str] = &[".cargo/registry", ".cargo/git", ".rustup"];

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("Cannot resolve {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Confines patch targets to a workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
    forbidden: Vec<PathBuf>,
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize().map_err(|source| SafetyError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

impl WorkspaceGuard {
    /// Canonicalize `root` and collect the forbidden directories that exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = canonicalize(root.as_ref())?;

        let in_workspace = FORBIDDEN_IN_WORKSPACE.iter().map(|dir| root.join(dir));
        let in_home = home::home_dir()
            .into_iter()
            .flat_map(|home| FORBIDDEN_IN_HOME.iter().map(move |dir| home.join(dir)));

        // Directories that don't exist can't contain a target
        let forbidden = in_workspace
            .chain(in_home)
            .filter_map(|dir| dir.canonicalize().ok())
            .collect();

        Ok(Self { root, forbidden })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a target path and confirm it may be patched.
    ///
    /// Relative paths are taken from the workspace root. Symlinks are resolved
    /// before the boundary check, so a link pointing out of the workspace is
    /// rejected. Returns the canonical path.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let canonical = canonicalize(&absolute)?;

        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical,
                workspace: self.root.clone(),
            });
        }

        if let Some(forbidden) = self.forbidden.iter().find(|dir| canonical.starts_with(dir)) {
            return Err(SafetyError::ForbiddenPath {
                path: canonical,
                forbidden: forbidden.clone(),
            });
        }

        if !canonical.is_file() {
            return Err(SafetyError::NotAFile(canonical));
        }

        Ok(canonical)
    }
}
