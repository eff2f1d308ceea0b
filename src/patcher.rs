//! The patcher: read a target file, apply one insertion rule, write it back.
//!
//! A run is split into [`Patcher::plan`], which reads and transforms without
//! side effects, and [`Patcher::commit`], which lands the planned insertions.
//! [`Patcher::run`] does both.

use crate::edit::{EditError, EditResult, FileEdits};
use crate::rule::{InsertionRule, MatchSpan, Transform};
use crate::validate::{self, ValidationError};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8: {source}")]
    Decode {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },

    #[error("failed to write {path}: {source}")]
    Edit { path: PathBuf, source: EditError },

    #[error("expected {expected} insertions in {path}, found {found}")]
    CountMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("patched {path} does not parse: {source}")]
    Syntax {
        path: PathBuf,
        source: ValidationError,
    },
}

/// Behavior switches for a run. The default reproduces a plain
/// substitution: no guard, no count check, no syntax check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOptions {
    /// Skip matches whose impl block already contains the rule's guard text
    pub skip_existing: bool,
    /// Required number of insertions
    pub expect: Option<usize>,
    /// Parse the patched content with syn before writing
    pub check_syntax: bool,
}

/// Applies one [`InsertionRule`] to one file.
#[derive(Debug, Clone)]
pub struct Patcher {
    target: PathBuf,
    rule: InsertionRule,
    options: PatchOptions,
}

/// A computed but unwritten patch.
#[derive(Debug, Clone)]
pub struct Plan {
    pub file: PathBuf,
    pub original: String,
    pub transform: Transform,
}

impl Plan {
    pub fn is_unchanged(&self) -> bool {
        self.transform.is_unchanged()
    }

    fn into_report(self, written: bool) -> PatchReport {
        PatchReport {
            file: self.file,
            inserted: self.transform.inserted(),
            matches: self.transform.matches,
            written,
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchReport carries the match count; zero matches is not an error"]
pub struct PatchReport {
    pub file: PathBuf,
    pub matches: Vec<MatchSpan>,
    pub inserted: usize,
    /// Whether the file on disk was rewritten
    pub written: bool,
}

impl PatchReport {
    pub fn skipped(&self) -> usize {
        self.matches.iter().filter(|m| m.skipped).count()
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} matched, {} inserted, {} skipped",
            self.file.display(),
            self.matches.len(),
            self.inserted,
            self.skipped()
        )
    }
}

impl Patcher {
    pub fn new(target: impl Into<PathBuf>, rule: InsertionRule) -> Self {
        Self {
            target: target.into(),
            rule,
            options: PatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Read the target and compute the rewritten content without writing.
    ///
    /// Count and syntax checks run here, so a plan that comes back `Ok` is
    /// one `commit` is allowed to write.
    pub fn plan(&self) -> Result<Plan, PatchError> {
        let bytes = fs::read(&self.target).map_err(|source| PatchError::Io {
            path: self.target.clone(),
            source,
        })?;
        let original = String::from_utf8(bytes).map_err(|source| PatchError::Decode {
            path: self.target.clone(),
            source,
        })?;

        let transform = self.rule.apply(&original, self.options.skip_existing);
        debug!(
            file = %self.target.display(),
            matched = transform.matches.len(),
            inserted = transform.inserted(),
            "planned patch"
        );

        if let Some(expected) = self.options.expect {
            if transform.inserted() != expected {
                return Err(PatchError::CountMismatch {
                    path: self.target.clone(),
                    expected,
                    found: transform.inserted(),
                });
            }
        }

        if self.options.check_syntax && !transform.is_unchanged() {
            validate::validate_file(&transform.content).map_err(|source| {
                PatchError::Syntax {
                    path: self.target.clone(),
                    source,
                }
            })?;
        }

        Ok(Plan {
            file: self.target.clone(),
            original,
            transform,
        })
    }

    /// Write a plan's insertions back to its file.
    ///
    /// Each insertion is re-verified against the file on disk, so a file that
    /// changed after `plan` fails with [`EditError::BeforeTextMismatch`]
    /// rather than losing the other writer's update. With `check_syntax` the
    /// whole file must still match the checked plan, since an edit outside the
    /// matched spans would otherwise land unchecked. A plan with nothing to
    /// insert leaves the file untouched.
    pub fn commit(&self, plan: Plan) -> Result<PatchReport, PatchError> {
        if plan.is_unchanged() {
            debug!(file = %plan.file.display(), "nothing to insert, leaving file untouched");
            return Ok(plan.into_report(false));
        }

        let mut edits = FileEdits::new(&plan.file);
        for replacement in &plan.transform.replacements {
            edits.push(replacement.to_edit());
        }
        if self.options.check_syntax {
            edits.pin_source(&plan.original);
        }

        let written = match edits.apply() {
            Ok(EditResult::Applied { edits, .. }) => {
                debug!(file = %plan.file.display(), edits, "committed patch");
                true
            }
            Ok(EditResult::Unchanged { .. }) => false,
            Err(source) => {
                return Err(PatchError::Edit {
                    path: plan.file,
                    source,
                })
            }
        };

        Ok(plan.into_report(written))
    }

    /// Plan and commit in one step.
    pub fn run(&self) -> Result<PatchReport, PatchError> {
        let plan = self.plan()?;
        self.commit(plan)
    }
}
