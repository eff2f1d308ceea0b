use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use xxhash_rust::xxh3::xxh3_64;

/// A verified byte-span replacement within one file.
///
/// Spans are computed from an earlier read of the file. Before anything is
/// written the span is checked against the current contents, so a file that
/// changed in between is rejected instead of overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until it is applied through FileEdits"]
pub struct Edit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Text written over [byte_start, byte_end)
    pub new_text: String,
    /// What the span must contain before the edit lands
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    ExactMatch(String),
    /// xxh3 hash of expected text (spans over 1KB)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("{file} changed since it was read: span [{byte_start}, {byte_end}) no longer matches")]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in file of length {file_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        file_len: usize,
    },

    #[error("Overlapping edits: span ending at {first_end} runs past span starting at {second_start}")]
    Overlapping {
        first_end: usize,
        second_start: usize,
    },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 validation error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("{file} changed since it was read")]
    SourceChanged { file: PathBuf },

    #[error("Invalid edit would create malformed UTF-8")]
    InvalidUtf8Edit,
}

/// Result of applying a set of edits to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for applied/unchanged"]
pub enum EditResult {
    Applied {
        file: PathBuf,
        edits: usize,
    },
    /// Nothing to apply; the file was not touched
    Unchanged { file: PathBuf },
}

impl Edit {
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self::with_verification(
            byte_start,
            byte_end,
            new_text,
            EditVerification::from_text(expected_before.as_ref()),
        )
    }

    pub fn with_verification(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        verification: EditVerification,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: verification,
        }
    }

    /// Check the span against the current file contents.
    fn validate(&self, file: &Path, content: &[u8]) -> Result<(), EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                file_len: content.len(),
            });
        }

        let current_text = std::str::from_utf8(&content[self.byte_start..self.byte_end])?;
        if !self.expected_before.matches(current_text) {
            return Err(EditError::BeforeTextMismatch {
                file: file.to_path_buf(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current_text.to_string(),
            });
        }

        Ok(())
    }
}

/// Edits bound for a single file, landed in one atomic write.
#[derive(Debug, Clone)]
pub struct FileEdits {
    file: PathBuf,
    edits: Vec<Edit>,
    source: Option<EditVerification>,
}

impl FileEdits {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            edits: Vec::new(),
            source: None,
        }
    }

    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Require the whole file to still equal `source` when the edits land,
    /// not just the edited spans.
    pub fn pin_source(&mut self, source: &str) {
        self.source = Some(EditVerification::from_text(source));
    }

    /// Verify every span against the file on disk, then splice all edits
    /// bottom-to-top and write the result atomically.
    ///
    /// Any verification failure aborts before the file is touched.
    pub fn apply(mut self) -> Result<EditResult, EditError> {
        if self.edits.is_empty() {
            return Ok(EditResult::Unchanged { file: self.file });
        }

        // Descending by byte_start so earlier offsets stay valid while splicing
        self.edits.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

        let mut content = fs::read(&self.file)?;

        if let Some(source) = &self.source {
            let current = std::str::from_utf8(&content)?;
            if !source.matches(current) {
                return Err(EditError::SourceChanged { file: self.file });
            }
        }

        for edit in &self.edits {
            edit.validate(&self.file, &content)?;
        }

        for window in self.edits.windows(2) {
            let (later, earlier) = (&window[0], &window[1]);
            if earlier.byte_end > later.byte_start {
                return Err(EditError::Overlapping {
                    first_end: earlier.byte_end,
                    second_start: later.byte_start,
                });
            }
        }

        for edit in &self.edits {
            content.splice(
                edit.byte_start..edit.byte_end,
                edit.new_text.as_bytes().iter().copied(),
            );
        }

        std::str::from_utf8(&content).map_err(|_| EditError::InvalidUtf8Edit)?;

        atomic_write(&self.file, &content)?;

        // Bump mtime so incremental builds notice the rewrite
        filetime::set_file_mtime(&self.file, filetime::FileTime::now())?;

        info!(
            file = %self.file.display(),
            edits = self.edits.len(),
            bytes = content.len(),
            "wrote patched file"
        );

        Ok(EditResult::Applied {
            file: self.file,
            edits: self.edits.len(),
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write lands or the original file is left as it was. The
/// rename itself only needs a writable directory, so an existing file is
/// opened for writing first and a write-protected target fails with
/// `PermissionDenied` like a plain write would.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    match OpenOptions::new().write(true).open(path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Same directory keeps the rename on one filesystem
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    // Keep the original file's permissions across the rename
    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
