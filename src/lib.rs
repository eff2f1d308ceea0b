//! Backend Patcher: regex-driven method insertion for Rust sources
//!
//! Finds every occurrence of a declaration pattern in a source file and
//! inserts a method definition right after it, before the enclosing block's
//! closing brace. The built-in rule adds a `get_quantity_step` stub after each
//! mock backend's `backend_name`.
//!
//! # Architecture
//!
//! - [`InsertionRule`] turns source text into a [`Transform`]: the rewritten
//!   text plus one [`MatchSpan`] per match. No I/O.
//! - [`Patcher`] reads the target, plans the transform, and commits it as
//!   verified byte-span [`Edit`]s in a single atomic write.
//! - [`config`] loads rule files; [`WorkspaceGuard`] keeps targets inside the
//!   workspace.
//!
//! Matching is textual, not syntax-aware. Zero matches is a successful no-op;
//! check [`PatchReport::matches`] when completeness matters.
//!
//! # Example
//!
//! ```no_run
//! use backend_patcher::{InsertionRule, Patcher};
//!
//! let report = Patcher::new("src/strategy/atomic_execution.rs", InsertionRule::quantity_step())
//!     .run()?;
//! println!("{report}");
//! # Ok::<(), backend_patcher::PatchError>(())
//! ```

pub mod config;
pub mod edit;
pub mod patcher;
pub mod rule;
pub mod safety;
pub mod validate;

// Re-exports
pub use config::{
    load_from_path, load_from_str, ConfigError, PatchConfig, RuleDefinition, RuleFileError,
};
pub use edit::{Edit, EditError, EditResult, EditVerification, FileEdits};
pub use patcher::{PatchError, PatchOptions, PatchReport, Patcher, Plan};
pub use rule::{InsertionRule, MatchSpan, Replacement, RuleError, Transform};
pub use safety::{SafetyError, WorkspaceGuard};
pub use validate::ValidationError;
