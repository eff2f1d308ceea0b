pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ConfigError, RuleFileError};
pub use schema::{Metadata, PatchConfig, RuleDefinition, ValidationError, ValidationIssue};
