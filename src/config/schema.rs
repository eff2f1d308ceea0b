use crate::rule::{
    InsertionRule, RuleError, DEFAULT_TARGET, QUANTITY_STEP_GUARD, QUANTITY_STEP_MESSAGE,
    QUANTITY_STEP_METHOD, QUANTITY_STEP_PATTERN,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl PatchConfig {
    /// The built-in configuration: one quantity-step rule against
    /// `src/strategy/atomic_execution.rs`.
    pub fn builtin() -> Self {
        Self {
            meta: Metadata {
                name: "quantity-step".to_string(),
                description: Some(
                    "Add a get_quantity_step stub to mock execution backends".to_string(),
                ),
                workspace_relative: true,
            },
            rules: vec![RuleDefinition {
                id: "get-quantity-step".to_string(),
                file: DEFAULT_TARGET.to_string(),
                pattern: QUANTITY_STEP_PATTERN.to_string(),
                insert: QUANTITY_STEP_METHOD.to_string(),
                separator: None,
                guard: Some(QUANTITY_STEP_GUARD.to_string()),
                message: Some(QUANTITY_STEP_MESSAGE.to_string()),
                expect: None,
            }],
        }
    }

    /// Resolve a rule's target file against the workspace root.
    pub fn resolve_target(&self, rule: &RuleDefinition, workspace_root: &Path) -> PathBuf {
        if self.meta.workspace_relative {
            workspace_root.join(&rule.file)
        } else {
            PathBuf::from(&rule.file)
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyRuleList);
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            let rule_id = (!rule.id.trim().is_empty()).then(|| rule.id.clone());

            if rule_id.is_none() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "id",
                });
            } else if !seen.insert(rule.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId(rule.id.clone()));
            }

            if rule.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: rule_id.clone(),
                    field: "file",
                });
            }
            if rule.insert.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: rule_id.clone(),
                    field: "insert",
                });
            }

            if rule.pattern.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id,
                    field: "pattern",
                });
            } else if let Err(error) = rule.to_rule() {
                issues.push(ValidationIssue::InvalidPattern {
                    rule_id,
                    message: error.to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub workspace_relative: bool,
}

/// One insertion rule as written in a rule file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RuleDefinition {
    pub id: String,
    pub file: String,
    /// Regex with a head and a tail capture group
    pub pattern: String,
    pub insert: String,
    /// Text between the head capture and `insert`, default two newlines
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub guard: Option<String>,
    /// Confirmation line printed after a successful run
    #[serde(default)]
    pub message: Option<String>,
    /// Required insertion count
    #[serde(default)]
    pub expect: Option<usize>,
}

impl RuleDefinition {
    pub fn to_rule(&self) -> Result<InsertionRule, RuleError> {
        let mut rule = InsertionRule::new(&self.pattern, self.insert.clone())?;
        if let Some(separator) = &self.separator {
            rule = rule.with_separator(separator.clone());
        }
        if let Some(guard) = &self.guard {
            rule = rule.with_guard(guard.clone());
        }
        Ok(rule)
    }

    pub fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("Applied rule '{}' to {}", self.id, self.file))
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyRuleList,
    DuplicateId(String),
    MissingField {
        rule_id: Option<String>,
        field: &'static str,
    },
    InvalidPattern {
        rule_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyRuleList => write!(f, "rule file contains no rules"),
            ValidationIssue::DuplicateId(id) => write!(f, "rule id '{id}' is used more than once"),
            ValidationIssue::MissingField { rule_id, field } => match rule_id {
                Some(id) => write!(f, "rule '{id}' missing required field '{field}'"),
                None => write!(f, "rule missing required field '{field}'"),
            },
            ValidationIssue::InvalidPattern { rule_id, message } => match rule_id {
                Some(id) => write!(f, "rule '{id}' has an unusable pattern: {message}"),
                None => write!(f, "unusable pattern: {message}"),
            },
        }
    }
}
