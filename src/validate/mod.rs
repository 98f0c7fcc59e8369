//! Entry validation
//!
//! Two tiers:
//! - [`sys`]: fixed structural rules for the system entry types, the
//!   link-graph rules for links-format types, and the nil-entry check every
//!   entry goes through
//! - custom validators: capability objects attached to an entry definition
//!   (JSON schema or an application rule) and run against the parsed
//!   content of application entries

pub mod links;
pub mod schema;
pub mod sys;

use serde_json::Value;
use tracing::debug;

use crate::entry::{Content, DataFormat, Entry, EntryDef};
use crate::error::{ChainError, Result};

pub use links::LinkGraphValidator;
pub use schema::JsonSchemaValidator;
pub use sys::sys_validate_entry;

/// A pluggable content validator.
pub trait Validator: Send + Sync {
    /// Name used in failure messages (`validator <name> failed: ...`).
    fn name(&self) -> &str;

    /// Check parsed entry content.
    fn validate(&self, content: &Value) -> Result<()>;
}

type RuleFn = dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync;

/// Application rule expressed as a closure over the parsed content.
pub struct RuleValidator {
    name: String,
    rule: Box<RuleFn>,
}

impl RuleValidator {
    pub fn new<F>(name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            rule: Box::new(rule),
        }
    }
}

impl Validator for RuleValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, content: &Value) -> Result<()> {
        (self.rule)(content).map_err(|msg| validator_failed(&self.name, msg))
    }
}

/// Wrap an engine message into the uniform validation failure.
pub fn validator_failed(name: &str, msg: impl std::fmt::Display) -> ChainError {
    ChainError::ValidationFailed(format!("validator {} failed: {}", name, msg))
}

/// Parse entry content into the value a validator sees.
pub fn parse_content(def: &EntryDef, entry: &Entry) -> Result<Value> {
    match (def.data_format, entry.content()) {
        (DataFormat::Links, Content::Text(s)) => {
            serde_json::from_str(s).map_err(ChainError::InvalidLinksJson)
        }
        (DataFormat::Json, Content::Text(s)) => Ok(serde_json::from_str(s)?),
        (DataFormat::String, Content::Text(s)) => Ok(Value::String(s.clone())),
        (DataFormat::Binary, Content::Bytes(b)) => {
            Ok(Value::Array(b.iter().map(|x| Value::from(*x)).collect()))
        }
        (DataFormat::Binary, Content::Text(s)) => Ok(Value::String(s.clone())),
        (format, Content::Bytes(_)) => Err(ChainError::ValidationFailed(format!(
            "{} entry content must be text",
            format
        ))),
    }
}

/// Run the declared validator of an application entry type. Structural
/// checks, including the link-graph rules, belong to [`sys_validate_entry`].
pub fn validate_entry_content(def: &EntryDef, entry: &Entry) -> Result<()> {
    let Some(validator) = &def.validator else {
        return Ok(());
    };
    let input = parse_content(def, entry)?;
    debug!(entry_type = %def.name, validator = validator.name(), "Validating entry content");
    validator.validate(&input)
}
