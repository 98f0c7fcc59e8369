//! JSON schema validation of entry content

use std::path::Path;

use serde_json::Value;

use super::{validator_failed, Validator};
use crate::error::{ChainError, Result};

/// Wraps a compiled `jsonschema` validator.
pub struct JsonSchemaValidator {
    name: String,
    validator: jsonschema::Validator,
}

impl JsonSchemaValidator {
    pub fn new(name: impl Into<String>, schema: &Value) -> Result<Self> {
        let name = name.into();
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| ChainError::Config(format!("invalid schema {}: {}", name, e)))?;
        Ok(Self { name, validator })
    }

    pub fn from_str(name: impl Into<String>, schema: &str) -> Result<Self> {
        let schema: Value = serde_json::from_str(schema)?;
        Self::new(name, &schema)
    }

    /// Load a schema file; the validator is named after the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content = std::fs::read_to_string(path)?;
        Self::from_str(name, &content)
    }
}

impl Validator for JsonSchemaValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, content: &Value) -> Result<()> {
        match self.validator.iter_errors(content).next() {
            Some(error) => Err(validator_failed(&self.name, error)),
            None => Ok(()),
        }
    }
}
