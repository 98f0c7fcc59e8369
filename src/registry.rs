//! Entry definition registry
//!
//! Owned by a host and passed explicitly to validation. Built once at
//! startup; read-only afterwards.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::EntryDefConfig;
use crate::entry::{
    is_sys_entry_type, DataFormat, EntryDef, Sharing, AGENT_ENTRY_TYPE, DEL_ENTRY_TYPE,
    DNA_ENTRY_TYPE, HEADERS_ENTRY_TYPE, KEY_ENTRY_TYPE,
};
use crate::error::{ChainError, Result};
use crate::validate::sys::{DEL_SCHEMA, HEADERS_SCHEMA};
use crate::validate::JsonSchemaValidator;

#[derive(Debug, Clone)]
pub struct EntryDefRegistry {
    defs: HashMap<String, Arc<EntryDef>>,
}

impl EntryDefRegistry {
    /// A registry holding only the system entry definitions.
    pub fn system() -> Result<Self> {
        let headers = JsonSchemaValidator::from_str(HEADERS_ENTRY_TYPE, HEADERS_SCHEMA)?;
        let del = JsonSchemaValidator::from_str(DEL_ENTRY_TYPE, DEL_SCHEMA)?;

        let sys = [
            EntryDef::new(DNA_ENTRY_TYPE, DataFormat::Binary, Sharing::Public),
            EntryDef::new(AGENT_ENTRY_TYPE, DataFormat::Json, Sharing::Public),
            EntryDef::new(KEY_ENTRY_TYPE, DataFormat::String, Sharing::Public),
            EntryDef::new(HEADERS_ENTRY_TYPE, DataFormat::Json, Sharing::Public)
                .with_validator(Arc::new(headers)),
            EntryDef::new(DEL_ENTRY_TYPE, DataFormat::Json, Sharing::Public)
                .with_validator(Arc::new(del)),
        ];

        Ok(Self {
            defs: sys
                .into_iter()
                .map(|d| (d.name.clone(), Arc::new(d)))
                .collect(),
        })
    }

    /// System definitions plus the application types declared in config.
    /// Schema file paths are resolved against `base_dir`.
    pub fn from_config(defs: &[EntryDefConfig], base_dir: &Path) -> Result<Self> {
        let mut registry = Self::system()?;
        for cfg in defs {
            let mut def = EntryDef::new(cfg.name.clone(), cfg.data_format, cfg.sharing);
            if let Some(file) = &cfg.schema_file {
                let validator = JsonSchemaValidator::from_file(&base_dir.join(file))?;
                def = def.with_validator(Arc::new(validator));
            } else if let Some(schema) = &cfg.schema {
                let validator = JsonSchemaValidator::from_str(cfg.name.clone(), schema)?;
                def = def.with_validator(Arc::new(validator));
            }
            registry.register(def)?;
        }
        info!(entry_types = registry.defs.len(), "Entry definitions loaded");
        Ok(registry)
    }

    /// Add an application entry type. System types cannot be replaced.
    pub fn register(&mut self, def: EntryDef) -> Result<()> {
        if is_sys_entry_type(&def.name) || def.name.starts_with('%') {
            return Err(ChainError::EntryDefInvalid);
        }
        self.defs.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<EntryDef>> {
        self.defs
            .get(name)
            .cloned()
            .ok_or_else(|| ChainError::EntryTypeMissing(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }
}
