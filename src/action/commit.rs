//! Mutating actions: commit, put, modify and delete

use super::{check_validation_base, ValidationContext};
use crate::entry::{
    DataFormat, DelEntry, Entry, EntryDef, AGENT_ENTRY_TYPE, DEL_ENTRY_TYPE, DNA_ENTRY_TYPE,
    HEADERS_ENTRY_TYPE, KEY_ENTRY_TYPE,
};
use crate::error::{ChainError, Result};
use crate::hash::Hash;
use crate::header::Header;
use crate::validate::sys_validate_entry;

/// Append an entry to the local chain (and publish it when public).
#[derive(Debug, Clone)]
pub struct CommitAction {
    pub entry_type: String,
    pub entry: Entry,
    pub header: Option<Header>,
}

impl CommitAction {
    pub fn new(entry_type: impl Into<String>, entry: Entry) -> Self {
        Self {
            entry_type: entry_type.into(),
            entry,
            header: None,
        }
    }

    pub(super) fn sys_validation(
        &self,
        ctx: &ValidationContext<'_>,
        def: &EntryDef,
        validation_base: Option<&Hash>,
    ) -> Result<()> {
        if def.name == DNA_ENTRY_TYPE {
            return Err(ChainError::NotValidForDNAType);
        }
        check_validation_base(ctx, &self.entry, validation_base)?;
        sys_validate_entry(def, Some(&self.entry))
    }
}

/// Store an entry published by another node into the local DHT view.
#[derive(Debug, Clone)]
pub struct PutAction {
    pub entry_type: String,
    pub entry: Entry,
    pub header: Option<Header>,
}

impl PutAction {
    pub fn new(entry_type: impl Into<String>, entry: Entry, header: Option<Header>) -> Self {
        Self {
            entry_type: entry_type.into(),
            entry,
            header,
        }
    }

    pub(super) fn sys_validation(
        &self,
        ctx: &ValidationContext<'_>,
        def: &EntryDef,
        validation_base: Option<&Hash>,
    ) -> Result<()> {
        if def.name == DNA_ENTRY_TYPE {
            return Err(ChainError::NotValidForDNAType);
        }
        check_validation_base(ctx, &self.entry, validation_base)?;
        sys_validate_entry(def, Some(&self.entry))
    }
}

/// Replace a previously committed entry with a new one.
#[derive(Debug, Clone)]
pub struct ModAction {
    pub entry_type: String,
    pub entry: Option<Entry>,
    pub replaces: Hash,
    pub header: Option<Header>,
}

impl ModAction {
    pub fn new(entry_type: impl Into<String>, entry: Option<Entry>, replaces: Hash) -> Self {
        Self {
            entry_type: entry_type.into(),
            entry,
            replaces,
            header: None,
        }
    }

    pub(super) fn sys_validation(
        &self,
        ctx: &ValidationContext<'_>,
        def: &EntryDef,
        validation_base: Option<&Hash>,
    ) -> Result<()> {
        match def.name.as_str() {
            DNA_ENTRY_TYPE => return Err(ChainError::NotValidForDNAType),
            HEADERS_ENTRY_TYPE => return Err(ChainError::NotValidForHeadersType),
            _ => {}
        }
        if def.data_format == DataFormat::Links {
            return Err(ChainError::ModInvalidForLinks);
        }
        let entry = self.entry.as_ref().ok_or(ChainError::NilEntryInvalid)?;
        let header = self.header.as_ref().ok_or(ChainError::ModMissingHeader)?;
        if header.entry_link == self.replaces {
            return Err(ChainError::ModReplacesHashNotDifferent);
        }
        check_validation_base(ctx, entry, validation_base)?;
        sys_validate_entry(def, Some(entry))
    }
}

/// Mark a previously committed entry deleted by committing a tombstone.
#[derive(Debug, Clone)]
pub struct DelAction {
    pub del: DelEntry,
    pub header: Option<Header>,
    entry: Entry,
}

impl DelAction {
    pub fn new(del: DelEntry) -> Result<Self> {
        let entry = Entry::text(del.to_json()?);
        Ok(Self {
            del,
            header: None,
            entry,
        })
    }

    /// The tombstone as a chain entry.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// `def` is the definition of the entry being deleted.
    pub(super) fn sys_validation(
        &self,
        ctx: &ValidationContext<'_>,
        def: &EntryDef,
        validation_base: Option<&Hash>,
    ) -> Result<()> {
        match def.name.as_str() {
            DNA_ENTRY_TYPE | KEY_ENTRY_TYPE | AGENT_ENTRY_TYPE | HEADERS_ENTRY_TYPE => {
                return Err(ChainError::EntryDefInvalid)
            }
            _ => {}
        }
        if def.data_format == DataFormat::Links {
            return Err(ChainError::DelInvalidForLinks);
        }
        check_validation_base(ctx, &self.entry, validation_base)?;
        let del_def = ctx.registry.get(DEL_ENTRY_TYPE)?;
        sys_validate_entry(&del_def, Some(&self.entry))
    }
}
