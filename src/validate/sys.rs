//! Structural rules for system entry types

use serde_json::Value;

use super::{parse_content, LinkGraphValidator, Validator};
use crate::entry::{
    AgentEntry, DataFormat, Entry, EntryDef, HeaderRecord, AGENT_ENTRY_TYPE, DEL_ENTRY_TYPE, DNA_ENTRY_TYPE,
    HEADERS_ENTRY_TYPE, KEY_ENTRY_TYPE,
};
use crate::error::{ChainError, Result};
use crate::hash::Hash;
use crate::signing::{is_valid_pub_key, SelfRevocation};

pub const BAD_PUBLIC_KEY_FORMAT: &str = "bad public key format";
pub const BAD_REVOCATION_FORMAT: &str = "bad revocation format";
pub const BAD_AGENT_ENTRY_FORMAT: &str = "bad agent entry format";

/// JSON schema every headers entry must satisfy.
pub const HEADERS_SCHEMA: &str = r#"{
    "type": "array",
    "items": {
        "type": "object",
        "properties": {
            "Header": { "type": "object" },
            "Role": { "type": "string" },
            "Source": { "type": "string" }
        },
        "required": ["Header", "Role", "Source"]
    }
}"#;

/// JSON schema every del entry must satisfy.
pub const DEL_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "Hash": { "type": "string" },
        "Message": { "type": "string" }
    },
    "required": ["Hash"]
}"#;

/// Check an entry against the rules that no application schema can
/// override. Links-format entries always get the link-graph checks, on top
/// of any validator their definition declares. `def` must be the registry's definition for the entry's type;
/// system definitions carry the schema validators for headers and del
/// entries.
pub fn sys_validate_entry(def: &EntryDef, entry: Option<&Entry>) -> Result<()> {
    if def.name == DNA_ENTRY_TYPE {
        return Err(ChainError::NotValidForDNAType);
    }
    let Some(entry) = entry else {
        return Err(ChainError::ValidationFailed(
            ChainError::NilEntryInvalid.to_string(),
        ));
    };

    match def.name.as_str() {
        KEY_ENTRY_TYPE => {
            let pk = entry.as_str().unwrap_or_default();
            if !is_valid_pub_key(pk) {
                return Err(failed(BAD_PUBLIC_KEY_FORMAT));
            }
        }
        AGENT_ENTRY_TYPE => {
            let j = entry.as_str().ok_or_else(|| failed(BAD_AGENT_ENTRY_FORMAT))?;
            let ae = AgentEntry::from_json(j).map_err(|_| failed(BAD_AGENT_ENTRY_FORMAT))?;
            if !is_valid_pub_key(&ae.public_key) {
                return Err(failed(BAD_PUBLIC_KEY_FORMAT));
            }
            if !ae.revocation.is_empty() && SelfRevocation::decode(&ae.revocation).is_err() {
                return Err(failed(BAD_REVOCATION_FORMAT));
            }
        }
        HEADERS_ENTRY_TYPE => {
            let value = parse_json(def, entry)?;
            let _: Vec<HeaderRecord> =
                serde_json::from_value(value).map_err(|e| failed(&e.to_string()))?;
        }
        DEL_ENTRY_TYPE => {
            let value = parse_json(def, entry)?;
            let hash = value
                .get("Hash")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if let Err(e) = Hash::from_b58(hash) {
                let reason = match e {
                    ChainError::InvalidHash(msg) => msg,
                    other => other.to_string(),
                };
                return Err(failed(&format!(
                    "Error ({}) when decoding Hash value '{}'",
                    reason, hash
                )));
            }
        }
        _ if def.data_format == DataFormat::Links => {
            let value = parse_content(def, entry)?;
            LinkGraphValidator.validate(&value)?;
        }
        _ => {}
    }
    Ok(())
}

/// Parse a JSON-bodied system entry and run the definition's schema on it.
fn parse_json(def: &EntryDef, entry: &Entry) -> Result<Value> {
    let text = entry.as_str().ok_or_else(|| failed("entry content must be text"))?;
    let value: Value = serde_json::from_str(text)?;
    if let Some(validator) = &def.validator {
        validator.validate(&value)?;
    }
    Ok(value)
}

fn failed(msg: &str) -> ChainError {
    ChainError::ValidationFailed(msg.to_string())
}
