//! Link-graph checks for links entries

use serde_json::Value;

use super::Validator;
use crate::error::{ChainError, Result};
use crate::hash::Hash;

/// Checks that a links entry holds at least one link and that every link
/// names a decodable base and target hash plus a tag.
pub struct LinkGraphValidator;

impl Validator for LinkGraphValidator {
    fn name(&self) -> &str {
        "links"
    }

    fn validate(&self, content: &Value) -> Result<()> {
        let links = content
            .get("Links")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if links.is_empty() {
            return Err(invalid("you must specify at least one link"));
        }
        for link in links {
            check_hash_field(link, "Base")?;
            check_hash_field(link, "Link")?;
            match link.get("Tag").and_then(Value::as_str) {
                Some(tag) if !tag.is_empty() => {}
                _ => return Err(invalid("missing Tag")),
            }
        }
        Ok(())
    }
}

fn check_hash_field(link: &Value, field: &str) -> Result<()> {
    let value = match link.get(field).and_then(Value::as_str) {
        Some(v) if !v.is_empty() => v,
        _ => return Err(invalid(&format!("missing {}", field))),
    };
    match Hash::from_b58(value) {
        Ok(_) => Ok(()),
        Err(ChainError::InvalidHash(msg)) => Err(invalid(&format!("{} {}", field, msg))),
        Err(e) => Err(e),
    }
}

fn invalid(msg: &str) -> ChainError {
    ChainError::InvalidLinks(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: &str = "QmdRXz53TVT9qBYfbXctHyy2GpTNa6YrpAy6ZcDGG8Xhc5";

    fn check(j: &str) -> Result<()> {
        let v: Value = serde_json::from_str(j).unwrap();
        LinkGraphValidator.validate(&v)
    }

    #[test]
    fn test_each_omission_has_its_own_message() {
        let cases = [
            (r#"{}"#.to_string(), "invalid links entry: you must specify at least one link"),
            (r#"{"Links":[]}"#.to_string(), "invalid links entry: you must specify at least one link"),
            (r#"{"Links":[{}]}"#.to_string(), "invalid links entry: missing Base"),
            (
                format!(r#"{{"Links":[{{"Base":"{}"}}]}}"#, H),
                "invalid links entry: missing Link",
            ),
            (
                r#"{"Links":[{"Base":"x","Link":"x","Tag":"sometag"}]}"#.to_string(),
                "invalid links entry: Base multihash too short. must be > 3 bytes",
            ),
            (
                format!(r#"{{"Links":[{{"Base":"{}","Link":"x","Tag":"sometag"}}]}}"#, H),
                "invalid links entry: Link multihash too short. must be > 3 bytes",
            ),
            (
                format!(r#"{{"Links":[{{"Base":"{}","Link":"{}"}}]}}"#, H, H),
                "invalid links entry: missing Tag",
            ),
            (
                format!(r#"{{"Links":[{{"Base":"{}","Link":"{}","Tag":""}}]}}"#, H, H),
                "invalid links entry: missing Tag",
            ),
        ];
        for (input, expected) in cases {
            let err = check(&input).unwrap_err();
            assert_eq!(err.to_string(), expected, "input: {}", input);
            assert!(err.is_validation_failed());
        }
    }

    #[test]
    fn test_valid_links() {
        let j = format!(
            r#"{{"Links":[{{"Base":"{}","Link":"{}","Tag":"4stars"}},{{"Base":"{}","Link":"{}","Tag":"friend"}}]}}"#,
            H, H, H, H
        );
        assert!(check(&j).is_ok());
    }
}
