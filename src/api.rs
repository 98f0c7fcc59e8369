//! API-style function calls
//!
//! Applications call into a host by function name with JSON arguments.
//! Each [`ApiFn`] declares its argument list; arity is checked before the
//! arguments are converted into an [`Action`].

use std::time::Duration;

use serde_json::Value;

use crate::action::{
    Action, CloseBundleAction, CommitAction, DelAction, GetAction, GetOptions, GetReq, ModAction,
    SignAction, StartBundleAction, VerifySignatureAction, DEFAULT_BUNDLE_TIMEOUT,
};
use crate::dht::{GetMask, StatusMask};
use crate::entry::{DelEntry, Entry};
use crate::error::{ChainError, Result};
use crate::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    /// A string, or any other JSON value committed as its JSON text
    Entry,
    Hash,
    Int,
    Bool,
    Object,
}

impl ArgType {
    fn name(&self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Entry => "string or object",
            ArgType::Hash => "hash",
            ArgType::Int => "int",
            ArgType::Bool => "boolean",
            ArgType::Object => "object",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arg {
    pub name: &'static str,
    pub arg_type: ArgType,
    pub optional: bool,
}

impl Arg {
    pub const fn new(name: &'static str, arg_type: ArgType) -> Self {
        Self {
            name,
            arg_type,
            optional: false,
        }
    }

    pub const fn optional(name: &'static str, arg_type: ArgType) -> Self {
        Self {
            name,
            arg_type,
            optional: true,
        }
    }
}

/// `n` must lie between the number of required arguments and the total
/// number of arguments.
pub fn check_arg_count(args: &[Arg], n: usize) -> Result<()> {
    let min = args.iter().filter(|a| !a.optional).count();
    if n < min || n > args.len() {
        return Err(ChainError::WrongNargs);
    }
    Ok(())
}

const COMMIT_ARGS: &[Arg] = &[
    Arg::new("entryType", ArgType::String),
    Arg::new("entry", ArgType::Entry),
];
const UPDATE_ARGS: &[Arg] = &[
    Arg::new("entryType", ArgType::String),
    Arg::new("entry", ArgType::Entry),
    Arg::new("replaces", ArgType::Hash),
];
const REMOVE_ARGS: &[Arg] = &[
    Arg::new("hash", ArgType::Hash),
    Arg::optional("message", ArgType::String),
];
const GET_ARGS: &[Arg] = &[
    Arg::new("hash", ArgType::Hash),
    Arg::optional("options", ArgType::Object),
];
const SIGN_ARGS: &[Arg] = &[Arg::new("data", ArgType::String)];
const VERIFY_ARGS: &[Arg] = &[
    Arg::new("signature", ArgType::String),
    Arg::new("data", ArgType::String),
    Arg::new("pubKey", ArgType::String),
];
const BUNDLE_START_ARGS: &[Arg] = &[
    Arg::new("timeout", ArgType::Int),
    Arg::optional("userParam", ArgType::String),
];
const BUNDLE_CLOSE_ARGS: &[Arg] = &[Arg::new("commit", ArgType::Bool)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFn {
    Commit,
    Update,
    Remove,
    Get,
    Sign,
    VerifySignature,
    BundleStart,
    BundleClose,
}

impl ApiFn {
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "commit" => ApiFn::Commit,
            "update" => ApiFn::Update,
            "remove" => ApiFn::Remove,
            "get" => ApiFn::Get,
            "sign" => ApiFn::Sign,
            "verifySignature" => ApiFn::VerifySignature,
            "bundleStart" => ApiFn::BundleStart,
            "bundleClose" => ApiFn::BundleClose,
            other => return Err(ChainError::UnknownFunction(other.to_string())),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ApiFn::Commit => "commit",
            ApiFn::Update => "update",
            ApiFn::Remove => "remove",
            ApiFn::Get => "get",
            ApiFn::Sign => "sign",
            ApiFn::VerifySignature => "verifySignature",
            ApiFn::BundleStart => "bundleStart",
            ApiFn::BundleClose => "bundleClose",
        }
    }

    pub fn args(&self) -> &'static [Arg] {
        match self {
            ApiFn::Commit => COMMIT_ARGS,
            ApiFn::Update => UPDATE_ARGS,
            ApiFn::Remove => REMOVE_ARGS,
            ApiFn::Get => GET_ARGS,
            ApiFn::Sign => SIGN_ARGS,
            ApiFn::VerifySignature => VERIFY_ARGS,
            ApiFn::BundleStart => BUNDLE_START_ARGS,
            ApiFn::BundleClose => BUNDLE_CLOSE_ARGS,
        }
    }

    /// Check arity and convert JSON arguments into an action.
    pub fn parse(&self, values: &[Value]) -> Result<Action> {
        self.parse_with(values, DEFAULT_BUNDLE_TIMEOUT)
    }

    /// As [`ApiFn::parse`], with the bundle timeout used when a bundle start
    /// passes zero.
    pub fn parse_with(&self, values: &[Value], bundle_timeout: Duration) -> Result<Action> {
        let spec = self.args();
        check_arg_count(spec, values.len())?;
        let args = Args { spec, values };

        Ok(match self {
            ApiFn::Commit => Action::Commit(CommitAction::new(args.string(0)?, args.entry(1)?)),
            ApiFn::Update => Action::Mod(ModAction::new(
                args.string(0)?,
                Some(args.entry(1)?),
                args.hash(2)?,
            )),
            ApiFn::Remove => {
                let message = args.opt_string(1)?.unwrap_or_default();
                Action::Del(DelAction::new(DelEntry::new(args.hash(0)?, message))?)
            }
            ApiFn::Get => {
                let mut req = GetReq::new(args.hash(0)?);
                let mut options = GetOptions::default();
                if let Some(opts) = args.object(1)? {
                    options.local = opts.get("Local").and_then(Value::as_bool).unwrap_or(false);
                    options.bundle = opts.get("Bundle").and_then(Value::as_bool).unwrap_or(false);
                    if let Some(bits) = opts.get("GetMask").and_then(Value::as_u64) {
                        req.get_mask = GetMask::from_bits(bits as u8);
                    }
                    if let Some(bits) = opts.get("StatusMask").and_then(Value::as_u64) {
                        req.status_mask = StatusMask::from_bits(bits as u8);
                    }
                }
                options.get_mask = Some(req.get_mask);
                Action::Get(GetAction::new(req, options))
            }
            ApiFn::Sign => Action::Sign(SignAction::new(args.string(0)?.into_bytes())),
            ApiFn::VerifySignature => Action::VerifySignature(VerifySignatureAction::new(
                args.string(0)?,
                args.string(1)?.into_bytes(),
                args.string(2)?,
            )),
            ApiFn::BundleStart => Action::StartBundle(StartBundleAction::with_default(
                args.int(0)?,
                args.opt_string(1)?.unwrap_or_default(),
                bundle_timeout,
            )),
            ApiFn::BundleClose => Action::CloseBundle(CloseBundleAction {
                commit: args.bool(0)?,
            }),
        })
    }
}

struct Args<'a> {
    spec: &'static [Arg],
    values: &'a [Value],
}

impl Args<'_> {
    fn wrong(&self, i: usize) -> ChainError {
        let arg = &self.spec[i];
        ChainError::WrongArgType {
            name: arg.name.to_string(),
            expected: arg.arg_type.name().to_string(),
        }
    }

    fn string(&self, i: usize) -> Result<String> {
        self.values
            .get(i)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.wrong(i))
    }

    fn opt_string(&self, i: usize) -> Result<Option<String>> {
        match self.values.get(i) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.string(i).map(Some),
        }
    }

    fn entry(&self, i: usize) -> Result<Entry> {
        match self.values.get(i) {
            Some(Value::String(s)) => Ok(Entry::text(s.clone())),
            Some(Value::Null) | None => Err(self.wrong(i)),
            Some(other) => Ok(Entry::text(other.to_string())),
        }
    }

    fn hash(&self, i: usize) -> Result<Hash> {
        Hash::from_b58(&self.string(i)?)
    }

    fn int(&self, i: usize) -> Result<u64> {
        self.values
            .get(i)
            .and_then(Value::as_u64)
            .ok_or_else(|| self.wrong(i))
    }

    fn bool(&self, i: usize) -> Result<bool> {
        self.values
            .get(i)
            .and_then(Value::as_bool)
            .ok_or_else(|| self.wrong(i))
    }

    fn object(&self, i: usize) -> Result<Option<&serde_json::Map<String, Value>>> {
        match self.values.get(i) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(m)) => Ok(Some(m)),
            Some(_) => Err(self.wrong(i)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_arg_count() {
        let args = [Arg::new("a", ArgType::String)];
        assert!(matches!(check_arg_count(&args, 2), Err(ChainError::WrongNargs)));

        let args = [
            Arg::new("a", ArgType::String),
            Arg::new("b", ArgType::String),
            Arg::optional("c", ArgType::String),
        ];
        assert!(matches!(check_arg_count(&args, 1), Err(ChainError::WrongNargs)));
        assert!(check_arg_count(&args, 2).is_ok());
        assert!(check_arg_count(&args, 3).is_ok());
        assert!(matches!(check_arg_count(&args, 4), Err(ChainError::WrongNargs)));
    }

    #[test]
    fn test_parse_commit_object_entry() {
        let action = ApiFn::Commit
            .parse(&[json!("profile"), json!({"firstName": "Zippy"})])
            .unwrap();
        match action {
            Action::Commit(a) => {
                assert_eq!(a.entry_type, "profile");
                assert_eq!(a.entry.as_str(), Some(r#"{"firstName":"Zippy"}"#));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_args() {
        assert!(matches!(
            ApiFn::Commit.parse(&[json!("profile")]),
            Err(ChainError::WrongNargs)
        ));
        let err = ApiFn::BundleClose.parse(&[json!("yes")]).unwrap_err();
        assert_eq!(err.to_string(), "argument commit should be boolean");
        assert!(matches!(
            ApiFn::Get.parse(&[json!("not-a-hash")]),
            Err(ChainError::InvalidHash(_))
        ));
        assert!(matches!(
            ApiFn::from_name("launchMissiles"),
            Err(ChainError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_parse_get_options() {
        let h = "QmY8Mzg9F69e5P9AoQPYat655HEhc1TVGs11tmfNSzkqh2";
        let action = ApiFn::Get
            .parse(&[json!(h), json!({"Local": true, "GetMask": 3})])
            .unwrap();
        match action {
            Action::Get(a) => {
                assert!(a.options.local);
                assert!(!a.options.bundle);
                assert!(a.req.get_mask.has(GetMask::ENTRY_TYPE));
                assert_eq!(a.options.effective_mask(&a.req), a.req.get_mask);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_every_fn_roundtrips_name() {
        for f in [
            ApiFn::Commit,
            ApiFn::Update,
            ApiFn::Remove,
            ApiFn::Get,
            ApiFn::Sign,
            ApiFn::VerifySignature,
            ApiFn::BundleStart,
            ApiFn::BundleClose,
        ] {
            assert_eq!(ApiFn::from_name(f.name()).unwrap(), f);
        }
    }
}
