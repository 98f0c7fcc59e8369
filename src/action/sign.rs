use crate::error::Result;
use crate::signing::{verify_signature, Agent};

/// Sign bytes with the chain owner's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignAction {
    pub data: Vec<u8>,
}

impl SignAction {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Base58 signature over the data.
    pub fn call(&self, agent: &Agent) -> String {
        agent.sign_b58(&self.data)
    }
}

/// Check a base58 signature against a base58 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifySignatureAction {
    pub signature: String,
    pub data: Vec<u8>,
    pub pub_key: String,
}

impl VerifySignatureAction {
    pub fn new(signature: impl Into<String>, data: impl Into<Vec<u8>>, pub_key: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            data: data.into(),
            pub_key: pub_key.into(),
        }
    }

    pub fn call(&self) -> Result<bool> {
        verify_signature(&self.signature, &self.data, &self.pub_key)
    }
}
