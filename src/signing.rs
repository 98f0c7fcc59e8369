//! Agent keys and signatures
//!
//! # Algorithms
//!
//! - **Keys**: Ed25519 (same as Holochain agents)
//! - **Text encoding**: base58 for public keys, signatures and revocations
//!
//! Signatures are deterministic: signing the same bytes with the same key
//! always yields the same signature.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::entry::AgentEntry;
use crate::error::{ChainError, Result};
use crate::hash::HashSpec;
use crate::peer::PeerId;

/// Ed25519 public key length (32 bytes)
pub const PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 private key length (32 bytes)
pub const PRIVATE_KEY_LEN: usize = 32;

/// The owner of a chain: an identity plus its signing key.
#[derive(Clone)]
pub struct Agent {
    identity: String,
    signing_key: SigningKey,
}

impl Agent {
    /// Generate a fresh agent using the OS random number generator.
    pub fn generate(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic agent from a 32 byte seed.
    pub fn from_seed(identity: impl Into<String>, seed: [u8; PRIVATE_KEY_LEN]) -> Self {
        Self {
            identity: identity.into(),
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn priv_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn pub_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn to_seed(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.signing_key.to_bytes()
    }

    pub fn encode_pub_key(&self) -> String {
        bs58::encode(self.pub_key().as_bytes()).into_string()
    }

    /// The network identity derived from the public key.
    pub fn node_id(&self) -> PeerId {
        peer_id_for(&self.pub_key())
    }

    pub fn sign(&self, data: &[u8]) -> Signature {
        self.signing_key.sign(data)
    }

    /// Sign and render the signature as base58.
    pub fn sign_b58(&self, data: &[u8]) -> String {
        bs58::encode(self.sign(data).to_bytes()).into_string()
    }

    /// The agent entry describing this agent, optionally carrying a
    /// revocation of a previous key.
    pub fn agent_entry(&self, revocation: Option<&SelfRevocation>) -> Result<AgentEntry> {
        let revocation = match revocation {
            Some(r) => r.encode()?,
            None => String::new(),
        };
        Ok(AgentEntry {
            identity: self.identity.clone(),
            revocation,
            public_key: self.encode_pub_key(),
        })
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("identity", &self.identity)
            .field("public_key", &self.encode_pub_key())
            .finish()
    }
}

/// Decode a base58 public key.
pub fn decode_pub_key(b58: &str) -> Result<VerifyingKey> {
    let bytes = bs58::decode(b58)
        .into_vec()
        .map_err(|e| ChainError::Signature(format!("invalid public key encoding: {}", e)))?;
    let bytes: [u8; PUBLIC_KEY_LEN] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ChainError::Signature(format!("invalid public key length: {}", bytes.len())))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| ChainError::Signature(format!("invalid public key: {}", e)))
}

/// The network identity of the holder of `key`.
pub fn peer_id_for(key: &VerifyingKey) -> PeerId {
    PeerId::from_hash(HashSpec::default().sum(key.as_bytes()))
}

pub fn is_valid_pub_key(b58: &str) -> bool {
    decode_pub_key(b58).is_ok()
}

/// Check a base58 signature over `data` against a base58 public key.
///
/// A well-formed signature that does not match yields `Ok(false)`; only
/// malformed encodings are errors.
pub fn verify_signature(b58_signature: &str, data: &[u8], b58_pub_key: &str) -> Result<bool> {
    let sig_bytes = bs58::decode(b58_signature)
        .into_vec()
        .map_err(|e| ChainError::Signature(format!("invalid signature encoding: {}", e)))?;
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|e| ChainError::Signature(format!("invalid signature: {}", e)))?;
    let key = decode_pub_key(b58_pub_key)?;
    Ok(key.verify(data, &signature).is_ok())
}

/// A key-rotation statement: the old key signs the new key and the new key
/// signs the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfRevocation {
    pub old_key: Vec<u8>,
    pub new_key: Vec<u8>,
    pub old_sig: Vec<u8>,
    pub new_sig: Vec<u8>,
}

impl SelfRevocation {
    pub fn new(old: &Agent, new: &Agent) -> Self {
        let old_key = old.pub_key().to_bytes().to_vec();
        let new_key = new.pub_key().to_bytes().to_vec();
        Self {
            old_sig: old.sign(&new_key).to_bytes().to_vec(),
            new_sig: new.sign(&old_key).to_bytes().to_vec(),
            old_key,
            new_key,
        }
    }

    /// Base58 of the MessagePack encoding.
    pub fn encode(&self) -> Result<String> {
        Ok(bs58::encode(rmp_serde::to_vec(self)?).into_string())
    }

    pub fn decode(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| ChainError::Signature(format!("invalid revocation encoding: {}", e)))?;
        Ok(rmp_serde::from_slice(&bytes)?)
    }

    /// Both cross-signatures check out.
    pub fn verify(&self) -> Result<bool> {
        let old = key_from_bytes(&self.old_key)?;
        let new = key_from_bytes(&self.new_key)?;
        let old_sig = Signature::from_slice(&self.old_sig)
            .map_err(|e| ChainError::Signature(e.to_string()))?;
        let new_sig = Signature::from_slice(&self.new_sig)
            .map_err(|e| ChainError::Signature(e.to_string()))?;
        Ok(old.verify(&self.new_key, &old_sig).is_ok() && new.verify(&self.old_key, &new_sig).is_ok())
    }
}

fn key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey> {
    let arr: [u8; PUBLIC_KEY_LEN] = bytes
        .try_into()
        .map_err(|_| ChainError::Signature("invalid public key length".into()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| ChainError::Signature(e.to_string()))
}
