//! Client-side encryption binding
//!
//! Content is encrypted with a fresh per-object content key; that key is
//! wrapped with the account's key-encryption key and travels alongside the
//! ciphertext in an envelope. Reads resolve the wrapping key by its id.
//!
//! Content is sealed with AES-256-GCM. [`AesKeyWrapper`] (A256KW) and
//! [`RsaKeyWrapper`] (RSA-OAEP) are the bundled wrappers; applications with
//! a key vault plug in their own [`KeyWrapper`].

use crate::config::ConfigError;
use crate::error::{StowageError, StowageResult};
use crate::value::Value;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use aes_kw::KekAes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

const NONCE_LEN: usize = 12;
const CONTENT_KEY_LEN: usize = 32;
const CONTENT_ALGORITHM: &str = "A256GCM";

/// Wraps and unwraps content keys with a key-encryption key
pub trait KeyWrapper: Send + Sync + fmt::Debug {
    fn wrap_key(&self, key: &[u8]) -> StowageResult<Vec<u8>>;

    fn unwrap_key(&self, wrapped: &[u8], algorithm: &str) -> StowageResult<Vec<u8>>;

    /// Identifier stored with every envelope
    fn key_id(&self) -> &str;

    fn algorithm(&self) -> &str;
}

fn unknown_algorithm(algorithm: &str) -> StowageError {
    StowageError::Encryption(format!("unknown key wrap algorithm {}", algorithm))
}

/// AES-256 key wrap (RFC 3394) under a key derived from a shared secret
pub struct AesKeyWrapper {
    kid: String,
    kek: KekAes256,
}

impl AesKeyWrapper {
    pub const ALGORITHM: &'static str = "A256KW";

    /// The secret is hashed down to the 256-bit key-encryption key
    pub fn new(key_identifier: &str, secret_key: &str) -> Self {
        Self {
            kid: format!("local:{}", key_identifier),
            kek: KekAes256::from(Sha256::digest(secret_key.as_bytes())),
        }
    }
}

impl fmt::Debug for AesKeyWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesKeyWrapper")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl KeyWrapper for AesKeyWrapper {
    fn wrap_key(&self, key: &[u8]) -> StowageResult<Vec<u8>> {
        self.kek
            .wrap_vec(key)
            .map_err(|e| StowageError::Encryption(format!("key wrap failed: {}", e)))
    }

    fn unwrap_key(&self, wrapped: &[u8], algorithm: &str) -> StowageResult<Vec<u8>> {
        if algorithm != Self::ALGORITHM {
            return Err(unknown_algorithm(algorithm));
        }
        self.kek
            .unwrap_vec(wrapped)
            .map_err(|e| StowageError::Encryption(format!("key unwrap failed for {}: {}", self.kid, e)))
    }

    fn key_id(&self) -> &str {
        &self.kid
    }

    fn algorithm(&self) -> &str {
        Self::ALGORITHM
    }
}

/// RSA-OAEP (SHA-256) key wrapper
///
/// A wrapper built from a public key only can seal but not open.
pub struct RsaKeyWrapper {
    kid: String,
    public_key: RsaPublicKey,
    private_key: Option<RsaPrivateKey>,
}

impl RsaKeyWrapper {
    pub const ALGORITHM: &'static str = "RSA-OAEP-256";

    pub fn new(key_identifier: &str, private_key: RsaPrivateKey) -> Self {
        Self {
            kid: format!("local:{}", key_identifier),
            public_key: RsaPublicKey::from(&private_key),
            private_key: Some(private_key),
        }
    }

    pub fn public_only(key_identifier: &str, public_key: RsaPublicKey) -> Self {
        Self {
            kid: format!("local:{}", key_identifier),
            public_key,
            private_key: None,
        }
    }

    /// Generate a fresh key pair of `bits` size
    pub fn generate(key_identifier: &str, bits: usize) -> StowageResult<Self> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| StowageError::Encryption(format!("rsa key generation failed: {}", e)))?;
        Ok(Self::new(key_identifier, private_key))
    }
}

impl fmt::Debug for RsaKeyWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyWrapper")
            .field("kid", &self.kid)
            .field("can_unwrap", &self.private_key.is_some())
            .finish_non_exhaustive()
    }
}

impl KeyWrapper for RsaKeyWrapper {
    fn wrap_key(&self, key: &[u8]) -> StowageResult<Vec<u8>> {
        self.public_key
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), key)
            .map_err(|e| StowageError::Encryption(format!("key wrap failed: {}", e)))
    }

    fn unwrap_key(&self, wrapped: &[u8], algorithm: &str) -> StowageResult<Vec<u8>> {
        if algorithm != Self::ALGORITHM {
            return Err(unknown_algorithm(algorithm));
        }
        let private_key = self.private_key.as_ref().ok_or_else(|| {
            StowageError::Encryption(format!("{} holds no private key", self.kid))
        })?;
        private_key
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|e| StowageError::Encryption(format!("key unwrap failed for {}: {}", self.kid, e)))
    }

    fn key_id(&self) -> &str {
        &self.kid
    }

    fn algorithm(&self) -> &str {
        Self::ALGORITHM
    }
}

/// Maps key ids to wrappers for decrypt-time lookup
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    keys: HashMap<String, Arc<dyn KeyWrapper>>,
}

impl KeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_key(&mut self, key: Arc<dyn KeyWrapper>) {
        self.keys.insert(key.key_id().to_string(), key);
    }

    pub fn resolve_key(&self, kid: &str) -> Option<Arc<dyn KeyWrapper>> {
        self.keys.get(kid).cloned()
    }
}

/// Serialized form of an encrypted payload
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    kid: String,
    algorithm: String,
    wrapped_key: String,
    content_algorithm: String,
    data: String,
}

/// Key-wrap provider plus the set of encrypted field names, attached to a
/// registration for its whole lifetime
#[derive(Debug, Clone)]
pub struct EncryptionBinding {
    wrapper: Arc<dyn KeyWrapper>,
    resolver: KeyResolver,
    fields: BTreeSet<String>,
}

impl EncryptionBinding {
    /// Bind an AES key wrapper for `key_identifier` and `secret_key`
    pub fn bind(key_identifier: &str, secret_key: &str, fields: BTreeSet<String>) -> StowageResult<Self> {
        if key_identifier.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "key_identifier".to_string(),
                hint: "set STORAGE_KEY_IDENTIFIER or StorageConfig::with_encryption_key".to_string(),
            }
            .into());
        }
        if secret_key.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "secret_key".to_string(),
                hint: "set STORAGE_SECRET_KEY or StorageConfig::with_encryption_key".to_string(),
            }
            .into());
        }
        Ok(Self::with_wrapper(
            Arc::new(AesKeyWrapper::new(key_identifier, secret_key)),
            fields,
        ))
    }

    /// Bind an application-supplied wrapper
    pub fn with_wrapper(wrapper: Arc<dyn KeyWrapper>, fields: BTreeSet<String>) -> Self {
        let mut resolver = KeyResolver::new();
        resolver.put_key(Arc::clone(&wrapper));
        Self {
            wrapper,
            resolver,
            fields,
        }
    }

    pub fn key_id(&self) -> &str {
        self.wrapper.key_id()
    }

    pub fn wrap_key(&self, raw_key: &[u8]) -> StowageResult<Vec<u8>> {
        self.wrapper.wrap_key(raw_key)
    }

    pub fn unwrap_key(&self, wrapped: &[u8]) -> StowageResult<Vec<u8>> {
        self.wrapper.unwrap_key(wrapped, self.wrapper.algorithm())
    }

    pub fn resolve(&self, kid: &str) -> Option<Arc<dyn KeyWrapper>> {
        self.resolver.resolve_key(kid)
    }

    /// Table properties encrypted for this registration
    pub fn encrypted_fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    /// Field-selective encryption decision for table properties
    pub fn should_encrypt(&self, _partition_key: &str, _row_key: &str, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Encrypt a payload into a self-describing envelope
    pub fn seal(&self, plaintext: &[u8]) -> StowageResult<String> {
        let mut content_key = [0u8; CONTENT_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut content_key);

        let envelope = Envelope {
            kid: self.key_id().to_string(),
            algorithm: self.wrapper.algorithm().to_string(),
            wrapped_key: STANDARD.encode(self.wrapper.wrap_key(&content_key)?),
            content_algorithm: CONTENT_ALGORITHM.to_string(),
            data: STANDARD.encode(seal_bytes(&content_key, plaintext)?),
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decrypt an envelope produced by [`seal`](Self::seal)
    pub fn open(&self, envelope: &str) -> StowageResult<Vec<u8>> {
        let envelope: Envelope = serde_json::from_str(envelope)
            .map_err(|e| StowageError::Encryption(format!("malformed envelope: {}", e)))?;
        if envelope.content_algorithm != CONTENT_ALGORITHM {
            return Err(StowageError::Encryption(format!(
                "unknown content algorithm {}",
                envelope.content_algorithm
            )));
        }

        let wrapper = self.resolve(&envelope.kid).ok_or_else(|| {
            StowageError::Encryption(format!("no key registered for id {}", envelope.kid))
        })?;
        let content_key = wrapper.unwrap_key(&decode(&envelope.wrapped_key)?, &envelope.algorithm)?;
        open_bytes(&content_key, &decode(&envelope.data)?)
    }

    /// Encrypt a single table property, keeping its type
    pub fn seal_value(&self, value: &Value) -> StowageResult<String> {
        self.seal(&serde_json::to_vec(value)?)
    }

    pub fn open_value(&self, envelope: &str) -> StowageResult<Value> {
        Ok(serde_json::from_slice(&self.open(envelope)?)?)
    }
}

fn decode(text: &str) -> StowageResult<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| StowageError::Encryption(format!("invalid base64: {}", e)))
}

/// nonce || ciphertext, the GCM tag trailing the ciphertext
fn seal_bytes(key: &[u8], plaintext: &[u8]) -> StowageResult<Vec<u8>> {
    let cipher = content_cipher(key)?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| StowageError::Encryption("content encryption failed".to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open_bytes(key: &[u8], sealed: &[u8]) -> StowageResult<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(StowageError::Encryption("ciphertext too short".to_string()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    content_cipher(key)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            StowageError::Encryption("authentication failed, wrong key or tampered data".to_string())
        })
}

fn content_cipher(key: &[u8]) -> StowageResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key)
        .map_err(|_| StowageError::Encryption(format!("content key must be {} bytes", CONTENT_KEY_LEN)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(fields: &[&str]) -> EncryptionBinding {
        EncryptionBinding::bind(
            "key1",
            "supersecretkey",
            fields.iter().map(|f| f.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_wrap_round_trip() {
        let binding = binding(&[]);
        let raw = b"0123456789abcdef0123456789abcdef";
        let wrapped = binding.wrap_key(raw).unwrap();
        // RFC 3394 adds one 64-bit block
        assert_eq!(wrapped.len(), raw.len() + 8);
        assert_ne!(&wrapped[8..], &raw[..]);
        assert_eq!(binding.unwrap_key(&wrapped).unwrap(), raw.to_vec());
        assert_eq!(binding.key_id(), "local:key1");
    }

    #[test]
    fn test_rsa_wrapper_round_trip() {
        let wrapper = Arc::new(RsaKeyWrapper::generate("rsa1", 1024).unwrap());
        let binding = EncryptionBinding::with_wrapper(wrapper, BTreeSet::new());
        assert_eq!(binding.key_id(), "local:rsa1");

        let envelope = binding.seal(b"wrapped with rsa").unwrap();
        assert!(envelope.contains(RsaKeyWrapper::ALGORITHM));
        assert_eq!(binding.open(&envelope).unwrap(), b"wrapped with rsa".to_vec());
    }

    #[test]
    fn test_public_only_rsa_wrapper_cannot_open() {
        let full = RsaKeyWrapper::generate("rsa2", 1024).unwrap();
        let public_key = full.public_key.clone();
        let sealing = EncryptionBinding::with_wrapper(
            Arc::new(RsaKeyWrapper::public_only("rsa2", public_key)),
            BTreeSet::new(),
        );
        let envelope = sealing.seal(b"for the key holder").unwrap();

        let err = sealing.open(&envelope).unwrap_err();
        assert!(err.to_string().contains("no private key"));

        let opening = EncryptionBinding::with_wrapper(Arc::new(full), BTreeSet::new());
        assert_eq!(opening.open(&envelope).unwrap(), b"for the key holder".to_vec());
    }

    #[test]
    fn test_unwrap_rejects_other_algorithm() {
        let wrapper = AesKeyWrapper::new("key1", "supersecretkey");
        let wrapped = wrapper.wrap_key(&[7u8; 32]).unwrap();
        assert!(matches!(
            wrapper.unwrap_key(&wrapped, RsaKeyWrapper::ALGORITHM),
            Err(StowageError::Encryption(_))
        ));
    }

    #[test]
    fn test_seal_and_open() {
        let binding = binding(&[]);
        let envelope = binding.seal(b"some long content spanning more than one cipher block").unwrap();
        assert!(!envelope.contains("cipher block"));
        assert!(envelope.contains(CONTENT_ALGORITHM));
        assert_eq!(
            binding.open(&envelope).unwrap(),
            b"some long content spanning more than one cipher block".to_vec()
        );
    }

    #[test]
    fn test_wrong_secret_fails() {
        let envelope = binding(&[]).seal(b"secret").unwrap();
        let other = EncryptionBinding::bind("key1", "another", BTreeSet::new()).unwrap();
        assert!(matches!(other.open(&envelope), Err(StowageError::Encryption(_))));

        let unknown = EncryptionBinding::bind("key2", "supersecretkey", BTreeSet::new()).unwrap();
        let err = unknown.open(&envelope).unwrap_err();
        assert!(err.to_string().contains("local:key1"));
    }

    #[test]
    fn test_value_round_trip_keeps_type() {
        let binding = binding(&["Secret"]);
        let sealed = binding.seal_value(&Value::Integer(42)).unwrap();
        assert_eq!(binding.open_value(&sealed).unwrap(), Value::Integer(42));
    }

    #[test]
    fn test_should_encrypt_is_field_selective() {
        let binding = binding(&["Secret"]);
        assert!(binding.should_encrypt("pk", "rk", "Secret"));
        assert!(!binding.should_encrypt("pk", "rk", "NonSecret"));
    }

    #[test]
    fn test_bind_requires_key_material() {
        let err = EncryptionBinding::bind("", "secret", BTreeSet::new()).unwrap_err();
        assert!(matches!(err, StowageError::Configuration(_)));
        assert!(EncryptionBinding::bind("id", "", BTreeSet::new()).is_err());
    }
}
