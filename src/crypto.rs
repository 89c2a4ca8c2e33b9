//! Envelope encryption (C1).
//!
//! Two key levels: a single process-wide master key wraps per-workspace data
//! keys; data keys encrypt individual fields with AES-256-GCM. The master key
//! is never used to touch plaintext data directly — only to wrap/unwrap
//! workspace keys.
//!
//! On-disk field format: `enc:` + base64(iv) + `:` + base64(ciphertext ‖ tag).
//! A value without the `enc:` prefix is plaintext and passed through
//! unchanged on decrypt (the migration path for pre-encryption rows).
//!
//! Wrapped-key blob: base64(iv ‖ wrapped-key-bytes), stored on the workspace
//! row by the control store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{MementoError, MementoResult};

const NONCE_LEN: usize = 12;
const ENC_PREFIX: &str = "enc:";

/// A 256-bit key used to encrypt/decrypt fields within one workspace.
#[derive(Clone)]
pub struct WorkspaceKey(pub [u8; 32]);

impl WorkspaceKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        use rand::RngCore;
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

/// Non-production fallback master key, derived deterministically so local
/// development works without any secret configured. Never used when
/// `production` is true.
fn development_master_key() -> [u8; 32] {
    *blake3::hash(b"memento-development-master-key-do-not-use-in-production").as_bytes()
}

pub struct CryptoService {
    master: [u8; 32],
    /// `true` when no real master key was configured and the development
    /// fallback is active — every field write/read in this mode is logged.
    degraded: bool,
    degraded_logged: AtomicBool,
    /// Process-wide unwrapped-key cache, keyed by workspace id.
    cache: DashMap<String, Arc<WorkspaceKey>>,
    /// Single-flight locks so a cache miss only triggers one unwrap per
    /// workspace even under concurrent requests.
    inflight: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl CryptoService {
    pub fn new(master_key: Option<[u8; 32]>) -> Self {
        let degraded = master_key.is_none();
        if degraded {
            tracing::warn!("no MEMENTO_MASTER_KEY configured; using non-production development fallback");
        }
        Self {
            master: master_key.unwrap_or_else(development_master_key),
            degraded,
            degraded_logged: AtomicBool::new(false),
            cache: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn log_degraded_once(&self) {
        if self.degraded && !self.degraded_logged.swap(true, Ordering::Relaxed) {
            tracing::warn!("operating with the development master key; field encryption is not safe for production data");
        }
    }

    // -- field encryption -------------------------------------------------

    pub fn encrypt(&self, plaintext: &str, key: &WorkspaceKey) -> String {
        self.log_degraded_once();
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = key
            .cipher()
            .encrypt(&nonce, plaintext.as_bytes())
            .expect("AES-GCM encryption is infallible for valid inputs");
        format!(
            "{ENC_PREFIX}{}:{}",
            B64.encode(nonce),
            B64.encode(ciphertext)
        )
    }

    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENC_PREFIX)
    }

    /// Decrypts a field. Passthrough for unprefixed (plaintext) values.
    /// A malformed `enc:` payload is a fatal integrity error — it is never
    /// silently returned as plaintext.
    pub fn decrypt(&self, value: &str, key: &WorkspaceKey) -> MementoResult<String> {
        let Some(rest) = value.strip_prefix(ENC_PREFIX) else {
            return Ok(value.to_string());
        };
        let (iv_b64, ct_b64) = rest
            .split_once(':')
            .ok_or_else(|| MementoError::Integrity("malformed enc: payload".into()))?;
        let iv = B64
            .decode(iv_b64)
            .map_err(|e| MementoError::Integrity(format!("bad iv encoding: {e}")))?;
        if iv.len() != NONCE_LEN {
            return Err(MementoError::Integrity("bad iv length".into()));
        }
        let ciphertext = B64
            .decode(ct_b64)
            .map_err(|e| MementoError::Integrity(format!("bad ciphertext encoding: {e}")))?;
        let nonce = Nonce::from_slice(&iv);
        let plaintext = key
            .cipher()
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| MementoError::Integrity("authentication failure decrypting field".into()))?;
        String::from_utf8(plaintext)
            .map_err(|e| MementoError::Integrity(format!("decrypted value is not utf8: {e}")))
    }

    pub fn encrypt_many(&self, record: &mut Map<String, Value>, fields: &[&str], key: &WorkspaceKey) {
        for field in fields {
            if let Some(Value::String(s)) = record.get(*field) {
                let enc = self.encrypt(s, key);
                record.insert((*field).to_string(), Value::String(enc));
            }
        }
    }

    pub fn decrypt_many(
        &self,
        record: &mut Map<String, Value>,
        fields: &[&str],
        key: &WorkspaceKey,
    ) -> MementoResult<()> {
        for field in fields {
            if let Some(Value::String(s)) = record.get(*field).cloned() {
                let plain = self.decrypt(&s, key)?;
                record.insert((*field).to_string(), Value::String(plain));
            }
        }
        Ok(())
    }

    // -- key wrapping -------------------------------------------------

    /// Wrap a workspace data key under the master key for storage on the
    /// workspace row. Format: base64(iv ‖ wrapped-key-bytes).
    pub fn wrap_workspace_key(&self, key: &WorkspaceKey) -> String {
        let master = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.master));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let wrapped = master
            .encrypt(&nonce, key.0.as_ref())
            .expect("AES-GCM wrap is infallible for valid inputs");
        let mut blob = Vec::with_capacity(NONCE_LEN + wrapped.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&wrapped);
        B64.encode(blob)
    }

    pub fn unwrap_workspace_key(&self, blob: &str) -> MementoResult<WorkspaceKey> {
        let raw = B64
            .decode(blob)
            .map_err(|e| MementoError::Integrity(format!("bad wrapped key encoding: {e}")))?;
        if raw.len() <= NONCE_LEN {
            return Err(MementoError::Integrity("wrapped key blob too short".into()));
        }
        let (iv, wrapped) = raw.split_at(NONCE_LEN);
        let master = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.master));
        let nonce = Nonce::from_slice(iv);
        let unwrapped = master
            .decrypt(nonce, wrapped)
            .map_err(|_| MementoError::Integrity("authentication failure unwrapping workspace key".into()))?;
        if unwrapped.len() != 32 {
            return Err(MementoError::Integrity("unwrapped key has wrong length".into()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&unwrapped);
        Ok(WorkspaceKey(bytes))
    }

    // -- process-wide key cache -------------------------------------------------

    pub fn cached(&self, workspace_id: &str) -> Option<Arc<WorkspaceKey>> {
        self.cache.get(workspace_id).map(|e| e.clone())
    }

    fn lock_for(&self, workspace_id: &str) -> Arc<AsyncMutex<()>> {
        self.inflight
            .entry(workspace_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Resolve the unwrapped key for a workspace, consulting the cache first.
    /// `load_wrapped` is called at most once per concurrent miss (single
    /// flight) and should read the wrapped blob from the control store, or
    /// `None` if the workspace has never had a key materialized.
    /// `persist_new` is invoked (at most once) if a fresh key had to be
    /// generated, so the caller can write the wrapped blob back.
    pub async fn get_or_create_workspace_key<FLoad, FutLoad, FPersist, FutPersist>(
        &self,
        workspace_id: &str,
        load_wrapped: FLoad,
        persist_new: FPersist,
    ) -> MementoResult<Arc<WorkspaceKey>>
    where
        FLoad: FnOnce() -> FutLoad,
        FutLoad: std::future::Future<Output = MementoResult<Option<String>>>,
        FPersist: FnOnce(String) -> FutPersist,
        FutPersist: std::future::Future<Output = MementoResult<()>>,
    {
        if let Some(key) = self.cached(workspace_id) {
            return Ok(key);
        }
        let lock = self.lock_for(workspace_id);
        let _guard = lock.lock().await;
        // Re-check after acquiring the single-flight lock.
        if let Some(key) = self.cached(workspace_id) {
            return Ok(key);
        }
        let key = match load_wrapped().await? {
            Some(blob) => self.unwrap_workspace_key(&blob)?,
            None => {
                let fresh = WorkspaceKey::generate();
                let blob = self.wrap_workspace_key(&fresh);
                persist_new(blob).await?;
                fresh
            }
        };
        let key = Arc::new(key);
        self.cache.insert(workspace_id.to_string(), key.clone());
        Ok(key)
    }

    /// Test-only hook: drop a cached key so a subsequent call re-reads it.
    pub fn invalidate(&self, workspace_id: &str) {
        self.cache.remove(workspace_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let svc = CryptoService::new(Some([7u8; 32]));
        let key = WorkspaceKey::generate();
        let enc = svc.encrypt("hello world", &key);
        assert!(CryptoService::is_encrypted(&enc));
        assert_eq!(svc.decrypt(&enc, &key).unwrap(), "hello world");
    }

    #[test]
    fn two_encryptions_differ() {
        let svc = CryptoService::new(Some([7u8; 32]));
        let key = WorkspaceKey::generate();
        let a = svc.encrypt("same", &key);
        let b = svc.encrypt("same", &key);
        assert_ne!(a, b);
    }

    #[test]
    fn passthrough_unprefixed() {
        let svc = CryptoService::new(Some([7u8; 32]));
        let key = WorkspaceKey::generate();
        assert_eq!(svc.decrypt("plain text", &key).unwrap(), "plain text");
    }

    #[test]
    fn malformed_enc_is_integrity_error() {
        let svc = CryptoService::new(Some([7u8; 32]));
        let key = WorkspaceKey::generate();
        assert!(svc.decrypt("enc:not-valid", &key).is_err());
    }

    #[test]
    fn wrap_unwrap_round_trip() {
        let svc = CryptoService::new(Some([9u8; 32]));
        let data_key = WorkspaceKey::generate();
        let wrapped = svc.wrap_workspace_key(&data_key);
        let unwrapped = svc.unwrap_workspace_key(&wrapped).unwrap();
        let msg = svc.encrypt("secret", &data_key);
        assert_eq!(svc.decrypt(&msg, &unwrapped).unwrap(), "secret");
    }
}
