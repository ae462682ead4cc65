//! Encrypted persistence for the single stored wallet
//!
//! [`KeyStore`] serializes one [`StoredWallet`] as JSON under a fixed key in a
//! [`SecureStore`]. The store itself is pluggable: [`EncryptedFileStore`]
//! keeps ChaCha20-Poly1305 encrypted files on disk under an Argon2id key,
//! [`MemoryStore`] keeps values in memory only.

use crate::{Error, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Key under which the wallet is stored
pub const WALLET_KEY: &str = "eatsol.wallet.v1";

/// Persisted wallet record
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct StoredWallet {
    /// Base58 public key derived from `secret_key`
    pub public_key: String,
    /// 64-byte secret key (seed followed by public key)
    pub secret_key: Vec<u8>,
    /// Phrase the key was derived from, if imported from a mnemonic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
}

impl std::fmt::Debug for StoredWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredWallet")
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .field("has_mnemonic", &self.mnemonic.is_some())
            .finish()
    }
}

/// Minimal secure key-value store
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<Zeroizing<String>>>;

    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    async fn delete_item(&self, key: &str) -> Result<()>;
}

/// Wallet persistence over a [`SecureStore`]
pub struct KeyStore {
    store: Box<dyn SecureStore>,
}

impl KeyStore {
    pub fn new(store: impl SecureStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Key store backed by process memory only
    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    pub async fn save(&self, wallet: &StoredWallet) -> Result<()> {
        let json = Zeroizing::new(serde_json::to_string(wallet)?);
        self.store.set_item(WALLET_KEY, &json).await
    }

    /// Load the stored wallet; an unparseable value counts as absent
    pub async fn load(&self) -> Result<Option<StoredWallet>> {
        let Some(raw) = self.store.get_item(WALLET_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<StoredWallet>(&raw) {
            Ok(wallet) => Ok(Some(wallet)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse stored wallet");
                Ok(None)
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.delete_item(WALLET_KEY).await
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, Zeroizing<String>>>,
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .write()
            .await
            .insert(key.to_string(), Zeroizing::new(value.to_string()));
        Ok(())
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

/// Argon2id cost parameters, stored next to the salt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost: u32,
    /// Number of passes
    pub t_cost: u32,
    /// Lanes
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 64 * 1024,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    /// Upper bound accepted when reading a file, so a tampered header cannot
    /// demand unbounded memory
    const MAX_M_COST: u32 = 1024 * 1024;

    fn argon2(&self) -> Result<Argon2<'static>> {
        if self.m_cost > Self::MAX_M_COST {
            return Err(Error::Storage(format!(
                "key derivation memory cost {} KiB exceeds limit",
                self.m_cost
            )));
        }
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(|e| Error::Storage(format!("invalid key derivation params: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;

/// On-disk envelope for one encrypted value
#[derive(Serialize, Deserialize)]
struct SealedItem {
    kdf: KdfParams,
    salt: String,
    nonce: String,
    ciphertext: String,
}

/// Stretch the passphrase into a cipher key with Argon2id
fn derive_cipher(passphrase: &SecretString, salt: &[u8], kdf: KdfParams) -> Result<ChaCha20Poly1305> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    kdf.argon2()?
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key[..])
        .map_err(|e| Error::Storage(format!("key derivation failed: {}", e)))?;
    ChaCha20Poly1305::new_from_slice(&key[..])
        .map_err(|_| Error::Storage("invalid cipher key length".to_string()))
}

/// File-per-key store encrypted with ChaCha20-Poly1305.
///
/// The cipher key is derived with Argon2id from the passphrase and a fresh
/// random salt on every write. Derivation runs on the blocking pool.
pub struct EncryptedFileStore {
    dir: PathBuf,
    passphrase: SecretString,
    kdf: KdfParams,
}

impl EncryptedFileStore {
    pub fn new(dir: impl Into<PathBuf>, passphrase: SecretString) -> Result<Self> {
        if passphrase.expose_secret().is_empty() {
            return Err(Error::Storage("key store passphrase is empty".to_string()));
        }
        Ok(Self {
            dir: dir.into(),
            passphrase,
            kdf: KdfParams::default(),
        })
    }

    /// Cost parameters for future writes; existing files keep their own
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid || key.starts_with('.') {
            return Err(Error::Storage(format!("invalid store key: {}", key)));
        }
        Ok(self.dir.join(format!("{}.enc", key)))
    }

    async fn cipher(&self, salt: Vec<u8>, kdf: KdfParams) -> Result<ChaCha20Poly1305> {
        let passphrase = self.passphrase.clone();
        tokio::task::spawn_blocking(move || derive_cipher(&passphrase, &salt, kdf))
            .await
            .map_err(|e| Error::Storage(format!("key derivation task failed: {}", e)))?
    }

    async fn seal(&self, plaintext: &[u8]) -> Result<SealedItem> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher(salt.to_vec(), self.kdf)
            .await?
            .encrypt(&nonce, plaintext)
            .map_err(|_| Error::Storage("encryption failed".to_string()))?;

        Ok(SealedItem {
            kdf: self.kdf,
            salt: BASE64.encode(salt),
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    async fn open(&self, item: &SealedItem) -> Result<Zeroizing<String>> {
        let decode = |field: &str, value: &str| {
            BASE64
                .decode(value)
                .map_err(|e| Error::Storage(format!("corrupt {}: {}", field, e)))
        };
        let salt = decode("salt", &item.salt)?;
        let nonce_bytes = decode("nonce", &item.nonce)?;
        if nonce_bytes.len() != 12 {
            return Err(Error::Storage("corrupt nonce length".to_string()));
        }
        let ciphertext = decode("ciphertext", &item.ciphertext)?;

        let plaintext = Zeroizing::new(
            self.cipher(salt, item.kdf)
                .await?
                .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
                .map_err(|_| {
                    Error::Storage("decryption failed - wrong passphrase or corrupt file".to_string())
                })?,
        );

        String::from_utf8(plaintext.to_vec())
            .map(Zeroizing::new)
            .map_err(|_| Error::Storage("decrypted value is not UTF-8".to_string()))
    }
}

#[async_trait]
impl SecureStore for EncryptedFileStore {
    async fn get_item(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        let path = self.path_for(key)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("{}: {}", path.display(), e))),
        };

        let item: SealedItem = serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("corrupt store file: {}", e)))?;
        self.open(&item).await.map(Some)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let sealed = self.seal(value.as_bytes()).await?;
        let json = serde_json::to_vec(&sealed)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Storage(format!("{}: {}", self.dir.display(), e)))?;

        let tmp = path.with_extension("enc.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| Error::Storage(format!("{}: {}", tmp.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| Error::Storage(format!("{}: {}", tmp.display(), e)))?;
        }

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), "Wrote encrypted store item");
        Ok(())
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("{}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_kdf() -> KdfParams {
        KdfParams {
            m_cost: 256,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn file_store(dir: &std::path::Path, passphrase: &str) -> EncryptedFileStore {
        EncryptedFileStore::new(dir, SecretString::from(passphrase.to_string()))
            .unwrap()
            .with_kdf_params(light_kdf())
    }

    fn sample_wallet() -> StoredWallet {
        StoredWallet {
            public_key: "Dest1111111111111111111111111111111111111111".to_string(),
            secret_key: (0u8..64).collect(),
            mnemonic: Some("abandon about".to_string()),
        }
    }

    #[tokio::test]
    async fn test_memory_save_load_clear() {
        let store = KeyStore::in_memory();
        assert!(store.load().await.unwrap().is_none());

        store.save(&sample_wallet()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.public_key, sample_wallet().public_key);
        assert_eq!(loaded.secret_key.len(), 64);
        assert_eq!(loaded.mnemonic.as_deref(), Some("abandon about"));

        tokio_test::assert_ok!(store.clear().await);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_json_uses_camel_case() {
        let json = serde_json::to_value(sample_wallet()).unwrap();
        assert!(json.get("publicKey").is_some());
        assert!(json.get("secretKey").unwrap().is_array());

        let mut without_mnemonic = sample_wallet();
        without_mnemonic.mnemonic = None;
        let json = serde_json::to_value(&without_mnemonic).unwrap();
        assert!(json.get("mnemonic").is_none());
    }

    #[tokio::test]
    async fn test_unparseable_value_loads_as_none() {
        let memory = MemoryStore::default();
        memory.set_item(WALLET_KEY, "{not json").await.unwrap();
        let store = KeyStore::new(memory);
        assert!(store.load().await.unwrap().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug_str = format!("{:?}", sample_wallet());
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("abandon"));
    }

    #[tokio::test]
    async fn test_encrypted_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(file_store(dir.path(), "correct horse"));

        store.save(&sample_wallet()).await.unwrap();
        let path = dir.path().join(format!("{}.enc", WALLET_KEY));
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("publicKey"));
        assert!(!on_disk.contains("abandon"));

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.public_key, sample_wallet().public_key);

        store.clear().await.unwrap();
        assert!(!path.exists());
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_passphrase_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = file_store(dir.path(), "one");
        writer.set_item(WALLET_KEY, "secret").await.unwrap();

        let reader = file_store(dir.path(), "two");
        let err = reader.get_item(WALLET_KEY).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path(), "pw");
        tokio_test::assert_err!(store.set_item("../escape", "x").await);
        tokio_test::assert_err!(store.get_item("").await);
        tokio_test::assert_ok!(store.set_item("eatsol.wallet.v1", "x").await);
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(EncryptedFileStore::new("/tmp/unused", SecretString::from("".to_string())).is_err());
    }

    #[tokio::test]
    async fn test_file_records_argon2_params() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path(), "pw");
        store.set_item(WALLET_KEY, "value").await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(format!("{}.enc", WALLET_KEY))).unwrap();
        let item: SealedItem = serde_json::from_str(&raw).unwrap();
        assert_eq!(item.kdf, light_kdf());
        assert_eq!(BASE64.decode(&item.salt).unwrap().len(), SALT_LEN);

        // A reader configured with different costs still opens the file
        let reader = EncryptedFileStore::new(dir.path(), SecretString::from("pw".to_string())).unwrap();
        assert_eq!(reader.get_item(WALLET_KEY).await.unwrap().unwrap().as_str(), "value");
    }

    #[test]
    fn test_default_kdf_is_memory_hard() {
        let kdf = KdfParams::default();
        assert!(kdf.m_cost >= 64 * 1024);
        assert!(kdf.t_cost >= 3);

        let key = SecretString::from("pw".to_string());
        let salt = [7u8; SALT_LEN];
        let light = |m_cost| KdfParams { m_cost, ..light_kdf() };
        // Same inputs derive the same key; changed costs derive another
        let sealed = derive_cipher(&key, &salt, light(256))
            .unwrap()
            .encrypt(Nonce::from_slice(&[0u8; 12]), b"x".as_slice())
            .unwrap();
        assert!(derive_cipher(&key, &salt, light(256))
            .unwrap()
            .decrypt(Nonce::from_slice(&[0u8; 12]), sealed.as_slice())
            .is_ok());
        assert!(derive_cipher(&key, &salt, light(512))
            .unwrap()
            .decrypt(Nonce::from_slice(&[0u8; 12]), sealed.as_slice())
            .is_err());
    }

    #[tokio::test]
    async fn test_tampered_kdf_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path(), "pw");
        store.set_item(WALLET_KEY, "value").await.unwrap();

        let path = dir.path().join(format!("{}.enc", WALLET_KEY));
        let mut item: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        item["kdf"]["m_cost"] = serde_json::json!(u32::MAX);
        std::fs::write(&path, item.to_string()).unwrap();

        let err = store.get_item(WALLET_KEY).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
