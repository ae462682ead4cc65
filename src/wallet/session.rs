//! Active wallet session
//!
//! Holds at most one signing key in memory. Importing replaces the key
//! outright; removing clears both the key store and memory.

use crate::wallet::keystore::KeyStore;
use crate::wallet::signer::SecureWallet;
use crate::{Error, Result};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct Session {
    store: KeyStore,
    active: RwLock<Option<Arc<SecureWallet>>>,
}

impl Session {
    pub fn new(store: KeyStore) -> Self {
        Self {
            store,
            active: RwLock::new(None),
        }
    }

    /// Activate the persisted wallet, if any.
    ///
    /// Stored key material whose public key does not match its secret key
    /// is rejected and nothing is activated.
    pub async fn restore(&self) -> Result<Option<Pubkey>> {
        let Some(stored) = self.store.load().await? else {
            tracing::debug!("No stored wallet found");
            return Ok(None);
        };

        let wallet = SecureWallet::from_secret_key_bytes(&stored.secret_key)?;
        if wallet.pubkey_string() != stored.public_key {
            tracing::warn!("Stored public key does not match stored secret key");
            return Err(Error::InvalidKeyMaterial(
                "stored public key does not match secret key".to_string(),
            ));
        }

        let pubkey = wallet.pubkey();
        *self.active.write().await = Some(Arc::new(wallet));
        tracing::info!(pubkey = %pubkey, "Restored wallet session");
        Ok(Some(pubkey))
    }

    /// Derive, persist and activate a wallet from a seed phrase
    pub async fn import_from_mnemonic(&self, phrase: &str) -> Result<Pubkey> {
        let (wallet, normalized) = SecureWallet::from_mnemonic(phrase)?;
        let stored = wallet.to_stored(Some(normalized.to_string()));
        self.store.save(&stored).await?;
        Ok(self.activate(wallet, "mnemonic").await)
    }

    /// Validate, persist and activate a wallet from 64 secret-key bytes
    pub async fn import_from_secret_key_bytes(&self, bytes: &[u8]) -> Result<Pubkey> {
        let wallet = SecureWallet::from_secret_key_bytes(bytes)?;
        let stored = wallet.to_stored(None);
        self.store.save(&stored).await?;
        Ok(self.activate(wallet, "secret_key").await)
    }

    async fn activate(&self, wallet: SecureWallet, source: &'static str) -> Pubkey {
        let pubkey = wallet.pubkey();
        let previous = self.active.write().await.replace(Arc::new(wallet));
        tracing::info!(
            pubkey = %pubkey,
            source,
            replaced = previous.is_some(),
            "Imported wallet"
        );
        pubkey
    }

    /// Erase the stored wallet and the in-memory key
    pub async fn remove(&self) -> Result<()> {
        self.store.clear().await?;
        *self.active.write().await = None;
        tracing::info!("Removed wallet");
        Ok(())
    }

    pub async fn current(&self) -> Option<Arc<SecureWallet>> {
        self.active.read().await.clone()
    }

    /// Current wallet, or `NoActiveWallet`
    pub async fn require(&self) -> Result<Arc<SecureWallet>> {
        self.current().await.ok_or(Error::NoActiveWallet)
    }

    pub async fn is_loaded(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Underlying key store
    pub fn store(&self) -> &KeyStore {
        &self.store
    }
}
