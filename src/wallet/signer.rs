//! Secure wallet implementation
//!
//! SECURITY: This is the ONLY place where a live signing key exists.
//! - Keys are held in the Solana SDK `Keypair`
//! - Keys are never serialized except into the encrypted key store
//! - Keys are never logged

use crate::wallet::keystore::StoredWallet;
use crate::{Error, Result};
use solana_sdk::derivation_path::DerivationPath;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::signer::keypair::{keypair_from_seed, keypair_from_seed_and_derivation_path};
use zeroize::Zeroizing;

/// Length of a Solana secret key (32-byte seed followed by 32-byte public key)
pub const SECRET_KEY_LEN: usize = 64;

/// Derivation path used for mnemonic imports
pub const DERIVATION_PATH: &str = "m/44'/501'/0'/0'";

/// Secure wallet that protects the signing key
///
/// The private key is:
/// - Stored in the SDK `Keypair`
/// - Never serialized (no Serialize impl)
/// - Only reachable through signing operations inside the crate
pub struct SecureWallet {
    keypair: Keypair,
    pubkey: Pubkey,
}

impl SecureWallet {
    /// Derive a wallet from a BIP-39 phrase at `m/44'/501'/0'/0'`.
    ///
    /// Returns the wallet and the whitespace-normalized phrase.
    pub fn from_mnemonic(phrase: &str) -> Result<(Self, Zeroizing<String>)> {
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(" "),
        );
        if normalized.is_empty() {
            return Err(Error::InvalidMnemonic("phrase is empty".to_string()));
        }

        let mnemonic = bip39::Mnemonic::parse_normalized(&normalized)
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;
        let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));

        let path = DerivationPath::new_bip44(Some(0), Some(0));
        let keypair = keypair_from_seed_and_derivation_path(&seed[..], Some(path))
            .map_err(|e| Error::InvalidMnemonic(format!("derivation failed: {}", e)))?;

        Ok((Self::from_keypair(keypair), normalized))
    }

    /// Build a wallet from 64 secret-key bytes.
    ///
    /// The public half must match the key derived from the first 32 bytes.
    pub fn from_secret_key_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(Error::InvalidKeyMaterial(format!(
                "expected {} bytes, got {}",
                SECRET_KEY_LEN,
                bytes.len()
            )));
        }

        let keypair = keypair_from_seed(&bytes[..32])
            .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))?;
        if keypair.pubkey().to_bytes() != bytes[32..] {
            return Err(Error::InvalidKeyMaterial(
                "public key does not match secret key".to_string(),
            ));
        }

        Ok(Self::from_keypair(keypair))
    }

    fn from_keypair(keypair: Keypair) -> Self {
        let pubkey = keypair.pubkey();
        Self { keypair, pubkey }
    }

    /// Get the public key (safe to share)
    pub fn pubkey(&self) -> Pubkey {
        self.pubkey
    }

    /// Base58 public key
    pub fn pubkey_string(&self) -> String {
        self.pubkey.to_string()
    }

    /// Sign arbitrary message bytes
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.keypair.sign_message(message)
    }

    /// Signer handle for SDK transaction builders
    pub(crate) fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Persistable form of this wallet
    pub(crate) fn to_stored(&self, mnemonic: Option<String>) -> StoredWallet {
        StoredWallet {
            public_key: self.pubkey_string(),
            secret_key: self.keypair.to_bytes().to_vec(),
            mnemonic,
        }
    }
}

// Implement Debug manually to avoid exposing the keypair
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("pubkey", &self.pubkey)
            .field("keypair", &"[REDACTED]")
            .finish()
    }
}

/// Parse user-supplied secret key text.
///
/// Accepts a JSON byte array (`[12, 34, ...]`) or a base58 string.
pub fn parse_secret_key_input(input: &str) -> Result<Zeroizing<Vec<u8>>> {
    let trimmed = input.trim();
    if trimmed.starts_with('[') {
        let bytes: Vec<u8> = serde_json::from_str(trimmed).map_err(|_| {
            Error::InvalidKeyMaterial("private key must be a JSON byte array".to_string())
        })?;
        return Ok(Zeroizing::new(bytes));
    }

    bs58::decode(trimmed)
        .into_vec()
        .map(Zeroizing::new)
        .map_err(|_| Error::InvalidKeyMaterial("private key is not valid base58".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_secret_key_roundtrip_matches_sdk() {
        let keypair = Keypair::new();
        let wallet = SecureWallet::from_secret_key_bytes(&keypair.to_bytes()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
        assert_eq!(wallet.pubkey_string(), keypair.pubkey().to_string());
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = SecureWallet::from_secret_key_bytes(&[7u8; 32]).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyMaterial(_)));
    }

    #[test]
    fn test_rejects_mismatched_public_half() {
        let mut bytes = Keypair::new().to_bytes();
        let other = Keypair::new().pubkey().to_bytes();
        bytes[32..].copy_from_slice(&other);
        let err = SecureWallet::from_secret_key_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyMaterial(_)));
    }

    #[test]
    fn test_mnemonic_is_deterministic() {
        let (first, phrase) = SecureWallet::from_mnemonic(TEST_PHRASE).unwrap();
        let (second, _) = SecureWallet::from_mnemonic(&format!("  {}  ", TEST_PHRASE.to_uppercase()))
            .unwrap();
        assert_eq!(first.pubkey(), second.pubkey());
        assert_eq!(phrase.as_str(), TEST_PHRASE);
    }

    #[test]
    fn test_mnemonic_wallet_roundtrips_through_secret_bytes() {
        let (wallet, _) = SecureWallet::from_mnemonic(TEST_PHRASE).unwrap();
        let stored = wallet.to_stored(None);
        let restored = SecureWallet::from_secret_key_bytes(&stored.secret_key).unwrap();
        assert_eq!(restored.pubkey(), wallet.pubkey());
        assert_eq!(stored.public_key, wallet.pubkey_string());
    }

    #[test]
    fn test_malformed_mnemonics_rejected() {
        let bad_checksum = ["abandon"; 12].join(" ");
        let short = ["abandon"; 11].join(" ");
        let unknown_word = TEST_PHRASE.replace("about", "aboutt");
        for phrase in [bad_checksum.as_str(), short.as_str(), unknown_word.as_str(), ""] {
            assert!(
                matches!(
                    SecureWallet::from_mnemonic(phrase),
                    Err(Error::InvalidMnemonic(_))
                ),
                "accepted {:?}",
                phrase
            );
        }
    }

    #[test]
    fn test_sign_message_verifies() {
        let wallet = SecureWallet::from_secret_key_bytes(&Keypair::new().to_bytes()).unwrap();
        let signature = wallet.sign_message(b"hello");
        assert!(signature.verify(wallet.pubkey().as_ref(), b"hello"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let keypair = Keypair::new();
        let wallet = SecureWallet::from_secret_key_bytes(&keypair.to_bytes()).unwrap();
        let debug_str = format!("{:?}", wallet);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains(&keypair.to_base58_string()));
    }

    #[test]
    fn test_parse_secret_key_input_formats() {
        let keypair = Keypair::new();
        let bytes = keypair.to_bytes();

        let json = serde_json::to_string(&bytes.to_vec()).unwrap();
        assert_eq!(parse_secret_key_input(&json).unwrap().as_slice(), &bytes[..]);

        let b58 = keypair.to_base58_string();
        assert_eq!(parse_secret_key_input(&b58).unwrap().as_slice(), &bytes[..]);

        assert!(parse_secret_key_input("[1, 2, 300]").is_err());
        assert!(parse_secret_key_input("not-base58-0OIl").is_err());
    }
}
