//! Secure wallet management
//!
//! This module handles key import, encrypted persistence and the active
//! signing session. The private key NEVER leaves this module except into the
//! encrypted key store.

pub mod keystore;
mod session;
mod signer;

pub use keystore::{EncryptedFileStore, KdfParams, KeyStore, MemoryStore, SecureStore, StoredWallet};
pub use session::Session;
pub use signer::{parse_secret_key_input, SecureWallet, DERIVATION_PATH, SECRET_KEY_LEN};
