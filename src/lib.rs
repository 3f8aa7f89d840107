//! Cryptomator Vault Format 8 core (cipher combination SIV_CTRMAC).
//!
//! Client-side encrypted vaults compatible with the Cryptomator on-storage
//! layout: an scrypt-derived KEK unwraps two AES-KW wrapped master keys,
//! a JWT config document binds the vault parameters to those keys, item
//! names are sealed with AES-SIV under their parent directory ID, and
//! directory IDs map deterministically to `d/XX/YYYY…` storage paths.
//!
//! Storage is pluggable: every blob operation goes through the async
//! [`DataProvider`] trait, so vaults work the same over a local disk or
//! any remote backend.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cryptomator_core::{CreateOptions, LocalFsProvider, Vault};
//!
//! # async fn demo() -> cryptomator_core::VaultResult<()> {
//! let provider = Arc::new(LocalFsProvider);
//! let vault = Vault::create(
//!     provider,
//!     "/data/vaults",
//!     "correct horse battery staple",
//!     CreateOptions {
//!         name: Some("My Vault".to_string()),
//!         ..Default::default()
//!     },
//! )
//! .await?;
//!
//! let root = vault.root_dir()?;
//! vault.create_directory("documents", &root, None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The file-content chunk pipeline is out of scope: `contents.c9r`
//! payloads are opaque bytes to this crate and are sealed/opened by an
//! external content cipher.

pub mod config;
pub mod error;
pub mod items;
pub mod keys;
pub mod masterkey;
mod names;
pub mod provider;
pub mod vault;

pub use config::{VaultConfigClaims, CIPHER_COMBO, DEFAULT_SHORTENING_THRESHOLD, VAULT_FORMAT};
pub use error::{DecryptionTarget, SignatureTarget, VaultError, VaultResult};
pub use items::{EncryptedDir, EncryptedFile, EncryptedItem};
pub use keys::{EncryptionKey, MacKey};
pub use masterkey::{MasterkeyFile, MASTERKEY_VERSION};
pub use names::{
    CONTENTS_FILE, DIR_ID_BACKUP_FILE, DIR_ID_FILE, LONG_NAME_FILE, REGULAR_SUFFIX,
    SHORTENED_SUFFIX,
};
pub use provider::{DataProvider, Item, ItemKind, LocalFsProvider, ProviderError};
pub use vault::{
    CreateOptions, CreationStep, OpenOptions, ProgressFn, QueryOptions, Vault, VaultSettings,
    DATA_DIR, DEFAULT_SCRYPT_BLOCK_SIZE, DEFAULT_SCRYPT_COST, MASTERKEY_FILE, VAULT_CONFIG_FILE,
};
