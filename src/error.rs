//! Error taxonomy for vault operations.
//!
//! Four stable kinds: a required-absent path exists, a decryption failed,
//! a config signature failed to verify, or the storage backend errored.
//! Backend errors pass through unchanged. Messages may carry paths but
//! never key material, passwords or derived secrets.

use std::fmt;

use thiserror::Error;

use crate::provider::ProviderError;

/// What a failed decryption was operating on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptionTarget {
    /// AES-KW unwrap of the wrapped master keys (wrong password).
    Vault,
    /// AES-SIV open of an encrypted item name.
    ItemName,
    /// File header (reserved for the content pipeline).
    FileHeader,
    /// File content chunk (reserved for the content pipeline).
    FileContent,
}

impl fmt::Display for DecryptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecryptionTarget::Vault => write!(f, "vault keys"),
            DecryptionTarget::ItemName => write!(f, "item name"),
            DecryptionTarget::FileHeader => write!(f, "file header"),
            DecryptionTarget::FileContent => write!(f, "file content"),
        }
    }
}

/// What a failed signature verification was operating on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureTarget {
    /// The `vault.cryptomator` JWT.
    Vault,
}

impl fmt::Display for SignatureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureTarget::Vault => write!(f, "vault config"),
        }
    }
}

/// Errors surfaced by vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("path already exists: {0}")]
    AlreadyExists(String),

    /// The cause is deliberately opaque: an AES-KW or AES-SIV failure
    /// reveals nothing beyond "wrong key or tampered data".
    #[error("unable to decrypt {target}")]
    Decryption {
        target: DecryptionTarget,
        /// Storage name of the item involved, when one exists.
        item: Option<String>,
    },

    #[error("signature verification failed for {target}")]
    InvalidSignature { target: SignatureTarget },

    #[error("invalid vault document: {0}")]
    Format(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl VaultError {
    pub(crate) fn decryption(target: DecryptionTarget) -> Self {
        VaultError::Decryption { target, item: None }
    }

    pub(crate) fn name_decryption(item: impl Into<String>) -> Self {
        VaultError::Decryption {
            target: DecryptionTarget::ItemName,
            item: Some(item.into()),
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_message_has_no_item_details_by_default() {
        let err = VaultError::decryption(DecryptionTarget::Vault);
        assert_eq!(err.to_string(), "unable to decrypt vault keys");
    }

    #[test]
    fn test_name_decryption_carries_item() {
        let err = VaultError::name_decryption("abc.c9r");
        match err {
            VaultError::Decryption { target, item } => {
                assert_eq!(target, DecryptionTarget::ItemName);
                assert_eq!(item.as_deref(), Some("abc.c9r"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
