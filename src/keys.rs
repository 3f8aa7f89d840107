//! Key hierarchy: password → scrypt KEK → AES-KW wrapped master keys.
//!
//! Two 256-bit master keys back every vault: an AES key (`EncryptionKey`)
//! and an HMAC-SHA256 key (`MacKey`). Their 64-byte concatenations feed
//! two different consumers with two different orderings — AES-SIV takes
//! `mac ‖ enc`, JWT signing takes `enc ‖ mac`. Both orderings are load
//! bearing for on-storage compatibility.
//!
//! Every transient buffer holding the KEK or raw key bytes is zeroized
//! before drop; the long-lived key handles zeroize themselves on drop.

use aes_kw::Kek;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::zeroize::{Zeroize, Zeroizing};

use crate::error::{DecryptionTarget, VaultError, VaultResult};

/// Length of each master key in bytes.
pub const KEY_LEN: usize = 32;

/// AES-KW output: key length plus the 8-byte integrity block.
pub(crate) const WRAPPED_KEY_LEN: usize = KEY_LEN + 8;

/// 256-bit AES master key. Zeroized on drop.
pub struct EncryptionKey([u8; KEY_LEN]);

/// 256-bit HMAC-SHA256 master key. Zeroized on drop.
pub struct MacKey([u8; KEY_LEN]);

macro_rules! key_newtype {
    ($name:ident) => {
        impl $name {
            pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
                Self(bytes)
            }

            pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
                &self.0
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.0.zeroize();
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "(<redacted>)"))
            }
        }
    };
}

key_newtype!(EncryptionKey);
key_newtype!(MacKey);

/// 64-byte AES-SIV key material: `mac ‖ enc`. Zeroized on drop.
pub(crate) struct SivKey([u8; 2 * KEY_LEN]);

impl SivKey {
    pub(crate) fn assemble(enc: &EncryptionKey, mac: &MacKey) -> Self {
        let mut combined = [0u8; 2 * KEY_LEN];
        combined[..KEY_LEN].copy_from_slice(mac.as_bytes());
        combined[KEY_LEN..].copy_from_slice(enc.as_bytes());
        Self(combined)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 2 * KEY_LEN] {
        &self.0
    }
}

impl Drop for SivKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// 64-byte JWT signing key material: `enc ‖ mac` (the opposite order).
pub(crate) fn jwt_signing_key(enc: &EncryptionKey, mac: &MacKey) -> Zeroizing<[u8; 2 * KEY_LEN]> {
    let mut combined = Zeroizing::new([0u8; 2 * KEY_LEN]);
    combined[..KEY_LEN].copy_from_slice(enc.as_bytes());
    combined[KEY_LEN..].copy_from_slice(mac.as_bytes());
    combined
}

/// Derive the KEK from a password via scrypt (`p` fixed at 1, 32-byte output).
///
/// CPU-bound; callers run this under `spawn_blocking`.
pub(crate) fn derive_kek(
    password: &str,
    salt: &[u8],
    cost: u32,
    block_size: u32,
) -> VaultResult<Zeroizing<[u8; KEY_LEN]>> {
    let log_n = (cost as f64).log2() as u8;
    let params = scrypt::Params::new(log_n, block_size, 1, KEY_LEN)
        .map_err(|e| VaultError::Format(format!("scrypt params: {e}")))?;

    let mut kek = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut *kek)
        .map_err(|e| VaultError::Format(format!("scrypt derive: {e}")))?;

    Ok(kek)
}

/// Wrap a 256-bit key with AES Key Wrap (RFC 3394).
pub(crate) fn wrap_key(kek: &[u8; KEY_LEN], key: &[u8; KEY_LEN]) -> VaultResult<Vec<u8>> {
    let kek: Kek<aes::Aes256> = Kek::new(kek.into());
    let mut buf = [0u8; WRAPPED_KEY_LEN];
    kek.wrap(key, &mut buf)
        .map_err(|e| VaultError::Format(format!("AES-KW wrap: {e}")))?;
    Ok(buf.to_vec())
}

/// Unwrap an AES-KW wrapped key.
///
/// A failed integrity check means a wrong password (or tampered
/// document) and surfaces as an opaque vault decryption error.
pub(crate) fn unwrap_key(
    kek: &[u8; KEY_LEN],
    wrapped: &[u8],
) -> VaultResult<Zeroizing<[u8; KEY_LEN]>> {
    if wrapped.len() != WRAPPED_KEY_LEN {
        return Err(VaultError::decryption(DecryptionTarget::Vault));
    }
    let kek: Kek<aes::Aes256> = Kek::new(kek.into());
    let mut buf = Zeroizing::new([0u8; KEY_LEN]);
    kek.unwrap(wrapped, &mut *buf)
        .map_err(|_| VaultError::decryption(DecryptionTarget::Vault))?;
    Ok(buf)
}

/// Fill a buffer with OS entropy.
pub(crate) fn random_bytes<const N: usize>() -> Zeroizing<[u8; N]> {
    let mut buf = Zeroizing::new([0u8; N]);
    OsRng.fill_bytes(&mut *buf);
    buf
}
