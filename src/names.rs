//! Filename and directory-ID cryptography.
//!
//! Two deterministic AES-SIV schemes live here. Item names are sealed
//! with the parent directory ID as associated data and written out as
//! padded base64url; names whose encoded form exceeds the shortening
//! threshold are stored under the base64url SHA-1 of the encoded string
//! instead. Directory IDs are sealed with no associated data, hashed
//! with SHA-1 and base32-encoded to form the `d/XX/YYYY…` storage path.
//! Both transforms must round-trip bit-for-bit with other Cryptomator
//! implementations.

use aes_siv::siv::Aes256Siv;
use aes_siv::KeyInit;
use data_encoding::{BASE32, BASE64URL, BASE64URL_NOPAD};
use sha1::{Digest, Sha1};

use crate::error::{VaultError, VaultResult};
use crate::keys::SivKey;

/// Suffix of regular encrypted entries.
pub const REGULAR_SUFFIX: &str = ".c9r";
/// Suffix of shortened entries.
pub const SHORTENED_SUFFIX: &str = ".c9s";
/// File inside a directory entry holding the child directory ID.
pub const DIR_ID_FILE: &str = "dir.c9r";
/// Sidecar inside a shortened entry holding the full encoded name.
pub const LONG_NAME_FILE: &str = "name.c9s";
/// Payload file inside a shortened file entry.
pub const CONTENTS_FILE: &str = "contents.c9r";
/// Reserved directory-ID backup name; never written, skipped on listing.
pub const DIR_ID_BACKUP_FILE: &str = "dirid.c9r";

fn siv(key: &SivKey) -> Aes256Siv {
    Aes256Siv::new(key.as_bytes().into())
}

/// Encrypt an item name under its parent directory ID.
///
/// Returns the padded base64url form without any suffix; the caller
/// appends `.c9r` (or applies shortening).
pub(crate) fn encrypt_name(key: &SivKey, parent_id: &str, name: &str) -> VaultResult<String> {
    let mut cipher = siv(key);
    let aad: &[&[u8]] = &[parent_id.as_bytes()];
    let sealed = cipher
        .encrypt(aad, name.as_bytes())
        .map_err(|_| VaultError::Format("AES-SIV seal failed".to_string()))?;
    Ok(BASE64URL.encode(&sealed))
}

/// Decrypt a base64url-encoded item name under its parent directory ID.
///
/// Accepts the padded form; falls back to the unpadded form for
/// interoperability with implementations that strip padding.
pub(crate) fn decrypt_name(key: &SivKey, parent_id: &str, encoded: &str) -> VaultResult<String> {
    let ciphertext = BASE64URL
        .decode(encoded.as_bytes())
        .or_else(|_| BASE64URL_NOPAD.decode(encoded.as_bytes()))
        .map_err(|_| VaultError::name_decryption(encoded))?;

    let mut cipher = siv(key);
    let aad: &[&[u8]] = &[parent_id.as_bytes()];
    let plaintext = cipher
        .decrypt(aad, &ciphertext)
        .map_err(|_| VaultError::name_decryption(encoded))?;

    String::from_utf8(plaintext).map_err(|_| VaultError::name_decryption(encoded))
}

/// Shortened storage stem for an over-threshold encoded name:
/// `base64url(SHA-1(encoded))`, without the `.c9s` suffix.
pub(crate) fn shorten_name(encoded: &str) -> String {
    let digest = Sha1::digest(encoded.as_bytes());
    BASE64URL.encode(&digest)
}

/// Hash a directory ID to its storage-path stem:
/// `base32(SHA-1(AES-SIV-seal(key, [], dir_id)))`, 32 uppercase chars.
pub(crate) fn hash_dir_id(key: &SivKey, dir_id: &str) -> VaultResult<String> {
    let mut cipher = siv(key);
    let aad: &[&[u8]] = &[];
    let sealed = cipher
        .encrypt(aad, dir_id.as_bytes())
        .map_err(|_| VaultError::Format("AES-SIV seal failed".to_string()))?;

    let digest = Sha1::digest(&sealed);
    Ok(BASE32.encode(&digest))
}
