//! The `masterkey.cryptomator` document.
//!
//! JSON carrying the two AES-KW wrapped master keys, the scrypt
//! parameters used to derive the KEK, and an HMAC over the vault format
//! number. Field order is immaterial on read; keys are camelCase on
//! storage.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{VaultError, VaultResult};
use crate::keys::{self, EncryptionKey, MacKey};

/// Fixed masterkey document version.
pub const MASTERKEY_VERSION: u32 = 999;

/// Parsed `masterkey.cryptomator` contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterkeyFile {
    pub version: u32,
    pub scrypt_salt: String,
    pub scrypt_cost_param: u32,
    pub scrypt_block_size: u32,
    pub primary_master_key: String,
    pub hmac_master_key: String,
    pub version_mac: String,
}

impl MasterkeyFile {
    /// Generate fresh master keys and wrap them under `password`.
    ///
    /// CPU-bound (scrypt); callers run this under `spawn_blocking`. All
    /// transient buffers (KEK, raw keys, salt) are zeroized on return.
    pub fn build(
        password: &str,
        format: u32,
        scrypt_cost: u32,
        scrypt_block_size: u32,
    ) -> VaultResult<(MasterkeyFile, EncryptionKey, MacKey)> {
        let salt = keys::random_bytes::<32>();
        let kek = keys::derive_kek(password, &*salt, scrypt_cost, scrypt_block_size)?;

        let enc_raw = keys::random_bytes::<32>();
        let mac_raw = keys::random_bytes::<32>();
        let wrapped_enc = keys::wrap_key(&kek, &enc_raw)?;
        let wrapped_mac = keys::wrap_key(&kek, &mac_raw)?;

        let enc_key = EncryptionKey::from_bytes(*enc_raw);
        let mac_key = MacKey::from_bytes(*mac_raw);
        let version_mac = compute_version_mac(&mac_key, format);

        let doc = MasterkeyFile {
            version: MASTERKEY_VERSION,
            scrypt_salt: B64.encode(&*salt),
            scrypt_cost_param: scrypt_cost,
            scrypt_block_size,
            primary_master_key: B64.encode(&wrapped_enc),
            hmac_master_key: B64.encode(&wrapped_mac),
            version_mac: B64.encode(version_mac),
        };

        Ok((doc, enc_key, mac_key))
    }

    /// Parse and sanity-check a masterkey document.
    pub fn parse(json: &str) -> VaultResult<MasterkeyFile> {
        let doc: MasterkeyFile = serde_json::from_str(json)
            .map_err(|e| VaultError::Format(format!("masterkey document: {e}")))?;
        if doc.version != MASTERKEY_VERSION {
            return Err(VaultError::Format(format!(
                "unsupported masterkey version: {} (expected {MASTERKEY_VERSION})",
                doc.version
            )));
        }
        Ok(doc)
    }

    pub fn to_json(&self) -> VaultResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::Format(format!("masterkey serialize: {e}")))
    }

    /// Derive the KEK from `password` and unwrap both master keys.
    ///
    /// CPU-bound (scrypt); callers run this under `spawn_blocking`. A
    /// failed AES-KW integrity check (wrong password) surfaces as an
    /// opaque vault decryption error.
    pub fn unlock(&self, password: &str) -> VaultResult<(EncryptionKey, MacKey)> {
        let salt = B64
            .decode(&self.scrypt_salt)
            .map_err(|e| VaultError::Format(format!("scrypt salt: {e}")))?;
        let wrapped_enc = B64
            .decode(&self.primary_master_key)
            .map_err(|e| VaultError::Format(format!("primary master key: {e}")))?;
        let wrapped_mac = B64
            .decode(&self.hmac_master_key)
            .map_err(|e| VaultError::Format(format!("hmac master key: {e}")))?;

        let kek = keys::derive_kek(password, &salt, self.scrypt_cost_param, self.scrypt_block_size)?;
        let enc_raw = keys::unwrap_key(&kek, &wrapped_enc)?;
        let mac_raw = keys::unwrap_key(&kek, &wrapped_mac)?;

        Ok((
            EncryptionKey::from_bytes(*enc_raw),
            MacKey::from_bytes(*mac_raw),
        ))
    }

    /// Whether the stored `versionMac` matches `format` under `mac_key`.
    pub fn verify_version_mac(&self, mac_key: &MacKey, format: u32) -> bool {
        let stored = match B64.decode(&self.version_mac) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(mac_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(format.to_string().as_bytes());
        mac.verify_slice(&stored).is_ok()
    }
}

/// `HMAC-SHA256(mac_key, utf8(decimal(format)))`.
pub(crate) fn compute_version_mac(mac_key: &MacKey, format: u32) -> Vec<u8> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(mac_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(format.to_string().as_bytes());
    mac.finalize().into_bytes().to_vec()
}
