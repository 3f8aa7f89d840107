//! The `vault.cryptomator` document.
//!
//! A compact JWS (HS256) binding the vault format, the name-shortening
//! threshold and a unique token id to the master keys. The signing key is
//! the 64-byte `enc ‖ mac` concatenation — note the opposite ordering
//! from the AES-SIV key.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{SignatureTarget, VaultError, VaultResult};
use crate::keys::{self, EncryptionKey, MacKey};

/// Supported vault format.
pub const VAULT_FORMAT: u32 = 8;

/// Supported cipher combination.
pub const CIPHER_COMBO: &str = "SIV_CTRMAC";

/// Default padded-base64url length above which names are shortened.
pub const DEFAULT_SHORTENING_THRESHOLD: u32 = 220;

/// Fixed `kid` pointing at the sibling masterkey document.
const CONFIG_KID: &str = "masterkeyfile:masterkey.cryptomator";

/// Claims carried by `vault.cryptomator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfigClaims {
    pub format: u32,
    pub shortening_threshold: u32,
    /// Fresh UUIDv4; unique per config document, not otherwise validated.
    pub jti: String,
    pub cipher_combo: String,
}

/// Sign the claims with `enc ‖ mac` under the fixed HS256 header.
pub(crate) fn sign(
    claims: &VaultConfigClaims,
    enc_key: &EncryptionKey,
    mac_key: &MacKey,
) -> VaultResult<String> {
    let signing_key = keys::jwt_signing_key(enc_key, mac_key);

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(CONFIG_KID.to_string());
    header.typ = Some("JWT".to_string());

    jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(signing_key.as_ref()))
        .map_err(|e| VaultError::Format(format!("vault config sign: {e}")))
}

/// Verify a config token and return its claims.
///
/// Only HS256 is accepted; registered claims (`exp` etc.) are not
/// required. A bad signature or a foreign algorithm surfaces as an
/// invalid-signature error, anything structurally broken as a format
/// error.
pub(crate) fn verify(
    token: &str,
    enc_key: &EncryptionKey,
    mac_key: &MacKey,
) -> VaultResult<VaultConfigClaims> {
    let signing_key = keys::jwt_signing_key(enc_key, mac_key);

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<VaultConfigClaims>(
        token.trim(),
        &DecodingKey::from_secret(signing_key.as_ref()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName => VaultError::InvalidSignature {
            target: SignatureTarget::Vault,
        },
        _ => VaultError::Format(format!("vault config: {e}")),
    })?;

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_LEN;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn test_keys() -> (EncryptionKey, MacKey) {
        (
            EncryptionKey::from_bytes([0x11; KEY_LEN]),
            MacKey::from_bytes([0x22; KEY_LEN]),
        )
    }

    fn test_claims() -> VaultConfigClaims {
        VaultConfigClaims {
            format: VAULT_FORMAT,
            shortening_threshold: DEFAULT_SHORTENING_THRESHOLD,
            jti: uuid::Uuid::new_v4().to_string(),
            cipher_combo: CIPHER_COMBO.to_string(),
        }
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let (enc, mac) = test_keys();
        let token = sign(&test_claims(), &enc, &mac).unwrap();

        let claims = verify(&token, &enc, &mac).unwrap();
        assert_eq!(claims.format, 8);
        assert_eq!(claims.cipher_combo, "SIV_CTRMAC");
        assert_eq!(claims.shortening_threshold, 220);
    }

    #[test]
    fn test_header_is_exactly_the_fixed_shape() {
        let (enc, mac) = test_keys();
        let token = sign(&test_claims(), &enc, &mac).unwrap();

        let header_segment = token.split('.').next().unwrap();
        let header_json = URL_SAFE_NO_PAD.decode(header_segment).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header_json).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");
        assert_eq!(header["kid"], "masterkeyfile:masterkey.cryptomator");
    }

    #[test]
    fn test_wrong_key_fails_signature_check() {
        let (enc, mac) = test_keys();
        let token = sign(&test_claims(), &enc, &mac).unwrap();

        let other_enc = EncryptionKey::from_bytes([0x33; KEY_LEN]);
        let err = verify(&token, &other_enc, &mac).unwrap_err();
        assert!(matches!(err, VaultError::InvalidSignature { .. }));
    }

    #[test]
    fn test_key_ordering_matters_for_signing() {
        // Signing uses enc ‖ mac; swapping the halves must not verify.
        let (enc, mac) = test_keys();
        let token = sign(&test_claims(), &enc, &mac).unwrap();

        let swapped_enc = EncryptionKey::from_bytes([0x22; KEY_LEN]);
        let swapped_mac = MacKey::from_bytes([0x11; KEY_LEN]);
        let err = verify(&token, &swapped_enc, &swapped_mac).unwrap_err();
        assert!(matches!(err, VaultError::InvalidSignature { .. }));
    }

    #[test]
    fn test_non_hs256_token_is_rejected() {
        let (enc, mac) = test_keys();
        // alg: none with an empty signature segment.
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&test_claims()).unwrap(),
        );
        let token = format!("{header}.{payload}.");

        assert!(verify(&token, &enc, &mac).is_err());
    }
}
