//! Credential vault: password-derived key hierarchy protecting provider
//! secrets at rest.
//!
//! Master password + random salt → KEK (Argon2id). A random 256-bit DEK is
//! encrypted under the KEK (AES-256-GCM envelope) and stored in the vault
//! header; each secret is independently encrypted under the DEK with a
//! fresh nonce. Password rotation re-wraps only the DEK — secrets are never
//! re-encrypted. Key material lives behind opaque handles and is zeroed on
//! drop; no API returns raw KEK or DEK bytes.

pub mod envelope;
pub mod kdf;
pub mod store;

pub use envelope::{
    decrypt_dek, decrypt_secret, encrypt_dek, encrypt_secret, generate_dek, rotate_dek, Dek,
    EncryptedDek, EncryptedSecret,
};
pub use kdf::{derive_kek, generate_salt, Kek, SALT_LEN};
pub use store::{SecretInfo, Vault, VaultHeader, VAULT_VERSION};

/// Base64 (standard alphabet) serde adapter for binary fields.
pub(crate) mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}
