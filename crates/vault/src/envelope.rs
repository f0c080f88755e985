//! AES-256-GCM envelope encryption: DEK wrapped by the KEK, secrets
//! wrapped by the DEK.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use concord_domain::error::{Error, Result};

use crate::b64;
use crate::kdf::Kek;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// The data-encryption key. Opaque, zeroed on drop, never serialized.
pub struct Dek(Zeroizing<[u8; 32]>);

impl Dek {
    pub(crate) fn expose(&self) -> &[u8; 32] {
        &self.0
    }
}

impl PartialEq for Dek {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

/// A random 256-bit DEK, generated once at vault creation.
pub fn generate_dek() -> Dek {
    let mut key = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(key.as_mut());
    Dek(key)
}

/// The DEK encrypted under the KEK, as stored in the vault header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedDek {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    /// 12 bytes.
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    /// 16 bytes.
    #[serde(with = "b64")]
    pub tag: Vec<u8>,
}

/// One secret encrypted under the DEK. Same envelope shape as
/// [`EncryptedDek`], at entry granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub tag: Vec<u8>,
}

/// Encrypt with a fresh nonce, splitting the GCM tag off the ciphertext.
fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Config(format!("cipher init failed: {e}")))?;
    let mut nonce = vec![0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut combined = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Error::Config("encryption failed".into()))?;
    let tag = combined.split_off(combined.len() - TAG_LEN);
    Ok((combined, nonce, tag))
}

/// Decrypt, authenticating ciphertext and tag. Any mismatch — wrong key,
/// flipped ciphertext bit, flipped tag bit — fails identically.
fn open(key: &[u8; 32], ciphertext: &[u8], nonce: &[u8], tag: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
        return Err(Error::AuthenticationFailure(
            "malformed envelope: bad nonce or tag length".into(),
        ));
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Config(format!("cipher init failed: {e}")))?;
    let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(nonce), combined.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| Error::AuthenticationFailure("wrong key or tampered data".into()))
}

pub fn encrypt_dek(dek: &Dek, kek: &Kek) -> Result<EncryptedDek> {
    let (ciphertext, nonce, tag) = seal(kek.expose(), dek.expose())?;
    Ok(EncryptedDek {
        ciphertext,
        nonce,
        tag,
    })
}

pub fn decrypt_dek(encrypted: &EncryptedDek, kek: &Kek) -> Result<Dek> {
    let plaintext = open(
        kek.expose(),
        &encrypted.ciphertext,
        &encrypted.nonce,
        &encrypted.tag,
    )?;
    let bytes: [u8; 32] = plaintext.as_slice().try_into().map_err(|_| {
        Error::AuthenticationFailure("decrypted DEK has the wrong length".into())
    })?;
    Ok(Dek(Zeroizing::new(bytes)))
}

/// Re-wrap the DEK under a new KEK. Secrets are untouched — this is what
/// makes password rotation cheap.
pub fn rotate_dek(encrypted: &EncryptedDek, old_kek: &Kek, new_kek: &Kek) -> Result<EncryptedDek> {
    let dek = decrypt_dek(encrypted, old_kek)?;
    encrypt_dek(&dek, new_kek)
}

pub fn encrypt_secret(plaintext: &[u8], dek: &Dek) -> Result<EncryptedSecret> {
    let (ciphertext, nonce, tag) = seal(dek.expose(), plaintext)?;
    Ok(EncryptedSecret {
        ciphertext,
        nonce,
        tag,
    })
}

/// Decrypt into a zero-on-drop buffer; callers keep the scope tight.
pub fn decrypt_secret(encrypted: &EncryptedSecret, dek: &Dek) -> Result<Zeroizing<Vec<u8>>> {
    open(
        dek.expose(),
        &encrypted.ciphertext,
        &encrypted.nonce,
        &encrypted.tag,
    )
}
