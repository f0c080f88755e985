//! Password → KEK derivation (Argon2id).

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use concord_domain::config::Argon2Params;
use concord_domain::error::{Error, Result};

pub const SALT_LEN: usize = 16;

/// The key-encryption key. Opaque: bytes are reachable only inside this
/// crate and are zeroed on drop.
pub struct Kek(Zeroizing<[u8; 32]>);

impl Kek {
    pub(crate) fn expose(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A fresh random salt for a new vault (or a password rotation).
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive the KEK from a master password. This is deliberately slow
/// (hundreds of milliseconds at the default parameters) and runs once at
/// startup or per administrative operation.
pub fn derive_kek(password: &str, salt: &[u8; SALT_LEN], params: &Argon2Params) -> Result<Kek> {
    if params.key_length_bytes != 32 {
        return Err(Error::Config(
            "vault KEK length must be 32 bytes (AES-256)".into(),
        ));
    }
    let params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(params.key_length_bytes as usize),
    )
    .map_err(|e| Error::Config(format!("invalid Argon2 parameters: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, output.as_mut())
        .map_err(|e| Error::Config(format!("key derivation failed: {e}")))?;
    Ok(Kek(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small parameters so tests stay fast; production defaults are 64 MiB.
    fn test_params() -> Argon2Params {
        Argon2Params {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
            key_length_bytes: 32,
        }
    }

    #[test]
    fn derivation_is_deterministic_per_password_and_salt() {
        let salt = generate_salt();
        let a = derive_kek("hunter2", &salt, &test_params()).unwrap();
        let b = derive_kek("hunter2", &salt, &test_params()).unwrap();
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn different_password_or_salt_changes_the_key() {
        let salt = generate_salt();
        let base = derive_kek("hunter2", &salt, &test_params()).unwrap();

        let other_pw = derive_kek("hunter3", &salt, &test_params()).unwrap();
        assert_ne!(base.expose(), other_pw.expose());

        let other_salt = derive_kek("hunter2", &generate_salt(), &test_params()).unwrap();
        assert_ne!(base.expose(), other_salt.expose());
    }

    #[test]
    fn non_aes256_key_length_is_rejected() {
        let params = Argon2Params {
            key_length_bytes: 16,
            ..test_params()
        };
        assert!(derive_kek("pw", &generate_salt(), &params).is_err());
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
