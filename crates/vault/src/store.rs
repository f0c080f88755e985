//! The on-disk vault file and the unlocked-vault handle.
//!
//! Layout: a JSON document holding the header (version, salt, KDF
//! parameters, encrypted DEK) and a map of named encrypted secrets with
//! metadata. Every binary field is base64. The file is the only persisted
//! artifact; the DEK exists in clear only inside the unlocked handle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use concord_domain::config::Argon2Params;
use concord_domain::error::{Error, Result};

use crate::b64;
use crate::envelope::{
    decrypt_dek, decrypt_secret, encrypt_dek, encrypt_secret, generate_dek, Dek, EncryptedDek,
    EncryptedSecret,
};
use crate::kdf::{derive_kek, generate_salt, SALT_LEN};

pub const VAULT_VERSION: u8 = 1;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File format
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultHeader {
    pub version: u8,
    #[serde(with = "b64")]
    pub salt: Vec<u8>,
    pub kdf: Argon2Params,
    pub encrypted_dek: EncryptedDek,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecretEntry {
    secret: EncryptedSecret,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultFile {
    header: VaultHeader,
    secrets: BTreeMap<String, SecretEntry>,
}

/// Secret metadata, safe to list without unlocking anything further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Unlocked vault
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An unlocked vault: file contents plus the in-memory DEK.
pub struct Vault {
    path: PathBuf,
    file: VaultFile,
    dek: Dek,
}

impl Vault {
    /// Create a new vault file. Fails if `path` already exists.
    pub fn create(path: impl Into<PathBuf>, password: &str, kdf: Argon2Params) -> Result<Vault> {
        let path = path.into();
        if path.exists() {
            return Err(Error::InvalidState(format!(
                "vault already exists at {}",
                path.display()
            )));
        }

        let salt = generate_salt();
        let kek = derive_kek(password, &salt, &kdf)?;
        let dek = generate_dek();
        let encrypted_dek = encrypt_dek(&dek, &kek)?;

        let vault = Vault {
            path,
            file: VaultFile {
                header: VaultHeader {
                    version: VAULT_VERSION,
                    salt: salt.to_vec(),
                    kdf,
                    encrypted_dek,
                },
                secrets: BTreeMap::new(),
            },
            dek,
        };
        vault.save()?;
        tracing::info!(path = %vault.path.display(), "vault created");
        Ok(vault)
    }

    /// Open and unlock an existing vault. A wrong password surfaces as
    /// `AuthenticationFailure` from the DEK decryption.
    pub fn unlock(path: impl Into<PathBuf>, password: &str) -> Result<Vault> {
        let path = path.into();
        let raw = std::fs::read_to_string(&path)?;
        let file: VaultFile = serde_json::from_str(&raw)?;

        if file.header.version != VAULT_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported vault version {}",
                file.header.version
            )));
        }
        let salt: [u8; SALT_LEN] = file
            .header
            .salt
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidInput("vault salt must be 16 bytes".into()))?;

        let kek = derive_kek(password, &salt, &file.header.kdf)?;
        let dek = decrypt_dek(&file.header.encrypted_dek, &kek)?;

        tracing::info!(
            path = %path.display(),
            secrets = file.secrets.len(),
            "vault unlocked"
        );
        Ok(Vault { path, file, dek })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── Secrets ────────────────────────────────────────────────────

    /// Encrypt and store a secret, then persist the file.
    pub fn set_secret(
        &mut self,
        name: impl Into<String>,
        plaintext: &[u8],
        description: Option<String>,
    ) -> Result<()> {
        let name = name.into();
        let secret = encrypt_secret(plaintext, &self.dek)?;
        let now = Utc::now();
        match self.file.secrets.get_mut(&name) {
            Some(entry) => {
                entry.secret = secret;
                entry.updated_at = now;
                if description.is_some() {
                    entry.description = description;
                }
            }
            None => {
                self.file.secrets.insert(
                    name,
                    SecretEntry {
                        secret,
                        created_at: now,
                        updated_at: now,
                        description,
                    },
                );
            }
        }
        self.save()
    }

    /// Decrypt one secret into a zero-on-drop buffer.
    pub fn get_secret(&self, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        let entry = self
            .file
            .secrets
            .get(name)
            .ok_or_else(|| Error::InvalidInput(format!("no secret named '{name}'")))?;
        decrypt_secret(&entry.secret, &self.dek)
    }

    pub fn remove_secret(&mut self, name: &str) -> Result<bool> {
        let removed = self.file.secrets.remove(name).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn list(&self) -> Vec<SecretInfo> {
        self.file
            .secrets
            .iter()
            .map(|(name, entry)| SecretInfo {
                name: name.clone(),
                created_at: entry.created_at,
                updated_at: entry.updated_at,
                description: entry.description.clone(),
            })
            .collect()
    }

    // ── Password rotation ──────────────────────────────────────────

    /// Re-derive the KEK from a new password and re-wrap the DEK. Secret
    /// ciphertexts are untouched.
    pub fn rotate_password(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        let old_salt: [u8; SALT_LEN] = self
            .file
            .header
            .salt
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidInput("vault salt must be 16 bytes".into()))?;
        let old_kek = derive_kek(old_password, &old_salt, &self.file.header.kdf)?;
        // Proves the old password before anything changes.
        let dek = decrypt_dek(&self.file.header.encrypted_dek, &old_kek)?;

        let new_salt = generate_salt();
        let new_kek = derive_kek(new_password, &new_salt, &self.file.header.kdf)?;
        self.file.header.encrypted_dek = encrypt_dek(&dek, &new_kek)?;
        self.file.header.salt = new_salt.to_vec();
        self.save()?;
        tracing::info!(path = %self.path.display(), "vault password rotated");
        Ok(())
    }

    // ── Startup materialization ────────────────────────────────────

    /// Decrypt every secret and export it into the process environment
    /// (name uppercased, non-alphanumerics mapped to `_`) for the provider
    /// clients to read. Returns the environment variable names set.
    pub fn materialize_env(&self) -> Result<Vec<String>> {
        let mut exported = Vec::new();
        for (name, entry) in &self.file.secrets {
            let value = decrypt_secret(&entry.secret, &self.dek)?;
            let value = std::str::from_utf8(&value)
                .map_err(|_| Error::InvalidInput(format!("secret '{name}' is not UTF-8")))?;
            let key = env_var_name(name);
            std::env::set_var(&key, value);
            exported.push(key);
        }
        tracing::info!(count = exported.len(), "vault secrets materialized into env");
        Ok(exported)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.file)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

fn env_var_name(secret_name: &str) -> String {
    secret_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_kdf() -> Argon2Params {
        Argon2Params {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
            key_length_bytes: 32,
        }
    }

    #[test]
    fn env_var_names_are_sanitized() {
        assert_eq!(env_var_name("anthropic.api-key"), "ANTHROPIC_API_KEY");
        assert_eq!(env_var_name("OPENAI_API_KEY"), "OPENAI_API_KEY");
    }

    #[test]
    fn create_set_unlock_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.vault");

        let mut vault = Vault::create(&path, "correct horse", fast_kdf()).unwrap();
        vault
            .set_secret("provider.key", b"sk-test-123", Some("primary key".into()))
            .unwrap();
        drop(vault);

        let vault = Vault::unlock(&path, "correct horse").unwrap();
        assert_eq!(vault.get_secret("provider.key").unwrap().as_slice(), b"sk-test-123");
        let info = vault.list();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].name, "provider.key");
        assert_eq!(info[0].description.as_deref(), Some("primary key"));
    }

    #[test]
    fn wrong_password_fails_authentication() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.vault");
        Vault::create(&path, "right", fast_kdf()).unwrap();

        assert!(matches!(
            Vault::unlock(&path, "wrong"),
            Err(Error::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.vault");
        Vault::create(&path, "pw", fast_kdf()).unwrap();
        assert!(matches!(
            Vault::create(&path, "pw", fast_kdf()),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn missing_secret_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::create(dir.path().join("v"), "pw", fast_kdf()).unwrap();
        assert!(matches!(
            vault.get_secret("ghost"),
            Err(Error::InvalidInput(_))
        ));
    }
}
