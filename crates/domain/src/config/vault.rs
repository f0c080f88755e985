use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigIssue;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Vault
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the credential vault lives and how its KEK is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "d_vault_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub kdf: Argon2Params,
}

fn d_vault_path() -> PathBuf {
    PathBuf::from("concord.vault")
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: d_vault_path(),
            kdf: Argon2Params::default(),
        }
    }
}

impl VaultConfig {
    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        self.kdf.validate(issues);
    }
}

/// Argon2id parameters for the password → KEK derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    #[serde(default = "d_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "d_iterations")]
    pub iterations: u32,
    #[serde(default = "d_parallelism")]
    pub parallelism: u32,
    #[serde(default = "d_key_length")]
    pub key_length_bytes: u32,
}

fn d_memory_kib() -> u32 {
    65_536
}
fn d_iterations() -> u32 {
    3
}
fn d_parallelism() -> u32 {
    4
}
fn d_key_length() -> u32 {
    32
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: d_memory_kib(),
            iterations: d_iterations(),
            parallelism: d_parallelism(),
            key_length_bytes: d_key_length(),
        }
    }
}

impl Argon2Params {
    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        // AES-256 keys are the only supported envelope key size.
        if self.key_length_bytes != 32 {
            issues.push(ConfigIssue::error(
                "vault.kdf.key_length_bytes",
                "must be 32 (AES-256)",
            ));
        }
        if self.iterations == 0 || self.parallelism == 0 {
            issues.push(ConfigIssue::error(
                "vault.kdf",
                "iterations and parallelism must be non-zero",
            ));
        }
        if self.memory_kib < 8 * self.parallelism {
            issues.push(ConfigIssue::error(
                "vault.kdf.memory_kib",
                "must be at least 8x parallelism",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults() {
        let params = Argon2Params::default();
        assert_eq!(params.memory_kib, 65_536);
        assert_eq!(params.iterations, 3);
        assert_eq!(params.parallelism, 4);
        assert_eq!(params.key_length_bytes, 32);
    }

    #[test]
    fn non_aes256_key_length_is_rejected() {
        let params = Argon2Params {
            key_length_bytes: 16,
            ..Default::default()
        };
        let mut issues = Vec::new();
        params.validate(&mut issues);
        assert_eq!(issues.len(), 1);
    }
}
