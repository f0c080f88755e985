//! Administrative vault operations.
//!
//! The master password is taken from `CONCORD_VAULT_PASSWORD` when set
//! (CI, scripted setups) and prompted interactively otherwise.

use std::path::Path;

use anyhow::Context;

use concord_vault::Vault;

use super::VaultCommand;
use crate::bootstrap;

pub fn run(command: VaultCommand, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = bootstrap::load_config(config_path)?;
    let vault_path = &config.vault.path;

    match command {
        VaultCommand::Init => {
            let password = read_password("New vault password: ")?;
            let confirm = read_password("Confirm password: ")?;
            anyhow::ensure!(password == confirm, "passwords do not match");
            let vault = Vault::create(vault_path, &password, config.vault.kdf)
                .context("creating vault")?;
            println!("vault created at {}", vault.path().display());
        }
        VaultCommand::Set { name, description } => {
            let password = read_password("Vault password: ")?;
            let mut vault = Vault::unlock(vault_path, &password).context("unlocking vault")?;
            let value = rpassword::prompt_password(format!("Value for '{name}': "))?;
            vault
                .set_secret(&name, value.as_bytes(), description)
                .context("storing secret")?;
            println!("stored '{name}'");
        }
        VaultCommand::List => {
            let password = read_password("Vault password: ")?;
            let vault = Vault::unlock(vault_path, &password).context("unlocking vault")?;
            let secrets = vault.list();
            if secrets.is_empty() {
                println!("vault is empty");
            }
            for info in secrets {
                match info.description {
                    Some(desc) => println!("{}  ({desc})", info.name),
                    None => println!("{}", info.name),
                }
            }
        }
        VaultCommand::Remove { name } => {
            let password = read_password("Vault password: ")?;
            let mut vault = Vault::unlock(vault_path, &password).context("unlocking vault")?;
            if vault.remove_secret(&name)? {
                println!("removed '{name}'");
            } else {
                println!("no secret named '{name}'");
            }
        }
        VaultCommand::RotatePassword => {
            let old = read_password("Current password: ")?;
            let mut vault = Vault::unlock(vault_path, &old).context("unlocking vault")?;
            let new = read_password("New password: ")?;
            let confirm = read_password("Confirm new password: ")?;
            anyhow::ensure!(new == confirm, "passwords do not match");
            vault
                .rotate_password(&old, &new)
                .context("rotating password")?;
            println!("password rotated; secrets were not re-encrypted");
        }
    }
    Ok(())
}

pub(crate) fn read_password(prompt: &str) -> anyhow::Result<String> {
    if let Ok(password) = std::env::var("CONCORD_VAULT_PASSWORD") {
        return Ok(password);
    }
    Ok(rpassword::prompt_password(prompt)?)
}
