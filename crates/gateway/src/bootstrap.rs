//! Config loading, vault unlock, and AppState construction — the shared
//! boot path for `serve` (and anything else that needs a wired runtime).

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use concord_domain::config::{Config, ConfigSeverity};
use concord_engine::BasicEngine;
use concord_providers::RetryMetrics;
use concord_sessions::SessionManager;
use concord_vault::Vault;
use concord_webhooks::{global as webhook_global, WebhookManager};

use crate::api;
use crate::state::AppState;

/// Read the TOML config (or defaults when no path is given), validate it,
/// and log every issue. `Error`-severity issues abort.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config: Config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config at {}", path.display()))?;
            toml::from_str(&raw).context("parsing config")?
        }
        None => Config::default(),
    };

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    anyhow::ensure!(errors == 0, "config validation failed with {errors} error(s)");
    Ok(config)
}

/// Initialize every subsystem and return a fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Vault ────────────────────────────────────────────────────────
    // Unlocked once; credentials are materialized into the environment
    // the provider clients read from. A missing vault file is fine for
    // development; a present one that fails to open is fatal.
    if config.vault.path.exists() {
        let password = crate::cli::vault_cmd::read_password("Vault password: ")
            .context("reading vault password")?;
        let vault =
            Vault::unlock(&config.vault.path, &password).context("unlocking vault at startup")?;
        let exported = vault.materialize_env().context("materializing credentials")?;
        tracing::info!(
            path = %config.vault.path.display(),
            secrets = exported.len(),
            "vault unlocked, credentials materialized"
        );
    } else {
        tracing::info!(
            path = %config.vault.path.display(),
            "no vault file; provider credentials come from the environment"
        );
    }

    // ── Webhooks ─────────────────────────────────────────────────────
    let webhooks = Arc::new(WebhookManager::new(config.webhooks.clone()));
    webhook_global::install(webhooks.clone());
    tracing::info!("webhook manager ready");

    // ── Sessions & engine ────────────────────────────────────────────
    let sessions = Arc::new(SessionManager::new());
    let engine = Arc::new(BasicEngine::new());
    tracing::info!("session manager ready");

    Ok(AppState {
        config,
        engine,
        sessions,
        webhooks,
        llm_metrics: Arc::new(RetryMetrics::new()),
    })
}

/// Boot and run the HTTP server until ctrl-c, then drain webhooks.
pub async fn serve(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Arc::new(load_config(config_path)?);
    let state = build_app_state(config.clone())?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, "concord listening");

    let webhooks = state.webhooks.clone();
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    // Let in-flight deliveries finish before the process exits.
    webhooks.flush().await;
    webhook_global::uninstall();
    tracing::info!("goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_config_path_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.orchestrator.max_missed_deadlines, 3);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[orchestrator]\nmovement_phase_duration_ms = 9000\n\n[server]\nbind = \"127.0.0.1:9999\""
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.orchestrator.movement_phase_duration_ms, 9_000);
        assert_eq!(config.server.bind, "127.0.0.1:9999");
    }

    #[test]
    fn invalid_config_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[webhooks]\nmax_retries = 0").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }
}
