use std::sync::Arc;

use concord_domain::capability::RulesEngine;
use concord_domain::config::Config;
use concord_providers::RetryMetrics;
use concord_sessions::SessionManager;
use concord_webhooks::WebhookManager;

/// Shared application state passed to every API handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Adjudicator wired into new sessions. The in-process engine by
    /// default; deployments with a full adjudicator swap it here.
    pub engine: Arc<dyn RulesEngine>,
    pub sessions: Arc<SessionManager>,
    pub webhooks: Arc<WebhookManager>,
    /// Process-wide LLM retry counters, surfaced by the stats endpoint.
    pub llm_metrics: Arc<RetryMetrics>,
}
