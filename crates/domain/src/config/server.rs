use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the admin/API listener.
    #[serde(default = "d_bind")]
    pub bind: String,
}

fn d_bind() -> String {
    "127.0.0.1:8642".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: d_bind() }
    }
}
