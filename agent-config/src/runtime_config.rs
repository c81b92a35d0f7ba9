//! Typed environment knobs for the agent runtime, resolved once at startup.
//!
//! Per the "Global singletons ... redesign as explicit dependencies" guidance,
//! nothing downstream calls `std::env::var` directly — callers resolve a
//! `RuntimeConfig` here and pass it down explicitly.

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub default_max_steps: u32,
    pub session_backend: String,
    pub enable_team: bool,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            llm_api_key: std::env::var("AGENT_LLM_API_KEY").ok(),
            llm_model: std::env::var("AGENT_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            default_max_steps: std::env::var("AGENT_MAX_STEPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            session_backend: std::env::var("AGENT_SESSION_BACKEND")
                .unwrap_or_else(|_| "memory".to_string()),
            enable_team: std::env::var("AGENT_ENABLE_TEAM")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}
