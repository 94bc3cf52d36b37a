//! Configuration types.

use crate::error::ConfigError;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Project name, used for `project:` tags on stored knowledge.
    pub project: String,
    /// Maximum worker dispatches in flight at once within a wave.
    pub max_parallel_agents: usize,
    /// Maximum automatic retries for a failed item before escalation.
    pub max_retries: u32,
    /// Soft token budget for assembled context bundles.
    pub context_token_budget: usize,
    /// Whether context assembly also pulls from the shared scope.
    pub include_global_context: bool,
    /// Session-wide cap on total dispatches (0 = unlimited).
    pub max_dispatches: usize,
    /// Agent identity used when neither a hint nor the classifier produces one.
    pub default_agent: String,
}

impl OrchestratorConfig {
    /// Validate invariants a session relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel_agents == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_parallel_agents".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_retries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            project: "foreman".to_string(),
            max_parallel_agents: 4,
            max_retries: 3,
            context_token_budget: 4_000,
            include_global_context: true,
            max_dispatches: 0,
            default_agent: "backend-developer".to_string(),
        }
    }
}
