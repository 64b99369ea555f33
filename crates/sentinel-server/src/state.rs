//! Process-wide shared state (C12, ambient): the handful of collaborators
//! every session borrows but none owns exclusively, assembled once at
//! startup and cloned (cheaply, via `Arc`) into each request.

use std::sync::Arc;

use sentinel_config::Config;
use sentinel_provider::ProviderClient;
use sentinel_schema::SchemaRegistry;
use sentinel_session::SessionDeps;
use sentinel_tools::{IdempotencyCache, ToolOrchestrator, ToolRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn ProviderClient>,
    pub registry: Arc<SchemaRegistry>,
    pub orchestrator: Arc<ToolOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, provider: Arc<dyn ProviderClient>, tools: ToolRegistry) -> Self {
        let cache = Arc::new(IdempotencyCache::new());
        Self {
            config: Arc::new(config),
            provider,
            registry: Arc::new(SchemaRegistry::new()),
            orchestrator: Arc::new(ToolOrchestrator::new(tools, cache)),
        }
    }

    /// Build the per-session dependency bundle C6 needs, sharing every
    /// process-wide collaborator by `Arc` clone.
    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            config: self.config.clone(),
            provider: self.provider.clone(),
            registry: self.registry.clone(),
            orchestrator: self.orchestrator.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_provider::MockProviderClient;
    use sentinel_tools::demo::demo_registry;

    #[test]
    fn session_deps_shares_the_same_registry_instance() {
        let state = AppState::new(Config::default(), Arc::new(MockProviderClient::new()), demo_registry());
        let deps = state.session_deps();
        assert!(Arc::ptr_eq(&state.registry, &deps.registry));
        assert!(Arc::ptr_eq(&state.orchestrator, &deps.orchestrator));
    }
}
