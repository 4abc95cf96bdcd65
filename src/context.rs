use std::sync::Arc;

use crate::agent_transport::AgentTransport;
use crate::clock::Clock;
use crate::config::CoreConfig;

/// Bundles every collaborator handle and policy knob the core's actors
/// need, passed in at construction instead of reached for through
/// module-level globals (spec.md §9, "Global mutable state").
#[derive(Clone)]
pub struct CoreContext {
    pub config: Arc<CoreConfig>,
    pub clock: Arc<dyn Clock>,
    pub agent_transport: Arc<dyn AgentTransport>,
}

impl std::fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContext").field("config", &self.config).finish_non_exhaustive()
    }
}

impl CoreContext {
    pub fn new(config: CoreConfig, clock: Arc<dyn Clock>, agent_transport: Arc<dyn AgentTransport>) -> Self {
        Self { config: Arc::new(config), clock, agent_transport }
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_transport::NullAgentTransport;
    use crate::clock::FixedClock;

    #[test]
    fn now_delegates_to_the_injected_clock() {
        let ctx = CoreContext::new(CoreConfig::default(), Arc::new(FixedClock::new(42)), Arc::new(NullAgentTransport));
        assert_eq!(ctx.now(), 42);
    }

    #[test]
    fn debug_does_not_panic_on_a_trait_object_field() {
        let ctx = CoreContext::new(CoreConfig::default(), Arc::new(FixedClock::new(0)), Arc::new(NullAgentTransport));
        let rendered = format!("{:?}", ctx);
        assert!(rendered.contains("CoreContext"));
    }
}
