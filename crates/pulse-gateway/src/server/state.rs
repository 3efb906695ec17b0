//! Gateway state
//!
//! Shared application state for the gateway server.

use crate::lifecycle::LifecycleController;
use pulse_common::AppConfig;
use std::sync::Arc;

/// Gateway application state
#[derive(Clone)]
pub struct GatewayState {
    /// Lifecycle controller shared by all connections
    controller: Arc<LifecycleController>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    pub fn new(controller: Arc<LifecycleController>, config: AppConfig) -> Self {
        Self {
            controller,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("config", &"AppConfig")
            .finish_non_exhaustive()
    }
}
