//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::code_store::CodeStore;
use crate::services::AllocationService;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CodeStore>,
    pub config: EnvironmentConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn CodeStore>, config: EnvironmentConfig) -> Self {
        Self { store, config }
    }

    /// Servicio de asignación ligado al almacén compartido
    pub fn allocation_service(&self) -> AllocationService {
        AllocationService::new(Arc::clone(&self.store), self.config.allocation.clone())
    }
}
