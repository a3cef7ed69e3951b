//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::auth::TokenService;
use crate::config::Settings;
use crate::dashboard::{Dashboard, Paginator};
use crate::error::AppError;
use crate::negotiation::NegotiationScheduler;
use crate::services::{
    ContractService, HarvestService, QaService, SourceService, UserService, VotingService,
};
use crate::store::Store;
use crate::workflow::WorkflowEngine;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// JWT signing and verification
    pub tokens: Arc<TokenService>,

    pub users: UserService,
    pub sources: SourceService,
    pub voting: VotingService,
    pub contracts: ContractService,
    pub qa: QaService,
    pub harvests: HarvestService,

    /// Per-user overview cards
    pub dashboard: Dashboard,
}

impl AppState {
    /// Wire the services over `store`
    pub fn new(store: Arc<dyn Store>, settings: &Settings) -> Result<Self, AppError> {
        let engine = WorkflowEngine::default();
        let tokens = Arc::new(TokenService::new(&settings.auth));
        let scheduler = Arc::new(NegotiationScheduler::new(
            settings.workflow.negotiation_delay_days,
        )?);
        let paginator = Paginator::new(
            settings.workflow.dashboard_page_size,
            settings.workflow.dashboard_orphans,
        );

        Ok(Self {
            users: UserService::new(store.clone(), tokens.clone()),
            sources: SourceService::new(store.clone(), engine.clone()),
            voting: VotingService::new(store.clone(), engine.clone()),
            contracts: ContractService::new(store.clone(), engine, scheduler),
            qa: QaService::new(store.clone()),
            harvests: HarvestService::new(store.clone()),
            dashboard: Dashboard::new(store, paginator),
            tokens,
        })
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
