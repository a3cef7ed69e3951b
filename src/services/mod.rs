//! Workflow services
//!
//! Glue between the HTTP handlers, the entity store and the workflow engine.
//! Services check who may do what; the store makes each change atomic.

pub mod contracts;
pub mod harvests;
pub mod qa;
pub mod sources;
pub mod users;
pub mod voting;

pub use contracts::ContractService;
pub use harvests::HarvestService;
pub use qa::QaService;
pub use sources::SourceService;
pub use users::UserService;
pub use voting::VotingService;

use crate::auth::Actor;
use crate::error::AppError;
use uuid::Uuid;

/// Reject `actor` unless it owns the record or manages sources
pub(crate) fn ensure_may_manage(actor: &Actor, owner: Uuid) -> Result<(), AppError> {
    if actor.may_manage(owner) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the curator of the source or a manager can do this".to_string(),
        ))
    }
}

/// Trimmed, non-blank seed URLs; each must parse as an absolute URL
pub(crate) fn seed_urls(raw: &[String]) -> Result<Vec<String>, AppError> {
    raw.iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(|u| {
            url::Url::parse(u)
                .map(|_| u.to_string())
                .map_err(|_| AppError::Validation(format!("Invalid seed URL '{}'", u)))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::auth::Role;
    use crate::constants::Frequency;
    use crate::store::{MemoryStore, Store};
    use crate::workflow::WorkflowEngine;
    use std::sync::Arc;

    pub fn store() -> Arc<dyn Store> {
        Arc::new(MemoryStore::new())
    }

    pub fn curator() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Curator)
    }

    pub fn manager() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Manager)
    }

    pub fn new_source(name: &str) -> sources::NewSource {
        sources::NewSource {
            name: name.to_string(),
            owner: None,
            publisher: Some("Gazette Publishing".to_string()),
            publisher_contact: Some("editor@gazette.example".to_string()),
            frequency: Frequency::Monthly,
            category: None,
            sub_category: None,
            comment: None,
            suggested_by: None,
            web_proposal: false,
            issn: None,
            open_license: false,
            seeds: vec!["https://gazette.example".to_string()],
        }
    }

    pub fn source_service(store: &Arc<dyn Store>) -> SourceService {
        SourceService::new(store.clone(), WorkflowEngine::default())
    }
}
