//! Contracts and their negotiation e-mails

use super::ensure_may_manage;
use crate::auth::Actor;
use crate::constants::ContractType;
use crate::error::AppError;
use crate::models::{Contract, ContractDetail, ContractFilter, EmailNegotiation, User};
use crate::negotiation::{EmailDraft, NegotiationContext, NegotiationScheduler, ScheduleSubmission};
use crate::store::{EditedContract, Store};
use crate::workflow::{ContractEdit, WorkflowEngine};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContract {
    pub contract_type: ContractType,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub description: Option<String>,
}

pub struct ContractService {
    store: Arc<dyn Store>,
    engine: WorkflowEngine,
    scheduler: Arc<NegotiationScheduler>,
}

impl ContractService {
    pub fn new(
        store: Arc<dyn Store>,
        engine: WorkflowEngine,
        scheduler: Arc<NegotiationScheduler>,
    ) -> Self {
        Self {
            store,
            engine,
            scheduler,
        }
    }

    /// Open a contract in negotiation for a source
    pub async fn create(
        &self,
        actor: &Actor,
        source_id: Uuid,
        request: NewContract,
    ) -> Result<Contract, AppError> {
        let source = self.store.get_source(source_id).await?;
        ensure_may_manage(actor, source.owner)?;

        let mut contract = Contract::new(source_id, request.contract_type);
        contract.valid_from = request.valid_from;
        contract.valid_to = request.valid_to;
        contract.description = request.description;
        if let (Some(from), Some(to)) = (contract.valid_from, contract.valid_to) {
            if to < from {
                return Err(AppError::Validation(
                    "Contract validity cannot end before it starts".to_string(),
                ));
            }
        }

        let contract = self.store.insert_contract(contract).await?;
        info!("Contract {} opened for source {}", contract.id, source_id);
        Ok(contract)
    }

    pub async fn list(&self, filter: &ContractFilter) -> Result<Vec<Contract>, AppError> {
        self.store.list_contracts(filter).await
    }

    pub async fn detail(&self, id: Uuid) -> Result<ContractDetail, AppError> {
        let contract = self.store.get_contract(id).await?;
        let emails = self.store.list_emails(id).await?;
        Ok(ContractDetail { contract, emails })
    }

    /// Apply an edit; validation assigns the contract number and the source
    /// follows the contract state
    pub async fn edit(
        &self,
        actor: &Actor,
        id: Uuid,
        edit: ContractEdit,
    ) -> Result<EditedContract, AppError> {
        let contract = self.store.get_contract(id).await?;
        let source = self.store.get_source(contract.source_id).await?;
        ensure_may_manage(actor, source.owner)?;

        let edited = self.store.edit_contract(id, &edit, &self.engine).await?;
        if let Some(state) = edited.source_state {
            info!(
                "Contract {} is {}, source {} moved to {}",
                id, edited.contract.state, source.id, state
            );
        }
        Ok(edited)
    }

    /// Proposed e-mail schedule; empty once the contract has e-mails
    pub async fn drafts(&self, user: &User, contract_id: Uuid) -> Result<Vec<EmailDraft>, AppError> {
        let contract = self.store.get_contract(contract_id).await?;
        let source = self.store.get_source(contract.source_id).await?;
        let existing = self.store.list_emails(contract_id).await?;

        let context = NegotiationContext {
            user_name: user.name.clone(),
            user_email: user.email.clone(),
            source_name: source.name,
        };
        let drafts = self
            .scheduler
            .initial_drafts(existing.len(), &context, Utc::now())?;
        debug!("{} e-mail drafts for contract {}", drafts.len(), contract_id);
        Ok(drafts)
    }

    pub async fn save_schedule(
        &self,
        actor: &Actor,
        contract_id: Uuid,
        submission: ScheduleSubmission,
    ) -> Result<Vec<EmailNegotiation>, AppError> {
        let contract = self.store.get_contract(contract_id).await?;
        let source = self.store.get_source(contract.source_id).await?;
        ensure_may_manage(actor, source.owner)?;

        let emails = self.store.save_schedule(contract_id, &submission).await?;
        info!(
            "Negotiation schedule of contract {} saved with {} e-mails",
            contract_id,
            emails.len()
        );
        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::constants::{ContractState, SourceState};
    use crate::negotiation::ScheduleEntry;
    use crate::services::fixtures::*;
    use pretty_assertions::assert_eq;

    fn service(store: &Arc<dyn Store>) -> ContractService {
        ContractService::new(
            store.clone(),
            WorkflowEngine::default(),
            Arc::new(NegotiationScheduler::new(14).unwrap()),
        )
    }

    async fn negotiating(store: &Arc<dyn Store>, owner: &Actor) -> Contract {
        let source = source_service(store)
            .propose(owner, new_source("Negotiated Source"))
            .await
            .unwrap()
            .source;
        service(store)
            .create(
                owner,
                source.id,
                NewContract {
                    contract_type: ContractType::Proprietary,
                    valid_from: None,
                    valid_to: None,
                    description: None,
                },
            )
            .await
            .unwrap()
    }

    fn to_state(state: ContractState) -> ContractEdit {
        ContractEdit {
            expected_state: Some(ContractState::Negotiation),
            state: Some(state),
            ..ContractEdit::default()
        }
    }

    #[tokio::test]
    async fn test_validation_assigns_number_and_runs_source() {
        let store = store();
        let owner = curator();
        let contract = negotiating(&store, &owner).await;

        let edited = service(&store)
            .edit(&owner, contract.id, to_state(ContractState::Valid))
            .await
            .unwrap();
        assert!(edited.number_assigned);
        assert_eq!(edited.contract.contract_number, Some(1));
        assert_eq!(
            store.get_source(contract.source_id).await.unwrap().state,
            SourceState::Running
        );

        let again = ContractEdit {
            state: Some(ContractState::Valid),
            ..ContractEdit::default()
        };
        let resubmitted = service(&store).edit(&owner, contract.id, again).await.unwrap();
        assert!(!resubmitted.number_assigned);
        assert_eq!(resubmitted.contract.contract_number, Some(1));
    }

    #[tokio::test]
    async fn test_declined_contract_declines_source() {
        let store = store();
        let owner = curator();
        let contract = negotiating(&store, &owner).await;

        let edited = service(&store)
            .edit(&owner, contract.id, to_state(ContractState::Declined))
            .await
            .unwrap();
        assert_eq!(edited.contract.contract_number, None);
        assert_eq!(edited.source_state, Some(SourceState::DeclinedByPublisher));
    }

    #[tokio::test]
    async fn test_edit_requires_owner() {
        let store = store();
        let contract = negotiating(&store, &curator()).await;
        let result = service(&store)
            .edit(&curator(), contract.id, to_state(ContractState::Valid))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(
            store.get_contract(contract.id).await.unwrap().state,
            ContractState::Negotiation
        );
    }

    #[tokio::test]
    async fn test_drafts_then_schedule() {
        let store = store();
        let owner = curator();
        let contract = negotiating(&store, &owner).await;
        let user = User::new(
            "jana@archive.example".to_string(),
            "hash".to_string(),
            "Jana".to_string(),
            Role::Curator,
        );
        let service = service(&store);

        let drafts = service.drafts(&user, contract.id).await.unwrap();
        assert_eq!(drafts.len(), 4);
        assert!(drafts[0].content.contains("Negotiated Source"));

        let submission = ScheduleSubmission {
            entries: drafts
                .into_iter()
                .map(|d| ScheduleEntry {
                    id: None,
                    scheduled_date: d.scheduled_date,
                    title: d.title,
                    content: d.content,
                    delete: false,
                })
                .collect(),
        };
        let saved = service.save_schedule(&owner, contract.id, submission).await.unwrap();
        assert_eq!(saved.len(), 4);

        assert!(service.drafts(&user, contract.id).await.unwrap().is_empty());
        assert_eq!(service.detail(contract.id).await.unwrap().emails.len(), 4);
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_validity() {
        let store = store();
        let owner = curator();
        let source = source_service(&store)
            .propose(&owner, new_source("Dated"))
            .await
            .unwrap()
            .source;
        let result = service(&store)
            .create(
                &owner,
                source.id,
                NewContract {
                    contract_type: ContractType::Proprietary,
                    valid_from: NaiveDate::from_ymd_opt(2025, 5, 1),
                    valid_to: NaiveDate::from_ymd_opt(2025, 1, 1),
                    description: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
