//! Workflow engine
//!
//! Keeps the state of a source consistent with the outcome of its voting
//! rounds and contracts.

use crate::auth::Actor;
use crate::constants::{ContractState, ContractType, SourceState, VoteState};
use crate::error::AppError;
use crate::models::{Contract, Source, VotingRound};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Lookup tables driving the automatic source state changes
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTables {
    /// Resolved round state -> source state (approval is handled separately)
    pub vote_to_source: HashMap<VoteState, SourceState>,
    /// Contract state -> source state
    pub contract_to_source: HashMap<ContractState, SourceState>,
}

impl Default for WorkflowTables {
    fn default() -> Self {
        let vote_to_source = HashMap::from([
            (VoteState::Approve, SourceState::AcceptedByStaff),
            (VoteState::Decline, SourceState::DeclinedByStaff),
            (VoteState::Wait, SourceState::Reevaluation),
            (VoteState::Technical, SourceState::TechnicalReview),
        ]);
        let contract_to_source = HashMap::from([
            (ContractState::Declined, SourceState::DeclinedByPublisher),
            (ContractState::Valid, SourceState::Running),
            (ContractState::Expired, SourceState::ContractExpired),
        ]);
        Self {
            vote_to_source,
            contract_to_source,
        }
    }
}

/// What resolving a voting round does to its source
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// New source state, `None` keeps the current one
    pub source_state: Option<SourceState>,
    /// Contract to open with the publisher
    pub new_contract: Option<Contract>,
}

impl RoundOutcome {
    /// Source as it should be persisted after the outcome
    pub fn apply(&self, source: &Source) -> Source {
        let mut updated = source.clone();
        if let Some(state) = self.source_state {
            updated.state = state;
            updated.updated_at = Utc::now();
        }
        updated
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowEngine {
    tables: Arc<WorkflowTables>,
}

impl WorkflowEngine {
    pub fn new(tables: WorkflowTables) -> Self {
        Self {
            tables: Arc::new(tables),
        }
    }

    /// Every new source starts with an open voting round
    pub fn on_source_created(&self, source: &Source) -> VotingRound {
        debug!("Opening voting round for new source {}", source.id);
        VotingRound::new(source.id)
    }

    /// Derive the source change for a round that was updated (never created).
    ///
    /// An approval with a valid contract already in place goes straight to
    /// archiving; without one a proprietary contract is opened and the
    /// source keeps its state until the contract resolves. Any other round
    /// state maps through `vote_to_source`.
    pub fn on_round_updated(
        &self,
        round: &VotingRound,
        source: &Source,
        has_valid_contract: bool,
    ) -> Result<RoundOutcome, AppError> {
        if round.source_id != source.id {
            return Err(AppError::Internal(format!(
                "Voting round {} does not belong to source {}",
                round.id, source.id
            )));
        }

        if round.state == VoteState::Approve {
            return Ok(if has_valid_contract {
                RoundOutcome {
                    source_state: Some(SourceState::Running),
                    new_contract: None,
                }
            } else {
                RoundOutcome {
                    source_state: None,
                    new_contract: Some(Contract::new(source.id, ContractType::Proprietary)),
                }
            });
        }

        let state = self
            .tables
            .vote_to_source
            .get(&round.state)
            .copied()
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Voting round state '{}' has no source state mapping",
                    round.state
                ))
            })?;

        Ok(RoundOutcome {
            source_state: Some(state),
            new_contract: None,
        })
    }

    /// Source state implied by a contract entering a new state
    pub fn on_contract_state_changed(
        &self,
        prior: ContractState,
        new: ContractState,
    ) -> Option<SourceState> {
        if prior == new {
            return None;
        }
        self.tables.contract_to_source.get(&new).copied()
    }

    /// Check that `actor` may resolve `round` (of `source`) into `target`
    pub fn check_resolution(
        &self,
        actor: &Actor,
        round: &VotingRound,
        source: &Source,
        target: VoteState,
    ) -> Result<(), AppError> {
        if !actor.may_manage(source.owner) {
            return Err(AppError::Forbidden(
                "Only the curator of the source or a manager can resolve its voting round"
                    .to_string(),
            ));
        }
        if round.state.is_resolved() {
            return Err(AppError::Conflict(format!(
                "Voting round {} is already resolved as '{}'",
                round.id, round.state
            )));
        }
        if !target.is_resolved() {
            return Err(AppError::Validation(
                "A voting round cannot be resolved to the initial state".to_string(),
            ));
        }
        Ok(())
    }

    /// A new round may open only for a source waiting for a vote with no open round
    pub fn check_reopen(&self, source: &Source, rounds: &[VotingRound]) -> Result<(), AppError> {
        if rounds.iter().any(VotingRound::is_open) {
            return Err(AppError::Conflict(format!(
                "Source {} already has an open voting round",
                source.id
            )));
        }
        if !source.state.is_vote_state() {
            return Err(AppError::Validation(format!(
                "Source in state '{}' is not waiting for a vote",
                source.state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::constants::Frequency;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn source() -> Source {
        let owner = Uuid::new_v4();
        Source::new(owner, owner, "Example".to_string(), Frequency::Yearly)
    }

    fn resolved(source: &Source, state: VoteState) -> VotingRound {
        let mut round = VotingRound::new(source.id);
        round.state = state;
        round
    }

    #[test]
    fn test_new_source_gets_initial_round() {
        let source = source();
        let round = WorkflowEngine::default().on_source_created(&source);
        assert_eq!(round.source_id, source.id);
        assert_eq!(round.state, VoteState::Initial);
    }

    #[test]
    fn test_approve_without_valid_contract_opens_negotiation() {
        let source = source();
        let outcome = WorkflowEngine::default()
            .on_round_updated(&resolved(&source, VoteState::Approve), &source, false)
            .unwrap();

        assert_eq!(outcome.source_state, None);
        assert_eq!(outcome.apply(&source).state, SourceState::Voting);
        let contract = outcome.new_contract.unwrap();
        assert_eq!(contract.source_id, source.id);
        assert_eq!(contract.state, ContractState::Negotiation);
        assert_eq!(contract.contract_type, ContractType::Proprietary);
        assert_eq!(contract.contract_number, None);
    }

    #[test]
    fn test_approve_with_valid_contract_runs() {
        let source = source();
        let outcome = WorkflowEngine::default()
            .on_round_updated(&resolved(&source, VoteState::Approve), &source, true)
            .unwrap();

        assert_eq!(outcome.source_state, Some(SourceState::Running));
        assert!(outcome.new_contract.is_none());
    }

    #[test]
    fn test_other_states_follow_lookup_table() {
        let engine = WorkflowEngine::default();
        let source = source();
        for (state, expected) in [
            (VoteState::Decline, SourceState::DeclinedByStaff),
            (VoteState::Wait, SourceState::Reevaluation),
            (VoteState::Technical, SourceState::TechnicalReview),
        ] {
            let outcome = engine
                .on_round_updated(&resolved(&source, state), &source, false)
                .unwrap();
            assert_eq!(outcome.source_state, Some(expected));
            assert!(outcome.new_contract.is_none());
        }
    }

    #[test]
    fn test_injected_tables_are_used() {
        let mut tables = WorkflowTables::default();
        tables
            .vote_to_source
            .insert(VoteState::Decline, SourceState::Duplicity);
        let engine = WorkflowEngine::new(tables);
        let source = source();
        let outcome = engine
            .on_round_updated(&resolved(&source, VoteState::Decline), &source, false)
            .unwrap();
        assert_eq!(outcome.source_state, Some(SourceState::Duplicity));
    }

    #[test]
    fn test_unmapped_state_is_rejected() {
        let source = source();
        let result = WorkflowEngine::default().on_round_updated(
            &resolved(&source, VoteState::Initial),
            &source,
            false,
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_contract_state_conversion() {
        let engine = WorkflowEngine::default();
        assert_eq!(
            engine.on_contract_state_changed(ContractState::Negotiation, ContractState::Valid),
            Some(SourceState::Running)
        );
        assert_eq!(
            engine.on_contract_state_changed(ContractState::Valid, ContractState::Expired),
            Some(SourceState::ContractExpired)
        );
        assert_eq!(
            engine.on_contract_state_changed(ContractState::Valid, ContractState::Valid),
            None
        );
        assert_eq!(
            engine.on_contract_state_changed(ContractState::Declined, ContractState::Negotiation),
            None
        );
    }

    #[test]
    fn test_resolution_rules() {
        let engine = WorkflowEngine::default();
        let source = source();
        let open = VotingRound::new(source.id);
        let owner = Actor::new(source.owner, Role::Curator);
        let stranger = Actor::new(Uuid::new_v4(), Role::Curator);
        let manager = Actor::new(Uuid::new_v4(), Role::Manager);

        assert!(engine.check_resolution(&owner, &open, &source, VoteState::Approve).is_ok());
        assert!(engine.check_resolution(&manager, &open, &source, VoteState::Wait).is_ok());
        assert!(matches!(
            engine.check_resolution(&stranger, &open, &source, VoteState::Approve),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            engine.check_resolution(&owner, &open, &source, VoteState::Initial),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            engine.check_resolution(&owner, &resolved(&source, VoteState::Decline), &source, VoteState::Approve),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_reopen_rules() {
        let engine = WorkflowEngine::default();
        let mut source = source();
        let closed = resolved(&source, VoteState::Wait);

        assert!(matches!(
            engine.check_reopen(&source, &[VotingRound::new(source.id)]),
            Err(AppError::Conflict(_))
        ));

        source.state = SourceState::Reevaluation;
        assert!(engine.check_reopen(&source, &[closed.clone()]).is_ok());

        source.state = SourceState::Running;
        assert!(matches!(
            engine.check_reopen(&source, &[closed]),
            Err(AppError::Validation(_))
        ));
    }
}
