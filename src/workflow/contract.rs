//! Contract edits
//!
//! A contract number is assigned exactly once: on the edit that moves the
//! contract from NEGOTIATION to VALID. The decision is taken on the state the
//! store holds at the moment of the edit, inside the same unit of work that
//! writes the result.

use crate::constants::{ContractState, ContractType, SourceState};
use crate::error::AppError;
use crate::models::Contract;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::WorkflowEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberAssignment {
    /// Generate a new contract number with this edit
    Assign,
    /// Leave the contract number as it is
    Keep,
}

impl NumberAssignment {
    pub fn decide(prior: ContractState, proposed: ContractState) -> Self {
        if prior == ContractState::Negotiation && proposed == ContractState::Valid {
            NumberAssignment::Assign
        } else {
            NumberAssignment::Keep
        }
    }
}

/// Next free contract number given the highest one in use
pub fn next_contract_number(current_max: Option<i64>) -> i64 {
    current_max.unwrap_or(0) + 1
}

/// Submitted contract edit; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEdit {
    /// State the editor saw; a different persisted state rejects the edit
    pub expected_state: Option<ContractState>,
    pub state: Option<ContractState>,
    pub contract_type: Option<ContractType>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub publisher_responds: Option<bool>,
    pub in_communication: Option<bool>,
    pub description: Option<String>,
}

/// Result of planning an edit against the persisted contract
#[derive(Debug, Clone, PartialEq)]
pub struct ContractEditPlan {
    /// Edited contract; the number is filled in by the store on `Assign`
    pub contract: Contract,
    pub assignment: NumberAssignment,
    /// Source state implied by the contract's new state
    pub source_state: Option<SourceState>,
}

impl ContractEditPlan {
    /// Complete the plan with the number reserved by the store
    pub fn with_number(mut self, number: i64) -> Self {
        if self.assignment == NumberAssignment::Assign {
            self.contract.contract_number = Some(number);
        }
        self
    }
}

impl WorkflowEngine {
    /// Plan `edit` against `current`, the contract as persisted right now
    pub fn plan_contract_edit(
        &self,
        current: &Contract,
        edit: &ContractEdit,
    ) -> Result<ContractEditPlan, AppError> {
        if let Some(expected) = edit.expected_state {
            if expected != current.state {
                return Err(AppError::Conflict(format!(
                    "Contract {} changed meanwhile: expected state {}, found {}",
                    current.id, expected, current.state
                )));
            }
        }

        let mut contract = current.clone();
        let proposed = edit.state.unwrap_or(current.state);

        contract.state = proposed;
        if let Some(contract_type) = edit.contract_type {
            contract.contract_type = contract_type;
        }
        if edit.valid_from.is_some() {
            contract.valid_from = edit.valid_from;
        }
        if edit.valid_to.is_some() {
            contract.valid_to = edit.valid_to;
        }
        if let Some(responds) = edit.publisher_responds {
            contract.publisher_responds = responds;
        }
        if let Some(in_communication) = edit.in_communication {
            contract.in_communication = in_communication;
        }
        if let Some(description) = &edit.description {
            contract.description = Some(description.clone());
        }

        if let (Some(from), Some(to)) = (contract.valid_from, contract.valid_to) {
            if to < from {
                return Err(AppError::Validation(
                    "Contract validity cannot end before it starts".to_string(),
                ));
            }
        }

        // A contract that was valid before and went back to negotiation keeps its number
        let assignment = match current.contract_number {
            Some(_) => NumberAssignment::Keep,
            None => NumberAssignment::decide(current.state, proposed),
        };

        contract.updated_at = Utc::now();

        Ok(ContractEditPlan {
            contract,
            assignment,
            source_state: self.on_contract_state_changed(current.state, proposed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn negotiating() -> Contract {
        Contract::new(Uuid::new_v4(), ContractType::Proprietary)
    }

    fn to_state(state: ContractState) -> ContractEdit {
        ContractEdit {
            state: Some(state),
            ..ContractEdit::default()
        }
    }

    #[test]
    fn test_only_negotiation_to_valid_assigns() {
        use ContractState::*;
        for prior in ContractState::ALL {
            for proposed in ContractState::ALL {
                let expected = if *prior == Negotiation && *proposed == Valid {
                    NumberAssignment::Assign
                } else {
                    NumberAssignment::Keep
                };
                assert_eq!(NumberAssignment::decide(*prior, *proposed), expected);
            }
        }
    }

    #[test]
    fn test_next_contract_number() {
        assert_eq!(next_contract_number(None), 1);
        assert_eq!(next_contract_number(Some(41)), 42);
    }

    #[test]
    fn test_plan_valid_transition() {
        let engine = WorkflowEngine::default();
        let plan = engine
            .plan_contract_edit(&negotiating(), &to_state(ContractState::Valid))
            .unwrap()
            .with_number(7);

        assert_eq!(plan.assignment, NumberAssignment::Assign);
        assert_eq!(plan.contract.contract_number, Some(7));
        assert_eq!(plan.contract.state, ContractState::Valid);
        assert_eq!(plan.source_state, Some(SourceState::Running));
    }

    #[test]
    fn test_plan_resubmitting_valid_keeps_number() {
        let engine = WorkflowEngine::default();
        let mut contract = negotiating();
        contract.state = ContractState::Valid;
        contract.contract_number = Some(3);

        let plan = engine
            .plan_contract_edit(&contract, &to_state(ContractState::Valid))
            .unwrap()
            .with_number(99);

        assert_eq!(plan.assignment, NumberAssignment::Keep);
        assert_eq!(plan.contract.contract_number, Some(3));
        assert_eq!(plan.source_state, None);
    }

    #[test]
    fn test_plan_revalidation_keeps_original_number() {
        let engine = WorkflowEngine::default();
        let mut contract = negotiating();
        contract.contract_number = Some(5);

        let plan = engine
            .plan_contract_edit(&contract, &to_state(ContractState::Valid))
            .unwrap()
            .with_number(6);

        assert_eq!(plan.assignment, NumberAssignment::Keep);
        assert_eq!(plan.contract.contract_number, Some(5));
    }

    #[test]
    fn test_plan_field_edit_without_state() {
        let engine = WorkflowEngine::default();
        let edit = ContractEdit {
            publisher_responds: Some(true),
            description: Some("called twice".to_string()),
            ..ContractEdit::default()
        };
        let plan = engine.plan_contract_edit(&negotiating(), &edit).unwrap();

        assert_eq!(plan.assignment, NumberAssignment::Keep);
        assert!(plan.contract.publisher_responds);
        assert_eq!(plan.contract.state, ContractState::Negotiation);
        assert_eq!(plan.contract.contract_number, None);
    }

    #[test]
    fn test_plan_rejects_stale_edit() {
        let engine = WorkflowEngine::default();
        let mut contract = negotiating();
        contract.state = ContractState::Valid;
        contract.contract_number = Some(1);

        let edit = ContractEdit {
            expected_state: Some(ContractState::Negotiation),
            state: Some(ContractState::Valid),
            ..ContractEdit::default()
        };
        assert!(matches!(
            engine.plan_contract_edit(&contract, &edit),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_plan_rejects_inverted_validity() {
        let engine = WorkflowEngine::default();
        let edit = ContractEdit {
            valid_from: NaiveDate::from_ymd_opt(2024, 6, 1),
            valid_to: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..ContractEdit::default()
        };
        assert!(matches!(
            engine.plan_contract_edit(&negotiating(), &edit),
            Err(AppError::Validation(_))
        ));
    }
}
