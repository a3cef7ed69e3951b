//! Contracts with publishers and the negotiation e-mail schedule

use crate::constants::{ContractState, ContractType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    pub source_id: Uuid,
    pub state: ContractState,
    pub contract_type: ContractType,
    /// Set once, when the contract first becomes valid
    pub contract_number: Option<i64>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub publisher_responds: bool,
    pub in_communication: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// New contract in negotiation
    pub fn new(source_id: Uuid, contract_type: ContractType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_id,
            state: ContractState::default(),
            contract_type,
            contract_number: None,
            valid_from: None,
            valid_to: None,
            publisher_responds: false,
            in_communication: false,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state == ContractState::Valid
    }
}

/// One scheduled e-mail of a contract negotiation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailNegotiation {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Filter for contract listings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractFilter {
    pub state: Option<ContractState>,
    pub source_id: Option<Uuid>,
    pub in_communication: Option<bool>,
}

impl ContractFilter {
    pub fn matches(&self, contract: &Contract) -> bool {
        self.state.map_or(true, |s| contract.state == s)
            && self.source_id.map_or(true, |id| contract.source_id == id)
            && self
                .in_communication
                .map_or(true, |c| contract.in_communication == c)
    }
}

/// Contract together with its schedule
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetail {
    pub contract: Contract,
    pub emails: Vec<EmailNegotiation>,
}
