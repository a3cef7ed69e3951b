//! Entity store
//!
//! Persistence of sources, voting rounds, contracts and the rest. Every
//! method is one unit of work: multi-row workflow transitions (source
//! creation, round resolution, contract edits, schedule submissions) read,
//! decide through the [`WorkflowEngine`] and write inside a single lock or
//! transaction, so a failure never leaves a half-applied transition.

mod memory;
mod postgres;
mod queries;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::auth::Actor;
use crate::constants::{Frequency, SourceState, VoteState};
use crate::dashboard::{CardKind, CardRow};
use crate::error::{not_found_error, AppError};
use crate::models::{
    Contract, ContractFilter, EmailNegotiation, Harvest, QaCheck, Seed, Source, SourceFilter, User, Vote,
    VotingRound,
};
use crate::negotiation::ScheduleSubmission;
use crate::workflow::{ContractEdit, WorkflowEngine};
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Everything written when a source is proposed
#[derive(Debug, Clone)]
pub struct NewSourceBundle {
    pub source: Source,
    /// The round opened by [`WorkflowEngine::on_source_created`]
    pub round: VotingRound,
    pub seeds: Vec<Seed>,
    /// Open license contract, still in negotiation
    pub contract: Option<Contract>,
}

/// Request to close a voting round
#[derive(Debug, Clone, Copy)]
pub struct RoundResolution {
    pub round_id: Uuid,
    pub state: VoteState,
    pub actor: Actor,
}

/// Rows touched by a round resolution
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRound {
    pub round: VotingRound,
    pub source: Source,
    pub contract: Option<Contract>,
}

/// Rows touched by a contract edit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditedContract {
    pub contract: Contract,
    pub number_assigned: bool,
    /// Present when the edit moved the source to another state
    pub source_state: Option<SourceState>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // Users

    /// Insert a user; the e-mail must be unused
    async fn insert_user(&self, user: User) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn get_user(&self, id: Uuid) -> Result<User, AppError>;

    async fn update_user(&self, user: User) -> Result<User, AppError>;

    // Sources and seeds

    /// Insert a new source with its first round, seeds and optional contract
    async fn create_source(&self, bundle: NewSourceBundle) -> Result<Source, AppError>;

    async fn get_source(&self, id: Uuid) -> Result<Source, AppError>;

    async fn list_sources(&self, filter: &SourceFilter) -> Result<Vec<Source>, AppError>;

    async fn update_source(&self, source: Source) -> Result<Source, AppError>;

    async fn insert_seed(&self, seed: Seed) -> Result<Seed, AppError>;

    async fn get_seed(&self, id: Uuid) -> Result<Seed, AppError>;

    async fn update_seed(&self, seed: Seed) -> Result<Seed, AppError>;

    async fn list_seeds(&self, source_id: Uuid) -> Result<Vec<Seed>, AppError>;

    // Voting

    async fn get_round(&self, id: Uuid) -> Result<VotingRound, AppError>;

    async fn list_rounds(&self, source_id: Uuid) -> Result<Vec<VotingRound>, AppError>;

    /// Open another round for a source, subject to [`WorkflowEngine::check_reopen`]
    async fn open_round(
        &self,
        round: VotingRound,
        engine: &WorkflowEngine,
    ) -> Result<VotingRound, AppError>;

    async fn list_votes(&self, round_id: Uuid) -> Result<Vec<Vote>, AppError>;

    /// Record a vote on an open round, replacing the author's earlier vote
    async fn upsert_vote(&self, vote: Vote) -> Result<Vote, AppError>;

    /// Close a round and apply its outcome to the source
    async fn resolve_round(
        &self,
        resolution: RoundResolution,
        engine: &WorkflowEngine,
    ) -> Result<ResolvedRound, AppError>;

    // Contracts

    /// Insert a contract as given; numbers are only handed out by
    /// [`Store::edit_contract`]
    async fn insert_contract(&self, contract: Contract) -> Result<Contract, AppError>;

    async fn get_contract(&self, id: Uuid) -> Result<Contract, AppError>;

    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>, AppError>;

    /// Apply an edit planned on the contract as currently stored
    async fn edit_contract(
        &self,
        id: Uuid,
        edit: &ContractEdit,
        engine: &WorkflowEngine,
    ) -> Result<EditedContract, AppError>;

    async fn list_emails(&self, contract_id: Uuid) -> Result<Vec<EmailNegotiation>, AppError>;

    /// Save, update and delete scheduled e-mails of a contract
    async fn save_schedule(
        &self,
        contract_id: Uuid,
        submission: &ScheduleSubmission,
    ) -> Result<Vec<EmailNegotiation>, AppError>;

    // Quality assurance

    async fn insert_qa(&self, check: QaCheck) -> Result<QaCheck, AppError>;

    async fn get_qa(&self, id: Uuid) -> Result<QaCheck, AppError>;

    async fn update_qa(&self, check: QaCheck) -> Result<QaCheck, AppError>;

    async fn list_qa(&self, source_id: Uuid) -> Result<Vec<QaCheck>, AppError>;

    // Harvests

    async fn insert_harvest(&self, harvest: Harvest) -> Result<Harvest, AppError>;

    async fn get_harvest(&self, id: Uuid) -> Result<Harvest, AppError>;

    /// All harvests, earliest scheduled first
    async fn list_harvests(&self) -> Result<Vec<Harvest>, AppError>;

    /// Distinct URLs of included seeds of archived sources harvested at
    /// `frequency`, sorted
    async fn harvest_seeds(&self, frequency: Frequency) -> Result<Vec<String>, AppError>;

    // Dashboard

    /// All rows of a dashboard card for `user`, in display order
    async fn card_rows(&self, kind: CardKind, user: Uuid) -> Result<Vec<CardRow>, AppError>;
}

pub(crate) fn not_found(kind: &str, id: Uuid) -> AppError {
    not_found_error(format!("{} {} not found", kind, id))
}
