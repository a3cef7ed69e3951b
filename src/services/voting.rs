//! Votes and voting round resolution

use super::ensure_may_manage;
use crate::auth::Actor;
use crate::constants::{VoteDecision, VoteState};
use crate::error::AppError;
use crate::models::{Vote, VoteSummary, VotingRound, VotingRoundDetail};
use crate::store::{ResolvedRound, RoundResolution, Store};
use crate::workflow::WorkflowEngine;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct VotingService {
    store: Arc<dyn Store>,
    engine: WorkflowEngine,
}

impl VotingService {
    pub fn new(store: Arc<dyn Store>, engine: WorkflowEngine) -> Self {
        Self { store, engine }
    }

    pub async fn detail(&self, round_id: Uuid) -> Result<VotingRoundDetail, AppError> {
        let round = self.store.get_round(round_id).await?;
        let votes = self.store.list_votes(round_id).await?;
        Ok(VotingRoundDetail {
            summary: VoteSummary::tally(&votes),
            round,
            votes,
        })
    }

    /// Cast the caller's vote, replacing a previous one in the same round
    pub async fn cast(
        &self,
        actor: &Actor,
        round_id: Uuid,
        decision: VoteDecision,
    ) -> Result<Vote, AppError> {
        let vote = self
            .store
            .upsert_vote(Vote::new(round_id, actor.id, decision))
            .await?;
        info!("{} voted {} in round {}", actor.id, decision, round_id);
        Ok(vote)
    }

    /// Close a round; the source follows the outcome
    pub async fn resolve(
        &self,
        actor: &Actor,
        round_id: Uuid,
        state: VoteState,
    ) -> Result<ResolvedRound, AppError> {
        self.store
            .resolve_round(
                RoundResolution {
                    round_id,
                    state,
                    actor: *actor,
                },
                &self.engine,
            )
            .await
    }

    /// Open a new round for a source waiting for reevaluation
    pub async fn reopen(&self, actor: &Actor, source_id: Uuid) -> Result<VotingRound, AppError> {
        let source = self.store.get_source(source_id).await?;
        ensure_may_manage(actor, source.owner)?;

        let round = self
            .store
            .open_round(VotingRound::new(source_id), &self.engine)
            .await?;
        info!("Voting round {} reopened for source {}", round.id, source_id);
        Ok(round)
    }
}
