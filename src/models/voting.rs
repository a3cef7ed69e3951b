//! Voting rounds and votes

use crate::constants::{VoteDecision, VoteState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A decision cycle in which staff vote on whether to curate a source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VotingRound {
    pub id: Uuid,
    pub source_id: Uuid,
    pub state: VoteState,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
}

impl VotingRound {
    pub fn new(source_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            state: VoteState::Initial,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.state.is_resolved()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Uuid,
    pub voting_round_id: Uuid,
    pub author: Uuid,
    pub decision: VoteDecision,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(voting_round_id: Uuid, author: Uuid, decision: VoteDecision) -> Self {
        Self {
            id: Uuid::new_v4(),
            voting_round_id,
            author,
            decision,
            created_at: Utc::now(),
        }
    }
}

/// Vote counts per decision
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub approve: usize,
    pub decline: usize,
    pub wait: usize,
    pub technical: usize,
}

impl VoteSummary {
    pub fn tally(votes: &[Vote]) -> Self {
        votes.iter().fold(Self::default(), |mut summary, vote| {
            match vote.decision {
                VoteDecision::Approve => summary.approve += 1,
                VoteDecision::Decline => summary.decline += 1,
                VoteDecision::Wait => summary.wait += 1,
                VoteDecision::Technical => summary.technical += 1,
            }
            summary
        })
    }

    pub fn total(&self) -> usize {
        self.approve + self.decline + self.wait + self.technical
    }
}

/// Round together with its votes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingRoundDetail {
    pub round: VotingRound,
    pub votes: Vec<Vote>,
    pub summary: VoteSummary,
}
