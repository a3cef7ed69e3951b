use super::{not_found, EditedContract, NewSourceBundle, ResolvedRound, RoundResolution, Store};
use crate::constants::{ContractState, Frequency, SeedState, SourceState};
use crate::dashboard::{CardKind, CardRow};
use crate::error::AppError;
use crate::models::{
    Contract, ContractFilter, EmailNegotiation, Harvest, QaCheck, Seed, Source, SourceFilter, User, Vote,
    VotingRound,
};
use crate::negotiation::{plan_submission, ScheduleSubmission};
use crate::workflow::contract::next_contract_number;
use crate::workflow::{ContractEdit, NumberAssignment, WorkflowEngine};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sources: HashMap<Uuid, Source>,
    seeds: HashMap<Uuid, Seed>,
    rounds: HashMap<Uuid, VotingRound>,
    votes: HashMap<Uuid, Vote>,
    contracts: HashMap<Uuid, Contract>,
    emails: HashMap<Uuid, EmailNegotiation>,
    qa_checks: HashMap<Uuid, QaCheck>,
    harvests: HashMap<Uuid, Harvest>,
}

impl Tables {
    fn source(&self, id: Uuid) -> Result<&Source, AppError> {
        self.sources.get(&id).ok_or_else(|| not_found("Source", id))
    }

    fn source_name(&self, id: Uuid) -> String {
        self.sources
            .get(&id)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    fn vote_count(&self, round_id: Uuid) -> usize {
        self.votes
            .values()
            .filter(|v| v.voting_round_id == round_id)
            .count()
    }

    fn next_contract_number(&self) -> i64 {
        next_contract_number(self.contracts.values().filter_map(|c| c.contract_number).max())
    }

    fn email_count(&self, contract_id: Uuid) -> usize {
        self.emails
            .values()
            .filter(|e| e.contract_id == contract_id)
            .count()
    }

    fn negotiating_contracts(&self, owner: Uuid) -> Vec<&Contract> {
        let mut contracts: Vec<_> = self
            .contracts
            .values()
            .filter(|c| c.state == ContractState::Negotiation)
            .filter(|c| self.sources.get(&c.source_id).map(|s| s.owner) == Some(owner))
            .collect();
        sort_by_created(&mut contracts, |c| (c.created_at, c.id));
        contracts
    }

    fn round_rows<'a>(&self, rounds: impl Iterator<Item = &'a VotingRound>) -> Vec<CardRow> {
        let mut rows: Vec<_> = rounds
            .map(|round| (self.vote_count(round.id), round))
            .collect();
        rows.sort_by_key(|(count, round)| (*count, round.created_at, round.id));
        rows.into_iter()
            .map(|(vote_count, round)| CardRow::Round {
                round: round.clone(),
                source_name: self.source_name(round.source_id),
                vote_count,
            })
            .collect()
    }

    fn source_rows(&self, keep: impl Fn(&Source) -> bool) -> Vec<CardRow> {
        let mut sources: Vec<_> = self.sources.values().filter(|s| keep(s)).collect();
        sort_by_created(&mut sources, |s| (s.created_at, s.id));
        sources
            .into_iter()
            .map(|s| CardRow::Source { source: s.clone() })
            .collect()
    }
}

fn sort_by_created<T>(items: &mut [&T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by_key(|item| key(item));
}

fn sorted<T: Clone>(items: impl Iterator<Item = T>, key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by_key(|item| key(item));
    items
}

/// Store keeping every table in memory behind one lock
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<User, AppError> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "User with email '{}' already exists",
                user.email
            )));
        }
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        let t = self.tables.read().await;
        t.users.get(&id).cloned().ok_or_else(|| not_found("User", id))
    }

    async fn update_user(&self, user: User) -> Result<User, AppError> {
        let mut t = self.tables.write().await;
        let slot = t
            .users
            .get_mut(&user.id)
            .ok_or_else(|| not_found("User", user.id))?;
        *slot = user.clone();
        Ok(user)
    }

    async fn create_source(&self, bundle: NewSourceBundle) -> Result<Source, AppError> {
        let mut t = self.tables.write().await;
        let NewSourceBundle {
            source,
            round,
            seeds,
            contract,
        } = bundle;

        if t.sources.contains_key(&source.id) {
            return Err(AppError::Conflict(format!("Source {} already exists", source.id)));
        }
        if round.source_id != source.id
            || seeds.iter().any(|s| s.source_id != source.id)
            || contract.as_ref().is_some_and(|c| c.source_id != source.id)
        {
            return Err(AppError::Internal(
                "Source bundle refers to another source".to_string(),
            ));
        }

        t.sources.insert(source.id, source.clone());
        t.rounds.insert(round.id, round);
        for seed in seeds {
            t.seeds.insert(seed.id, seed);
        }
        if let Some(contract) = contract {
            t.contracts.insert(contract.id, contract);
        }
        Ok(source)
    }

    async fn get_source(&self, id: Uuid) -> Result<Source, AppError> {
        let t = self.tables.read().await;
        t.source(id).cloned()
    }

    async fn list_sources(&self, filter: &SourceFilter) -> Result<Vec<Source>, AppError> {
        let t = self.tables.read().await;
        Ok(sorted(
            t.sources.values().filter(|s| filter.matches(s)).cloned(),
            |s| (s.created_at, s.id),
        ))
    }

    async fn update_source(&self, source: Source) -> Result<Source, AppError> {
        let mut t = self.tables.write().await;
        let slot = t
            .sources
            .get_mut(&source.id)
            .ok_or_else(|| not_found("Source", source.id))?;
        *slot = source.clone();
        Ok(source)
    }

    async fn insert_seed(&self, seed: Seed) -> Result<Seed, AppError> {
        let mut t = self.tables.write().await;
        t.source(seed.source_id)?;
        t.seeds.insert(seed.id, seed.clone());
        Ok(seed)
    }

    async fn get_seed(&self, id: Uuid) -> Result<Seed, AppError> {
        let t = self.tables.read().await;
        t.seeds.get(&id).cloned().ok_or_else(|| not_found("Seed", id))
    }

    async fn update_seed(&self, seed: Seed) -> Result<Seed, AppError> {
        let mut t = self.tables.write().await;
        let slot = t
            .seeds
            .get_mut(&seed.id)
            .ok_or_else(|| not_found("Seed", seed.id))?;
        *slot = seed.clone();
        Ok(seed)
    }

    async fn list_seeds(&self, source_id: Uuid) -> Result<Vec<Seed>, AppError> {
        let t = self.tables.read().await;
        Ok(sorted(
            t.seeds.values().filter(|s| s.source_id == source_id).cloned(),
            |s| (s.created_at, s.id),
        ))
    }

    async fn get_round(&self, id: Uuid) -> Result<VotingRound, AppError> {
        let t = self.tables.read().await;
        t.rounds
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Voting round", id))
    }

    async fn list_rounds(&self, source_id: Uuid) -> Result<Vec<VotingRound>, AppError> {
        let t = self.tables.read().await;
        Ok(sorted(
            t.rounds.values().filter(|r| r.source_id == source_id).cloned(),
            |r| (r.created_at, r.id),
        ))
    }

    async fn open_round(
        &self,
        round: VotingRound,
        engine: &WorkflowEngine,
    ) -> Result<VotingRound, AppError> {
        let mut t = self.tables.write().await;
        let source = t.source(round.source_id)?;
        let rounds: Vec<_> = t
            .rounds
            .values()
            .filter(|r| r.source_id == source.id)
            .cloned()
            .collect();
        engine.check_reopen(source, &rounds)?;
        t.rounds.insert(round.id, round.clone());
        Ok(round)
    }

    async fn list_votes(&self, round_id: Uuid) -> Result<Vec<Vote>, AppError> {
        let t = self.tables.read().await;
        Ok(sorted(
            t.votes.values().filter(|v| v.voting_round_id == round_id).cloned(),
            |v| (v.created_at, v.id),
        ))
    }

    async fn upsert_vote(&self, vote: Vote) -> Result<Vote, AppError> {
        let mut t = self.tables.write().await;
        let round = t
            .rounds
            .get(&vote.voting_round_id)
            .ok_or_else(|| not_found("Voting round", vote.voting_round_id))?;
        if !round.is_open() {
            return Err(AppError::Conflict(format!(
                "Voting round {} is closed",
                round.id
            )));
        }

        let existing = t
            .votes
            .values_mut()
            .find(|v| v.voting_round_id == vote.voting_round_id && v.author == vote.author);
        match existing {
            Some(current) => {
                current.decision = vote.decision;
                Ok(current.clone())
            }
            None => {
                t.votes.insert(vote.id, vote.clone());
                Ok(vote)
            }
        }
    }

    async fn resolve_round(
        &self,
        resolution: RoundResolution,
        engine: &WorkflowEngine,
    ) -> Result<ResolvedRound, AppError> {
        let mut t = self.tables.write().await;
        let mut round = t
            .rounds
            .get(&resolution.round_id)
            .cloned()
            .ok_or_else(|| not_found("Voting round", resolution.round_id))?;
        let source = t.source(round.source_id)?.clone();
        engine.check_resolution(&resolution.actor, &round, &source, resolution.state)?;

        round.state = resolution.state;
        round.resolved_at = Some(Utc::now());
        round.resolved_by = Some(resolution.actor.id);

        let has_valid_contract = t
            .contracts
            .values()
            .any(|c| c.source_id == source.id && c.is_valid());
        let outcome = engine.on_round_updated(&round, &source, has_valid_contract)?;
        let source = outcome.apply(&source);

        t.rounds.insert(round.id, round.clone());
        t.sources.insert(source.id, source.clone());
        if let Some(contract) = &outcome.new_contract {
            t.contracts.insert(contract.id, contract.clone());
        }

        info!(
            "Voting round {} resolved as {}, source {} is {}",
            round.id, round.state, source.id, source.state
        );
        Ok(ResolvedRound {
            round,
            source,
            contract: outcome.new_contract,
        })
    }

    async fn insert_contract(&self, contract: Contract) -> Result<Contract, AppError> {
        let mut t = self.tables.write().await;
        t.source(contract.source_id)?;
        t.contracts.insert(contract.id, contract.clone());
        Ok(contract)
    }

    async fn get_contract(&self, id: Uuid) -> Result<Contract, AppError> {
        let t = self.tables.read().await;
        t.contracts
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Contract", id))
    }

    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>, AppError> {
        let t = self.tables.read().await;
        Ok(sorted(
            t.contracts.values().filter(|c| filter.matches(c)).cloned(),
            |c| (c.created_at, c.id),
        ))
    }

    async fn edit_contract(
        &self,
        id: Uuid,
        edit: &ContractEdit,
        engine: &WorkflowEngine,
    ) -> Result<EditedContract, AppError> {
        let mut t = self.tables.write().await;
        let current = t
            .contracts
            .get(&id)
            .ok_or_else(|| not_found("Contract", id))?;
        let plan = engine.plan_contract_edit(current, edit)?;

        let number_assigned = plan.assignment == NumberAssignment::Assign;
        let plan = if number_assigned {
            plan.with_number(t.next_contract_number())
        } else {
            plan
        };

        if let Some(state) = plan.source_state {
            let source = t
                .sources
                .get_mut(&plan.contract.source_id)
                .ok_or_else(|| not_found("Source", plan.contract.source_id))?;
            source.state = state;
            source.updated_at = Utc::now();
        }
        t.contracts.insert(id, plan.contract.clone());

        if number_assigned {
            info!(
                "Contract {} validated with number {:?}",
                id, plan.contract.contract_number
            );
        }
        Ok(EditedContract {
            contract: plan.contract,
            number_assigned,
            source_state: plan.source_state,
        })
    }

    async fn list_emails(&self, contract_id: Uuid) -> Result<Vec<EmailNegotiation>, AppError> {
        let t = self.tables.read().await;
        let mut emails: Vec<_> = t
            .emails
            .values()
            .filter(|e| e.contract_id == contract_id)
            .cloned()
            .collect();
        emails.sort_by_key(|e| (e.scheduled_date, e.id));
        Ok(emails)
    }

    async fn save_schedule(
        &self,
        contract_id: Uuid,
        submission: &ScheduleSubmission,
    ) -> Result<Vec<EmailNegotiation>, AppError> {
        let mut t = self.tables.write().await;
        if !t.contracts.contains_key(&contract_id) {
            return Err(not_found("Contract", contract_id));
        }
        let existing: Vec<_> = t
            .emails
            .values()
            .filter(|e| e.contract_id == contract_id)
            .cloned()
            .collect();
        let changes = plan_submission(contract_id, &existing, submission)?;

        for id in &changes.deletes {
            t.emails.remove(id);
        }
        for email in changes.upserts {
            t.emails.insert(email.id, email);
        }

        let mut emails: Vec<_> = t
            .emails
            .values()
            .filter(|e| e.contract_id == contract_id)
            .cloned()
            .collect();
        emails.sort_by_key(|e| (e.scheduled_date, e.id));
        Ok(emails)
    }

    async fn insert_qa(&self, check: QaCheck) -> Result<QaCheck, AppError> {
        let mut t = self.tables.write().await;
        t.source(check.source_id)?;
        t.qa_checks.insert(check.id, check.clone());
        Ok(check)
    }

    async fn get_qa(&self, id: Uuid) -> Result<QaCheck, AppError> {
        let t = self.tables.read().await;
        t.qa_checks
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("QA check", id))
    }

    async fn update_qa(&self, check: QaCheck) -> Result<QaCheck, AppError> {
        let mut t = self.tables.write().await;
        let slot = t
            .qa_checks
            .get_mut(&check.id)
            .ok_or_else(|| not_found("QA check", check.id))?;
        *slot = check.clone();
        Ok(check)
    }

    async fn list_qa(&self, source_id: Uuid) -> Result<Vec<QaCheck>, AppError> {
        let t = self.tables.read().await;
        Ok(sorted(
            t.qa_checks.values().filter(|q| q.source_id == source_id).cloned(),
            |q| (q.created_at, q.id),
        ))
    }

    async fn insert_harvest(&self, harvest: Harvest) -> Result<Harvest, AppError> {
        let mut t = self.tables.write().await;
        if t.harvests.contains_key(&harvest.id) {
            return Err(AppError::Conflict(format!("Harvest {} already exists", harvest.id)));
        }
        t.harvests.insert(harvest.id, harvest.clone());
        Ok(harvest)
    }

    async fn get_harvest(&self, id: Uuid) -> Result<Harvest, AppError> {
        let t = self.tables.read().await;
        t.harvests
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Harvest", id))
    }

    async fn list_harvests(&self) -> Result<Vec<Harvest>, AppError> {
        let t = self.tables.read().await;
        let mut harvests: Vec<_> = t.harvests.values().cloned().collect();
        harvests.sort_by_key(|h| (h.scheduled_on, h.created_at, h.id));
        Ok(harvests)
    }

    async fn harvest_seeds(&self, frequency: Frequency) -> Result<Vec<String>, AppError> {
        let t = self.tables.read().await;
        let mut urls: Vec<String> = t
            .seeds
            .values()
            .filter(|seed| seed.state == SeedState::Include)
            .filter(|seed| {
                t.sources.get(&seed.source_id).is_some_and(|source| {
                    source.frequency == frequency && source.state.is_archiving()
                })
            })
            .map(|seed| seed.url.clone())
            .collect();
        urls.sort();
        urls.dedup();
        Ok(urls)
    }

    async fn card_rows(&self, kind: CardKind, user: Uuid) -> Result<Vec<CardRow>, AppError> {
        let t = self.tables.read().await;
        let owned_by = |source_id: Uuid, owner: Uuid| {
            t.sources.get(&source_id).map(|s| s.owner) == Some(owner)
        };

        let rows = match kind {
            CardKind::Contracts => t
                .negotiating_contracts(user)
                .into_iter()
                .map(|c| CardRow::Contract {
                    contract: c.clone(),
                    source_name: t.source_name(c.source_id),
                })
                .collect(),
            CardKind::NoCommunication => t
                .negotiating_contracts(user)
                .into_iter()
                .filter(|c| !c.in_communication && t.email_count(c.id) == 0)
                .map(|c| CardRow::Contract {
                    contract: c.clone(),
                    source_name: t.source_name(c.source_id),
                })
                .collect(),
            CardKind::VotingRounds => t.round_rows(
                t.rounds
                    .values()
                    .filter(|r| r.is_open() && owned_by(r.source_id, user)),
            ),
            CardKind::OpenVotes => t.round_rows(t.rounds.values().filter(|r| {
                r.is_open()
                    && t.sources
                        .get(&r.source_id)
                        .is_some_and(|s| s.owner != user && s.state.is_vote_state())
                    && !t
                        .votes
                        .values()
                        .any(|v| v.voting_round_id == r.id && v.author == user)
            })),
            CardKind::SourcesOwned => {
                t.source_rows(|s| s.owner == user && s.state.has_potential())
            }
            CardKind::Technical => t.source_rows(|s| s.state == SourceState::TechnicalReview),
            CardKind::WithoutAleph => {
                t.source_rows(|s| s.state.is_archiving() && s.aleph_id.is_none())
            }
            CardKind::QaOpened => {
                let checks = sorted(
                    t.qa_checks
                        .values()
                        .filter(|q| q.checked_by == user && q.is_open()),
                    |q| (q.created_at, q.id),
                );
                checks
                    .into_iter()
                    .map(|q| CardRow::Qa {
                        check: q.clone(),
                        source_name: t.source_name(q.source_id),
                    })
                    .collect()
            }
        };
        Ok(rows)
    }
}
