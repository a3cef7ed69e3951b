//! Source proposals, edits and seeds

use super::{ensure_may_manage, seed_urls};
use crate::auth::Actor;
use crate::constants::{ContractType, Frequency, SeedState, SourceState, SuggestedBy};
use crate::error::AppError;
use crate::models::{Contract, ContractFilter, Seed, Source, SourceDetail, SourceFilter};
use crate::store::{NewSourceBundle, Store};
use crate::workflow::{intake_for, WorkflowEngine};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

/// Eight digits with the check character, e.g. `1234-567X`
static ISSN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{3}[\dX]$").expect("valid ISSN pattern"));

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewSource {
    #[validate(length(min = 1, max = 255, message = "Source name is required"))]
    pub name: String,
    /// Curator to own the source; only managers may pick someone else
    pub owner: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "Publisher name cannot be empty"))]
    pub publisher: Option<String>,
    #[validate(email(message = "Publisher contact must be an e-mail address"))]
    pub publisher_contact: Option<String>,
    pub frequency: Frequency,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub comment: Option<String>,
    pub suggested_by: Option<SuggestedBy>,
    #[serde(default)]
    pub web_proposal: bool,
    #[validate(regex(path = *ISSN_PATTERN, message = "ISSN must look like 1234-567X"))]
    pub issn: Option<String>,
    /// Published under an open license: a creative commons contract is opened
    /// right away, valid from today once it is validated
    #[serde(default)]
    pub open_license: bool,
    pub seeds: Vec<String>,
}

/// Editable source fields; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SourceUpdate {
    pub owner: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "Source name cannot be empty"))]
    pub name: Option<String>,
    pub publisher: Option<String>,
    #[validate(email(message = "Publisher contact must be an e-mail address"))]
    pub publisher_contact: Option<String>,
    pub state: Option<SourceState>,
    pub frequency: Option<Frequency>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub comment: Option<String>,
    pub aleph_id: Option<String>,
    #[validate(regex(path = *ISSN_PATTERN, message = "ISSN must look like 1234-567X"))]
    pub issn: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewSeed {
    #[validate(url(message = "Seed must be a valid URL"))]
    pub url: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUpdate {
    pub state: Option<SeedState>,
    pub redirect: Option<bool>,
    pub robots: Option<bool>,
    pub comment: Option<String>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
}

pub struct SourceService {
    store: Arc<dyn Store>,
    engine: WorkflowEngine,
}

impl SourceService {
    pub fn new(store: Arc<dyn Store>, engine: WorkflowEngine) -> Self {
        Self { store, engine }
    }

    /// Propose a source: the source, its first voting round, its seeds and
    /// (for open licenses) a creative commons contract are written together
    pub async fn propose(&self, actor: &Actor, request: NewSource) -> Result<SourceDetail, AppError> {
        request.validate()?;

        let intake = intake_for(actor);
        let owner = intake.resolve_owner(actor, request.owner)?;

        let urls = seed_urls(&request.seeds)?;
        if urls.is_empty() {
            return Err(AppError::Validation(
                "At least one seed URL is required".to_string(),
            ));
        }

        let mut source = Source::new(owner, actor.id, request.name.trim().to_string(), request.frequency);
        source.publisher = request.publisher.map(|p| p.trim().to_string());
        source.publisher_contact = request.publisher_contact;
        source.category = request.category;
        source.sub_category = request.sub_category;
        source.comment = request.comment;
        source.suggested_by = request.suggested_by;
        source.web_proposal = request.web_proposal;
        source.issn = request.issn;

        let round = self.engine.on_source_created(&source);
        let seeds = urls.into_iter().map(|url| Seed::new(source.id, url)).collect();
        let contract = request.open_license.then(|| {
            let mut contract = Contract::new(source.id, ContractType::CreativeCommons);
            contract.valid_from = Some(Utc::now().date_naive());
            contract
        });

        let source = self
            .store
            .create_source(NewSourceBundle {
                source,
                round,
                seeds,
                contract,
            })
            .await?;

        info!(
            "Source {} proposed by {} through {} intake, owner {}",
            source.id,
            actor.id,
            intake.name(),
            source.owner
        );
        self.detail(source.id).await
    }

    pub async fn list(&self, filter: &SourceFilter) -> Result<Vec<Source>, AppError> {
        self.store.list_sources(filter).await
    }

    pub async fn detail(&self, id: Uuid) -> Result<SourceDetail, AppError> {
        let source = self.store.get_source(id).await?;
        let seeds = self.store.list_seeds(id).await?;
        let voting_rounds = self.store.list_rounds(id).await?;
        let contracts = self
            .store
            .list_contracts(&ContractFilter {
                source_id: Some(id),
                ..ContractFilter::default()
            })
            .await?;
        let qa_checks = self.store.list_qa(id).await?;
        debug!("Loaded source {} with {} seeds", id, seeds.len());

        let next_harvest = if source.state.is_archiving() {
            source.frequency.next_harvest(Utc::now())
        } else {
            None
        };

        Ok(SourceDetail {
            source,
            seeds,
            voting_rounds,
            contracts,
            qa_checks,
            next_harvest,
        })
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        update: SourceUpdate,
    ) -> Result<Source, AppError> {
        update.validate()?;
        let mut source = self.store.get_source(id).await?;
        ensure_may_manage(actor, source.owner)?;

        if let Some(owner) = update.owner {
            if owner != source.owner && !actor.role.can_manage_sources() {
                return Err(AppError::Forbidden(
                    "Only managers can hand a source to another curator".to_string(),
                ));
            }
            source.owner = owner;
        }
        if let Some(name) = update.name {
            source.name = name.trim().to_string();
        }
        if let Some(publisher) = update.publisher {
            source.publisher = Some(publisher);
        }
        if let Some(contact) = update.publisher_contact {
            source.publisher_contact = Some(contact);
        }
        if let Some(state) = update.state {
            if state != source.state {
                info!("Source {} moved from {} to {} by {}", id, source.state, state, actor.id);
            }
            source.state = state;
        }
        if let Some(frequency) = update.frequency {
            source.frequency = frequency;
        }
        if let Some(category) = update.category {
            source.category = Some(category);
        }
        if let Some(sub_category) = update.sub_category {
            source.sub_category = Some(sub_category);
        }
        if let Some(comment) = update.comment {
            source.comment = Some(comment);
        }
        if let Some(aleph_id) = update.aleph_id {
            source.aleph_id = Some(aleph_id).filter(|a| !a.trim().is_empty());
        }
        if let Some(issn) = update.issn {
            source.issn = Some(issn);
        }
        source.updated_at = Utc::now();

        self.store.update_source(source).await
    }

    pub async fn add_seed(
        &self,
        actor: &Actor,
        source_id: Uuid,
        request: NewSeed,
    ) -> Result<Seed, AppError> {
        request.validate()?;
        let source = self.store.get_source(source_id).await?;
        ensure_may_manage(actor, source.owner)?;

        let mut seed = Seed::new(source_id, request.url.trim().to_string());
        seed.comment = request.comment;
        self.store.insert_seed(seed).await
    }

    pub async fn update_seed(
        &self,
        actor: &Actor,
        seed_id: Uuid,
        update: SeedUpdate,
    ) -> Result<Seed, AppError> {
        let mut seed = self.store.get_seed(seed_id).await?;
        let source = self.store.get_source(seed.source_id).await?;
        ensure_may_manage(actor, source.owner)?;

        if let Some(state) = update.state {
            seed.state = state;
        }
        if let Some(redirect) = update.redirect {
            seed.redirect = redirect;
        }
        if let Some(robots) = update.robots {
            seed.robots = robots;
        }
        if let Some(comment) = update.comment {
            seed.comment = Some(comment);
        }
        if update.from_time.is_some() {
            seed.from_time = update.from_time;
        }
        if update.to_time.is_some() {
            seed.to_time = update.to_time;
        }
        if let (Some(from), Some(to)) = (seed.from_time, seed.to_time) {
            if to < from {
                return Err(AppError::Validation(
                    "Seed harvest window cannot end before it starts".to_string(),
                ));
            }
        }

        self.store.update_seed(seed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ContractState, VoteState};
    use crate::services::fixtures::*;
    use crate::services::VotingService;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_propose_opens_voting_round() {
        let store = store();
        let service = source_service(&store);
        let curator = curator();

        let mut request = new_source("Local News");
        request.seeds = vec![
            "https://news.example".to_string(),
            "  ".to_string(),
            "https://news.example/archive".to_string(),
        ];
        let detail = service.propose(&curator, request).await.unwrap();

        assert_eq!(detail.source.owner, curator.id);
        assert_eq!(detail.source.state, SourceState::Voting);
        assert_eq!(detail.voting_rounds.len(), 1);
        assert_eq!(detail.voting_rounds[0].state, VoteState::Initial);
        assert_eq!(detail.seeds.len(), 2);
        assert!(detail.contracts.is_empty());
        assert_eq!(detail.next_harvest, None);
    }

    #[tokio::test]
    async fn test_open_license_contract_waits_for_validation() {
        let store = store();
        let service = source_service(&store);

        let mut request = new_source("Open Data Weekly");
        request.open_license = true;
        let detail = service.propose(&curator(), request).await.unwrap();

        assert_eq!(detail.contracts.len(), 1);
        let contract = &detail.contracts[0];
        assert_eq!(contract.contract_type, ContractType::CreativeCommons);
        assert_eq!(contract.state, ContractState::Negotiation);
        assert_eq!(contract.contract_number, None);
        assert_eq!(contract.valid_from, Some(Utc::now().date_naive()));

        // No valid contract yet, so approval still goes through negotiation
        let round = detail.voting_rounds[0].id;
        let resolved = VotingService::new(store.clone(), WorkflowEngine::default())
            .resolve(&manager(), round, VoteState::Approve)
            .await
            .unwrap();
        assert_eq!(resolved.source.state, SourceState::Voting);
        assert!(resolved.contract.is_some());
        let numbered = store
            .list_contracts(&ContractFilter::default())
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.contract_number.is_some())
            .count();
        assert_eq!(numbered, 0);
    }

    #[tokio::test]
    async fn test_owner_selection_by_role() {
        let store = store();
        let service = source_service(&store);
        let assignee = Uuid::new_v4();

        let mut request = new_source("Handed over");
        request.owner = Some(assignee);
        let denied = service.propose(&curator(), request.clone()).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        let detail = service.propose(&manager(), request).await.unwrap();
        assert_eq!(detail.source.owner, assignee);
    }

    #[tokio::test]
    async fn test_propose_validation() {
        let store = store();
        let service = source_service(&store);

        let mut no_seeds = new_source("Empty");
        no_seeds.seeds = vec![" ".to_string()];
        assert!(matches!(
            service.propose(&curator(), no_seeds).await,
            Err(AppError::Validation(_))
        ));

        let mut bad_seed = new_source("Broken");
        bad_seed.seeds = vec!["not a url".to_string()];
        assert!(service.propose(&curator(), bad_seed).await.is_err());

        let mut bad_issn = new_source("Serial");
        bad_issn.issn = Some("12345678".to_string());
        assert!(matches!(
            service.propose(&curator(), bad_issn).await,
            Err(AppError::Validation(_))
        ));

        let mut good_issn = new_source("Serial");
        good_issn.issn = Some("0317-8471".to_string());
        assert!(service.propose(&curator(), good_issn).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_permissions() {
        let store = store();
        let service = source_service(&store);
        let owner = curator();
        let detail = service.propose(&owner, new_source("Owned")).await.unwrap();
        let id = detail.source.id;

        let rename = SourceUpdate {
            name: Some("Renamed".to_string()),
            ..SourceUpdate::default()
        };
        assert!(matches!(
            service.update(&curator(), id, rename.clone()).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(service.update(&owner, id, rename).await.unwrap().name, "Renamed");

        let handover = SourceUpdate {
            owner: Some(Uuid::new_v4()),
            ..SourceUpdate::default()
        };
        assert!(service.update(&owner, id, handover.clone()).await.is_err());
        assert!(service.update(&manager(), id, handover).await.is_ok());
    }

    #[tokio::test]
    async fn test_archived_source_has_next_harvest() {
        let store = store();
        let service = source_service(&store);
        let owner = curator();
        let id = service.propose(&owner, new_source("Daily")).await.unwrap().source.id;

        let update = SourceUpdate {
            state: Some(SourceState::Running),
            frequency: Some(Frequency::Daily),
            ..SourceUpdate::default()
        };
        service.update(&owner, id, update).await.unwrap();
        assert!(service.detail(id).await.unwrap().next_harvest.is_some());
    }

    #[tokio::test]
    async fn test_seed_management() {
        let store = store();
        let service = source_service(&store);
        let owner = curator();
        let id = service.propose(&owner, new_source("Seeds")).await.unwrap().source.id;

        let seed = service
            .add_seed(
                &owner,
                id,
                NewSeed {
                    url: "https://seeds.example/feed".to_string(),
                    comment: None,
                },
            )
            .await
            .unwrap();
        let updated = service
            .update_seed(
                &owner,
                seed.id,
                SeedUpdate {
                    state: Some(SeedState::Exclude),
                    robots: Some(true),
                    ..SeedUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.state, SeedState::Exclude);
        assert!(updated.robots);
        assert_eq!(service.detail(id).await.unwrap().seeds.len(), 2);
    }
}
