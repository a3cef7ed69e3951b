//! Harvest planning

use super::seed_urls;
use crate::auth::Actor;
use crate::constants::Frequency;
use crate::error::AppError;
use crate::models::{Harvest, HarvestDetail};
use crate::store::Store;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewHarvest {
    #[validate(length(min = 1, max = 255, message = "Harvest title is required"))]
    pub title: String,
    pub scheduled_on: NaiveDate,
    pub target_frequency: Option<Frequency>,
    #[serde(default)]
    pub custom_seeds: Vec<String>,
}

pub struct HarvestService {
    store: Arc<dyn Store>,
}

impl HarvestService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Plan a harvest; only managers schedule crawls
    pub async fn create(&self, actor: &Actor, request: NewHarvest) -> Result<Harvest, AppError> {
        if !actor.role.can_manage_sources() {
            return Err(AppError::Forbidden(
                "Only managers can plan harvests".to_string(),
            ));
        }
        request.validate()?;

        if request.scheduled_on < Utc::now().date_naive() {
            return Err(AppError::Validation(
                "A harvest cannot be scheduled in the past".to_string(),
            ));
        }
        let custom_seeds = seed_urls(&request.custom_seeds)?;
        if request.target_frequency.is_none() && custom_seeds.is_empty() {
            return Err(AppError::Validation(
                "A harvest needs a target frequency or custom seeds".to_string(),
            ));
        }

        let mut harvest = Harvest::new(request.title.trim().to_string(), request.scheduled_on, actor.id);
        harvest.target_frequency = request.target_frequency;
        harvest.custom_seeds = custom_seeds;

        let harvest = self.store.insert_harvest(harvest).await?;
        info!(
            "Harvest {} '{}' planned for {} by {}",
            harvest.id, harvest.title, harvest.scheduled_on, actor.id
        );
        Ok(harvest)
    }

    /// The harvest with every URL it crawls: seeds of archived sources at the
    /// target frequency, then the custom seeds not already listed
    pub async fn detail(&self, id: Uuid) -> Result<HarvestDetail, AppError> {
        let harvest = self.store.get_harvest(id).await?;
        let mut seeds = match harvest.target_frequency {
            Some(frequency) => self.store.harvest_seeds(frequency).await?,
            None => Vec::new(),
        };
        for url in &harvest.custom_seeds {
            if !seeds.contains(url) {
                seeds.push(url.clone());
            }
        }
        Ok(HarvestDetail { harvest, seeds })
    }

    pub async fn list(&self) -> Result<Vec<Harvest>, AppError> {
        self.store.list_harvests().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ContractState, VoteState};
    use crate::negotiation::NegotiationScheduler;
    use crate::services::fixtures::*;
    use crate::services::{ContractService, VotingService};
    use crate::workflow::{ContractEdit, WorkflowEngine};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn next_week() -> NaiveDate {
        Utc::now().date_naive() + Duration::days(7)
    }

    fn request(title: &str) -> NewHarvest {
        NewHarvest {
            title: title.to_string(),
            scheduled_on: next_week(),
            target_frequency: Some(Frequency::Monthly),
            custom_seeds: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_only_managers_plan_harvests() {
        let service = HarvestService::new(store());
        assert!(matches!(
            service.create(&curator(), request("Monthly crawl")).await,
            Err(AppError::Forbidden(_))
        ));

        let manager = manager();
        let harvest = service.create(&manager, request("Monthly crawl")).await.unwrap();
        assert_eq!(harvest.created_by, manager.id);
        assert_eq!(harvest.scheduled_on, next_week());
        assert_eq!(service.list().await.unwrap(), vec![harvest]);
    }

    #[tokio::test]
    async fn test_harvest_validation() {
        let service = HarvestService::new(store());

        let mut past = request("Yesterday");
        past.scheduled_on = Utc::now().date_naive() - Duration::days(1);
        assert!(matches!(
            service.create(&manager(), past).await,
            Err(AppError::Validation(_))
        ));

        let mut empty = request("Nothing to crawl");
        empty.target_frequency = None;
        empty.custom_seeds = vec!["  ".to_string()];
        assert!(matches!(
            service.create(&manager(), empty).await,
            Err(AppError::Validation(_))
        ));

        let mut broken = request("Broken seed");
        broken.custom_seeds = vec!["not a url".to_string()];
        assert!(matches!(
            service.create(&manager(), broken).await,
            Err(AppError::Validation(_))
        ));

        assert!(matches!(
            service.create(&manager(), request("")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_detail_lists_running_sources_and_custom_seeds() {
        let store = store();
        let engine = WorkflowEngine::default();
        let manager = manager();

        // Monthly source taken through voting and a validated contract
        let detail = source_service(&store)
            .propose(&manager, new_source("Gazette"))
            .await
            .unwrap();
        let contract = VotingService::new(store.clone(), engine.clone())
            .resolve(&manager, detail.voting_rounds[0].id, VoteState::Approve)
            .await
            .unwrap()
            .contract
            .unwrap();
        let validate = ContractEdit {
            expected_state: Some(ContractState::Negotiation),
            state: Some(ContractState::Valid),
            ..ContractEdit::default()
        };
        ContractService::new(
            store.clone(),
            engine,
            Arc::new(NegotiationScheduler::new(14).unwrap()),
        )
        .edit(&manager, contract.id, validate)
        .await
        .unwrap();

        // Still voting, left out
        source_service(&store)
            .propose(&curator(), new_source("Pending"))
            .await
            .unwrap();

        let service = HarvestService::new(store.clone());
        let mut planned = request("Monthly crawl");
        planned.custom_seeds = vec![
            " https://extra.example ".to_string(),
            "https://gazette.example".to_string(),
        ];
        let harvest = service.create(&manager, planned).await.unwrap();
        assert_eq!(
            harvest.custom_seeds,
            vec!["https://extra.example".to_string(), "https://gazette.example".to_string()]
        );

        let detail = service.detail(harvest.id).await.unwrap();
        assert_eq!(
            detail.seeds,
            vec!["https://gazette.example".to_string(), "https://extra.example".to_string()]
        );
    }

    #[tokio::test]
    async fn test_detail_of_unknown_harvest() {
        let service = HarvestService::new(store());
        assert!(matches!(
            service.detail(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
