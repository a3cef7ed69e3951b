//! Dashboard cards
//!
//! Each card is a named, paginated list of items a user should act on. The
//! store runs the card query; this module decides how elements are titled,
//! badged and colored and cuts the result into pages.

use crate::error::AppError;
use crate::models::{Contract, QaCheck, Source, VotingRound};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardKind {
    /// Contracts of the user's sources in negotiation
    #[serde(rename = "contracts")]
    Contracts,
    /// Contracts in negotiation with no scheduled e-mail
    #[serde(rename = "no_communication")]
    NoCommunication,
    /// Open rounds of the user's sources
    #[serde(rename = "voting_rounds")]
    VotingRounds,
    /// Open rounds of other curators' sources the user has not voted in
    #[serde(rename = "open_votes")]
    OpenVotes,
    #[serde(rename = "sources_owned")]
    SourcesOwned,
    #[serde(rename = "technical")]
    Technical,
    /// Archived sources missing their catalogue id
    #[serde(rename = "without_aleph")]
    WithoutAleph,
    #[serde(rename = "QAopened")]
    QaOpened,
}

impl CardKind {
    pub const ALL: &'static [CardKind] = &[
        CardKind::Contracts,
        CardKind::VotingRounds,
        CardKind::OpenVotes,
        CardKind::SourcesOwned,
        CardKind::WithoutAleph,
        CardKind::NoCommunication,
        CardKind::Technical,
        CardKind::QaOpened,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            CardKind::Contracts => "contracts",
            CardKind::NoCommunication => "no_communication",
            CardKind::VotingRounds => "voting_rounds",
            CardKind::OpenVotes => "open_votes",
            CardKind::SourcesOwned => "sources_owned",
            CardKind::Technical => "technical",
            CardKind::WithoutAleph => "without_aleph",
            CardKind::QaOpened => "QAopened",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.slug() == slug)
    }

    pub fn title(&self) -> &'static str {
        match self {
            CardKind::Contracts => "Contracts in negotiation",
            CardKind::NoCommunication => "Contracts without scheduled communication",
            CardKind::VotingRounds => "Voting rounds you manage",
            CardKind::OpenVotes => "Opened voting rounds",
            CardKind::SourcesOwned => "Sources curating",
            CardKind::Technical => "Sources that need technical review",
            CardKind::WithoutAleph => "Source without Aleph ID",
            CardKind::QaOpened => "Opened QAs",
        }
    }
}

/// Row returned by a card query
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardRow {
    Contract {
        contract: Contract,
        source_name: String,
    },
    Round {
        round: VotingRound,
        source_name: String,
        vote_count: usize,
    },
    Source {
        source: Source,
    },
    Qa {
        check: QaCheck,
        source_name: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardElement {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    pub instance: CardRow,
}

impl CardElement {
    fn from_row(row: CardRow) -> Self {
        let (title, badge, color) = match &row {
            CardRow::Contract {
                contract,
                source_name,
            } => {
                let color = if contract.publisher_responds { "success" } else { "info" };
                (source_name.clone(), None, Some(color))
            }
            CardRow::Round {
                source_name,
                vote_count,
                ..
            } => (source_name.clone(), Some(*vote_count), None),
            CardRow::Source { source } => (source.name.clone(), None, Some(source.css_class())),
            CardRow::Qa { source_name, .. } => (source_name.clone(), None, None),
        };
        Self {
            title,
            badge,
            color,
            instance: row,
        }
    }
}

/// Page bookkeeping of a card
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub slug: &'static str,
    pub title: &'static str,
    pub empty: bool,
    pub page: PageInfo,
    pub elements: Vec<CardElement>,
}

/// Splits `count` items into pages of `per_page`; a last page of at most
/// `orphans` items is merged into the one before it
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    pub per_page: usize,
    pub orphans: usize,
}

impl Paginator {
    pub fn new(per_page: usize, orphans: usize) -> Self {
        Self {
            per_page: per_page.max(1),
            orphans,
        }
    }

    pub fn num_pages(&self, count: usize) -> usize {
        if count == 0 {
            return 1;
        }
        let hits = count.saturating_sub(self.orphans).max(1);
        hits.div_ceil(self.per_page)
    }

    /// Index range of page `number` (1-based)
    pub fn page_range(&self, number: usize, count: usize) -> Result<Range<usize>, AppError> {
        let num_pages = self.num_pages(count);
        if number == 0 || number > num_pages {
            return Err(AppError::NotFound(format!(
                "Page {} out of range (1..={})",
                number, num_pages
            )));
        }
        let bottom = (number - 1) * self.per_page;
        let mut top = bottom + self.per_page;
        if top + self.orphans >= count {
            top = count;
        }
        Ok(bottom..top.max(bottom))
    }

    pub fn page_info(&self, number: usize, count: usize) -> PageInfo {
        let num_pages = self.num_pages(count);
        PageInfo {
            number,
            num_pages,
            count,
            has_next: number < num_pages,
            has_previous: number > 1,
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(10, 3)
    }
}

pub struct Dashboard {
    store: Arc<dyn Store>,
    paginator: Paginator,
}

impl Dashboard {
    pub fn new(store: Arc<dyn Store>, paginator: Paginator) -> Self {
        Self { store, paginator }
    }

    /// First page of every card
    pub async fn cards(&self, user: Uuid) -> Result<Vec<Card>, AppError> {
        let mut cards = Vec::with_capacity(CardKind::ALL.len());
        for kind in CardKind::ALL {
            cards.push(self.card(*kind, user, 1).await?);
        }
        Ok(cards)
    }

    pub async fn card(&self, kind: CardKind, user: Uuid, page: usize) -> Result<Card, AppError> {
        let rows = self.store.card_rows(kind, user).await?;
        let count = rows.len();
        let range = self.paginator.page_range(page, count)?;
        debug!("Card {} for {}: {} rows, page {}", kind.slug(), user, count, page);

        let elements = rows
            .into_iter()
            .skip(range.start)
            .take(range.len())
            .map(CardElement::from_row)
            .collect();

        Ok(Card {
            slug: kind.slug(),
            title: kind.title(),
            empty: count == 0,
            page: self.paginator.page_info(page, count),
            elements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Actor, Role};
    use crate::constants::{ContractType, Frequency, SourceState, VoteDecision};
    use crate::models::{Seed, Vote};
    use crate::store::{MemoryStore, NewSourceBundle};
    use crate::workflow::WorkflowEngine;

    #[test]
    fn test_paginator_merges_orphans() {
        let paginator = Paginator::new(10, 3);
        assert_eq!(paginator.num_pages(0), 1);
        assert_eq!(paginator.num_pages(10), 1);
        assert_eq!(paginator.num_pages(13), 1);
        assert_eq!(paginator.num_pages(14), 2);
        assert_eq!(paginator.page_range(1, 13).unwrap(), 0..13);
        assert_eq!(paginator.page_range(1, 14).unwrap(), 0..10);
        assert_eq!(paginator.page_range(2, 14).unwrap(), 10..14);
        assert_eq!(paginator.page_range(1, 0).unwrap(), 0..0);
        assert!(paginator.page_range(2, 13).is_err());
        assert!(paginator.page_range(0, 13).is_err());
    }

    #[test]
    fn test_card_slugs() {
        for kind in CardKind::ALL {
            assert_eq!(CardKind::from_slug(kind.slug()), Some(*kind));
        }
        assert_eq!(CardKind::from_slug("nope"), None);
        assert_eq!(CardKind::ALL.len(), 8);
    }

    async fn seed_source(store: &MemoryStore, owner: Uuid, name: &str) -> Source {
        let engine = WorkflowEngine::default();
        let source = Source::new(owner, owner, name.to_string(), Frequency::Yearly);
        let round = engine.on_source_created(&source);
        store
            .create_source(NewSourceBundle {
                seeds: vec![Seed::new(source.id, "https://example.org".to_string())],
                source,
                round,
                contract: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_voting_cards() {
        let store = Arc::new(MemoryStore::new());
        let curator = Uuid::new_v4();
        let colleague = Uuid::new_v4();
        let mine = seed_source(&store, curator, "Mine").await;
        let theirs = seed_source(&store, colleague, "Theirs").await;
        let voted = seed_source(&store, colleague, "Voted").await;

        let voted_round = store.list_rounds(voted.id).await.unwrap().remove(0);
        store
            .upsert_vote(Vote::new(voted_round.id, curator, VoteDecision::Approve))
            .await
            .unwrap();

        let dashboard = Dashboard::new(store.clone(), Paginator::default());

        let managed = dashboard.card(CardKind::VotingRounds, curator, 1).await.unwrap();
        assert_eq!(managed.elements.len(), 1);
        assert_eq!(managed.elements[0].title, mine.name);
        assert_eq!(managed.elements[0].badge, Some(0));

        let open = dashboard.card(CardKind::OpenVotes, curator, 1).await.unwrap();
        let titles: Vec<_> = open.elements.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec![theirs.name.as_str()]);

        let owned = dashboard.card(CardKind::SourcesOwned, curator, 1).await.unwrap();
        assert_eq!(owned.elements.len(), 1);
        assert_eq!(owned.elements[0].color, Some("info"));
    }

    #[tokio::test]
    async fn test_contract_cards() {
        let store = Arc::new(MemoryStore::new());
        let curator = Uuid::new_v4();
        let source = seed_source(&store, curator, "Negotiated").await;

        let silent = store
            .insert_contract(Contract::new(source.id, ContractType::Proprietary))
            .await
            .unwrap();
        let mut responding = Contract::new(source.id, ContractType::Proprietary);
        responding.publisher_responds = true;
        responding.in_communication = true;
        store.insert_contract(responding).await.unwrap();

        let dashboard = Dashboard::new(store.clone(), Paginator::default());
        let all = dashboard.card(CardKind::Contracts, curator, 1).await.unwrap();
        assert_eq!(all.elements.len(), 2);
        let mut colors: Vec<_> = all.elements.iter().filter_map(|e| e.color).collect();
        colors.sort();
        assert_eq!(colors, vec!["info", "success"]);

        let quiet = dashboard
            .card(CardKind::NoCommunication, curator, 1)
            .await
            .unwrap();
        assert_eq!(quiet.elements.len(), 1);
        match &quiet.elements[0].instance {
            CardRow::Contract { contract, .. } => assert_eq!(contract.id, silent.id),
            other => panic!("unexpected row {:?}", other),
        }

        let other_user = dashboard.card(CardKind::Contracts, Uuid::new_v4(), 1).await.unwrap();
        assert!(other_user.empty);
    }

    #[tokio::test]
    async fn test_review_cards_and_pagination() {
        let store = Arc::new(MemoryStore::new());
        let curator = Uuid::new_v4();
        let manager = Actor::new(Uuid::new_v4(), Role::Manager);
        for i in 0..14 {
            let mut source = seed_source(&store, curator, &format!("Source {}", i)).await;
            source.state = SourceState::TechnicalReview;
            store.update_source(source).await.unwrap();
        }

        let dashboard = Dashboard::new(store.clone(), Paginator::default());
        let first = dashboard.card(CardKind::Technical, manager.id, 1).await.unwrap();
        assert_eq!(first.elements.len(), 10);
        assert_eq!(first.page.num_pages, 2);
        assert!(first.page.has_next);
        let second = dashboard.card(CardKind::Technical, manager.id, 2).await.unwrap();
        assert_eq!(second.elements.len(), 4);
        assert!(dashboard.card(CardKind::Technical, manager.id, 3).await.is_err());

        let cards = dashboard.cards(curator).await.unwrap();
        assert_eq!(cards.len(), CardKind::ALL.len());
    }
}
