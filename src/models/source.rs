//! Sources and their seeds
//!
//! A source is an information source (usually a website) that is going to be
//! harvested. Seeds are the individual urls of a source; most sources have a
//! single seed equal to their base url.

use crate::constants::{Frequency, SeedState, SourceState, SuggestedBy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Contract, QaCheck, VotingRound};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: Uuid,
    /// Curator responsible for the source
    pub owner: Uuid,
    pub created_by: Uuid,
    pub name: String,
    pub publisher: Option<String>,
    pub publisher_contact: Option<String>,
    pub state: SourceState,
    pub frequency: Frequency,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub comment: Option<String>,
    pub suggested_by: Option<SuggestedBy>,
    /// Proposed by a visitor through the public form
    pub web_proposal: bool,
    /// Identifier in the library catalogue
    pub aleph_id: Option<String>,
    pub issn: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    pub fn new(owner: Uuid, created_by: Uuid, name: String, frequency: Frequency) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            created_by,
            name,
            publisher: None,
            publisher_contact: None,
            state: SourceState::default(),
            frequency,
            category: None,
            sub_category: None,
            comment: None,
            suggested_by: None,
            web_proposal: false,
            aleph_id: None,
            issn: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn css_class(&self) -> &'static str {
        self.state.color()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub state: SeedState,
    /// The seed redirects elsewhere
    pub redirect: bool,
    /// robots.txt is active on the seed
    pub robots: bool,
    pub comment: Option<String>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Seed {
    pub fn new(source_id: Uuid, url: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            url,
            state: SeedState::default(),
            redirect: false,
            robots: false,
            comment: None,
            from_time: None,
            to_time: None,
            created_at: Utc::now(),
        }
    }
}

/// Source with everything hanging off it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDetail {
    pub source: Source,
    pub seeds: Vec<Seed>,
    pub voting_rounds: Vec<VotingRound>,
    pub contracts: Vec<Contract>,
    pub qa_checks: Vec<QaCheck>,
    pub next_harvest: Option<DateTime<Utc>>,
}

/// Filter for source listings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFilter {
    pub state: Option<SourceState>,
    pub owner: Option<Uuid>,
}

impl SourceFilter {
    pub fn matches(&self, source: &Source) -> bool {
        self.state.map_or(true, |s| source.state == s)
            && self.owner.map_or(true, |o| source.owner == o)
    }
}
