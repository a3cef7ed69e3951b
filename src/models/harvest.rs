//! Planned harvests
//!
//! A harvest crawls the included seeds of every archived source with its
//! target frequency, plus any seeds listed on the harvest itself.

use crate::constants::Frequency;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Harvest {
    pub id: Uuid,
    pub title: String,
    pub scheduled_on: NaiveDate,
    /// Sources harvested at this frequency contribute their seeds
    pub target_frequency: Option<Frequency>,
    pub custom_seeds: Vec<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Harvest {
    pub fn new(title: String, scheduled_on: NaiveDate, created_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            scheduled_on,
            target_frequency: None,
            custom_seeds: Vec::new(),
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// A harvest with the full list of URLs it will crawl
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestDetail {
    pub harvest: Harvest,
    pub seeds: Vec<String>,
}
