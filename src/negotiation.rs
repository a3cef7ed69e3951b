//! Negotiation e-mail scheduling
//!
//! When a contract enters negotiation its curator gets a pre-filled schedule
//! of outreach e-mails, one per template, each `delay` after the previous
//! one. The schedule is only proposed while the contract has no e-mails;
//! afterwards it is edited entry by entry. Nothing is sent from here.

use crate::error::AppError;
use crate::models::EmailNegotiation;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tera::{Context, Tera};
use uuid::Uuid;

/// Ordered negotiation templates: (template name, e-mail title, body)
const NEGOTIATION_TEMPLATES: [(&str, &str, &str); 4] = [
    (
        "negotiation/first.txt",
        "Request for permission to archive",
        include_str!("../templates/negotiation/first.txt"),
    ),
    (
        "negotiation/second.txt",
        "Reminder: request for permission to archive",
        include_str!("../templates/negotiation/second.txt"),
    ),
    (
        "negotiation/third.txt",
        "Second reminder: request for permission to archive",
        include_str!("../templates/negotiation/third.txt"),
    ),
    (
        "negotiation/last.txt",
        "Closing our request for permission to archive",
        include_str!("../templates/negotiation/last.txt"),
    ),
];

/// Values available to the templates
#[derive(Debug, Clone, Serialize)]
pub struct NegotiationContext {
    pub user_name: String,
    pub user_email: String,
    pub source_name: String,
}

/// Proposed e-mail, not persisted yet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailDraft {
    pub scheduled_date: DateTime<Utc>,
    pub title: String,
    pub content: String,
}

/// One row of a submitted schedule
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    /// Existing e-mail to update or delete; `None` adds a new one
    pub id: Option<Uuid>,
    pub scheduled_date: DateTime<Utc>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub delete: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleSubmission {
    pub entries: Vec<ScheduleEntry>,
}

/// Rows to write for a submitted schedule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleChanges {
    pub upserts: Vec<EmailNegotiation>,
    pub deletes: Vec<Uuid>,
}

pub struct NegotiationScheduler {
    tera: Tera,
    delay: Duration,
}

impl NegotiationScheduler {
    /// Drafts are spaced `delay_days` apart, which must be at least one day
    pub fn new(delay_days: i64) -> Result<Self, AppError> {
        if delay_days <= 0 {
            return Err(AppError::Config(format!(
                "Negotiation delay must be at least one day, got {}",
                delay_days
            )));
        }
        let mut tera = Tera::default();
        tera.add_raw_templates(
            NEGOTIATION_TEMPLATES
                .iter()
                .map(|(name, _, body)| (*name, *body)),
        )?;
        Ok(Self {
            tera,
            delay: Duration::days(delay_days),
        })
    }

    /// Initial schedule for a contract with `existing` e-mails: one draft per
    /// template when there are none, nothing otherwise
    pub fn initial_drafts(
        &self,
        existing: usize,
        context: &NegotiationContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<EmailDraft>, AppError> {
        if existing > 0 {
            return Ok(Vec::new());
        }

        let context = Context::from_serialize(context)?;
        let mut scheduled_date = now;
        let mut drafts = Vec::with_capacity(NEGOTIATION_TEMPLATES.len());
        for (name, title, _) in NEGOTIATION_TEMPLATES.iter() {
            drafts.push(EmailDraft {
                scheduled_date,
                title: title.to_string(),
                content: self.tera.render(name, &context)?,
            });
            scheduled_date += self.delay;
        }
        Ok(drafts)
    }
}

/// Turn a submission into row changes for `contract_id`, whose current
/// e-mails are `existing`
pub fn plan_submission(
    contract_id: Uuid,
    existing: &[EmailNegotiation],
    submission: &ScheduleSubmission,
) -> Result<ScheduleChanges, AppError> {
    let mut changes = ScheduleChanges::default();
    let mut seen = HashSet::new();

    for entry in &submission.entries {
        match entry.id {
            Some(id) => {
                let current = existing.iter().find(|e| e.id == id).ok_or_else(|| {
                    AppError::Validation(format!(
                        "E-mail {} is not scheduled for contract {}",
                        id, contract_id
                    ))
                })?;
                if !seen.insert(id) {
                    return Err(AppError::BadRequest(format!(
                        "E-mail {} submitted more than once",
                        id
                    )));
                }
                if entry.delete {
                    changes.deletes.push(id);
                    continue;
                }
                check_title(entry)?;
                changes.upserts.push(EmailNegotiation {
                    scheduled_date: entry.scheduled_date,
                    title: entry.title.trim().to_string(),
                    content: entry.content.clone(),
                    ..current.clone()
                });
            }
            // A new row marked for deletion was never saved
            None if entry.delete => {}
            None => {
                check_title(entry)?;
                changes.upserts.push(EmailNegotiation {
                    id: Uuid::new_v4(),
                    contract_id,
                    scheduled_date: entry.scheduled_date,
                    title: entry.title.trim().to_string(),
                    content: entry.content.clone(),
                    created_at: Utc::now(),
                });
            }
        }
    }

    Ok(changes)
}

fn check_title(entry: &ScheduleEntry) -> Result<(), AppError> {
    if entry.title.trim().is_empty() {
        return Err(AppError::Validation("E-mail title is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn context() -> NegotiationContext {
        NegotiationContext {
            user_name: "Jana Curator".to_string(),
            user_email: "jana@archive.example".to_string(),
            source_name: "Local News".to_string(),
        }
    }

    fn email(contract_id: Uuid) -> EmailNegotiation {
        EmailNegotiation {
            id: Uuid::new_v4(),
            contract_id,
            scheduled_date: Utc::now(),
            title: "Hello".to_string(),
            content: "Body".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_initial_drafts_for_empty_schedule() {
        let scheduler = NegotiationScheduler::new(14).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let drafts = scheduler.initial_drafts(0, &context(), now).unwrap();

        assert_eq!(drafts.len(), 4);
        for (k, draft) in drafts.iter().enumerate() {
            assert_eq!(draft.scheduled_date, now + Duration::days(14 * k as i64));
            assert!(draft.content.contains("Local News"));
            assert!(draft.content.contains("Jana Curator"));
        }
        assert!(drafts.windows(2).all(|w| w[0].scheduled_date < w[1].scheduled_date));
    }

    #[test]
    fn test_no_drafts_when_schedule_exists() {
        let scheduler = NegotiationScheduler::new(14).unwrap();
        assert!(scheduler.initial_drafts(1, &context(), Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_plan_submission() {
        let contract_id = Uuid::new_v4();
        let kept = email(contract_id);
        let dropped = email(contract_id);
        let submission = ScheduleSubmission {
            entries: vec![
                ScheduleEntry {
                    id: Some(kept.id),
                    scheduled_date: kept.scheduled_date,
                    title: "Updated ".to_string(),
                    content: "New body".to_string(),
                    delete: false,
                },
                ScheduleEntry {
                    id: Some(dropped.id),
                    scheduled_date: dropped.scheduled_date,
                    title: dropped.title.clone(),
                    content: dropped.content.clone(),
                    delete: true,
                },
                ScheduleEntry {
                    id: None,
                    scheduled_date: Utc::now(),
                    title: "Fresh".to_string(),
                    content: "Hi".to_string(),
                    delete: false,
                },
                ScheduleEntry {
                    id: None,
                    scheduled_date: Utc::now(),
                    title: String::new(),
                    content: String::new(),
                    delete: true,
                },
            ],
        };

        let changes =
            plan_submission(contract_id, &[kept.clone(), dropped.clone()], &submission).unwrap();

        assert_eq!(changes.deletes, vec![dropped.id]);
        assert_eq!(changes.upserts.len(), 2);
        assert_eq!(changes.upserts[0].id, kept.id);
        assert_eq!(changes.upserts[0].title, "Updated");
        assert_eq!(changes.upserts[1].contract_id, contract_id);
    }

    #[test]
    fn test_plan_rejects_foreign_email() {
        let contract_id = Uuid::new_v4();
        let submission = ScheduleSubmission {
            entries: vec![ScheduleEntry {
                id: Some(Uuid::new_v4()),
                scheduled_date: Utc::now(),
                title: "x".to_string(),
                content: String::new(),
                delete: true,
            }],
        };
        assert!(plan_submission(contract_id, &[email(contract_id)], &submission).is_err());
    }

    #[test]
    fn test_plan_requires_title() {
        let submission = ScheduleSubmission {
            entries: vec![ScheduleEntry {
                id: None,
                scheduled_date: Utc::now(),
                title: "   ".to_string(),
                content: "body".to_string(),
                delete: false,
            }],
        };
        assert!(matches!(
            plan_submission(Uuid::new_v4(), &[], &submission),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_scheduler_rejects_non_positive_delay() {
        assert!(matches!(NegotiationScheduler::new(0), Err(AppError::Config(_))));
        assert!(matches!(NegotiationScheduler::new(-14), Err(AppError::Config(_))));
    }

    #[test]
    fn test_drafts_have_distinct_dates() {
        let scheduler = NegotiationScheduler::new(1).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let drafts = scheduler.initial_drafts(0, &context(), now).unwrap();
        for pair in drafts.windows(2) {
            assert!(pair[0].scheduled_date < pair[1].scheduled_date);
        }
    }
}
