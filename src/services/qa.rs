//! Quality assurance checks of harvested sources

use crate::auth::Actor;
use crate::error::AppError;
use crate::models::QaCheck;
use crate::store::Store;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CloseQa {
    /// What happens to the source after the check
    #[validate(length(min = 1, max = 64, message = "Source action is required"))]
    pub source_action: String,
    pub comment: Option<String>,
}

pub struct QaService {
    store: Arc<dyn Store>,
}

impl QaService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn open(
        &self,
        actor: &Actor,
        source_id: Uuid,
        comment: Option<String>,
    ) -> Result<QaCheck, AppError> {
        let check = self
            .store
            .insert_qa(QaCheck::new(source_id, actor.id, comment))
            .await?;
        info!("QA check {} opened on source {} by {}", check.id, source_id, actor.id);
        Ok(check)
    }

    /// Close a check with the action taken on its source
    pub async fn close(&self, actor: &Actor, id: Uuid, request: CloseQa) -> Result<QaCheck, AppError> {
        request.validate()?;
        let mut check = self.store.get_qa(id).await?;
        if !actor.may_manage(check.checked_by) {
            return Err(AppError::Forbidden(
                "Only the author of the check or a manager can close it".to_string(),
            ));
        }
        if !check.is_open() {
            return Err(AppError::Conflict(format!("QA check {} is already closed", id)));
        }

        check.source_action = Some(request.source_action);
        if request.comment.is_some() {
            check.comment = request.comment;
        }
        self.store.update_qa(check).await
    }

    pub async fn list(&self, source_id: Uuid) -> Result<Vec<QaCheck>, AppError> {
        self.store.list_qa(source_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_check_lifecycle() {
        let store = store();
        let checker = curator();
        let source = source_service(&store)
            .propose(&checker, new_source("Checked"))
            .await
            .unwrap()
            .source;
        let service = QaService::new(store.clone());

        let check = assert_ok!(service.open(&checker, source.id, None).await);
        assert!(check.is_open());

        let request = CloseQa {
            source_action: "keep".to_string(),
            comment: Some("harvest looks complete".to_string()),
        };
        assert!(matches!(
            service.close(&curator(), check.id, request.clone()).await,
            Err(AppError::Forbidden(_))
        ));
        let closed = assert_ok!(service.close(&checker, check.id, request.clone()).await);
        assert!(!closed.is_open());
        assert!(matches!(
            service.close(&checker, check.id, request).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(service.list(source.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_check_needs_source() {
        let service = QaService::new(store());
        assert!(matches!(
            service.open(&curator(), Uuid::new_v4(), None).await,
            Err(AppError::NotFound(_))
        ));
    }
}
