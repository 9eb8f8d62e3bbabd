//! Notification Service
//!
//! User-visible event log written after every committed mutation.
//! A failed write never fails the operation that triggered it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{DomainError, OperationContext, Principal};
use crate::repository::RepositoryError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for NotificationError {
    fn from(err: sqlx::Error) -> Self {
        NotificationError::Repository(err.into())
    }
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a notification
    pub async fn create(&self, user_id: Uuid, message: &str) -> Result<Uuid, NotificationError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (id, user_id, message, read)
            VALUES ($1, $2, $3, FALSE)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(notification_id = %id, user_id = %user_id, "Notification created");
        Ok(id)
    }

    /// Fire-and-forget variant of [`create`](Self::create); failures are logged
    pub async fn notify(&self, user_id: Uuid, message: impl AsRef<str>, context: &OperationContext) {
        if let Err(e) = self.create(user_id, message.as_ref()).await {
            tracing::warn!(
                user_id = %user_id,
                correlation_id = ?context.correlation_id,
                error = %e,
                "Failed to write notification"
            );
        }
    }

    /// Newest first
    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Notification>, NotificationError> {
        let notifications = sqlx::query_as(
            r#"
            SELECT id, user_id, message, read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    /// Mark one notification read; only its owner may do so
    pub async fn mark_read(&self, id: Uuid, principal: &Principal) -> Result<Notification, NotificationError> {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let owner = owner.ok_or(NotificationError::NotFound(id))?;
        principal.ensure_owner(owner)?;

        let notification = sqlx::query_as(
            r#"
            UPDATE notifications SET read = TRUE
            WHERE id = $1
            RETURNING id, user_id, message, read, created_at
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(notification)
    }

    /// Returns how many notifications changed
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, NotificationError> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_shape() {
        let notification = Notification {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            message: "Deposit of 10.00 USD completed".to_string(),
            read: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["read"], false);
        assert!(json.get("user").is_some());
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_error_messages() {
        let id = Uuid::nil();
        assert_eq!(
            NotificationError::NotFound(id).to_string(),
            format!("Notification not found: {}", id)
        );
        let forbidden: NotificationError = DomainError::forbidden("nope").into();
        assert_eq!(forbidden.to_string(), "Forbidden: nope");
    }
}
