//! Statement Handlers
//!
//! A statement is stored as a request; the report is replayed from the
//! transaction log on every read.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::OperationContext;
use crate::error::AppError;
use crate::notification::NotificationService;
use crate::repository::{statements, transactions};
use crate::statement::{build_report, Statement, StatementReport};

use super::{require_principal, CreateStatementCommand};

pub struct CreateStatementHandler {
    pool: PgPool,
    notifications: NotificationService,
}

impl CreateStatementHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
        }
    }

    pub async fn execute(&self, command: CreateStatementCommand, context: &OperationContext) -> Result<Statement, AppError> {
        let principal = require_principal(context)?;
        let statement = Statement::request(
            principal.user_id,
            command.account_type,
            command.start_date,
            command.end_date,
            command.format,
            Utc::now(),
        )?;

        let mut conn = self.pool.acquire().await?;
        statements::insert(&mut conn, &statement).await?;

        tracing::info!(
            statement_id = %statement.id,
            user_id = %statement.user_id,
            account_type = %statement.account_type,
            correlation_id = ?context.correlation_id,
            "Statement requested"
        );

        self.notifications
            .notify(
                statement.user_id,
                format!(
                    "Your {} statement for {} to {} is ready",
                    statement.account_type, statement.start_date, statement.end_date
                ),
                context,
            )
            .await;

        Ok(statement)
    }
}

pub struct StatementReportHandler {
    pool: PgPool,
    config: Arc<Config>,
}

impl StatementReportHandler {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        Self { pool, config }
    }

    /// Load the request and replay its balances from one snapshot
    pub async fn execute(&self, statement_id: Uuid, context: &OperationContext) -> Result<StatementReport, AppError> {
        let principal = require_principal(context)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let statement = statements::find_by_id(&mut tx, statement_id)
            .await?
            .ok_or_else(|| AppError::not_found("Statement"))?;
        principal.ensure_owner_or_admin(statement.user_id)?;

        let window = statement.window();
        let in_window =
            transactions::list_in_window(&mut tx, statement.user_id, statement.account_type, window.start, window.end)
                .await?;
        let prior =
            transactions::list_completed_before(&mut tx, statement.user_id, statement.account_type, window.start)
                .await?;
        tx.commit().await?;

        Ok(build_report(statement, in_window, &prior, &self.config.default_currency))
    }
}
