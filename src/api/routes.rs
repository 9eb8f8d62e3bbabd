//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Loan, Transaction, User};
use crate::domain::{DomainError, OperationContext, Principal, TransactionPatch};
use crate::error::AppError;
use crate::handlers::{
    AddTransactionCommand, AddTransactionHandler, CreateCurrencyCommand, CreateLoanCommand,
    CreateLoanHandler, CreateStatementCommand, CreateStatementHandler, CreditLimitCommand,
    CreditLimitHandler, DeleteTransactionHandler, ForgotPasswordCommand, ForgotPasswordHandler,
    LoanPaymentCommand, LoanPaymentHandler, LoanPaymentResult, LoginCommand, LoginHandler, LoginResult, LogoutHandler,
    RegisterCommand, RegisterHandler, ResetPasswordCommand, ResetPasswordHandler,
    SessionResult, SetAccountLevelCommand, SetAccountLevelHandler, SetTransferAbilityCommand,
    SetTransferAbilityHandler, StatementReportHandler, TransitionStatusCommand,
    TransactionView, TransitionStatusHandler, UpdateBalanceCommand, UpdateBalanceHandler, UpdateCurrencyCommand,
    UpdateTransactionHandler, VerifyOtpCommand, VerifyOtpHandler,
};
use crate::notification::{Notification, NotificationService};
use crate::repository::{currencies, loans, statements, transactions, users, Currency};
use crate::statement::{Statement, StatementReport};
use crate::state::AppState;

use super::extract::{ValidatedJson, ValidatedPath, ValidatedQuery};
use super::middleware::{request_context, SessionToken};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Administrators may ask for every user's records
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction: Transaction,
}

/// Response of the routes that record a new transaction
#[derive(Debug, Serialize)]
pub struct RecordedTransactionResponse {
    pub transaction: TransactionView,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
pub struct StatementResponse {
    pub statement: Statement,
}

#[derive(Debug, Serialize)]
pub struct StatementReportResponse {
    pub statement: StatementReport,
}

#[derive(Debug, Serialize)]
pub struct StatementsResponse {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub loan: Loan,
}

#[derive(Debug, Serialize)]
pub struct LoansResponse {
    pub loans: Vec<Loan>,
}

#[derive(Debug, Serialize)]
pub struct CurrencyResponse {
    pub currency: Currency,
}

#[derive(Debug, Serialize)]
pub struct CurrenciesResponse {
    pub currencies: Vec<Currency>,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub notification: Notification,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct MarkedReadResponse {
    pub updated: u64,
}

/// Whether a list request should return every user's records
fn list_scope(principal: &Principal, query: &ListQuery) -> Result<Option<Uuid>, AppError> {
    if query.admin {
        principal.ensure_admin()?;
        Ok(None)
    } else {
        Ok(Some(principal.user_id))
    }
}

// =========================================================================
// Routers
// =========================================================================

/// Routes reachable without a session
pub fn create_public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

/// Routes behind the bearer-session middleware
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/users/me", get(get_profile))
        // Transactions
        .route("/transactions", post(add_transaction).get(list_transactions))
        .route("/transactions/credit-limit", post(request_credit_limit))
        .route(
            "/transactions/:transaction_id",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
        // Statements
        .route("/statements", post(create_statement).get(list_statements))
        .route("/statements/:statement_id", get(get_statement))
        // Loans
        .route("/loans", get(list_loans))
        .route("/loans/:loan_id", get(get_loan))
        .route("/loans/:loan_id/payment", post(pay_loan))
        // Currencies
        .route("/currencies", get(list_currencies))
        // Notifications
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", patch(mark_all_notifications_read))
        .route("/notifications/:notification_id/read", patch(mark_notification_read))
        // Back office
        .route("/admin/users/:user_id/transactions", post(add_transaction_by_admin))
        .route("/admin/users/:user_id/balance", patch(update_balance))
        .route("/admin/users/:user_id/transfer-ability", patch(set_transfer_ability))
        .route("/admin/users/:user_id/account-level", patch(set_account_level))
        .route("/admin/transactions/:transaction_id/status", post(transition_status))
        .route("/admin/loans", post(create_loan))
        .route("/admin/currencies", post(create_currency))
        .route("/admin/currencies/:currency_id", patch(update_currency))
}

// =========================================================================
// Identity
// =========================================================================

async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(command): ValidatedJson<RegisterCommand>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let context = request_context(&headers);
    let user = RegisterHandler::new(state.pool).execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(command): ValidatedJson<LoginCommand>,
) -> Result<Json<LoginResult>, AppError> {
    let context = request_context(&headers);
    let handler = LoginHandler::new(state.pool, state.config, state.mailer);
    Ok(Json(handler.execute(command, &context).await?))
}

async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(command): ValidatedJson<VerifyOtpCommand>,
) -> Result<Json<SessionResult>, AppError> {
    let context = request_context(&headers);
    let handler = VerifyOtpHandler::new(state.pool, state.config);
    Ok(Json(handler.execute(command, &context).await?))
}

async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(command): ValidatedJson<ForgotPasswordCommand>,
) -> Result<Json<MessageResponse>, AppError> {
    let context = request_context(&headers);
    let handler = ForgotPasswordHandler::new(state.pool, state.config, state.mailer);
    let message = handler.execute(command, &context).await?;
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(command): ValidatedJson<ResetPasswordCommand>,
) -> Result<Json<MessageResponse>, AppError> {
    let context = request_context(&headers);
    ResetPasswordHandler::new(state.pool).execute(command, &context).await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}

async fn logout(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Extension(SessionToken(token_hash)): Extension<SessionToken>,
) -> Result<StatusCode, AppError> {
    LogoutHandler::new(state.pool).execute(&token_hash, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserResponse>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let user = users::find_by_id(&mut conn, principal.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(UserResponse { user }))
}

// =========================================================================
// Transactions
// =========================================================================

async fn add_transaction(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedJson(command): ValidatedJson<AddTransactionCommand>,
) -> Result<(StatusCode, Json<RecordedTransactionResponse>), AppError> {
    let transaction = AddTransactionHandler::new(state.pool).execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(RecordedTransactionResponse { transaction })))
}

async fn add_transaction_by_admin(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedPath(user_id): ValidatedPath<Uuid>,
    ValidatedJson(command): ValidatedJson<AddTransactionCommand>,
) -> Result<(StatusCode, Json<RecordedTransactionResponse>), AppError> {
    let transaction = AddTransactionHandler::new(state.pool)
        .execute_as_admin(user_id, command, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(RecordedTransactionResponse { transaction })))
}

async fn list_transactions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let transactions = match list_scope(&principal, &query)? {
        Some(user_id) => transactions::list_by_user(&mut conn, user_id).await?,
        None => transactions::list_all(&mut conn).await?,
    };
    Ok(Json(TransactionsResponse { transactions }))
}

async fn get_transaction(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedPath(transaction_id): ValidatedPath<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let transaction = transactions::find_by_id(&mut conn, transaction_id)
        .await?
        .ok_or_else(|| AppError::not_found("Transaction"))?;
    principal.ensure_owner_or_admin(transaction.user_id())?;
    Ok(Json(TransactionResponse { transaction }))
}

async fn update_transaction(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedPath(transaction_id): ValidatedPath<Uuid>,
    ValidatedJson(patch): ValidatedJson<TransactionPatch>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = UpdateTransactionHandler::new(state.pool)
        .execute(transaction_id, patch, &context)
        .await?;
    Ok(Json(TransactionResponse { transaction }))
}

async fn delete_transaction(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedPath(transaction_id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    DeleteTransactionHandler::new(state.pool)
        .execute(transaction_id, &context)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn transition_status(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedPath(transaction_id): ValidatedPath<Uuid>,
    ValidatedJson(command): ValidatedJson<TransitionStatusCommand>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = TransitionStatusHandler::new(state.pool)
        .execute(transaction_id, command, &context)
        .await?;
    Ok(Json(TransactionResponse { transaction }))
}

async fn request_credit_limit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedJson(command): ValidatedJson<CreditLimitCommand>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let transaction = CreditLimitHandler::new(state.pool, state.config)
        .execute(command, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(TransactionResponse { transaction })))
}

// =========================================================================
// Statements
// =========================================================================

async fn create_statement(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedJson(command): ValidatedJson<CreateStatementCommand>,
) -> Result<(StatusCode, Json<StatementResponse>), AppError> {
    let statement = CreateStatementHandler::new(state.pool).execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(StatementResponse { statement })))
}

async fn list_statements(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<StatementsResponse>, AppError> {
    let scope = (!principal.can_view_all()).then_some(principal.user_id);
    let mut conn = state.pool.acquire().await?;
    let statements = statements::list(&mut conn, scope).await?;
    Ok(Json(StatementsResponse { statements }))
}

async fn get_statement(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedPath(statement_id): ValidatedPath<Uuid>,
) -> Result<Json<StatementReportResponse>, AppError> {
    let statement = StatementReportHandler::new(state.pool, state.config)
        .execute(statement_id, &context)
        .await?;
    Ok(Json(StatementReportResponse { statement }))
}

// =========================================================================
// Loans
// =========================================================================

async fn create_loan(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedJson(command): ValidatedJson<CreateLoanCommand>,
) -> Result<(StatusCode, Json<LoanResponse>), AppError> {
    let loan = CreateLoanHandler::new(state.pool).execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(LoanResponse { loan })))
}

async fn list_loans(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> Result<Json<LoansResponse>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let loans = match list_scope(&principal, &query)? {
        Some(user_id) => loans::list_by_user(&mut conn, user_id).await?,
        None => loans::list_all(&mut conn).await?,
    };
    Ok(Json(LoansResponse { loans }))
}

async fn get_loan(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedPath(loan_id): ValidatedPath<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let loan = loans::find_by_id(&mut conn, loan_id)
        .await?
        .ok_or_else(|| AppError::not_found("Loan"))?;
    principal.ensure_owner_or_admin(loan.user_id())?;
    Ok(Json(LoanResponse { loan }))
}

async fn pay_loan(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedPath(loan_id): ValidatedPath<Uuid>,
    ValidatedJson(command): ValidatedJson<LoanPaymentCommand>,
) -> Result<(StatusCode, Json<LoanPaymentResult>), AppError> {
    let result = LoanPaymentHandler::new(state.pool, state.config)
        .execute(loan_id, command, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

// =========================================================================
// Back office
// =========================================================================

async fn update_balance(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedPath(user_id): ValidatedPath<Uuid>,
    ValidatedJson(command): ValidatedJson<UpdateBalanceCommand>,
) -> Result<Json<UserResponse>, AppError> {
    let user = UpdateBalanceHandler::new(state.pool)
        .execute(user_id, command, &context)
        .await?;
    Ok(Json(UserResponse { user }))
}

async fn set_transfer_ability(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedPath(user_id): ValidatedPath<Uuid>,
    ValidatedJson(command): ValidatedJson<SetTransferAbilityCommand>,
) -> Result<Json<UserResponse>, AppError> {
    let user = SetTransferAbilityHandler::new(state.pool)
        .execute(user_id, command, &context)
        .await?;
    Ok(Json(UserResponse { user }))
}

async fn set_account_level(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ValidatedPath(user_id): ValidatedPath<Uuid>,
    ValidatedJson(command): ValidatedJson<SetAccountLevelCommand>,
) -> Result<Json<UserResponse>, AppError> {
    let user = SetAccountLevelHandler::new(state.pool)
        .execute(user_id, command, &context)
        .await?;
    Ok(Json(UserResponse { user }))
}

// =========================================================================
// Currencies
// =========================================================================

async fn list_currencies(State(state): State<AppState>) -> Result<Json<CurrenciesResponse>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let currencies = currencies::list(&mut conn).await?;
    Ok(Json(CurrenciesResponse { currencies }))
}

async fn create_currency(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedJson(command): ValidatedJson<CreateCurrencyCommand>,
) -> Result<(StatusCode, Json<CurrencyResponse>), AppError> {
    principal.ensure_admin()?;
    let name = command.name.trim().to_uppercase();
    if name.is_empty() {
        return Err(DomainError::validation("name is required").into());
    }
    if command.wallet_address.trim().is_empty() {
        return Err(DomainError::validation("walletAddress is required").into());
    }

    let mut conn = state.pool.acquire().await?;
    let currency = currencies::insert(&mut conn, &name, command.wallet_address.trim()).await?;
    tracing::info!(currency = %currency.name, admin_id = %principal.user_id, "Currency created");
    Ok((StatusCode::CREATED, Json(CurrencyResponse { currency })))
}

async fn update_currency(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedPath(currency_id): ValidatedPath<Uuid>,
    ValidatedJson(command): ValidatedJson<UpdateCurrencyCommand>,
) -> Result<Json<CurrencyResponse>, AppError> {
    principal.ensure_admin()?;
    if command.wallet_address.is_none() && command.active.is_none() {
        return Err(DomainError::validation("no fields to update").into());
    }

    let mut conn = state.pool.acquire().await?;
    let currency = currencies::update(
        &mut conn,
        currency_id,
        command.wallet_address.as_deref().map(str::trim),
        command.active,
    )
    .await?
    .ok_or_else(|| AppError::not_found("Currency"))?;
    Ok(Json(CurrencyResponse { currency }))
}

// =========================================================================
// Notifications
// =========================================================================

async fn list_notifications(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<NotificationsResponse>, AppError> {
    let notifications = NotificationService::new(state.pool)
        .list_by_user(principal.user_id)
        .await?;
    Ok(Json(NotificationsResponse { notifications }))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedPath(notification_id): ValidatedPath<Uuid>,
) -> Result<Json<NotificationResponse>, AppError> {
    let notification = NotificationService::new(state.pool)
        .mark_read(notification_id, &principal)
        .await?;
    Ok(Json(NotificationResponse { notification }))
}

async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<MarkedReadResponse>, AppError> {
    let updated = NotificationService::new(state.pool)
        .mark_all_read(principal.user_id)
        .await?;
    Ok(Json(MarkedReadResponse { updated }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    #[test]
    fn test_list_scope() {
        let user = Principal::new(Uuid::new_v4(), Role::User);
        let admin = Principal::new(Uuid::new_v4(), Role::Admin);

        assert_eq!(list_scope(&user, &ListQuery::default()).unwrap(), Some(user.user_id));
        assert!(list_scope(&user, &ListQuery { admin: true }).is_err());
        assert_eq!(list_scope(&admin, &ListQuery { admin: true }).unwrap(), None);
        assert_eq!(list_scope(&admin, &ListQuery::default()).unwrap(), Some(admin.user_id));
    }

    #[test]
    fn test_message_response_shape() {
        let body = serde_json::to_value(MessageResponse {
            message: "ok".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"message": "ok"}));
    }
}
