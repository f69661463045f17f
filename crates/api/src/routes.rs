use crate::auth::{self, AuthAccount};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use papertrade_core::{Account, NewAccount, PaymentMethod, Quote, Transaction};
use papertrade_ledger::{AccountSummary, PortfolioValuation, Settlement, TransactionStats};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let account_routes = Router::new()
        // Account
        .route("/account", get(get_account).delete(close_account))
        .route("/account/summary", get(account_summary))
        // Trading
        .route("/portfolio", get(get_portfolio))
        .route("/trade/buy", post(buy))
        .route("/trade/sell", post(sell))
        // Funds
        .route("/funds/deposit", post(deposit))
        .route("/funds/withdraw", post(withdraw))
        // History
        .route("/transactions", get(list_transactions))
        .route("/transactions/stats", get(transaction_stats))
        .route("/transactions/{id}", get(get_transaction))
        .route_layer(middleware::from_fn_with_state(state, auth::require_auth));

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Auth
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        // Market data
        .route("/market", get(market_listings))
        .route("/market/{symbol}", get(market_quote))
        .merge(account_routes)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// Token plus the account it belongs to, returned by register and login.
#[derive(Serialize)]
struct SessionResponse {
    token: String,
    expires_in: usize,
    account: Account,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::Validation("Username is required".to_string()));
    }
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::Validation(
            "Please include a valid email".to_string(),
        ));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&req.password).map_err(|_| ApiError::Internal)?;
    let account = state
        .ledger
        .register(NewAccount {
            username,
            email,
            password_hash,
        })
        .await?;
    let (token, expires_in) = state
        .jwt
        .generate_token(&account)
        .map_err(|_| ApiError::Internal)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            expires_in,
            account,
        }),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let credentials = state
        .ledger
        .credentials(req.username.trim())
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !auth::verify_password(&req.password, &credentials.password_hash) {
        tracing::warn!(username = %credentials.username, "Failed login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let account = state.ledger.account(credentials.account_id).await?;
    let (token, expires_in) = state
        .jwt
        .generate_token(&account)
        .map_err(|_| ApiError::Internal)?;

    tracing::info!(username = %account.username, "Login successful");
    Ok(Json(SessionResponse {
        token,
        expires_in,
        account,
    }))
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.ledger.account(auth.id).await?))
}

async fn account_summary(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
) -> Result<Json<AccountSummary>, ApiError> {
    Ok(Json(state.ledger.summary(auth.id).await?))
}

async fn close_account(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
) -> Result<StatusCode, ApiError> {
    state.ledger.close_account(auth.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListingsQuery {
    #[serde(default = "default_listings_limit")]
    limit: usize,
}

fn default_listings_limit() -> usize {
    100
}

async fn market_listings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<Vec<Quote>>, ApiError> {
    Ok(Json(state.ledger.market_listings(query.limit).await?))
}

async fn market_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(state.ledger.market_quote(&symbol).await?))
}

// ---------------------------------------------------------------------------
// Trading
// ---------------------------------------------------------------------------

/// Payment methods accepted when buying crypto.
const BUY_METHODS: &[PaymentMethod] = &[
    PaymentMethod::Balance,
    PaymentMethod::CreditCard,
    PaymentMethod::BankTransfer,
];

#[derive(Deserialize)]
struct BuyRequest {
    symbol: String,
    quantity: Decimal,
    payment_method: PaymentMethod,
}

#[derive(Deserialize)]
struct SellRequest {
    symbol: String,
    quantity: Decimal,
}

/// The settled transaction plus the balance it left behind.
#[derive(Serialize)]
struct TradeResponse {
    transaction: Transaction,
    cash_balance: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    realized_pnl: Option<Decimal>,
}

impl From<Settlement> for TradeResponse {
    fn from(settlement: Settlement) -> Self {
        Self {
            transaction: settlement.transaction,
            cash_balance: settlement.account.cash_balance,
            realized_pnl: settlement.realized_pnl,
        }
    }
}

async fn buy(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
    Json(req): Json<BuyRequest>,
) -> Result<(StatusCode, Json<TradeResponse>), ApiError> {
    ensure_symbol(&req.symbol)?;
    ensure_method(req.payment_method, BUY_METHODS)?;
    let settlement = state
        .ledger
        .buy(auth.id, &req.symbol, req.quantity, req.payment_method)
        .await?;
    Ok((StatusCode::CREATED, Json(settlement.into())))
}

async fn sell(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
    Json(req): Json<SellRequest>,
) -> Result<(StatusCode, Json<TradeResponse>), ApiError> {
    ensure_symbol(&req.symbol)?;
    let settlement = state
        .ledger
        .sell(auth.id, &req.symbol, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(settlement.into())))
}

async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
) -> Result<Json<PortfolioValuation>, ApiError> {
    Ok(Json(state.ledger.portfolio(auth.id).await?))
}

// ---------------------------------------------------------------------------
// Funds
// ---------------------------------------------------------------------------

/// Payment methods accepted for deposits.
const DEPOSIT_METHODS: &[PaymentMethod] = &[
    PaymentMethod::CreditCard,
    PaymentMethod::BankTransfer,
    PaymentMethod::Paypal,
];

/// Payout methods accepted for withdrawals.
const WITHDRAW_METHODS: &[PaymentMethod] = &[
    PaymentMethod::BankTransfer,
    PaymentMethod::Paypal,
    PaymentMethod::Crypto,
];

/// Deposits and withdrawals below this are rejected at the API edge.
const MIN_FUNDS_AMOUNT: Decimal = Decimal::ONE;

#[derive(Deserialize)]
struct FundsRequest {
    amount: Decimal,
    payment_method: PaymentMethod,
}

async fn deposit(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
    Json(req): Json<FundsRequest>,
) -> Result<(StatusCode, Json<TradeResponse>), ApiError> {
    ensure_funds_amount(req.amount)?;
    ensure_method(req.payment_method, DEPOSIT_METHODS)?;
    let settlement = state
        .ledger
        .deposit(auth.id, req.amount, req.payment_method)
        .await?;
    Ok((StatusCode::CREATED, Json(settlement.into())))
}

async fn withdraw(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
    Json(req): Json<FundsRequest>,
) -> Result<(StatusCode, Json<TradeResponse>), ApiError> {
    ensure_funds_amount(req.amount)?;
    ensure_method(req.payment_method, WITHDRAW_METHODS)?;
    let settlement = state
        .ledger
        .withdraw(auth.id, req.amount, req.payment_method)
        .await?;
    Ok((StatusCode::CREATED, Json(settlement.into())))
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.ledger.history(auth.id).await?))
}

async fn transaction_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
) -> Result<Json<TransactionStats>, ApiError> {
    Ok(Json(state.ledger.stats(auth.id).await?))
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthAccount>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.ledger.transaction(auth.id, id).await?))
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

fn ensure_symbol(symbol: &str) -> Result<(), ApiError> {
    if symbol.trim().is_empty() {
        return Err(ApiError::Validation(
            "Cryptocurrency symbol is required".to_string(),
        ));
    }
    Ok(())
}

fn ensure_funds_amount(amount: Decimal) -> Result<(), ApiError> {
    if amount < MIN_FUNDS_AMOUNT {
        return Err(ApiError::Validation(format!(
            "Amount must be at least {MIN_FUNDS_AMOUNT}"
        )));
    }
    Ok(())
}

fn ensure_method(method: PaymentMethod, allowed: &[PaymentMethod]) -> Result<(), ApiError> {
    if allowed.contains(&method) {
        return Ok(());
    }
    let accepted: Vec<&str> = allowed.iter().map(PaymentMethod::as_str).collect();
    Err(ApiError::Validation(format!(
        "Payment method {} is not accepted here (accepted: {})",
        method.as_str(),
        accepted.join(", ")
    )))
}
