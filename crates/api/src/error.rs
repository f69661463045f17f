use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use papertrade_core::{LedgerError, OracleError, StoreError};
use papertrade_ledger::ServiceError;

/// Everything a handler can fail with.
///
/// Each error renders as `{ "error": { "kind": ..., "message": ... } }` where
/// `kind` is a stable machine-readable string clients can match on.
#[derive(Debug)]
pub enum ApiError {
    MissingToken,
    InvalidToken,
    InvalidCredentials,
    Validation(String),
    Service(ServiceError),
    Internal,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "missing_token",
                "Missing authorization token".to_string(),
            ),
            ApiError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid or expired token".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid username or password".to_string(),
            ),
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, "validation", message.clone())
            }
            ApiError::Service(err) => service_response(err),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(%status, kind, "Request failed: {self:?}");
        }

        let body = Json(serde_json::json!({
            "error": { "kind": kind, "message": message }
        }));
        (status, body).into_response()
    }
}

fn service_response(err: &ServiceError) -> (StatusCode, &'static str, String) {
    let (status, kind) = match err {
        ServiceError::Ledger(LedgerError::InvalidAmount { .. }) => {
            (StatusCode::BAD_REQUEST, "invalid_amount")
        }
        ServiceError::Ledger(LedgerError::InsufficientFunds { .. }) => {
            (StatusCode::BAD_REQUEST, "insufficient_funds")
        }
        ServiceError::Ledger(LedgerError::InsufficientHoldings { .. }) => {
            (StatusCode::BAD_REQUEST, "insufficient_holdings")
        }
        ServiceError::Ledger(LedgerError::PriceUnavailable { .. }) => {
            (StatusCode::BAD_GATEWAY, "price_unavailable")
        }
        ServiceError::Ledger(LedgerError::AccountNotEmpty { .. }) => {
            (StatusCode::BAD_REQUEST, "account_not_empty")
        }
        ServiceError::Store(StoreError::AccountNotFound(_)) => {
            (StatusCode::NOT_FOUND, "account_not_found")
        }
        ServiceError::Store(StoreError::TransactionNotFound(_)) => {
            (StatusCode::NOT_FOUND, "transaction_not_found")
        }
        ServiceError::Store(StoreError::UsernameTaken(_)) => {
            (StatusCode::BAD_REQUEST, "username_taken")
        }
        ServiceError::Store(StoreError::EmailTaken(_)) => {
            (StatusCode::BAD_REQUEST, "email_taken")
        }
        ServiceError::Store(StoreError::DatabaseError(_)) => {
            // The database detail goes to the log, never the response body.
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Internal server error".to_string(),
            );
        }
        ServiceError::Oracle(OracleError::SymbolNotFound(_)) => {
            (StatusCode::NOT_FOUND, "symbol_not_found")
        }
        ServiceError::Oracle(OracleError::ApiError(_) | OracleError::ParseError(_)) => {
            (StatusCode::BAD_GATEWAY, "price_unavailable")
        }
        ServiceError::NotOwner(_) => (StatusCode::UNAUTHORIZED, "not_owner"),
    };
    (status, kind, err.to_string())
}
