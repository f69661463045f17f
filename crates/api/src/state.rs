use crate::auth::JwtHandler;
use papertrade_ledger::SettlementService;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    pub ledger: SettlementService,
    pub jwt: JwtHandler,
}

impl AppState {
    pub fn new(ledger: SettlementService, jwt: JwtHandler) -> Self {
        Self { ledger, jwt }
    }
}
