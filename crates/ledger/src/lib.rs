pub mod engine;
pub mod portfolio;
pub mod service;
pub mod stats;

pub use engine::Settlement;
pub use portfolio::{HoldingValuation, PortfolioValuation};
pub use service::{AccountSummary, ServiceError, SettlementService};
pub use stats::{MonthlyActivity, TransactionStats};
