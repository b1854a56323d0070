use thiserror::Error;

/// Step of an order sequence, used to say where a sequence stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStep {
    Entry,
    TakeProfit1,
    TakeProfit2,
    Exit,
}

impl std::fmt::Display for OrderStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrderStep::Entry => "entry",
            OrderStep::TakeProfit1 => "take-profit 1",
            OrderStep::TakeProfit2 => "take-profit 2",
            OrderStep::Exit => "exit",
        };
        f.write_str(name)
    }
}

/// Every failure a decision cycle can surface to its caller
#[derive(Debug, Error)]
pub enum TradeError {
    /// Snapshot store read/update failed. Safe to retry with the next delivery.
    #[error("Snapshot store error: {0}")]
    Store(String),

    /// Exchange credentials could not be fetched or were empty
    #[error("Credential error: {0}")]
    Credentials(String),

    /// Balance too small to size a position with two whole-unit targets
    #[error("Balance too small to open a position on {asset} (sized qty {qty})")]
    ZeroBalance { asset: String, qty: u64 },

    /// The exchange refused an order
    #[error("Order rejected at {step}: {reason}")]
    OrderRejected { step: OrderStep, reason: String },

    /// A take-profit failed after entry; the position was flattened
    #[error("Entry rolled back after {step} failed: {reason}")]
    EntryRolledBack { step: OrderStep, reason: String },

    /// A take-profit failed and the flattening close failed too
    #[error("Rollback failed after {step} failed ({reason}); flatten error: {flatten_error}")]
    RollbackFailed {
        step: OrderStep,
        reason: String,
        flatten_error: String,
    },

    /// Transport or decoding failure talking to the exchange
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// The exchange answered with a non-zero `ret_code`
    #[error("Exchange rejected request (ret_code {code}): {message}")]
    ExchangeRejected { code: i64, message: String },

    #[error("Invalid alert: {0}")]
    InvalidAlert(String),

    /// State/position combination the state machine does not cover
    #[error("Unexpected state: {0}")]
    UnexpectedState(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl TradeError {
    /// Error text for an order step failure, whichever variant carried it
    pub(crate) fn reason(&self) -> String {
        match self {
            TradeError::OrderRejected { reason, .. } => reason.clone(),
            TradeError::ExchangeRejected { code, message } => format!("{} ({})", message, code),
            other => other.to_string(),
        }
    }
}

impl From<redis::RedisError> for TradeError {
    fn from(err: redis::RedisError) -> Self {
        TradeError::Store(err.to_string())
    }
}

impl From<reqwest::Error> for TradeError {
    fn from(err: reqwest::Error) -> Self {
        TradeError::Exchange(err.to_string())
    }
}
