// Exchange access
pub mod bybit;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::ApiCredentials;
use crate::models::Side;
use crate::Result;

pub use bybit::{BybitClient, BybitConnector};

/// Exchange acknowledgement for a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub order_link_id: String,
}

/// Open position on one instrument as the exchange reports it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionInfo {
    /// Contracts held, 0 when flat
    pub size: u64,
    pub side: Option<Side>,
}

impl PositionInfo {
    pub fn flat() -> Self {
        Self {
            size: 0,
            side: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.size > 0
    }
}

/// Authenticated exchange session
///
/// Calls are independent requests; the coordinator awaits them one at a time.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Market order, optionally with a stop-loss attached
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        qty: u64,
        stop_loss: Option<f64>,
    ) -> Result<OrderAck>;

    /// Take-profit for `qty` of the open position at `price`
    async fn place_take_profit(&self, symbol: &str, price: f64, qty: u64) -> Result<()>;

    async fn get_position(&self, symbol: &str) -> Result<PositionInfo>;

    /// Wallet balance denominated in `asset`
    async fn get_balance(&self, asset: &str) -> Result<f64>;
}

/// Opens an exchange session for a set of credentials
pub trait ExchangeConnector: Send + Sync {
    fn connect(&self, credentials: ApiCredentials) -> Result<Arc<dyn Exchange>>;
}
