use serde::{Deserialize, Serialize};

use crate::error::TradeError;
use crate::models::Side;
use crate::Result;

/// Smallest quantity that still gives each of the two targets a whole unit
pub const MIN_ORDER_QTY: u64 = 2;

/// Position sizing and protective-level multiples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSizing {
    pub qty_fraction: f64,
    pub stop_loss_atr: f64,
    pub tp1_atr: f64,
    pub tp2_atr: f64,
}

impl Default for PositionSizing {
    fn default() -> Self {
        Self {
            qty_fraction: 0.1,  // 10% of balance per trade
            stop_loss_atr: 1.5, // SL 1.5x ATR from entry
            tp1_atr: 1.0,       // first half off at 1x ATR
            tp2_atr: 3.0,       // second half at 3x ATR
        }
    }
}

/// Stop-loss and both take-profit prices for an entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectiveLevels {
    pub stop_loss: f64,
    pub tp1: f64,
    pub tp3x: f64,
}

/// Base asset of a symbol (`BTCUSD` -> `BTC`)
pub fn base_asset(symbol: &str) -> &str {
    symbol.get(..3).unwrap_or(symbol)
}

impl PositionSizing {
    /// Whole-unit order quantity from a wallet balance held in the base asset
    ///
    /// The balance is valued at `price` and `qty_fraction` of that value is used.
    pub fn size(&self, asset: &str, wallet_balance: f64, price: f64) -> Result<u64> {
        let value = wallet_balance * price;
        let raw = (value * self.qty_fraction).floor();
        let qty = if raw.is_finite() && raw > 0.0 { raw as u64 } else { 0 };

        if qty < MIN_ORDER_QTY {
            tracing::error!(
                asset = %asset,
                wallet_balance,
                price,
                qty,
                "Could not size order from balance"
            );
            return Err(TradeError::ZeroBalance {
                asset: asset.to_string(),
                qty,
            });
        }

        Ok(qty)
    }

    pub fn levels(&self, side: Side, entry: f64, atr: f64) -> ProtectiveLevels {
        let direction = match side {
            Side::Long => 1.0,
            Side::Short => -1.0,
        };
        ProtectiveLevels {
            stop_loss: entry - direction * atr * self.stop_loss_atr,
            tp1: entry + direction * atr * self.tp1_atr,
            tp3x: entry + direction * atr * self.tp2_atr,
        }
    }
}

/// Split a position across the two targets; the odd unit goes to the second
pub fn split_targets(qty: u64) -> (u64, u64) {
    let first = qty / 2;
    (first, qty - first)
}
