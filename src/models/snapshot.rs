use serde::Serialize;
use std::collections::HashMap;

use super::fields::{Field, FieldDeltas, FieldValue};
use super::state::TradeState;
use crate::error::TradeError;
use crate::Result;

/// Latest known indicator values and trade bookkeeping for one instrument
///
/// Bookkeeping fields (`trade_*`, `order_qty`) are only meaningful while
/// `trade_state` is in the open family; in flat states they are stale leftovers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub symbol: String,

    pub trend_long: Option<f64>,
    pub trend_short: Option<f64>,
    pub trend_timestamp: Option<String>,

    pub baseline: Option<f64>,
    pub candle_close: Option<f64>,
    pub candle_high: Option<f64>,
    pub candle_low: Option<f64>,
    pub baseline_timestamp: Option<String>,

    pub volatility: Option<f64>,
    pub volatility_timestamp: Option<String>,

    pub volume_long: Option<f64>,
    pub volume_short: Option<f64>,
    pub volume_timestamp: Option<String>,

    pub trade_state: TradeState,
    pub trade_entry: Option<f64>,
    pub trade_stop_loss: Option<f64>,
    pub trade_tp1: Option<f64>,
    pub trade_tp3x: Option<f64>,
    pub order_qty: Option<u64>,
    pub last_processed_marker: Option<String>,
}

/// Complete feed values for one candle, as the state machine consumes them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Indicators {
    pub trend_long: f64,
    pub trend_short: f64,
    pub baseline: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volatility: f64,
    pub volume_long: f64,
    pub volume_short: f64,
}

impl Snapshot {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Rebuild a snapshot from a stored hash (storage name -> raw string)
    ///
    /// Unknown keys are skipped so older records with extra columns still load.
    pub fn from_store(symbol: &str, raw: &HashMap<String, String>) -> Result<Self> {
        let mut deltas = FieldDeltas::new();

        for (key, value) in raw {
            match key.parse::<Field>() {
                Ok(field) => {
                    let parsed = field
                        .parse_value(value)
                        .map_err(|e| TradeError::Store(format!("Corrupt record for {}: {}", symbol, e)))?;
                    deltas.set(field, parsed);
                }
                Err(_) => {
                    tracing::debug!(symbol = %symbol, key = %key, "Skipping unknown stored field");
                }
            }
        }

        let mut snapshot = Snapshot::new(symbol);
        snapshot.apply(&deltas)?;
        Ok(snapshot)
    }

    /// Merge field deltas in place (last write wins per field)
    pub fn apply(&mut self, deltas: &FieldDeltas) -> Result<()> {
        for (field, value) in deltas.iter() {
            self.set(field, value)?;
        }
        Ok(())
    }

    fn set(&mut self, field: Field, value: &FieldValue) -> Result<()> {
        match field {
            Field::TrendLong => self.trend_long = Some(number(field, value)?),
            Field::TrendShort => self.trend_short = Some(number(field, value)?),
            Field::TrendTimestamp => self.trend_timestamp = Some(value.to_store_string()),
            Field::Baseline => self.baseline = Some(number(field, value)?),
            Field::CandleClose => self.candle_close = Some(number(field, value)?),
            Field::CandleHigh => self.candle_high = Some(number(field, value)?),
            Field::CandleLow => self.candle_low = Some(number(field, value)?),
            Field::BaselineTimestamp => self.baseline_timestamp = Some(value.to_store_string()),
            Field::Volatility => self.volatility = Some(number(field, value)?),
            Field::VolatilityTimestamp => self.volatility_timestamp = Some(value.to_store_string()),
            Field::VolumeLong => self.volume_long = Some(number(field, value)?),
            Field::VolumeShort => self.volume_short = Some(number(field, value)?),
            Field::VolumeTimestamp => self.volume_timestamp = Some(value.to_store_string()),
            Field::TradeState => self.trade_state = value.to_store_string().parse()?,
            Field::TradeEntry => self.trade_entry = Some(number(field, value)?),
            Field::TradeStopLoss => self.trade_stop_loss = Some(number(field, value)?),
            Field::TradeTp1 => self.trade_tp1 = Some(number(field, value)?),
            Field::TradeTp3x => self.trade_tp3x = Some(number(field, value)?),
            Field::OrderQty => self.order_qty = Some(whole_units(field, value)?),
            Field::LastProcessedMarker => {
                self.last_processed_marker = Some(value.to_store_string())
            }
        }
        Ok(())
    }

    /// Timestamps of the four feeds: trend, baseline, volatility, volume
    pub fn feed_timestamps(&self) -> [Option<&str>; 4] {
        [
            self.trend_timestamp.as_deref(),
            self.baseline_timestamp.as_deref(),
            self.volatility_timestamp.as_deref(),
            self.volume_timestamp.as_deref(),
        ]
    }

    /// Complete indicator view, or UnexpectedState naming the first missing field
    pub fn indicators(&self) -> Result<Indicators> {
        let require = |value: Option<f64>, field: Field| {
            value.ok_or_else(|| {
                TradeError::UnexpectedState(format!("{} has no {} value", self.symbol, field))
            })
        };

        Ok(Indicators {
            trend_long: require(self.trend_long, Field::TrendLong)?,
            trend_short: require(self.trend_short, Field::TrendShort)?,
            baseline: require(self.baseline, Field::Baseline)?,
            close: require(self.candle_close, Field::CandleClose)?,
            high: require(self.candle_high, Field::CandleHigh)?,
            low: require(self.candle_low, Field::CandleLow)?,
            volatility: require(self.volatility, Field::Volatility)?,
            volume_long: require(self.volume_long, Field::VolumeLong)?,
            volume_short: require(self.volume_short, Field::VolumeShort)?,
        })
    }
}

fn number(field: Field, value: &FieldValue) -> Result<f64> {
    match value {
        FieldValue::Number(n) => Ok(*n),
        FieldValue::Text(raw) => field
            .parse_value(raw)?
            .as_number()
            .ok_or_else(|| TradeError::InvalidAlert(format!("{} expects a number", field))),
    }
}

fn whole_units(field: Field, value: &FieldValue) -> Result<u64> {
    let n = number(field, value)?;
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
        return Err(TradeError::InvalidAlert(format!(
            "{} must be a whole unit count, got {}",
            field, n
        )));
    }
    Ok(n as u64)
}

/// Trade facts produced by an order sequence, committed together with the new state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingTradeFacts {
    pub entry: Option<f64>,
    pub stop_loss: Option<f64>,
    pub tp1: Option<f64>,
    pub tp3x: Option<f64>,
    pub qty: Option<u64>,
}

impl PendingTradeFacts {
    pub fn write_into(&self, deltas: &mut FieldDeltas) {
        let numbers = [
            (Field::TradeEntry, self.entry),
            (Field::TradeStopLoss, self.stop_loss),
            (Field::TradeTp1, self.tp1),
            (Field::TradeTp3x, self.tp3x),
        ];
        for (field, value) in numbers {
            if let Some(v) = value {
                deltas.set(field, FieldValue::Number(v));
            }
        }
        if let Some(qty) = self.qty {
            deltas.set(Field::OrderQty, FieldValue::Number(qty as f64));
        }
    }
}
