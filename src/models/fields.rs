use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::TradeError;

/// Every field stored in an instrument's snapshot record
///
/// Storage names match the alert payload keys, so one parser serves both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    // Trend comparison feed
    TrendLong,
    TrendShort,
    TrendTimestamp,
    // Baseline feed (carries the candle values)
    Baseline,
    CandleClose,
    CandleHigh,
    CandleLow,
    BaselineTimestamp,
    // Volatility feed
    Volatility,
    VolatilityTimestamp,
    // Volume confirmation feed
    VolumeLong,
    VolumeShort,
    VolumeTimestamp,
    // Trade bookkeeping
    TradeState,
    TradeEntry,
    TradeStopLoss,
    TradeTp1,
    TradeTp3x,
    OrderQty,
    LastProcessedMarker,
}

impl Field {
    pub const ALL: [Field; 20] = [
        Field::TrendLong,
        Field::TrendShort,
        Field::TrendTimestamp,
        Field::Baseline,
        Field::CandleClose,
        Field::CandleHigh,
        Field::CandleLow,
        Field::BaselineTimestamp,
        Field::Volatility,
        Field::VolatilityTimestamp,
        Field::VolumeLong,
        Field::VolumeShort,
        Field::VolumeTimestamp,
        Field::TradeState,
        Field::TradeEntry,
        Field::TradeStopLoss,
        Field::TradeTp1,
        Field::TradeTp3x,
        Field::OrderQty,
        Field::LastProcessedMarker,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::TrendLong => "C1_LONG_VALUE",
            Field::TrendShort => "C1_SHORT_VALUE",
            Field::TrendTimestamp => "C1_TIMESTAMP",
            Field::Baseline => "BASELINE_VALUE",
            Field::CandleClose => "CANDLE_CLOSE",
            Field::CandleHigh => "CANDLE_HIGH",
            Field::CandleLow => "CANDLE_LOW",
            Field::BaselineTimestamp => "BASELINE_TIMESTAMP",
            Field::Volatility => "ATR_VALUE",
            Field::VolatilityTimestamp => "ATR_TIMESTAMP",
            Field::VolumeLong => "VOL_LONG_VALUE",
            Field::VolumeShort => "VOL_SHORT_VALUE",
            Field::VolumeTimestamp => "VOL_TIMESTAMP",
            Field::TradeState => "TRADE_STATE",
            Field::TradeEntry => "TRADE_ENTRY",
            Field::TradeStopLoss => "TRADE_SL",
            Field::TradeTp1 => "TRADE_TP1",
            Field::TradeTp3x => "TRADE_TP3X",
            Field::OrderQty => "ORDER_QTY",
            Field::LastProcessedMarker => "LAST_SUCCESSFUL_EXECUTION",
        }
    }

    /// Fields an indicator alert is allowed to carry
    pub fn is_feed(self) -> bool {
        !matches!(
            self,
            Field::TradeState
                | Field::TradeEntry
                | Field::TradeStopLoss
                | Field::TradeTp1
                | Field::TradeTp3x
                | Field::OrderQty
                | Field::LastProcessedMarker
        )
    }

    /// Fields holding free text rather than numbers
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Field::TrendTimestamp
                | Field::BaselineTimestamp
                | Field::VolatilityTimestamp
                | Field::VolumeTimestamp
                | Field::TradeState
                | Field::LastProcessedMarker
        )
    }

    /// Parse a raw stored/alert string into the value kind this field holds
    pub fn parse_value(self, raw: &str) -> Result<FieldValue, TradeError> {
        if self.is_text() {
            return Ok(FieldValue::Text(raw.to_string()));
        }

        let value = raw.trim().parse::<f64>().map_err(|_| {
            TradeError::InvalidAlert(format!("{} is not numeric: {:?}", self.as_str(), raw))
        })?;
        // f64 parsing accepts "NaN" and "inf", which no comparison or level can use
        if !value.is_finite() {
            return Err(TradeError::InvalidAlert(format!(
                "{} is not finite: {:?}",
                self.as_str(),
                raw
            )));
        }
        Ok(FieldValue::Number(value))
    }
}

impl FromStr for Field {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| TradeError::InvalidAlert(format!("Unknown field: {}", s)))
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    /// String form written to the store
    pub fn to_store_string(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

/// Field-level changes to one snapshot record, last write wins per field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDeltas {
    values: BTreeMap<Field, FieldValue>,
}

impl FieldDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: Field, value: FieldValue) -> &mut Self {
        self.values.insert(field, value);
        self
    }

    pub fn with_number(mut self, field: Field, value: f64) -> Self {
        self.set(field, FieldValue::Number(value));
        self
    }

    pub fn with_text(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, FieldValue::Text(value.into()));
        self
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (storage name, value) pairs ready for a hash write
    pub fn to_store_pairs(&self) -> Vec<(&'static str, String)> {
        self.values
            .iter()
            .map(|(f, v)| (f.as_str(), v.to_store_string()))
            .collect()
    }
}
