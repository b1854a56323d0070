use super::fields::{Field, FieldDeltas};
use crate::error::TradeError;
use crate::Result;

/// Feed values delivered by one indicator alert for one instrument
///
/// Only feed fields are accepted; trade bookkeeping is never written from an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialUpdate {
    symbol: String,
    deltas: FieldDeltas,
}

const TIMESTAMP_FIELDS: [Field; 4] = [
    Field::TrendTimestamp,
    Field::BaselineTimestamp,
    Field::VolatilityTimestamp,
    Field::VolumeTimestamp,
];

impl PartialUpdate {
    pub fn new(symbol: impl Into<String>, deltas: FieldDeltas) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(TradeError::InvalidAlert("Missing instrument symbol".to_string()));
        }

        if let Some(field) = deltas.fields().find(|f| !f.is_feed()) {
            return Err(TradeError::InvalidAlert(format!(
                "{} cannot be set by an alert",
                field
            )));
        }

        if !TIMESTAMP_FIELDS.iter().any(|f| deltas.contains(*f)) {
            return Err(TradeError::InvalidAlert(format!(
                "Alert for {} carries no feed timestamp",
                symbol
            )));
        }

        Ok(Self { symbol, deltas })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn deltas(&self) -> &FieldDeltas {
        &self.deltas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_single_feed() {
        let deltas = FieldDeltas::new()
            .with_number(Field::Volatility, 3.0)
            .with_text(Field::VolatilityTimestamp, "2021-06-01T12:12:00Z");

        let update = PartialUpdate::new("BTCUSD", deltas).unwrap();
        assert_eq!(update.symbol(), "BTCUSD");
        assert_eq!(update.deltas().len(), 2);
    }

    #[test]
    fn test_rejects_trade_state() {
        let deltas = FieldDeltas::new()
            .with_text(Field::VolatilityTimestamp, "2021-06-01T12:12:00Z")
            .with_text(Field::TradeState, "IN_LONG");

        let err = PartialUpdate::new("BTCUSD", deltas).unwrap_err();
        assert!(err.to_string().contains("TRADE_STATE"));
    }

    #[test]
    fn test_rejects_missing_symbol_or_timestamp() {
        let with_ts = FieldDeltas::new().with_text(Field::TrendTimestamp, "x");
        assert!(PartialUpdate::new("  ", with_ts).is_err());

        let no_ts = FieldDeltas::new().with_number(Field::TrendLong, 1.0);
        assert!(PartialUpdate::new("BTCUSD", no_ts).is_err());
    }
}
