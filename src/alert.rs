//! Inbound indicator alerts.
//!
//! An alert is a flat JSON object: `PAIR` names the instrument, every other
//! key is a feed field in storage naming (`C1_LONG_VALUE`, `ATR_TIMESTAMP`, ...).

use serde_json::Value;

use crate::error::TradeError;
use crate::models::{Field, FieldDeltas, FieldValue, PartialUpdate};
use crate::Result;

const SYMBOL_KEY: &str = "PAIR";

/// Parse a raw alert body into a typed partial update
pub fn parse_alert(body: &str) -> Result<PartialUpdate> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TradeError::InvalidAlert(format!("Alert is not valid JSON: {}", e)))?;
    from_json(&value)
}

pub fn from_json(value: &Value) -> Result<PartialUpdate> {
    let object = value
        .as_object()
        .ok_or_else(|| TradeError::InvalidAlert("Alert must be a JSON object".to_string()))?;

    let symbol = object
        .get(SYMBOL_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| TradeError::InvalidAlert(format!("Alert has no {}", SYMBOL_KEY)))?;

    let mut deltas = FieldDeltas::new();
    for (key, raw) in object {
        if key == SYMBOL_KEY {
            continue;
        }
        let field: Field = key.parse()?;
        deltas.set(field, field_value(field, raw)?);
    }

    PartialUpdate::new(symbol, deltas)
}

fn field_value(field: Field, raw: &Value) -> Result<FieldValue> {
    match raw {
        Value::String(s) => field.parse_value(s),
        Value::Number(n) if field.is_text() => Ok(FieldValue::Text(n.to_string())),
        Value::Number(n) => n.as_f64().map(FieldValue::Number).ok_or_else(|| {
            TradeError::InvalidAlert(format!("{} is out of range: {}", field, n))
        }),
        other => Err(TradeError::InvalidAlert(format!(
            "{} has unsupported value {}",
            field, other
        ))),
    }
}
