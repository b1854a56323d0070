use super::Decision;
use crate::error::TradeError;
use crate::models::{Indicators, Side, Snapshot, TradeState};
use crate::Result;

fn require(value: Option<f64>, what: &str, state: TradeState) -> Result<f64> {
    value.ok_or_else(|| {
        TradeError::UnexpectedState(format!("{} has no recorded {}", state, what))
    })
}

fn side_of(state: TradeState) -> Result<Side> {
    state.position_side().ok_or_else(|| {
        TradeError::UnexpectedState(format!("{} does not carry a position", state))
    })
}

/// Exit/hold evaluation while the exchange still holds the position
pub fn in_trade_rules(state: TradeState, ind: &Indicators, current: &Snapshot) -> Result<Decision> {
    let side = side_of(state)?;
    let tp1 = require(current.trade_tp1, "first take-profit", state)?;

    let reached_tp1 = match side {
        Side::Long => ind.high >= tp1,
        Side::Short => ind.low <= tp1,
    };
    let lost_baseline = match side {
        Side::Long => ind.close < ind.baseline,
        Side::Short => ind.close > ind.baseline,
    };

    if lost_baseline {
        let next = if reached_tp1 {
            TradeState::FlatFresh
        } else {
            TradeState::LostToBaseline
        };
        tracing::debug!(state = %state, next = %next, "Baseline crossed against position");
        return Ok(Decision::exit(next));
    }

    if state.is_tp1_hit() {
        // Broker-side stop should have handled this already
        let entry = require(current.trade_entry, "entry price", state)?;
        let reverted = match side {
            Side::Long => ind.close < entry,
            Side::Short => ind.close > entry,
        };
        if reverted {
            tracing::warn!(state = %state, entry, close = ind.close, "Close reverted past entry after TP1");
            return Ok(Decision::exit(TradeState::FlatFresh));
        }
    } else if reached_tp1 {
        return Ok(Decision::hold(TradeState::tp1_hit(side)));
    }

    let trend_flipped = match side {
        Side::Long => ind.trend_short > ind.trend_long,
        Side::Short => ind.trend_long > ind.trend_short,
    };
    if trend_flipped {
        return Ok(Decision::exit(TradeState::FlatFresh));
    }

    Ok(Decision::hold(state))
}

/// Classify how a position the exchange no longer holds was closed
///
/// Reaching the wide target without the opposite extreme touching the stop is a
/// clean full close; anything else is treated as stopped out.
pub fn classify_closed_position(state: TradeState, ind: &Indicators, current: &Snapshot) -> Result<TradeState> {
    let side = side_of(state)?;
    let tp3x = require(current.trade_tp3x, "wide take-profit", state)?;
    let stop_loss = require(current.trade_stop_loss, "stop-loss", state)?;

    let clean_close = match side {
        Side::Long => ind.high >= tp3x && ind.low > stop_loss,
        Side::Short => ind.low <= tp3x && ind.high < stop_loss,
    };
    if !clean_close {
        return Ok(TradeState::LostToBaseline);
    }

    let beyond_baseline = match side {
        Side::Long => ind.close > ind.baseline,
        Side::Short => ind.close < ind.baseline,
    };
    Ok(if beyond_baseline {
        TradeState::ContinuationPending
    } else {
        TradeState::FlatFresh
    })
}
