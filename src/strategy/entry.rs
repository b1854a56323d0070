use super::Decision;
use crate::models::{Indicators, Side, Snapshot, TradeState};

/// Side favoured by the trend comparison pair, None when the two values are equal
pub fn bias(ind: &Indicators) -> Option<Side> {
    if ind.trend_long > ind.trend_short {
        Some(Side::Long)
    } else if ind.trend_long < ind.trend_short {
        Some(Side::Short)
    } else {
        None
    }
}

/// Close strictly on the favourable side of the baseline
fn baseline_confirms(side: Side, ind: &Indicators) -> bool {
    match side {
        Side::Long => ind.close > ind.baseline,
        Side::Short => ind.close < ind.baseline,
    }
}

fn volume_confirms(side: Side, ind: &Indicators) -> bool {
    match side {
        Side::Long => ind.volume_long > ind.volume_short,
        Side::Short => ind.volume_long < ind.volume_short,
    }
}

/// Close already one volatility unit or more past the baseline
fn overshoots(side: Side, ind: &Indicators) -> bool {
    match side {
        Side::Long => ind.close >= ind.baseline + ind.volatility,
        Side::Short => ind.close <= ind.baseline - ind.volatility,
    }
}

/// Prior candle closed on the opposite side of its baseline
fn prior_on_other_side(side: Side, prior: &Snapshot) -> bool {
    match (prior.candle_close, prior.baseline) {
        (Some(close), Some(baseline)) => match side {
            Side::Long => close < baseline,
            Side::Short => close > baseline,
        },
        _ => false,
    }
}

/// Strict sign change of `a - b` between the prior and current candle
fn crossed(prior: (Option<f64>, Option<f64>), current: (f64, f64)) -> bool {
    match prior {
        (Some(pa), Some(pb)) => {
            let (ca, cb) = current;
            (pa > pb && ca < cb) || (pa < pb && ca > cb)
        }
        _ => false,
    }
}

/// Regular entry evaluation for `FLAT_FRESH` and the `PENDING_ATR_*` states
pub fn entry_rules(state: TradeState, ind: &Indicators, prior: &Snapshot) -> Decision {
    let Some(side) = bias(ind) else {
        return Decision::hold(state);
    };

    if !baseline_confirms(side, ind) {
        tracing::debug!(?side, "Baseline check failed");
        return Decision::hold(state);
    }
    if !volume_confirms(side, ind) {
        tracing::debug!(?side, "Volume check failed");
        return Decision::hold(state);
    }

    if overshoots(side, ind) {
        tracing::debug!(?side, state = %state, "Close beyond volatility band");
        return match state {
            // First candle to overshoot: wait for a pullback
            TradeState::FlatFresh if prior_on_other_side(side, prior) => {
                Decision::hold(TradeState::pending_atr(side))
            }
            TradeState::FlatFresh => Decision::hold(state),
            s if s == TradeState::pending_atr(side) => {
                Decision::hold(TradeState::pending_atr_confirmed(side))
            }
            _ => Decision::hold(TradeState::FlatFresh),
        };
    }

    Decision::enter(side)
}

/// Re-entry after a clean full close that finished beyond the baseline
pub fn continuation_rules(ind: &Indicators) -> Decision {
    let state = TradeState::ContinuationPending;
    let Some(side) = bias(ind) else {
        return Decision::hold(state);
    };

    if !baseline_confirms(side, ind) {
        return Decision::hold(TradeState::FlatFresh);
    }
    if !volume_confirms(side, ind) {
        return Decision::hold(state);
    }
    if overshoots(side, ind) {
        // No pullback staging from continuation
        tracing::debug!(?side, "Continuation overshoot, back to fresh");
        return Decision::hold(TradeState::FlatFresh);
    }

    Decision::enter(side)
}

/// After a baseline loss, wait for a trend or volume reversal before trying again
pub fn lost_to_baseline_rules(ind: &Indicators, prior: &Snapshot) -> Decision {
    let trend_reversed = crossed(
        (prior.trend_long, prior.trend_short),
        (ind.trend_long, ind.trend_short),
    );
    let volume_reversed = crossed(
        (prior.volume_long, prior.volume_short),
        (ind.volume_long, ind.volume_short),
    );

    if !(trend_reversed || volume_reversed) {
        return Decision::hold(TradeState::LostToBaseline);
    }

    tracing::debug!(trend_reversed, volume_reversed, "Reversal after baseline loss");
    entry_rules(TradeState::FlatFresh, ind, prior)
}
