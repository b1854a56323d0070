// Trade lifecycle state machine
pub mod entry;
pub mod machine;
pub mod position;

use serde::Serialize;

use crate::models::{Side, TradeState};

pub use machine::{decide, transition, ExchangePosition};
pub use position::classify_closed_position;

/// Exchange action requested by a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeAction {
    None,
    EnterLong,
    EnterShort,
    ExitPosition,
}

/// Outcome of the state machine for one candle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub next_state: TradeState,
    pub action: TradeAction,
}

impl Decision {
    /// Move to `next_state` without touching the exchange
    pub fn hold(next_state: TradeState) -> Self {
        Self {
            next_state,
            action: TradeAction::None,
        }
    }

    pub fn enter(side: Side) -> Self {
        let action = match side {
            Side::Long => TradeAction::EnterLong,
            Side::Short => TradeAction::EnterShort,
        };
        Self {
            next_state: TradeState::opened(side),
            action,
        }
    }

    /// Close the position and finish in `next_state`
    pub fn exit(next_state: TradeState) -> Self {
        Self {
            next_state,
            action: TradeAction::ExitPosition,
        }
    }
}
