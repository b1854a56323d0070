use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TradeError;

/// Position direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

/// Lifecycle state of the single trade an instrument may carry
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeState {
    #[default]
    FlatFresh,
    PendingAtrLong,
    PendingAtrLongConfirmed,
    PendingAtrShort,
    PendingAtrShortConfirmed,
    InLong,
    InShort,
    InLongTp1Hit,
    InShortTp1Hit,
    ContinuationPending,
    LostToBaseline,
}

impl TradeState {
    pub const ALL: [TradeState; 11] = [
        TradeState::FlatFresh,
        TradeState::PendingAtrLong,
        TradeState::PendingAtrLongConfirmed,
        TradeState::PendingAtrShort,
        TradeState::PendingAtrShortConfirmed,
        TradeState::InLong,
        TradeState::InShort,
        TradeState::InLongTp1Hit,
        TradeState::InShortTp1Hit,
        TradeState::ContinuationPending,
        TradeState::LostToBaseline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TradeState::FlatFresh => "FLAT_FRESH",
            TradeState::PendingAtrLong => "PENDING_ATR_LONG",
            TradeState::PendingAtrLongConfirmed => "PENDING_ATR_LONG_CONFIRMED",
            TradeState::PendingAtrShort => "PENDING_ATR_SHORT",
            TradeState::PendingAtrShortConfirmed => "PENDING_ATR_SHORT_CONFIRMED",
            TradeState::InLong => "IN_LONG",
            TradeState::InShort => "IN_SHORT",
            TradeState::InLongTp1Hit => "IN_LONG_TP1_HIT",
            TradeState::InShortTp1Hit => "IN_SHORT_TP1_HIT",
            TradeState::ContinuationPending => "CONTINUATION_PENDING",
            TradeState::LostToBaseline => "LOST_TO_BASELINE",
        }
    }

    /// States that carry an exchange position
    pub fn is_open(self) -> bool {
        matches!(
            self,
            TradeState::InLong
                | TradeState::InShort
                | TradeState::InLongTp1Hit
                | TradeState::InShortTp1Hit
        )
    }

    pub fn is_flat(self) -> bool {
        !self.is_open()
    }

    /// Side of the open position, None for the flat family
    pub fn position_side(self) -> Option<Side> {
        match self {
            TradeState::InLong | TradeState::InLongTp1Hit => Some(Side::Long),
            TradeState::InShort | TradeState::InShortTp1Hit => Some(Side::Short),
            _ => None,
        }
    }

    pub fn is_tp1_hit(self) -> bool {
        matches!(self, TradeState::InLongTp1Hit | TradeState::InShortTp1Hit)
    }

    pub fn opened(side: Side) -> TradeState {
        match side {
            Side::Long => TradeState::InLong,
            Side::Short => TradeState::InShort,
        }
    }

    pub fn tp1_hit(side: Side) -> TradeState {
        match side {
            Side::Long => TradeState::InLongTp1Hit,
            Side::Short => TradeState::InShortTp1Hit,
        }
    }

    pub fn pending_atr(side: Side) -> TradeState {
        match side {
            Side::Long => TradeState::PendingAtrLong,
            Side::Short => TradeState::PendingAtrShort,
        }
    }

    pub fn pending_atr_confirmed(side: Side) -> TradeState {
        match side {
            Side::Long => TradeState::PendingAtrLongConfirmed,
            Side::Short => TradeState::PendingAtrShortConfirmed,
        }
    }
}

impl FromStr for TradeState {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TradeState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| TradeError::UnexpectedState(format!("Unknown trade state: {}", s)))
    }
}

impl std::fmt::Display for TradeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
