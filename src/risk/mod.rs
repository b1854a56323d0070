// Risk management module
pub mod sizing;

pub use sizing::{base_asset, split_targets, PositionSizing, ProtectiveLevels, MIN_ORDER_QTY};
