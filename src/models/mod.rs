// Snapshot data model: fields, trade state, partial updates
pub mod fields;
pub mod snapshot;
pub mod state;
pub mod update;

pub use fields::{Field, FieldDeltas, FieldValue};
pub use snapshot::{Indicators, PendingTradeFacts, Snapshot};
pub use state::{Side, TradeState};
pub use update::PartialUpdate;
