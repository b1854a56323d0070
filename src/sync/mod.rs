// Synchronization barrier for the four per-candle feeds
pub mod barrier;

pub use barrier::{aligned_minute, candle_minute, evaluate_gate, BarrierOutcome, Gate, SyncBarrier};
