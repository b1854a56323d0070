// Core modules
pub mod alert;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod execution;
pub mod models;
pub mod persistence;
pub mod risk;
pub mod strategy;
pub mod sync;

// Re-export commonly used types
pub use error::{OrderStep, TradeError};
pub use execution::{CycleReport, DecisionCycle};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, TradeError>;
