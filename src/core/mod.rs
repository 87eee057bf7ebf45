//! Core business logic abstractions

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod log;
pub mod model;
pub mod price;

// Re-export main types for cleaner imports
pub use error::{CacheError, LookupError, SourceError};
pub use model::{OpeningAverage, QueryResult, UsageLogEntry};
pub use price::{PriceCandle, PriceSource};
