pub mod error;
pub mod result;
pub mod statement;
pub mod store;
pub mod time_value;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "pe")]
pub mod pe;

#[cfg(all(feature = "valuation", feature = "pe"))]
pub mod engine;

pub use error::ValuationError;
pub use result::{ValuationDetail, ValuationMethod, ValuationResult};
pub use statement::{FinancialStatement, StatementPeriod};
pub use types::*;

/// Standard result type for all valuation operations
pub type EngineResult<T> = Result<T, ValuationError>;
