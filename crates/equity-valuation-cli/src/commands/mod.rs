pub mod batch;
pub mod pe;
pub mod valuation;
