use serde::{Deserialize, Serialize};

use crate::error::ValuationError;
use crate::types::{Currency, Money};
use crate::EngineResult;

/// One fiscal period of reported financials. Every figure is optional;
/// an engine only demands the fields its computation path needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub fiscal_year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebitda: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebit: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_income: Option<Money>,
    /// Capital expenditure, as a positive outflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capex: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depreciation_amortization: Option<Money>,
    /// Increase in net working capital (positive = cash absorbed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_in_nwc: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_debt: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<Money>,
}

/// Per-ticker financial statements, oldest period first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub ticker: String,
    #[serde(default)]
    pub currency: Currency,
    pub periods: Vec<StatementPeriod>,
}

impl FinancialStatement {
    /// Check that periods exist and run oldest→newest in consecutive
    /// fiscal years.
    pub fn validate(&self) -> EngineResult<()> {
        if self.periods.is_empty() {
            return Err(ValuationError::invalid_input(
                "periods",
                format!("{}: statement has no periods", self.ticker),
            ));
        }
        for pair in self.periods.windows(2) {
            let (prev, next) = (pair[0].fiscal_year, pair[1].fiscal_year);
            if next <= prev {
                return Err(ValuationError::invalid_input(
                    "periods",
                    format!(
                        "{}: periods must be ordered oldest to newest ({prev} followed by {next})",
                        self.ticker
                    ),
                ));
            }
            if prev.checked_add(1) != Some(next) {
                return Err(ValuationError::invalid_input(
                    "periods",
                    format!(
                        "{}: gap between fiscal years {prev} and {next}",
                        self.ticker
                    ),
                ));
            }
        }
        Ok(())
    }

    /// The newest period, used as the projection base year.
    pub fn base_period(&self) -> EngineResult<&StatementPeriod> {
        self.periods
            .last()
            .ok_or_else(|| ValuationError::missing("periods", "a base-year period"))
    }
}

impl StatementPeriod {
    /// Fetch an optional field, raising `MissingData` naming the field and
    /// the computation that needed it.
    pub fn require(
        &self,
        value: Option<Money>,
        field: &str,
        context: &str,
    ) -> EngineResult<Money> {
        value.ok_or_else(|| {
            ValuationError::missing(field, &format!("{context} (fiscal year {})", self.fiscal_year))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn period(year: i32) -> StatementPeriod {
        StatementPeriod {
            fiscal_year: year,
            revenue: Some(dec!(1000)),
            ..Default::default()
        }
    }

    fn statement(years: &[i32]) -> FinancialStatement {
        FinancialStatement {
            ticker: "ACME".into(),
            currency: Currency::USD,
            periods: years.iter().map(|y| period(*y)).collect(),
        }
    }

    #[test]
    fn test_consecutive_periods_valid() {
        assert!(statement(&[2021, 2022, 2023]).validate().is_ok());
    }

    #[test]
    fn test_single_period_valid() {
        assert!(statement(&[2023]).validate().is_ok());
    }

    #[test]
    fn test_empty_statement_rejected() {
        assert!(matches!(
            statement(&[]).validate(),
            Err(ValuationError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_unordered_periods_rejected() {
        let err = statement(&[2023, 2022]).validate().unwrap_err();
        assert!(err.to_string().contains("oldest to newest"));
    }

    #[test]
    fn test_gap_rejected() {
        let err = statement(&[2020, 2022]).validate().unwrap_err();
        assert!(err.to_string().contains("gap"));
    }

    #[test]
    fn test_periods_at_end_of_year_range() {
        assert!(statement(&[i32::MAX - 1, i32::MAX]).validate().is_ok());
        let err = statement(&[i32::MAX, i32::MAX]).validate().unwrap_err();
        assert!(err.to_string().contains("oldest to newest"));
    }

    #[test]
    fn test_base_period_is_newest() {
        let s = statement(&[2021, 2022, 2023]);
        assert_eq!(s.base_period().unwrap().fiscal_year, 2023);
    }

    #[test]
    fn test_require_missing_field() {
        let p = period(2023);
        match p.require(p.cash, "cash", "equity bridge") {
            Err(ValuationError::MissingData { field, context }) => {
                assert_eq!(field, "cash");
                assert!(context.contains("2023"));
            }
            other => panic!("Expected MissingData, got {other:?}"),
        }
    }
}
