use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ValuationError;
use crate::result::{DcfDetail, DcfYear, ValuationDetail, ValuationResult};
use crate::statement::{FinancialStatement, StatementPeriod};
use crate::time_value::discount_factor;
use crate::types::{push_warning, with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::EngineResult;

use super::wacc::{compute_wacc, WaccInputs};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Revenue (or EBITDA) growth over the explicit forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthSchedule {
    /// One rate applied to every projected year
    Uniform(Rate),
    /// Exactly one rate per projected year
    PerYear(Vec<Rate>),
}

/// Operating margin used to get from projected revenue to EBIT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginAssumption {
    /// EBITDA = revenue * margin; EBIT = EBITDA - D&A
    EbitdaMargin(Rate),
    /// EBIT = revenue * margin; EBITDA = EBIT + D&A
    EbitMargin(Rate),
    /// Base-year EBIT / revenue held constant
    HistoricalEbitMargin,
}

/// Which base-year line the growth schedule compounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionDriver {
    Revenue { margin: MarginAssumption },
    /// Grow base-year EBITDA directly; EBIT = EBITDA - D&A
    Ebitda,
}

/// Projection rule for D&A, CapEx or the change in NWC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemPolicy {
    /// Base-year value in every projected year
    HeldFlat,
    /// Base-year value times the cumulative growth index
    ScaleWithGrowth,
    /// Fraction of projected revenue
    PercentOfRevenue(Rate),
    /// A separately assumed amount for every year
    Fixed(Money),
}

/// Documented fallback for a line item nobody configured. A held-flat line
/// still needs its base-year figure; there is no implicit zero.
pub const DEFAULT_LINE_ITEM_POLICY: LineItemPolicy = LineItemPolicy::HeldFlat;

fn default_line_item_policy() -> LineItemPolicy {
    DEFAULT_LINE_ITEM_POLICY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinvestmentPolicy {
    #[serde(default = "default_line_item_policy")]
    pub depreciation_amortization: LineItemPolicy,
    #[serde(default = "default_line_item_policy")]
    pub capex: LineItemPolicy,
    #[serde(default = "default_line_item_policy")]
    pub change_in_nwc: LineItemPolicy,
}

impl Default for ReinvestmentPolicy {
    fn default() -> Self {
        Self {
            depreciation_amortization: DEFAULT_LINE_ITEM_POLICY,
            capex: DEFAULT_LINE_ITEM_POLICY,
            change_in_nwc: DEFAULT_LINE_ITEM_POLICY,
        }
    }
}

/// Where the discount rate comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountRateSource {
    Wacc(WaccInputs),
    Override(Rate),
}

fn default_true() -> bool {
    true
}

/// Assumptions for a single-stage FCFF DCF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfAssumptions {
    /// Number of explicit forecast years (>= 1)
    pub horizon_years: u32,
    pub revenue_growth: GrowthSchedule,
    pub driver: ProjectionDriver,
    /// Tax rate on EBIT, in [0, 1)
    pub tax_rate: Rate,
    #[serde(default)]
    pub reinvestment: ReinvestmentPolicy,
    /// Perpetuity growth after the horizon; must be below the discount rate
    pub terminal_growth_rate: Rate,
    pub discount_rate: DiscountRateSource,
    /// Discount each year's FCF at t - 0.5 instead of t
    #[serde(default)]
    pub mid_year_convention: bool,
    /// Exit EV/EBITDA multiple reported beside the Gordon terminal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_exit_multiple: Option<Multiple>,
    /// Require shares outstanding and report a per-share value
    #[serde(default = "default_true")]
    pub per_share_output: bool,
}

/// Base-year figures the projection starts from.
struct BaseYear<'a> {
    period: &'a StatementPeriod,
    revenue: Option<Money>,
    ebitda: Option<Money>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value a company by discounting projected unlevered free cash flow and a
/// Gordon-growth terminal value.
pub fn run_dcf(
    statement: &FinancialStatement,
    assumptions: &DcfAssumptions,
) -> EngineResult<ComputationOutput<ValuationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    statement.validate()?;

    // --- Resolve discount rate ---
    let discount_rate = resolve_discount_rate(assumptions, &mut warnings)?;

    // --- Validate ---
    validate_assumptions(assumptions, discount_rate)?;

    let period = statement.base_period()?;
    let base = BaseYear {
        period,
        revenue: period.revenue,
        ebitda: period.ebitda,
    };

    // --- Project cash flows ---
    let projections = build_projections(&base, assumptions, discount_rate)?;

    let pv_of_fcf = projections
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.pv_fcf))
        .ok_or_else(|| ValuationError::overflow("Sum of discounted free cash flows"))?;
    let last = projections.last().ok_or_else(|| {
        ValuationError::missing("projections", "terminal value (no projected years)")
    })?;

    // --- Terminal value (Gordon growth) ---
    let g = assumptions.terminal_growth_rate;
    // A spread of a few basis points is legal but can push the value out of range.
    let terminal_value = last
        .fcf
        .checked_mul(Decimal::ONE + g)
        .and_then(|next_fcf| next_fcf.checked_div(discount_rate - g))
        .ok_or_else(|| {
            ValuationError::overflow(&format!(
                "Terminal value with growth {g} against discount rate {discount_rate}"
            ))
        })?;
    let tv_factor = discount_factor(discount_rate, Decimal::from(assumptions.horizon_years))?;
    let pv_of_terminal = terminal_value
        .checked_mul(tv_factor)
        .ok_or_else(|| ValuationError::overflow("Present value of terminal value"))?;

    let terminal_value_exit_multiple =
        cross_check_exit_multiple(assumptions, last, terminal_value, &mut warnings)?;

    // --- Enterprise value ---
    let enterprise_value = pv_of_fcf
        .checked_add(pv_of_terminal)
        .ok_or_else(|| ValuationError::overflow("Enterprise value"))?;

    let terminal_value_pct = if enterprise_value.is_zero() {
        Decimal::ZERO
    } else {
        pv_of_terminal
            .checked_div(enterprise_value)
            .ok_or_else(|| ValuationError::overflow("Terminal value share of enterprise value"))?
    };
    if terminal_value_pct > dec!(0.75) {
        push_warning(
            &mut warnings,
            format!(
                "Terminal value represents {:.1}% of enterprise value; consider extending the explicit forecast period",
                terminal_value_pct.saturating_mul(dec!(100))
            ),
        );
    }

    let implied_exit_multiple = if last.ebitda.is_zero() {
        Decimal::ZERO
    } else {
        terminal_value
            .checked_div(last.ebitda)
            .ok_or_else(|| ValuationError::overflow("Implied exit multiple"))?
    };

    // --- Equity bridge ---
    let total_debt = period.require(period.total_debt, "total_debt", "DCF equity bridge")?;
    let cash = period.require(period.cash, "cash", "DCF equity bridge")?;
    let equity_value = enterprise_value
        .checked_sub(total_debt)
        .and_then(|v| v.checked_add(cash))
        .ok_or_else(|| ValuationError::overflow("Equity value"))?;
    let value_per_share = per_share_value(period, equity_value, assumptions.per_share_output)?;

    tracing::debug!(
        ticker = %statement.ticker,
        %discount_rate,
        %enterprise_value,
        %equity_value,
        "DCF valuation complete"
    );

    let detail = DcfDetail {
        base_fiscal_year: period.fiscal_year,
        projections,
        discount_rate,
        terminal_growth_rate: g,
        terminal_value,
        pv_of_fcf,
        pv_of_terminal,
        terminal_value_pct,
        implied_exit_multiple,
        terminal_value_exit_multiple,
        total_debt,
        cash,
        shares_outstanding: period.shares_outstanding,
    };

    let result = ValuationResult {
        ticker: Some(statement.ticker.clone()),
        currency: statement.currency.clone(),
        enterprise_value,
        equity_value: Some(equity_value),
        value_per_share,
        detail: ValuationDetail::Dcf(detail),
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Single-stage FCFF DCF with Gordon growth terminal value",
        assumptions,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn resolve_discount_rate(
    assumptions: &DcfAssumptions,
    warnings: &mut Vec<String>,
) -> EngineResult<Rate> {
    match &assumptions.discount_rate {
        DiscountRateSource::Wacc(inputs) => {
            let wacc_out = compute_wacc(inputs)?;
            for w in &wacc_out.warnings {
                warnings.push(format!("[WACC] {w}"));
            }
            Ok(wacc_out.result.wacc)
        }
        DiscountRateSource::Override(rate) => Ok(*rate),
    }
}

fn validate_assumptions(assumptions: &DcfAssumptions, discount_rate: Rate) -> EngineResult<()> {
    if assumptions.horizon_years < 1 {
        return Err(ValuationError::invalid_input(
            "horizon_years",
            "Projection horizon must be at least 1 year",
        ));
    }
    if discount_rate <= Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "discount_rate",
            "Discount rate must be positive",
        ));
    }
    if assumptions.tax_rate < Decimal::ZERO || assumptions.tax_rate >= Decimal::ONE {
        return Err(ValuationError::invalid_input(
            "tax_rate",
            "Tax rate must be in [0, 1)",
        ));
    }

    // Gordon growth is undefined once g reaches r
    if assumptions.terminal_growth_rate >= discount_rate {
        return Err(ValuationError::InvalidAssumption(format!(
            "Terminal growth rate ({}) must be less than the discount rate ({discount_rate})",
            assumptions.terminal_growth_rate
        )));
    }

    if let GrowthSchedule::PerYear(rates) = &assumptions.revenue_growth {
        if rates.len() != assumptions.horizon_years as usize {
            return Err(ValuationError::InvalidAssumption(format!(
                "{} growth rates supplied for a {}-year horizon",
                rates.len(),
                assumptions.horizon_years
            )));
        }
    }
    let growth_rates = match &assumptions.revenue_growth {
        GrowthSchedule::Uniform(r) => std::slice::from_ref(r),
        GrowthSchedule::PerYear(rates) => rates.as_slice(),
    };
    if growth_rates.iter().any(|r| *r <= dec!(-1)) {
        return Err(ValuationError::invalid_input(
            "revenue_growth",
            "Growth rates must be greater than -100%",
        ));
    }

    if let ProjectionDriver::Revenue {
        margin: MarginAssumption::EbitdaMargin(m) | MarginAssumption::EbitMargin(m),
    } = &assumptions.driver
    {
        if *m <= dec!(-1) || *m >= Decimal::ONE {
            return Err(ValuationError::invalid_input(
                "margin",
                "Operating margin must be below 100%",
            ));
        }
    }

    if let Some(multiple) = assumptions.terminal_exit_multiple {
        if multiple <= Decimal::ZERO {
            return Err(ValuationError::invalid_input(
                "terminal_exit_multiple",
                "Exit multiple must be positive",
            ));
        }
    }

    Ok(())
}

fn growth_rate_for_year(schedule: &GrowthSchedule, year_idx: usize) -> Rate {
    match schedule {
        GrowthSchedule::Uniform(r) => *r,
        GrowthSchedule::PerYear(rates) => rates[year_idx],
    }
}

fn build_projections(
    base: &BaseYear<'_>,
    assumptions: &DcfAssumptions,
    discount_rate: Rate,
) -> EngineResult<Vec<DcfYear>> {
    let n_years = assumptions.horizon_years;
    let policy = &assumptions.reinvestment;

    // Historical margin is fixed from the base year up front.
    let historical_margin = match &assumptions.driver {
        ProjectionDriver::Revenue {
            margin: MarginAssumption::HistoricalEbitMargin,
        } => {
            let revenue = base.period.require(base.revenue, "revenue", "historical EBIT margin")?;
            let ebit = base.period.require(base.period.ebit, "ebit", "historical EBIT margin")?;
            if revenue <= Decimal::ZERO {
                return Err(ValuationError::invalid_input(
                    "revenue",
                    "Base-year revenue must be positive to derive a margin",
                ));
            }
            Some(
                ebit.checked_div(revenue)
                    .ok_or_else(|| ValuationError::overflow("Historical EBIT margin"))?,
            )
        }
        _ => None,
    };

    let mut projections = Vec::with_capacity(n_years as usize);
    let mut growth_index = Decimal::ONE;

    for year_idx in 0..n_years {
        let year_num = year_idx + 1;
        let growth = growth_rate_for_year(&assumptions.revenue_growth, year_idx as usize);
        growth_index = growth_index
            .checked_mul(Decimal::ONE + growth)
            .ok_or_else(|| year_overflow(year_num, "cumulative growth"))?;

        let revenue = match (&assumptions.driver, base.revenue) {
            (_, Some(rev)) => Some(
                rev.checked_mul(growth_index)
                    .ok_or_else(|| year_overflow(year_num, "revenue"))?,
            ),
            (ProjectionDriver::Revenue { .. }, None) => {
                return Err(base_missing(base, "revenue", "revenue-driven projection"));
            }
            (ProjectionDriver::Ebitda, None) => None,
        };

        let da = project_line(
            &policy.depreciation_amortization,
            base.period.depreciation_amortization,
            "depreciation_amortization",
            base,
            growth_index,
            revenue,
        )?;
        let capex = project_line(
            &policy.capex,
            base.period.capex,
            "capex",
            base,
            growth_index,
            revenue,
        )?;
        let nwc_change = project_line(
            &policy.change_in_nwc,
            base.period.change_in_nwc,
            "change_in_nwc",
            base,
            growth_index,
            revenue,
        )?;

        let (ebitda, ebit) = match &assumptions.driver {
            ProjectionDriver::Ebitda => {
                let base_ebitda = base.period.require(base.ebitda, "ebitda", "EBITDA-driven projection")?;
                let ebitda = base_ebitda.checked_mul(growth_index);
                (ebitda, ebitda.and_then(|e| e.checked_sub(da)))
            }
            ProjectionDriver::Revenue { margin } => {
                // revenue is present on this branch
                let rev = revenue.unwrap_or(Decimal::ZERO);
                match margin {
                    MarginAssumption::EbitdaMargin(m) => {
                        let ebitda = rev.checked_mul(*m);
                        (ebitda, ebitda.and_then(|e| e.checked_sub(da)))
                    }
                    MarginAssumption::EbitMargin(m) => {
                        let ebit = rev.checked_mul(*m);
                        (ebit.and_then(|e| e.checked_add(da)), ebit)
                    }
                    MarginAssumption::HistoricalEbitMargin => {
                        let ebit = rev.checked_mul(historical_margin.unwrap_or(Decimal::ZERO));
                        (ebit.and_then(|e| e.checked_add(da)), ebit)
                    }
                }
            }
        };
        let ebitda = ebitda.ok_or_else(|| year_overflow(year_num, "EBITDA"))?;
        let ebit = ebit.ok_or_else(|| year_overflow(year_num, "EBIT"))?;

        // FCF = EBIT * (1 - t) + D&A - CapEx - Delta NWC
        let nopat = ebit * (Decimal::ONE - assumptions.tax_rate);
        let fcf = nopat
            .checked_add(da)
            .and_then(|v| v.checked_sub(capex))
            .and_then(|v| v.checked_sub(nwc_change))
            .ok_or_else(|| year_overflow(year_num, "free cash flow"))?;

        let discount_period = if assumptions.mid_year_convention {
            Decimal::from(year_num) - dec!(0.5)
        } else {
            Decimal::from(year_num)
        };
        let factor = discount_factor(discount_rate, discount_period)?;
        let pv_fcf = fcf * factor;

        projections.push(DcfYear {
            year: year_num,
            revenue: revenue.unwrap_or(Decimal::ZERO),
            ebitda,
            ebit,
            nopat,
            plus_da: da,
            less_capex: capex,
            less_nwc_change: nwc_change,
            fcf,
            discount_factor: factor,
            pv_fcf,
        });
    }

    Ok(projections)
}

fn project_line(
    policy: &LineItemPolicy,
    base_value: Option<Money>,
    field: &str,
    base: &BaseYear<'_>,
    growth_index: Decimal,
    revenue: Option<Money>,
) -> EngineResult<Money> {
    match policy {
        LineItemPolicy::HeldFlat => base_value.ok_or_else(|| base_missing(base, field, "held-flat projection")),
        LineItemPolicy::ScaleWithGrowth => base_value
            .ok_or_else(|| base_missing(base, field, "growth-scaled projection"))?
            .checked_mul(growth_index)
            .ok_or_else(|| ValuationError::overflow(&format!("Projected {field}"))),
        LineItemPolicy::PercentOfRevenue(pct) => revenue
            .ok_or_else(|| base_missing(base, "revenue", &format!("{field} as a percentage of revenue")))?
            .checked_mul(*pct)
            .ok_or_else(|| ValuationError::overflow(&format!("Projected {field}"))),
        LineItemPolicy::Fixed(amount) => Ok(*amount),
    }
}

fn year_overflow(year: u32, line: &str) -> ValuationError {
    ValuationError::overflow(&format!("Projected {line} in year {year}"))
}

fn base_missing(base: &BaseYear<'_>, field: &str, context: &str) -> ValuationError {
    ValuationError::missing(
        field,
        &format!("{context} (fiscal year {})", base.period.fiscal_year),
    )
}

fn cross_check_exit_multiple(
    assumptions: &DcfAssumptions,
    last_year: &DcfYear,
    gordon_tv: Money,
    warnings: &mut Vec<String>,
) -> EngineResult<Option<Money>> {
    let Some(multiple) = assumptions.terminal_exit_multiple else {
        return Ok(None);
    };
    let exit_tv = last_year
        .ebitda
        .checked_mul(multiple)
        .ok_or_else(|| ValuationError::overflow("Exit multiple terminal value"))?;
    if gordon_tv > Decimal::ZERO && exit_tv > Decimal::ZERO {
        let diff_pct = (gordon_tv - exit_tv)
            .abs()
            .checked_div(gordon_tv)
            .unwrap_or(Decimal::MAX);
        if diff_pct > dec!(0.25) {
            push_warning(
                warnings,
                format!(
                    "Gordon TV ({gordon_tv:.2}) and exit multiple TV ({exit_tv:.2}) differ by {:.1}%; review assumptions",
                    diff_pct.saturating_mul(dec!(100))
                ),
            );
        }
    }
    Ok(Some(exit_tv))
}

/// Per-share value from the base period's share count.
pub(crate) fn per_share_value(
    period: &StatementPeriod,
    equity_value: Money,
    required: bool,
) -> EngineResult<Option<Money>> {
    if !required {
        return Ok(None);
    }
    let shares = period.require(period.shares_outstanding, "shares_outstanding", "per-share value")?;
    divide_by_shares(equity_value, shares).map(Some)
}

/// equity / shares, treating a zero share count as missing data.
pub(crate) fn divide_by_shares(equity_value: Money, shares: Money) -> EngineResult<Money> {
    if shares < Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "shares_outstanding",
            "Shares outstanding cannot be negative",
        ));
    }
    if shares.is_zero() {
        return Err(ValuationError::missing(
            "shares_outstanding",
            "per-share value (share count is zero)",
        ));
    }
    equity_value
        .checked_div(shares)
        .ok_or_else(|| ValuationError::overflow("Value per share"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;
    use rust_decimal_macros::dec;

    fn sample_statement() -> FinancialStatement {
        FinancialStatement {
            ticker: "ACME".into(),
            currency: Currency::USD,
            periods: vec![
                StatementPeriod {
                    fiscal_year: 2022,
                    revenue: Some(dec!(900)),
                    ..Default::default()
                },
                StatementPeriod {
                    fiscal_year: 2023,
                    revenue: Some(dec!(1000)),
                    ebitda: Some(dec!(250)),
                    ebit: Some(dec!(220)),
                    net_income: Some(dec!(150)),
                    capex: Some(dec!(50)),
                    depreciation_amortization: Some(dec!(30)),
                    change_in_nwc: Some(dec!(10)),
                    total_debt: Some(dec!(300)),
                    cash: Some(dec!(100)),
                    shares_outstanding: Some(dec!(100)),
                },
            ],
        }
    }

    fn sample_assumptions() -> DcfAssumptions {
        DcfAssumptions {
            horizon_years: 5,
            revenue_growth: GrowthSchedule::Uniform(dec!(0.10)),
            driver: ProjectionDriver::Revenue {
                margin: MarginAssumption::EbitdaMargin(dec!(0.25)),
            },
            tax_rate: dec!(0.25),
            reinvestment: ReinvestmentPolicy {
                depreciation_amortization: LineItemPolicy::PercentOfRevenue(dec!(0.03)),
                capex: LineItemPolicy::PercentOfRevenue(dec!(0.05)),
                change_in_nwc: LineItemPolicy::Fixed(dec!(10)),
            },
            terminal_growth_rate: dec!(0.025),
            discount_rate: DiscountRateSource::Override(dec!(0.10)),
            mid_year_convention: false,
            terminal_exit_multiple: None,
            per_share_output: true,
        }
    }

    fn detail(out: &ValuationResult) -> &DcfDetail {
        match &out.detail {
            ValuationDetail::Dcf(d) => d,
            other => panic!("Expected DCF detail, got {other:?}"),
        }
    }

    #[test]
    fn test_dcf_year1_fcf() {
        let result = run_dcf(&sample_statement(), &sample_assumptions()).unwrap();
        let y1 = &detail(&result.result).projections[0];

        // Revenue = 1000 * 1.10 = 1100
        assert_eq!(y1.revenue, dec!(1100));
        // EBITDA = 1100 * 0.25 = 275
        assert_eq!(y1.ebitda, dec!(275));
        // D&A = 1100 * 0.03 = 33
        assert_eq!(y1.plus_da, dec!(33));
        // EBIT = 275 - 33 = 242
        assert_eq!(y1.ebit, dec!(242));
        // NOPAT = 242 * 0.75 = 181.5
        assert_eq!(y1.nopat, dec!(181.5));
        // CapEx = 1100 * 0.05 = 55
        assert_eq!(y1.less_capex, dec!(55));
        assert_eq!(y1.less_nwc_change, dec!(10));
        // FCF = 181.5 + 33 - 55 - 10 = 149.5
        assert_eq!(y1.fcf, dec!(149.5));
    }

    #[test]
    fn test_dcf_enterprise_value_composition() {
        let result = run_dcf(&sample_statement(), &sample_assumptions()).unwrap();
        let out = &result.result;
        let d = detail(out);

        assert_eq!(d.projections.len(), 5);
        assert_eq!(out.enterprise_value, d.pv_of_fcf + d.pv_of_terminal);

        // TV = FCF_5 * 1.025 / (0.10 - 0.025)
        let last_fcf = d.projections[4].fcf;
        assert_eq!(d.terminal_value, last_fcf * dec!(1.025) / dec!(0.075));
        // TV discounted with the year-5 factor
        assert_eq!(d.pv_of_terminal, d.terminal_value * d.projections[4].discount_factor);
    }

    #[test]
    fn test_dcf_equity_bridge_and_per_share() {
        let result = run_dcf(&sample_statement(), &sample_assumptions()).unwrap();
        let out = &result.result;

        let equity = out.equity_value.unwrap();
        assert_eq!(equity, out.enterprise_value - dec!(300) + dec!(100));
        assert_eq!(out.value_per_share.unwrap(), equity / dec!(100));
        assert_eq!(out.ticker.as_deref(), Some("ACME"));
    }

    #[test]
    fn test_dcf_discounting() {
        let result = run_dcf(&sample_statement(), &sample_assumptions()).unwrap();
        let d = detail(&result.result);
        let y2 = &d.projections[1];
        // 1 / 1.1^2
        assert!((y2.discount_factor - dec!(0.826446)).abs() < dec!(0.000001));
        assert_eq!(y2.pv_fcf, y2.fcf * y2.discount_factor);
    }

    #[test]
    fn test_terminal_growth_equal_to_discount_rate_rejected() {
        let mut a = sample_assumptions();
        a.terminal_growth_rate = dec!(0.10);
        assert!(matches!(
            run_dcf(&sample_statement(), &a),
            Err(ValuationError::InvalidAssumption(_))
        ));
    }

    #[test]
    fn test_terminal_growth_above_discount_rate_rejected() {
        let mut a = sample_assumptions();
        a.terminal_growth_rate = dec!(0.12);
        assert!(matches!(
            run_dcf(&sample_statement(), &a),
            Err(ValuationError::InvalidAssumption(_))
        ));
    }

    #[test]
    fn test_terminal_growth_just_below_discount_rate_is_out_of_range() {
        let mut a = sample_assumptions();
        a.terminal_growth_rate = dec!(0.0999999999999999999999999999);
        assert!(matches!(
            run_dcf(&sample_statement(), &a),
            Err(ValuationError::InvalidAssumption(msg)) if msg.contains("Terminal value")
        ));
    }

    #[test]
    fn test_runaway_compounding_is_out_of_range() {
        let mut a = sample_assumptions();
        a.horizon_years = 200;
        a.revenue_growth = GrowthSchedule::Uniform(dec!(0.5));
        assert!(matches!(
            run_dcf(&sample_statement(), &a),
            Err(ValuationError::InvalidAssumption(msg)) if msg.contains("exceeds the representable decimal range")
        ));
    }

    #[test]
    fn test_zero_discount_rate_rejected() {
        let mut a = sample_assumptions();
        a.discount_rate = DiscountRateSource::Override(Decimal::ZERO);
        a.terminal_growth_rate = dec!(-0.01);
        assert!(matches!(
            run_dcf(&sample_statement(), &a),
            Err(ValuationError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let mut a = sample_assumptions();
        a.horizon_years = 0;
        assert!(run_dcf(&sample_statement(), &a).is_err());
    }

    #[test]
    fn test_per_year_growth_length_mismatch() {
        let mut a = sample_assumptions();
        a.revenue_growth = GrowthSchedule::PerYear(vec![dec!(0.10), dec!(0.08)]);
        assert!(matches!(
            run_dcf(&sample_statement(), &a),
            Err(ValuationError::InvalidAssumption(_))
        ));
    }

    #[test]
    fn test_per_year_growth() {
        let mut a = sample_assumptions();
        a.horizon_years = 3;
        a.revenue_growth = GrowthSchedule::PerYear(vec![dec!(0.10), dec!(0.05), dec!(0.00)]);
        let result = run_dcf(&sample_statement(), &a).unwrap();
        let d = detail(&result.result);
        assert_eq!(d.projections[0].revenue, dec!(1100));
        assert_eq!(d.projections[1].revenue, dec!(1155));
        assert_eq!(d.projections[2].revenue, dec!(1155));
    }

    #[test]
    fn test_held_flat_policy_uses_base_year() {
        let mut a = sample_assumptions();
        a.reinvestment = ReinvestmentPolicy::default();
        let result = run_dcf(&sample_statement(), &a).unwrap();
        let d = detail(&result.result);
        for y in &d.projections {
            assert_eq!(y.plus_da, dec!(30));
            assert_eq!(y.less_capex, dec!(50));
            assert_eq!(y.less_nwc_change, dec!(10));
        }
    }

    #[test]
    fn test_scale_with_growth_policy() {
        let mut a = sample_assumptions();
        a.reinvestment.capex = LineItemPolicy::ScaleWithGrowth;
        let result = run_dcf(&sample_statement(), &a).unwrap();
        let d = detail(&result.result);
        // 50 * 1.1, 50 * 1.21
        assert_eq!(d.projections[0].less_capex, dec!(55));
        assert_eq!(d.projections[1].less_capex, dec!(60.5));
    }

    #[test]
    fn test_held_flat_missing_base_value_is_missing_data() {
        let mut s = sample_statement();
        s.periods[1].depreciation_amortization = None;
        let mut a = sample_assumptions();
        a.reinvestment.depreciation_amortization = LineItemPolicy::HeldFlat;

        match run_dcf(&s, &a).unwrap_err() {
            ValuationError::MissingData { field, .. } => {
                assert_eq!(field, "depreciation_amortization")
            }
            e => panic!("Expected MissingData, got {e:?}"),
        }
    }

    #[test]
    fn test_ebitda_driver() {
        let mut a = sample_assumptions();
        a.driver = ProjectionDriver::Ebitda;
        let result = run_dcf(&sample_statement(), &a).unwrap();
        let y1 = &detail(&result.result).projections[0];
        // EBITDA = 250 * 1.1 = 275; D&A = 3% of 1100 = 33
        assert_eq!(y1.ebitda, dec!(275));
        assert_eq!(y1.ebit, dec!(242));
    }

    #[test]
    fn test_ebitda_driver_without_revenue() {
        let mut s = sample_statement();
        s.periods[1].revenue = None;
        let mut a = sample_assumptions();
        a.driver = ProjectionDriver::Ebitda;
        a.reinvestment = ReinvestmentPolicy::default();
        let result = run_dcf(&s, &a).unwrap();
        assert_eq!(detail(&result.result).projections[0].revenue, Decimal::ZERO);
    }

    #[test]
    fn test_ebit_margin() {
        let mut a = sample_assumptions();
        a.driver = ProjectionDriver::Revenue {
            margin: MarginAssumption::EbitMargin(dec!(0.20)),
        };
        let result = run_dcf(&sample_statement(), &a).unwrap();
        let y1 = &detail(&result.result).projections[0];
        assert_eq!(y1.ebit, dec!(220));
        assert_eq!(y1.ebitda, dec!(253));
    }

    #[test]
    fn test_historical_ebit_margin() {
        let mut a = sample_assumptions();
        a.driver = ProjectionDriver::Revenue {
            margin: MarginAssumption::HistoricalEbitMargin,
        };
        let result = run_dcf(&sample_statement(), &a).unwrap();
        let y1 = &detail(&result.result).projections[0];
        // 220 / 1000 = 22% of 1100
        assert_eq!(y1.ebit, dec!(242));
    }

    #[test]
    fn test_negative_fcf_passes_through() {
        let mut a = sample_assumptions();
        a.reinvestment.capex = LineItemPolicy::Fixed(dec!(1000));
        let result = run_dcf(&sample_statement(), &a).unwrap();
        let d = detail(&result.result);
        assert!(d.projections.iter().all(|y| y.fcf < Decimal::ZERO));
        assert!(d.terminal_value < Decimal::ZERO);
    }

    #[test]
    fn test_missing_cash_is_missing_data() {
        let mut s = sample_statement();
        s.periods[1].cash = None;
        assert!(matches!(
            run_dcf(&s, &sample_assumptions()),
            Err(ValuationError::MissingData { .. })
        ));
    }

    #[test]
    fn test_zero_shares_is_missing_data() {
        let mut s = sample_statement();
        s.periods[1].shares_outstanding = Some(Decimal::ZERO);
        match run_dcf(&s, &sample_assumptions()).unwrap_err() {
            ValuationError::MissingData { field, .. } => assert_eq!(field, "shares_outstanding"),
            e => panic!("Expected MissingData, got {e:?}"),
        }
    }

    #[test]
    fn test_absent_shares_without_per_share_output() {
        let mut s = sample_statement();
        s.periods[1].shares_outstanding = None;
        let mut a = sample_assumptions();
        a.per_share_output = false;
        let result = run_dcf(&s, &a).unwrap();
        assert!(result.result.equity_value.is_some());
        assert!(result.result.value_per_share.is_none());
    }

    #[test]
    fn test_mid_year_convention_raises_ev() {
        let mut a = sample_assumptions();
        let end_year = run_dcf(&sample_statement(), &a).unwrap();
        a.mid_year_convention = true;
        let mid_year = run_dcf(&sample_statement(), &a).unwrap();
        assert!(mid_year.result.enterprise_value > end_year.result.enterprise_value);
    }

    #[test]
    fn test_exit_multiple_cross_check() {
        let mut a = sample_assumptions();
        a.terminal_exit_multiple = Some(dec!(30));
        let result = run_dcf(&sample_statement(), &a).unwrap();
        let d = detail(&result.result);
        let last_ebitda = d.projections.last().unwrap().ebitda;
        assert_eq!(d.terminal_value_exit_multiple, Some(last_ebitda * dec!(30)));
        assert!(result.warnings.iter().any(|w| w.contains("differ")));
    }

    #[test]
    fn test_wacc_discount_rate() {
        let mut a = sample_assumptions();
        a.discount_rate = DiscountRateSource::Wacc(WaccInputs {
            cost_of_equity: crate::valuation::wacc::CostOfEquity::Direct(dec!(0.10)),
            cost_of_debt: dec!(0.06),
            tax_rate: dec!(0.25),
            equity_weight: dec!(0.70),
            debt_weight: dec!(0.30),
        });
        let result = run_dcf(&sample_statement(), &a).unwrap();
        assert_eq!(detail(&result.result).discount_rate, dec!(0.0835));
    }

    #[test]
    fn test_unordered_statement_rejected() {
        let mut s = sample_statement();
        s.periods.reverse();
        assert!(matches!(
            run_dcf(&s, &sample_assumptions()),
            Err(ValuationError::InvalidInput { .. })
        ));
    }
}
