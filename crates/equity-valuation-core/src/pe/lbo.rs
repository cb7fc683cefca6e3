use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ValuationError;
use crate::result::{IrrMethod, LboDetail, LboYear, ValuationDetail, ValuationResult};
use crate::time_value::{irr, single_period_irr};
use crate::types::*;
use crate::EngineResult;

/// How much debt is retired each year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtPaydown {
    /// Entry debt / holding period, every year
    #[default]
    StraightLine,
    /// The same amount every year
    FixedAmount(Money),
    /// A fraction of each year's EBITDA
    PercentOfEbitda(Rate),
    /// A fraction of after-interest, after-tax, after-capex free cash flow
    PercentOfFreeCashFlow(Rate),
}

/// Cash costs needed to derive free cash flow from EBITDA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LboCashFlowAssumptions {
    /// Tax rate on EBITDA less interest
    pub tax_rate: Rate,
    /// Capital expenditure as a fraction of EBITDA
    pub capex_pct_of_ebitda: Rate,
}

/// Input for a single-tranche leveraged buyout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LboAssumptions {
    // Entry
    /// Entry EV/EBITDA multiple
    pub entry_multiple: Multiple,
    /// Entry-year EBITDA (LTM)
    pub entry_ebitda: Money,
    /// Acquisition debt as a multiple of entry EBITDA
    pub leverage: Multiple,
    /// Annual interest rate on the outstanding debt
    pub interest_rate: Rate,

    // Operations
    /// Annual EBITDA growth
    pub ebitda_growth: Rate,
    #[serde(default)]
    pub debt_paydown: DebtPaydown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_flow: Option<LboCashFlowAssumptions>,
    /// Pay cash left after the debt is gone to the sponsor each year
    #[serde(default)]
    pub distribute_excess_cash: bool,

    // Exit
    /// Exit EV/EBITDA multiple
    pub exit_multiple: Multiple,
    /// Holding period in years
    pub holding_period_years: u32,

    #[serde(default)]
    pub currency: Currency,
}

/// Build the LBO from entry through exit and solve for the sponsor IRR.
pub fn run_lbo(input: &LboAssumptions) -> EngineResult<ComputationOutput<ValuationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // ─── Validation ──────────────────────────────────────────────────
    validate_inputs(input)?;

    // ─── Entry ───────────────────────────────────────────────────────
    let entry_ev = input
        .entry_multiple
        .checked_mul(input.entry_ebitda)
        .ok_or_else(|| ValuationError::overflow("Entry enterprise value"))?;
    let entry_debt = input
        .leverage
        .checked_mul(input.entry_ebitda)
        .ok_or_else(|| ValuationError::overflow("Entry debt"))?;
    let entry_equity = entry_ev - entry_debt;

    if input.holding_period_years < 1 {
        return Err(ValuationError::InvalidAssumption(
            "Holding period must be at least 1 year".into(),
        ));
    }
    if entry_equity <= Decimal::ZERO {
        return Err(ValuationError::InvalidAssumption(format!(
            "Entry debt ({entry_debt}) leaves no sponsor equity in an entry EV of {entry_ev}"
        )));
    }
    if let (DebtPaydown::PercentOfFreeCashFlow(_), None) = (&input.debt_paydown, &input.cash_flow) {
        return Err(ValuationError::InvalidAssumption(
            "Free-cash-flow paydown requires cash_flow assumptions (tax rate and capex)".into(),
        ));
    }

    // ─── Year-by-year schedule ───────────────────────────────────────
    let schedule = build_schedule(input, entry_debt, &mut warnings)?;

    // ─── Exit ────────────────────────────────────────────────────────
    let n = input.holding_period_years;
    let final_year = schedule
        .last()
        .ok_or_else(|| ValuationError::missing("schedule", "LBO exit (no projected years)"))?;
    let exit_ebitda = final_year.ebitda;
    let exit_ev = input
        .exit_multiple
        .checked_mul(exit_ebitda)
        .ok_or_else(|| ValuationError::overflow("Exit enterprise value"))?;
    let exit_debt = final_year.closing_debt.max(Decimal::ZERO);
    let exit_equity = exit_ev - exit_debt;

    // ─── Returns ─────────────────────────────────────────────────────
    // [-equity, d1, ..., d(n-1), dn + exit equity]
    let mut equity_cash_flows: Vec<Money> = Vec::with_capacity(n as usize + 1);
    equity_cash_flows.push(-entry_equity);
    for y in &schedule {
        if y.year == n {
            let final_flow = y
                .distribution
                .checked_add(exit_equity)
                .ok_or_else(|| ValuationError::overflow("Final equity cash flow"))?;
            equity_cash_flows.push(final_flow);
        } else {
            equity_cash_flows.push(y.distribution);
        }
    }

    let has_interim_flows = equity_cash_flows[1..n as usize]
        .iter()
        .any(|cf| !cf.is_zero());
    let final_flow = equity_cash_flows[n as usize];

    let (irr_val, irr_method) = if has_interim_flows {
        (irr(&equity_cash_flows, dec!(0.10))?, IrrMethod::NewtonRaphson)
    } else {
        if final_flow <= Decimal::ZERO {
            push_warning(
                &mut warnings,
                format!("Exit equity of {exit_equity} wipes out the sponsor; IRR is -100%"),
            );
        }
        (
            single_period_irr(entry_equity, final_flow, n)?,
            IrrMethod::ClosedForm,
        )
    };

    let moic = equity_cash_flows[1..]
        .iter()
        .try_fold(Decimal::ZERO, |acc, cf| acc.checked_add(*cf))
        .and_then(|total_returned| total_returned.checked_div(entry_equity))
        .ok_or_else(|| ValuationError::overflow("Multiple on invested capital"))?;

    let exit_leverage = leverage_ratio(exit_debt, exit_ebitda)
        .ok_or_else(|| ValuationError::overflow("Exit leverage"))?;

    tracing::debug!(
        %entry_ev,
        %entry_equity,
        %exit_equity,
        irr = %irr_val,
        ?irr_method,
        "LBO returns computed"
    );

    let detail = LboDetail {
        entry_ev,
        entry_debt,
        entry_equity,
        schedule,
        exit_ebitda,
        exit_ev,
        exit_debt,
        exit_equity,
        equity_cash_flows,
        irr: irr_val,
        irr_method,
        moic,
        entry_leverage: input.leverage,
        exit_leverage,
    };

    let result = ValuationResult {
        ticker: None,
        currency: input.currency.clone(),
        enterprise_value: entry_ev,
        equity_value: Some(entry_equity),
        value_per_share: None,
        detail: ValuationDetail::Lbo(detail),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Leveraged Buyout Model",
        input,
        warnings,
        elapsed,
        result,
    ))
}

fn validate_inputs(input: &LboAssumptions) -> EngineResult<()> {
    if input.entry_ebitda <= Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "entry_ebitda",
            "Entry EBITDA must be positive",
        ));
    }
    if input.entry_multiple <= Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "entry_multiple",
            "Entry multiple must be positive",
        ));
    }
    if input.exit_multiple <= Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "exit_multiple",
            "Exit multiple must be positive",
        ));
    }
    if input.leverage < Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "leverage",
            "Leverage cannot be negative",
        ));
    }
    if input.interest_rate < Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "interest_rate",
            "Interest rate cannot be negative",
        ));
    }
    if input.ebitda_growth <= dec!(-1) {
        return Err(ValuationError::invalid_input(
            "ebitda_growth",
            "EBITDA growth must be greater than -100%",
        ));
    }
    match &input.debt_paydown {
        DebtPaydown::FixedAmount(a) if *a < Decimal::ZERO => {
            return Err(ValuationError::invalid_input(
                "debt_paydown",
                "Fixed paydown cannot be negative",
            ));
        }
        DebtPaydown::PercentOfEbitda(p) | DebtPaydown::PercentOfFreeCashFlow(p)
            if *p < Decimal::ZERO || *p > Decimal::ONE =>
        {
            return Err(ValuationError::invalid_input(
                "debt_paydown",
                "Paydown percentage must be between 0 and 1",
            ));
        }
        _ => {}
    }
    if let Some(cf) = &input.cash_flow {
        if cf.tax_rate < Decimal::ZERO || cf.tax_rate >= Decimal::ONE {
            return Err(ValuationError::invalid_input(
                "cash_flow.tax_rate",
                "Tax rate must be in [0, 1)",
            ));
        }
        if cf.capex_pct_of_ebitda < Decimal::ZERO {
            return Err(ValuationError::invalid_input(
                "cash_flow.capex_pct_of_ebitda",
                "Capex percentage cannot be negative",
            ));
        }
    }
    Ok(())
}

/// Free cash flow after interest, tax and capex.
fn free_cash_flow(ebitda: Money, interest: Money, cf: &LboCashFlowAssumptions) -> Option<Money> {
    let capex = ebitda.checked_mul(cf.capex_pct_of_ebitda)?;
    let pre_tax = ebitda.checked_sub(interest)?;
    let tax = pre_tax.max(Decimal::ZERO) * cf.tax_rate;
    pre_tax.checked_sub(capex)?.checked_sub(tax)
}

/// Debt / EBITDA, zero when EBITDA is zero.
fn leverage_ratio(debt: Money, ebitda: Money) -> Option<Multiple> {
    if ebitda.is_zero() {
        Some(Decimal::ZERO)
    } else {
        debt.checked_div(ebitda)
    }
}

fn build_schedule(
    input: &LboAssumptions,
    entry_debt: Money,
    warnings: &mut Vec<String>,
) -> EngineResult<Vec<LboYear>> {
    let n = input.holding_period_years;
    let straight_line = entry_debt / Decimal::from(n);

    let mut schedule = Vec::with_capacity(n as usize);
    let mut ebitda = input.entry_ebitda;
    let mut debt = entry_debt;

    for year in 1..=n {
        let year_overflow =
            |line: &str| ValuationError::overflow(&format!("Year {year} {line}"));
        ebitda = ebitda
            .checked_mul(Decimal::ONE + input.ebitda_growth)
            .ok_or_else(|| year_overflow("EBITDA"))?;
        let opening_debt = debt;
        let interest_expense = opening_debt
            .checked_mul(input.interest_rate)
            .ok_or_else(|| year_overflow("interest expense"))?;

        // Cash the policy devotes to debt service this year
        let cash_available = match (&input.debt_paydown, &input.cash_flow) {
            // Final instalment clears any rounding residue
            (DebtPaydown::StraightLine, _) if year == n => opening_debt,
            (DebtPaydown::StraightLine, _) => straight_line,
            (DebtPaydown::FixedAmount(a), _) => *a,
            (DebtPaydown::PercentOfEbitda(p), _) => ebitda * p,
            (DebtPaydown::PercentOfFreeCashFlow(p), Some(cf)) => {
                let fcf = free_cash_flow(ebitda, interest_expense, cf)
                    .ok_or_else(|| year_overflow("free cash flow"))?;
                if fcf < Decimal::ZERO {
                    push_warning(
                        warnings,
                        format!("Year {year}: negative free cash flow of {fcf}; no debt repaid"),
                    );
                }
                fcf * p
            }
            // Rejected before simulation
            (DebtPaydown::PercentOfFreeCashFlow(_), None) => Decimal::ZERO,
        };

        let debt_paydown = cash_available.max(Decimal::ZERO).min(opening_debt);
        let closing_debt = opening_debt - debt_paydown;
        let distribution = if input.distribute_excess_cash && cash_available > debt_paydown {
            cash_available - debt_paydown
        } else {
            Decimal::ZERO
        };

        let leverage =
            leverage_ratio(closing_debt, ebitda).ok_or_else(|| year_overflow("leverage"))?;

        schedule.push(LboYear {
            year,
            ebitda,
            opening_debt,
            interest_expense,
            cash_available,
            debt_paydown,
            distribution,
            closing_debt,
            leverage,
        });

        debt = closing_debt;
    }

    if debt > Decimal::ZERO {
        tracing::debug!(remaining_debt = %debt, "Debt outstanding at exit");
    }

    Ok(schedule)
}
