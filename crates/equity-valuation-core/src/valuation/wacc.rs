use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ValuationError;
use crate::types::{push_warning, with_metadata, ComputationOutput, Rate};
use crate::EngineResult;

/// How the cost of equity is supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostOfEquity {
    /// A cost of equity estimated elsewhere
    Direct(Rate),
    /// CAPM build-up: Ke = Rf + Beta * ERP + size premium + country premium
    Capm {
        risk_free_rate: Rate,
        equity_risk_premium: Rate,
        beta: Decimal,
        /// Unlevered (asset) beta; if present it is re-levered via Hamada
        /// at the D/E implied by the capital structure weights
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unlevered_beta: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_premium: Option<Rate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        country_risk_premium: Option<Rate>,
    },
}

/// Inputs for the Weighted Average Cost of Capital.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccInputs {
    pub cost_of_equity: CostOfEquity,
    /// Pre-tax cost of debt
    pub cost_of_debt: Rate,
    /// Marginal tax rate, in [0, 1)
    pub tax_rate: Rate,
    /// Target equity weight; rescaled with `debt_weight` to sum to 1
    pub equity_weight: Rate,
    pub debt_weight: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccOutput {
    pub wacc: Rate,
    pub cost_of_equity: Rate,
    pub after_tax_cost_of_debt: Rate,
    /// Equity weight after normalization
    pub equity_weight: Rate,
    /// Debt weight after normalization
    pub debt_weight: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levered_beta: Option<Decimal>,
}

/// Compute WACC = We * Ke + Wd * Kd * (1 - t).
///
/// Weights that do not sum to one are normalized rather than rejected, so
/// the result is invariant to a uniform rescaling of the weights.
pub fn compute_wacc(input: &WaccInputs) -> EngineResult<ComputationOutput<WaccOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_wacc_inputs(input)?;

    let (equity_weight, debt_weight) = normalize_weights(input, &mut warnings)?;
    let (cost_of_equity, levered_beta) =
        resolve_cost_of_equity(input, equity_weight, debt_weight, &mut warnings)?;

    let after_tax_cost_of_debt = input.cost_of_debt * (Decimal::ONE - input.tax_rate);
    let wacc = (equity_weight * cost_of_equity)
        .checked_add(debt_weight * after_tax_cost_of_debt)
        .ok_or_else(|| ValuationError::overflow("WACC"))?;

    if let Some(beta) = levered_beta {
        if beta > dec!(3.0) {
            push_warning(
                &mut warnings,
                format!("High beta ({beta}): verify market data; betas above 3.0 are unusual"),
            );
        }
    }
    if wacc > dec!(0.20) {
        push_warning(
            &mut warnings,
            format!("WACC of {wacc} exceeds 20%; appropriate for high-risk situations only"),
        );
    }

    tracing::debug!(%wacc, %cost_of_equity, %after_tax_cost_of_debt, "WACC computed");

    let output = WaccOutput {
        wacc,
        cost_of_equity,
        after_tax_cost_of_debt,
        equity_weight,
        debt_weight,
        levered_beta,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Weighted Average Cost of Capital",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_wacc_inputs(input: &WaccInputs) -> EngineResult<()> {
    if input.cost_of_debt < Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "cost_of_debt",
            "Cost of debt cannot be negative",
        ));
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate >= Decimal::ONE {
        return Err(ValuationError::invalid_input(
            "tax_rate",
            "Tax rate must be in [0, 1)",
        ));
    }
    if input.debt_weight < Decimal::ZERO || input.equity_weight < Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "equity_weight / debt_weight",
            "Capital structure weights cannot be negative",
        ));
    }
    match &input.cost_of_equity {
        CostOfEquity::Direct(ke) => {
            if *ke < Decimal::ZERO {
                return Err(ValuationError::invalid_input(
                    "cost_of_equity",
                    "Cost of equity cannot be negative",
                ));
            }
        }
        CostOfEquity::Capm {
            risk_free_rate,
            equity_risk_premium,
            beta,
            unlevered_beta,
            ..
        } => {
            if *risk_free_rate < Decimal::ZERO {
                return Err(ValuationError::invalid_input(
                    "risk_free_rate",
                    "Risk-free rate cannot be negative",
                ));
            }
            if *equity_risk_premium < Decimal::ZERO {
                return Err(ValuationError::invalid_input(
                    "equity_risk_premium",
                    "Equity risk premium cannot be negative",
                ));
            }
            match unlevered_beta {
                Some(bu) if *bu <= Decimal::ZERO => {
                    return Err(ValuationError::invalid_input(
                        "unlevered_beta",
                        "Unlevered beta must be positive",
                    ));
                }
                None if *beta <= Decimal::ZERO => {
                    return Err(ValuationError::invalid_input(
                        "beta",
                        "Beta must be positive",
                    ));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Returns (equity_weight, debt_weight) scaled to sum to one.
fn normalize_weights(
    input: &WaccInputs,
    warnings: &mut Vec<String>,
) -> EngineResult<(Rate, Rate)> {
    let weight_sum = input
        .equity_weight
        .checked_add(input.debt_weight)
        .ok_or_else(|| ValuationError::overflow("Sum of capital structure weights"))?;
    if weight_sum.is_zero() {
        return Err(ValuationError::invalid_input(
            "equity_weight + debt_weight",
            "At least one capital structure weight must be positive",
        ));
    }
    if (weight_sum - Decimal::ONE).abs() > dec!(0.01) {
        push_warning(
            warnings,
            format!("Capital structure weights sum to {weight_sum}; normalized to 1.0"),
        );
    }
    let equity_weight = input.equity_weight / weight_sum;
    Ok((equity_weight, Decimal::ONE - equity_weight))
}

/// Returns (cost_of_equity, levered beta if CAPM was used).
fn resolve_cost_of_equity(
    input: &WaccInputs,
    equity_weight: Rate,
    debt_weight: Rate,
    warnings: &mut Vec<String>,
) -> EngineResult<(Rate, Option<Decimal>)> {
    match &input.cost_of_equity {
        CostOfEquity::Direct(ke) => Ok((*ke, None)),
        CostOfEquity::Capm {
            risk_free_rate,
            equity_risk_premium,
            beta,
            unlevered_beta,
            size_premium,
            country_risk_premium,
        } => {
            let levered_beta = match unlevered_beta {
                Some(beta_u) => {
                    if equity_weight.is_zero() {
                        return Err(ValuationError::invalid_input(
                            "equity_weight",
                            "Cannot derive D/E for Hamada re-levering when equity weight is zero",
                        ));
                    }
                    let de = debt_weight
                        .checked_div(equity_weight)
                        .ok_or_else(|| ValuationError::overflow("Implied debt-to-equity"))?;
                    let beta_l = relever_beta(*beta_u, input.tax_rate, de)?;
                    push_warning(
                        warnings,
                        format!(
                            "Levered beta re-calculated via Hamada equation: {beta_l} (from unlevered {beta_u}, implied D/E {de})"
                        ),
                    );
                    beta_l
                }
                None => *beta,
            };
            let ke = levered_beta
                .checked_mul(*equity_risk_premium)
                .and_then(|premium| premium.checked_add(*risk_free_rate))
                .and_then(|ke| ke.checked_add(size_premium.unwrap_or(Decimal::ZERO)))
                .and_then(|ke| ke.checked_add(country_risk_premium.unwrap_or(Decimal::ZERO)))
                .ok_or_else(|| ValuationError::overflow("CAPM cost of equity"))?;
            Ok((ke, Some(levered_beta)))
        }
    }
}

/// Unlever a beta using the Hamada equation.
///
/// Beta_U = Beta_L / (1 + (1 - t) * D/E)
pub fn unlever_beta(levered_beta: Decimal, tax_rate: Rate, debt_equity: Decimal) -> EngineResult<Decimal> {
    let denom = hamada_factor(tax_rate, debt_equity)?;
    if denom <= Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "debt_equity",
            "Hamada unlever denominator must be positive",
        ));
    }
    levered_beta
        .checked_div(denom)
        .ok_or_else(|| ValuationError::overflow("Unlevered beta"))
}

/// Re-lever a beta using the Hamada equation.
///
/// Beta_L = Beta_U * (1 + (1 - t) * D/E)
pub fn relever_beta(unlevered_beta: Decimal, tax_rate: Rate, debt_equity: Decimal) -> EngineResult<Decimal> {
    hamada_factor(tax_rate, debt_equity)?
        .checked_mul(unlevered_beta)
        .ok_or_else(|| ValuationError::overflow("Re-levered beta"))
}

/// 1 + (1 - t) * D/E
fn hamada_factor(tax_rate: Rate, debt_equity: Decimal) -> EngineResult<Decimal> {
    (Decimal::ONE - tax_rate)
        .checked_mul(debt_equity)
        .and_then(|shield| shield.checked_add(Decimal::ONE))
        .ok_or_else(|| ValuationError::overflow("Hamada leverage factor"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
