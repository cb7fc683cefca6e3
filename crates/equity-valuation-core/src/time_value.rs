use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::ValuationError;
use crate::types::{Money, Rate};
use crate::EngineResult;

/// Residual on NPV below which the IRR search stops.
pub const IRR_TOLERANCE: Decimal = dec!(0.000001);
pub const MAX_IRR_ITERATIONS: u32 = 100;

/// Discount factor `1 / (1 + rate)^periods`.
pub fn discount_factor(rate: Rate, periods: Decimal) -> EngineResult<Rate> {
    if rate <= dec!(-1) {
        return Err(ValuationError::invalid_input(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }
    (Decimal::ONE + rate)
        .checked_powd(periods)
        .and_then(|growth| Decimal::ONE.checked_div(growth))
        .ok_or_else(|| {
            ValuationError::invalid_input("rate", format!("(1 + {rate})^{periods} out of range"))
        })
}

/// Net Present Value of a series of cash flows, index 0 undiscounted.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> EngineResult<Money> {
    if rate <= dec!(-1) {
        return Err(ValuationError::invalid_input(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount
                .checked_mul(one_plus_r)
                .ok_or_else(|| ValuationError::overflow("NPV discounting"))?;
        }
        result = cf
            .checked_div(discount)
            .and_then(|pv| result.checked_add(pv))
            .ok_or_else(|| ValuationError::overflow("NPV discounting"))?;
    }

    Ok(result)
}

/// Closed-form IRR for a single investment and a single return `periods`
/// later: `(exit / entry)^(1/n) - 1`.
pub fn single_period_irr(entry: Money, exit: Money, periods: u32) -> EngineResult<Rate> {
    if entry <= Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "entry",
            "Initial investment must be positive",
        ));
    }
    if periods == 0 {
        return Err(ValuationError::invalid_input(
            "periods",
            "Holding period must be at least 1",
        ));
    }
    if exit <= Decimal::ZERO {
        return Ok(dec!(-1));
    }
    let exponent = Decimal::ONE / Decimal::from(periods);
    let growth = exit
        .checked_div(entry)
        .and_then(|multiple| multiple.checked_powd(exponent))
        .ok_or_else(|| {
        ValuationError::invalid_input("exit", "Return multiple out of range for IRR")
    })?;
    Ok(growth - Decimal::ONE)
}

/// Internal Rate of Return using Newton-Raphson, bounded by
/// `MAX_IRR_ITERATIONS` with `IRR_TOLERANCE` on the NPV residual.
pub fn irr(cash_flows: &[Money], guess: Rate) -> EngineResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(ValuationError::missing(
            "cash_flows",
            "IRR (at least 2 cash flows)",
        ));
    }

    let mut rate = guess;
    let mut npv_val = Decimal::MAX;

    for i in 0..MAX_IRR_ITERATIONS {
        npv_val = Decimal::ZERO;
        let mut dnpv = Decimal::ZERO;
        let one_plus_r = Decimal::ONE + rate;

        for (t, cf) in cash_flows.iter().enumerate() {
            let (pv, slope) = irr_terms(*cf, one_plus_r, t)
                .ok_or_else(|| convergence_failure(i, npv_val))?;
            npv_val = npv_val
                .checked_add(pv)
                .ok_or_else(|| convergence_failure(i, npv_val))?;
            dnpv = dnpv
                .checked_sub(slope)
                .ok_or_else(|| convergence_failure(i, npv_val))?;
        }

        if npv_val.abs() < IRR_TOLERANCE {
            tracing::debug!(iterations = i, %rate, "IRR converged");
            return Ok(rate);
        }

        if dnpv.is_zero() {
            return Err(convergence_failure(i, npv_val));
        }

        rate = npv_val
            .checked_div(dnpv)
            .and_then(|step| rate.checked_sub(step))
            .ok_or_else(|| convergence_failure(i, npv_val))?;

        // Guard against divergence
        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        } else if rate > dec!(100.0) {
            rate = dec!(100.0);
        }
    }

    Err(convergence_failure(MAX_IRR_ITERATIONS, npv_val))
}

/// `cf / (1+r)^t` and its derivative magnitude `t * cf / (1+r)^(t+1)`;
/// `None` once either leaves the decimal range.
fn irr_terms(cf: Money, one_plus_r: Decimal, t: usize) -> Option<(Decimal, Decimal)> {
    let discount = one_plus_r.checked_powi(t as i64).filter(|d| !d.is_zero())?;
    let pv = cf.checked_div(discount)?;
    if t == 0 {
        return Some((pv, Decimal::ZERO));
    }
    let slope = Decimal::from(t as u64)
        .checked_mul(cf)?
        .checked_div(discount.checked_mul(one_plus_r)?)?;
    Some((pv, slope))
}

fn convergence_failure(iterations: u32, last_delta: Decimal) -> ValuationError {
    ValuationError::ConvergenceFailure {
        function: "IRR".into(),
        iterations,
        last_delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // NPV at 10%: -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(0.01));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        let result = npv(dec!(0.0), &cfs).unwrap();
        assert_eq!(result, dec!(50));
    }

    #[test]
    fn test_npv_rejects_minus_100_pct() {
        assert!(npv(dec!(-1), &[dec!(-1), dec!(2)]).is_err());
    }

    #[test]
    fn test_irr_basic() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        // IRR ~9.70%
        assert!((result - dec!(0.0970)).abs() < dec!(0.0005));
        assert!(npv(result, &cfs).unwrap().abs() < IRR_TOLERANCE);
    }

    #[test]
    fn test_irr_matches_closed_form_for_single_exit() {
        let cfs = vec![dec!(-100), dec!(0), dec!(0), dec!(0), dec!(0), dec!(200)];
        let numeric = irr(&cfs, dec!(0.10)).unwrap();
        let closed = single_period_irr(dec!(100), dec!(200), 5).unwrap();
        assert!((numeric - closed).abs() < dec!(0.00001));
    }

    #[test]
    fn test_irr_requires_two_flows() {
        assert!(matches!(
            irr(&[dec!(-100)], dec!(0.1)),
            Err(ValuationError::MissingData { .. })
        ));
    }

    #[test]
    fn test_irr_no_sign_change_fails_to_converge() {
        let cfs = vec![dec!(100), dec!(100), dec!(100)];
        assert!(matches!(
            irr(&cfs, dec!(0.10)),
            Err(ValuationError::ConvergenceFailure { .. })
        ));
    }

    #[test]
    fn test_irr_runaway_rate_fails_to_converge() {
        // Newton overshoots to the 10000% clamp, where (1 + r)^15 overflows
        let mut cfs = vec![dec!(-1)];
        cfs.extend(std::iter::repeat(dec!(1000)).take(15));
        assert!(matches!(
            irr(&cfs, dec!(0.10)),
            Err(ValuationError::ConvergenceFailure { .. })
        ));
    }

    #[test]
    fn test_irr_near_total_loss_fails_to_converge() {
        // The only root sits below the -99% clamp
        let mut cfs = vec![dec!(-70000000000000000000000000000)];
        cfs.extend(std::iter::repeat(dec!(1)).take(14));
        assert!(matches!(
            irr(&cfs, dec!(0.10)),
            Err(ValuationError::ConvergenceFailure { .. })
        ));
    }

    #[test]
    fn test_npv_overflow_is_an_error() {
        let cfs = vec![dec!(0), dec!(79000000000000000000000000000)];
        assert!(npv(dec!(-0.5), &cfs).is_err());
    }

    #[test]
    fn test_single_period_irr_doubling() {
        // (200/100)^(1/5) - 1 = 14.8698%
        let r = single_period_irr(dec!(100), dec!(200), 5).unwrap();
        assert!((r - dec!(0.148698)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_single_period_irr_total_loss() {
        assert_eq!(single_period_irr(dec!(100), dec!(0), 3).unwrap(), dec!(-1));
    }

    #[test]
    fn test_discount_factor() {
        let df = discount_factor(dec!(0.10), dec!(2)).unwrap();
        assert!((df - dec!(0.826446)).abs() < dec!(0.000001));
    }
}
