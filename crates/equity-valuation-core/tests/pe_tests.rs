use equity_valuation_core::pe::lbo::{run_lbo, DebtPaydown, LboAssumptions, LboCashFlowAssumptions};
use equity_valuation_core::result::IrrMethod;
use equity_valuation_core::time_value::{irr, npv};
use equity_valuation_core::types::Currency;
use equity_valuation_core::{ValuationDetail, ValuationError, ValuationResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn detail(result: &ValuationResult) -> &equity_valuation_core::result::LboDetail {
    match &result.detail {
        ValuationDetail::Lbo(d) => d,
        other => panic!("Expected LBO detail, got {other:?}"),
    }
}

/// Mid-market buyout: 10x entry on 50 of EBITDA, 5x leverage.
fn mid_market_deal() -> LboAssumptions {
    LboAssumptions {
        entry_multiple: dec!(10),
        entry_ebitda: dec!(50),
        leverage: dec!(5),
        interest_rate: dec!(0.09),
        ebitda_growth: dec!(0.06),
        debt_paydown: DebtPaydown::PercentOfFreeCashFlow(dec!(0.75)),
        cash_flow: Some(LboCashFlowAssumptions {
            tax_rate: dec!(0.25),
            capex_pct_of_ebitda: dec!(0.15),
        }),
        distribute_excess_cash: false,
        exit_multiple: dec!(10),
        holding_period_years: 5,
        currency: Currency::GBP,
    }
}

#[test]
fn test_lbo_closed_form_doubling() {
    // Entry equity 100, exit equity 200 after 5 years
    let input = LboAssumptions {
        entry_multiple: dec!(10),
        entry_ebitda: dec!(20),
        leverage: dec!(5),
        interest_rate: dec!(0.08),
        ebitda_growth: Decimal::ZERO,
        debt_paydown: DebtPaydown::StraightLine,
        cash_flow: None,
        distribute_excess_cash: false,
        exit_multiple: dec!(10),
        holding_period_years: 5,
        currency: Currency::USD,
    };
    let out = run_lbo(&input).unwrap();
    let d = detail(&out.result);

    assert_eq!(d.entry_equity, dec!(100));
    assert_eq!(d.exit_equity, dec!(200));
    assert_eq!(d.irr_method, IrrMethod::ClosedForm);
    assert!(
        (d.irr - dec!(0.1487)).abs() < dec!(0.0001),
        "Expected IRR ~14.87%, got {}",
        d.irr
    );
}

#[test]
fn test_lbo_mid_market_deleverages() {
    let out = run_lbo(&mid_market_deal()).unwrap();
    let d = detail(&out.result);

    assert_eq!(d.entry_ev, dec!(500));
    assert_eq!(d.entry_debt, dec!(250));
    assert_eq!(out.result.currency, Currency::GBP);

    for y in &d.schedule {
        assert!(y.closing_debt <= y.opening_debt);
        assert_eq!(y.interest_expense, y.opening_debt * dec!(0.09));
    }
    assert!(d.exit_debt < d.entry_debt);
    assert!(d.exit_leverage < d.entry_leverage);
    assert!(d.moic > Decimal::ONE);
    assert!(d.irr > Decimal::ZERO);
}

#[test]
fn test_lbo_cash_flows_tie_to_exit() {
    let out = run_lbo(&mid_market_deal()).unwrap();
    let d = detail(&out.result);

    assert_eq!(d.equity_cash_flows.len(), 6);
    assert_eq!(d.equity_cash_flows[0], -d.entry_equity);
    assert_eq!(d.equity_cash_flows[5], d.exit_equity);
    assert_eq!(d.exit_equity, d.exit_ev - d.exit_debt);
}

#[test]
fn test_lbo_interim_distributions_solve_numerically() {
    let input = LboAssumptions {
        leverage: dec!(1),
        debt_paydown: DebtPaydown::PercentOfEbitda(dec!(0.5)),
        distribute_excess_cash: true,
        cash_flow: None,
        ..mid_market_deal()
    };
    let out = run_lbo(&input).unwrap();
    let d = detail(&out.result);

    assert_eq!(d.irr_method, IrrMethod::NewtonRaphson);
    assert!(d.schedule.iter().any(|y| y.distribution > Decimal::ZERO));
    let residual = npv(d.irr, &d.equity_cash_flows).unwrap();
    assert!(residual.abs() < dec!(0.000001), "NPV at IRR should be ~0, got {residual}");
    assert_eq!(irr(&d.equity_cash_flows, dec!(0.10)).unwrap(), d.irr);
}

#[test]
fn test_lbo_entry_debt_above_ev_rejected_before_simulation() {
    let input = LboAssumptions {
        leverage: dec!(11),
        ..mid_market_deal()
    };
    match run_lbo(&input).unwrap_err() {
        ValuationError::InvalidAssumption(msg) => assert!(msg.contains("no sponsor equity")),
        e => panic!("Expected InvalidAssumption, got {e:?}"),
    }
}

#[test]
fn test_lbo_negative_paydown_pct_rejected() {
    let input = LboAssumptions {
        debt_paydown: DebtPaydown::PercentOfEbitda(dec!(-0.1)),
        ..mid_market_deal()
    };
    assert!(matches!(
        run_lbo(&input),
        Err(ValuationError::InvalidInput { .. })
    ));
}

#[test]
fn test_lbo_assumptions_from_json() {
    let raw = r#"{
        "entry_multiple": "8",
        "entry_ebitda": "100",
        "leverage": "4",
        "interest_rate": "0.08",
        "ebitda_growth": "0.05",
        "exit_multiple": "8",
        "holding_period_years": 5
    }"#;
    let input: LboAssumptions = serde_json::from_str(raw).unwrap();
    assert_eq!(input.debt_paydown, DebtPaydown::StraightLine);
    assert!(!input.distribute_excess_cash);
    assert!(run_lbo(&input).is_ok());
}
