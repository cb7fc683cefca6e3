#![cfg(feature = "batch")]

use equity_valuation_core::engine::{
    run_batch, run_dcf_batch, run_valuation, DcfInput, ValuationRequest,
};
use equity_valuation_core::pe::lbo::LboAssumptions;
use equity_valuation_core::statement::{FinancialStatement, StatementPeriod};
use equity_valuation_core::store::StatementStore;
use equity_valuation_core::valuation::dcf::{
    DcfAssumptions, DiscountRateSource, GrowthSchedule, MarginAssumption, ProjectionDriver,
    ReinvestmentPolicy,
};
use equity_valuation_core::{ValuationError, ValuationMethod};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn statement(ticker: &str, revenue: Decimal) -> FinancialStatement {
    FinancialStatement {
        ticker: ticker.into(),
        currency: Default::default(),
        periods: vec![StatementPeriod {
            fiscal_year: 2023,
            revenue: Some(revenue),
            ebitda: Some(revenue * dec!(0.2)),
            ebit: Some(revenue * dec!(0.15)),
            capex: Some(revenue * dec!(0.04)),
            depreciation_amortization: Some(revenue * dec!(0.05)),
            change_in_nwc: Some(revenue * dec!(0.01)),
            total_debt: Some(dec!(100)),
            cash: Some(dec!(50)),
            shares_outstanding: Some(dec!(10)),
            ..Default::default()
        }],
    }
}

fn assumptions() -> DcfAssumptions {
    DcfAssumptions {
        horizon_years: 5,
        revenue_growth: GrowthSchedule::Uniform(dec!(0.05)),
        driver: ProjectionDriver::Revenue {
            margin: MarginAssumption::EbitdaMargin(dec!(0.20)),
        },
        tax_rate: dec!(0.25),
        reinvestment: ReinvestmentPolicy::default(),
        terminal_growth_rate: dec!(0.02),
        discount_rate: DiscountRateSource::Override(dec!(0.09)),
        mid_year_convention: false,
        terminal_exit_multiple: None,
        per_share_output: true,
    }
}

#[test]
fn test_dcf_batch_matches_sequential_runs() {
    let statements: Vec<FinancialStatement> = (1..=8)
        .map(|i| statement(&format!("T{i}"), Decimal::from(i * 1000)))
        .collect();
    let a = assumptions();

    let batch = run_dcf_batch(&statements, &a);
    assert_eq!(batch.len(), statements.len());

    for (statement, result) in statements.iter().zip(&batch) {
        let parallel = result.as_ref().unwrap();
        let sequential = run_valuation(&ValuationRequest::Dcf(DcfInput {
            statement: statement.clone(),
            assumptions: a.clone(),
        }))
        .unwrap();
        assert_eq!(parallel.result, sequential.result);
        assert_eq!(parallel.result.ticker.as_deref(), Some(statement.ticker.as_str()));
    }
}

#[test]
fn test_batch_results_are_independent() {
    let mut statements = vec![
        statement("AAA", dec!(1000)),
        statement("BBB", dec!(2000)),
        statement("CCC", dec!(3000)),
    ];
    let a = assumptions();
    let before = run_dcf_batch(&statements, &a);

    // Break one ticker; the others must not move
    statements[1].periods[0].cash = None;
    let after = run_dcf_batch(&statements, &a);

    assert!(matches!(after[1], Err(ValuationError::MissingData { .. })));
    assert_eq!(
        before[0].as_ref().unwrap().result,
        after[0].as_ref().unwrap().result
    );
    assert_eq!(
        before[2].as_ref().unwrap().result,
        after[2].as_ref().unwrap().result
    );
}

#[test]
fn test_mixed_batch_from_json() {
    let raw = r#"[
        {
            "method": "lbo",
            "entry_multiple": "8",
            "entry_ebitda": "100",
            "leverage": "4",
            "interest_rate": "0.08",
            "ebitda_growth": "0.05",
            "exit_multiple": "8",
            "holding_period_years": 5
        },
        {
            "method": "comps",
            "subject_name": "Sub",
            "subject_metric": "100",
            "multiple_type": "EvEbitda",
            "peers": [
                { "name": "A", "enterprise_value": "900", "metric": "100" },
                { "name": "B", "enterprise_value": "1100", "metric": "100" }
            ]
        }
    ]"#;
    let requests: Vec<ValuationRequest> = serde_json::from_str(raw).unwrap();
    let results = run_batch(&requests);

    let methods: Vec<ValuationMethod> = results
        .iter()
        .map(|r| r.as_ref().unwrap().result.method())
        .collect();
    assert_eq!(methods, vec![ValuationMethod::Lbo, ValuationMethod::Comps]);
    assert_eq!(results[1].as_ref().unwrap().result.enterprise_value, dec!(1000));
}

#[test]
fn test_store_feeds_valuation() {
    let mut store = StatementStore::new(chrono::Duration::minutes(15));
    store.insert(statement("ACME", dec!(1500)));

    let cached = store.get("ACME").cloned().unwrap();
    let out = run_valuation(&ValuationRequest::Dcf(DcfInput {
        statement: cached,
        assumptions: assumptions(),
    }))
    .unwrap();
    assert_eq!(out.result.ticker.as_deref(), Some("ACME"));
    assert!(store.get("MISSING").is_none());
}

#[test]
fn test_lbo_request_over_leveraged() {
    let request = ValuationRequest::Lbo(LboAssumptions {
        entry_multiple: dec!(6),
        entry_ebitda: dec!(100),
        leverage: dec!(7),
        interest_rate: dec!(0.08),
        ebitda_growth: dec!(0.03),
        debt_paydown: Default::default(),
        cash_flow: None,
        distribute_excess_cash: false,
        exit_multiple: dec!(6),
        holding_period_years: 4,
        currency: Default::default(),
    });
    assert!(matches!(
        run_valuation(&request),
        Err(ValuationError::InvalidAssumption(_))
    ));
}
