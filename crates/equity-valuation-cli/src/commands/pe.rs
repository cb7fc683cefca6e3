use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use equity_valuation_core::pe::lbo::{self, DebtPaydown, LboAssumptions, LboCashFlowAssumptions};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PaydownPolicy {
    StraightLine,
    Fixed,
    PctEbitda,
    PctFcf,
}

/// Arguments for LBO model
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct LboArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Entry EV/EBITDA multiple
    #[arg(long)]
    pub entry_multiple: Option<Decimal>,

    /// Entry (LTM) EBITDA
    #[arg(long)]
    pub entry_ebitda: Option<Decimal>,

    /// Acquisition debt as a multiple of entry EBITDA
    #[arg(long)]
    pub leverage: Option<Decimal>,

    /// Interest rate on the acquisition debt
    #[arg(long)]
    pub interest_rate: Option<Decimal>,

    /// Annual EBITDA growth
    #[arg(long, default_value = "0")]
    pub ebitda_growth: Decimal,

    /// Exit EV/EBITDA multiple
    #[arg(long)]
    pub exit_multiple: Option<Decimal>,

    /// Holding period in years
    #[arg(long, default_value = "5")]
    pub years: u32,

    /// Debt paydown policy
    #[arg(long, value_enum, default_value = "straight-line")]
    pub paydown: PaydownPolicy,

    /// Amount (fixed) or fraction (pct-ebitda, pct-fcf) for the paydown policy
    #[arg(long)]
    pub paydown_value: Option<Decimal>,

    /// Tax rate for free cash flow (pct-fcf)
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Capex as a fraction of EBITDA for free cash flow (pct-fcf)
    #[arg(long)]
    pub capex_pct: Option<Decimal>,

    /// Distribute cash left after the debt is repaid
    #[arg(long)]
    pub distribute_excess_cash: bool,
}

pub fn run_lbo(args: LboArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let lbo_input: LboAssumptions = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        lbo_from_flags(&args)?
    };

    let result = lbo::run_lbo(&lbo_input)?;
    Ok(serde_json::to_value(result)?)
}

fn lbo_from_flags(args: &LboArgs) -> Result<LboAssumptions, Box<dyn std::error::Error>> {
    let paydown_value = || {
        args.paydown_value
            .ok_or("--paydown-value is required for this paydown policy")
    };
    let debt_paydown = match args.paydown {
        PaydownPolicy::StraightLine => DebtPaydown::StraightLine,
        PaydownPolicy::Fixed => DebtPaydown::FixedAmount(paydown_value()?),
        PaydownPolicy::PctEbitda => DebtPaydown::PercentOfEbitda(paydown_value()?),
        PaydownPolicy::PctFcf => DebtPaydown::PercentOfFreeCashFlow(paydown_value()?),
    };

    let cash_flow = match (args.tax_rate, args.capex_pct) {
        (Some(tax_rate), Some(capex_pct_of_ebitda)) => Some(LboCashFlowAssumptions {
            tax_rate,
            capex_pct_of_ebitda,
        }),
        (None, None) => None,
        _ => return Err("--tax-rate and --capex-pct must be given together".into()),
    };

    Ok(LboAssumptions {
        entry_multiple: args
            .entry_multiple
            .ok_or("--entry-multiple is required (or provide --input)")?,
        entry_ebitda: args
            .entry_ebitda
            .ok_or("--entry-ebitda is required (or provide --input)")?,
        leverage: args
            .leverage
            .ok_or("--leverage is required (or provide --input)")?,
        interest_rate: args
            .interest_rate
            .ok_or("--interest-rate is required (or provide --input)")?,
        ebitda_growth: args.ebitda_growth,
        debt_paydown,
        cash_flow,
        distribute_excess_cash: args.distribute_excess_cash,
        exit_multiple: args
            .exit_multiple
            .ok_or("--exit-multiple is required (or provide --input)")?,
        holding_period_years: args.years,
        currency: Default::default(),
    })
}
