use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use equity_valuation_core::engine::{run_model, DcfInput, DcfModel};
use equity_valuation_core::valuation::comps::{self, CompsAssumptions, SummaryStatistic};
use equity_valuation_core::valuation::dcf::{DcfAssumptions, DiscountRateSource};
use equity_valuation_core::valuation::wacc::{self, CostOfEquity, WaccInputs};

use crate::input;

/// Arguments for WACC calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct WaccArgs {
    /// Cost of equity used directly (skips the CAPM build-up)
    #[arg(long, conflicts_with = "risk_free_rate")]
    pub cost_of_equity: Option<Decimal>,

    /// Risk-free rate (e.g. 0.042 for 4.2%)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,

    /// Equity risk premium (e.g. 0.055 for 5.5%)
    #[arg(long, alias = "erp")]
    pub equity_risk_premium: Option<Decimal>,

    /// Levered beta
    #[arg(long)]
    pub beta: Option<Decimal>,

    /// Pre-tax cost of debt
    #[arg(long)]
    pub cost_of_debt: Option<Decimal>,

    /// Marginal corporate tax rate
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Debt weight in capital structure (market value basis)
    #[arg(long)]
    pub debt_weight: Option<Decimal>,

    /// Equity weight in capital structure (market value basis)
    #[arg(long)]
    pub equity_weight: Option<Decimal>,

    /// Size premium
    #[arg(long)]
    pub size_premium: Option<Decimal>,

    /// Country risk premium
    #[arg(long)]
    pub country_risk: Option<Decimal>,

    /// Unlevered (asset) beta for Hamada re-levering at the target weights
    #[arg(long)]
    pub unlevered_beta: Option<Decimal>,

    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for DCF valuation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct DcfArgs {
    /// Input file holding `statement` and `assumptions`
    #[arg(long)]
    pub input: Option<String>,

    /// Financial statement file (used with --assumptions)
    #[arg(long, requires = "assumptions", conflicts_with = "input")]
    pub statement: Option<String>,

    /// DCF assumptions file (used with --statement)
    #[arg(long, requires = "statement")]
    pub assumptions: Option<String>,

    /// Override the discount rate (replaces any WACC inputs)
    #[arg(long)]
    pub discount_rate: Option<Decimal>,

    /// Override the terminal growth rate
    #[arg(long)]
    pub terminal_growth: Option<Decimal>,

    /// Discount cash flows at mid-year
    #[arg(long)]
    pub mid_year: bool,
}

/// Arguments for comparable company analysis
#[derive(Args)]
pub struct CompsArgs {
    /// Path to JSON or YAML input file with subject and peer data
    #[arg(long)]
    pub input: Option<String>,

    /// Apply the mean peer multiple instead of the median
    #[arg(long)]
    pub mean: bool,
}

pub fn run_wacc(args: WaccArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let wacc_input: WaccInputs = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let cost_of_equity = match args.cost_of_equity {
            Some(ke) => CostOfEquity::Direct(ke),
            None => CostOfEquity::Capm {
                risk_free_rate: args
                    .risk_free_rate
                    .ok_or("--risk-free-rate or --cost-of-equity is required (or provide --input)")?,
                equity_risk_premium: args
                    .equity_risk_premium
                    .ok_or("--equity-risk-premium is required (or provide --input)")?,
                beta: args.beta.unwrap_or(dec!(1.0)),
                unlevered_beta: args.unlevered_beta,
                size_premium: args.size_premium,
                country_risk_premium: args.country_risk,
            },
        };
        WaccInputs {
            cost_of_equity,
            cost_of_debt: args
                .cost_of_debt
                .ok_or("--cost-of-debt is required (or provide --input)")?,
            tax_rate: args
                .tax_rate
                .ok_or("--tax-rate is required (or provide --input)")?,
            equity_weight: args
                .equity_weight
                .ok_or("--equity-weight is required (or provide --input)")?,
            debt_weight: args
                .debt_weight
                .ok_or("--debt-weight is required (or provide --input)")?,
        }
    };

    let result = wacc::compute_wacc(&wacc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_dcf(args: DcfArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: DcfInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let (Some(statement), Some(assumptions)) = (&args.statement, &args.assumptions) {
        DcfInput {
            statement: input::file::read_input(statement)?,
            assumptions: input::file::read_input(assumptions)?,
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input, --statement/--assumptions or stdin required for DCF".into());
    };

    apply_dcf_overrides(&mut request.assumptions, &args);

    let result = run_model(DcfModel, &request)?;
    Ok(serde_json::to_value(result)?)
}

fn apply_dcf_overrides(assumptions: &mut DcfAssumptions, args: &DcfArgs) {
    if let Some(rate) = args.discount_rate {
        tracing::debug!(%rate, "Discount rate overridden from the command line");
        assumptions.discount_rate = DiscountRateSource::Override(rate);
    }
    if let Some(g) = args.terminal_growth {
        assumptions.terminal_growth_rate = g;
    }
    if args.mid_year {
        assumptions.mid_year_convention = true;
    }
}

pub fn run_comps(args: CompsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut comps_input: CompsAssumptions = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input file is required for comps analysis".into());
    };

    if args.mean {
        comps_input.summary_statistic = SummaryStatistic::Mean;
    }

    let result = comps::run_comps(&comps_input)?;
    Ok(serde_json::to_value(result)?)
}
