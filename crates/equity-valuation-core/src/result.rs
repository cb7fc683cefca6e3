use serde::{Deserialize, Serialize};

use crate::types::{Currency, Money, Multiple, Rate};

/// Which methodology produced a valuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValuationMethod {
    Dcf,
    Comps,
    Lbo,
}

impl std::fmt::Display for ValuationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValuationMethod::Dcf => write!(f, "DCF"),
            ValuationMethod::Comps => write!(f, "Comps"),
            ValuationMethod::Lbo => write!(f, "LBO"),
        }
    }
}

/// Normalized output of every engine. Built once and returned; nothing
/// mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub currency: Currency,
    pub enterprise_value: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity_value: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_per_share: Option<Money>,
    pub detail: ValuationDetail,
}

impl ValuationResult {
    pub fn method(&self) -> ValuationMethod {
        match self.detail {
            ValuationDetail::Dcf(_) => ValuationMethod::Dcf,
            ValuationDetail::Comps(_) => ValuationMethod::Comps,
            ValuationDetail::Lbo(_) => ValuationMethod::Lbo,
        }
    }
}

/// Method-specific detail carried alongside the headline values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ValuationDetail {
    Dcf(DcfDetail),
    Comps(CompsDetail),
    Lbo(LboDetail),
}

// ---------------------------------------------------------------------------
// DCF
// ---------------------------------------------------------------------------

/// One projected year of the DCF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfYear {
    pub year: u32,
    pub revenue: Money,
    pub ebitda: Money,
    pub ebit: Money,
    pub nopat: Money,
    pub plus_da: Money,
    pub less_capex: Money,
    pub less_nwc_change: Money,
    pub fcf: Money,
    pub discount_factor: Rate,
    pub pv_fcf: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfDetail {
    pub base_fiscal_year: i32,
    pub projections: Vec<DcfYear>,
    pub discount_rate: Rate,
    pub terminal_growth_rate: Rate,
    pub terminal_value: Money,
    pub pv_of_fcf: Money,
    pub pv_of_terminal: Money,
    /// PV of terminal value as a share of enterprise value
    pub terminal_value_pct: Rate,
    /// Terminal value divided by final-year EBITDA
    pub implied_exit_multiple: Multiple,
    /// Exit-multiple terminal value, when a cross-check multiple is supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_value_exit_multiple: Option<Money>,
    pub total_debt: Money,
    pub cash: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<Money>,
}

// ---------------------------------------------------------------------------
// Comps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerMultiple {
    pub name: String,
    pub value: Money,
    pub metric: Money,
    pub multiple: Multiple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerStatistics {
    pub count: usize,
    pub min: Multiple,
    pub max: Multiple,
    pub median: Multiple,
    pub mean: Multiple,
    pub std_dev: Multiple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompsDetail {
    pub subject_name: String,
    pub multiple_type: String,
    pub summary_statistic: String,
    pub applied_multiple: Multiple,
    pub subject_metric: Money,
    /// Implied value before the equity bridge; an equity value for
    /// price-based multiples.
    pub implied_value: Money,
    pub peers: Vec<PeerMultiple>,
    pub statistics: PeerStatistics,
    pub peers_excluded: usize,
}

// ---------------------------------------------------------------------------
// LBO
// ---------------------------------------------------------------------------

/// How the sponsor IRR was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrMethod {
    ClosedForm,
    NewtonRaphson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LboYear {
    pub year: u32,
    pub ebitda: Money,
    pub opening_debt: Money,
    pub interest_expense: Money,
    pub cash_available: Money,
    pub debt_paydown: Money,
    pub distribution: Money,
    pub closing_debt: Money,
    /// Closing debt / EBITDA
    pub leverage: Multiple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LboDetail {
    pub entry_ev: Money,
    pub entry_debt: Money,
    pub entry_equity: Money,
    pub schedule: Vec<LboYear>,
    pub exit_ebitda: Money,
    pub exit_ev: Money,
    pub exit_debt: Money,
    pub exit_equity: Money,
    /// Sponsor cash flows, index 0 = entry (negative)
    pub equity_cash_flows: Vec<Money>,
    pub irr: Rate,
    pub irr_method: IrrMethod,
    pub moic: Multiple,
    pub entry_leverage: Multiple,
    pub exit_leverage: Multiple,
}
