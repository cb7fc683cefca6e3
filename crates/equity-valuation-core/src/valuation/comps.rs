use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ValuationError;
use crate::result::{CompsDetail, PeerMultiple, PeerStatistics, ValuationDetail, ValuationResult};
use crate::statement::StatementPeriod;
use crate::types::{push_warning, with_metadata, ComputationOutput, Currency, Money, Multiple};
use crate::EngineResult;

use super::dcf::divide_by_shares;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Types of valuation multiples supported by the comps engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultipleType {
    EvEbitda,
    EvRevenue,
    EvEbit,
    PriceEarnings,
    PriceBook,
}

impl MultipleType {
    /// P/E and P/B price equity, not the whole firm.
    pub fn is_equity_based(&self) -> bool {
        matches!(self, MultipleType::PriceEarnings | MultipleType::PriceBook)
    }
}

impl std::fmt::Display for MultipleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultipleType::EvEbitda => write!(f, "EV/EBITDA"),
            MultipleType::EvRevenue => write!(f, "EV/Revenue"),
            MultipleType::EvEbit => write!(f, "EV/EBIT"),
            MultipleType::PriceEarnings => write!(f, "P/E"),
            MultipleType::PriceBook => write!(f, "P/B"),
        }
    }
}

/// Which statistic of the peer set is applied to the subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatistic {
    #[default]
    Median,
    Mean,
}

impl std::fmt::Display for SummaryStatistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryStatistic::Median => write!(f, "median"),
            SummaryStatistic::Mean => write!(f, "mean"),
        }
    }
}

fn default_include() -> bool {
    true
}

/// A comparable company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub name: String,
    /// Enterprise value, or market capitalisation for P/E and P/B
    pub enterprise_value: Money,
    /// Denominator of the multiple (EBITDA, revenue, EBIT, earnings, book)
    pub metric: Money,
    /// Include in the analysis (allows easy toggling)
    #[serde(default = "default_include")]
    pub include: bool,
}

/// Input for a trading comparables valuation of one subject company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompsAssumptions {
    pub subject_name: String,
    /// Subject's value of the same metric the peers are measured on
    pub subject_metric: Money,
    pub peers: Vec<Peer>,
    pub multiple_type: MultipleType,
    #[serde(default)]
    pub summary_statistic: SummaryStatistic,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_debt: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<Money>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value the subject by applying the peer set's summary multiple to its
/// metric.
pub fn run_comps(
    assumptions: &CompsAssumptions,
) -> EngineResult<ComputationOutput<ValuationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // --- Validate ---
    if assumptions.subject_metric <= Decimal::ZERO {
        return Err(ValuationError::invalid_input(
            "subject_metric",
            format!(
                "{} metric must be positive to apply {}",
                assumptions.subject_name, assumptions.multiple_type
            ),
        ));
    }

    let included: Vec<&Peer> = assumptions.peers.iter().filter(|p| p.include).collect();
    let peers_excluded = assumptions.peers.len() - included.len();

    if included.is_empty() {
        return Err(ValuationError::missing(
            "peers",
            "comparable multiples (no peers included)",
        ));
    }
    if included.len() < 3 {
        push_warning(
            &mut warnings,
            format!(
                "Only {} comparables included; consider adding more for statistical significance",
                included.len()
            ),
        );
    }

    // --- Peer multiples ---
    let peers = compute_peer_multiples(&included)?;
    let statistics = compute_statistics(&peers)?;

    let applied_multiple = match assumptions.summary_statistic {
        SummaryStatistic::Median => statistics.median,
        SummaryStatistic::Mean => statistics.mean,
    };
    let implied_value = applied_multiple
        .checked_mul(assumptions.subject_metric)
        .ok_or_else(|| ValuationError::overflow("Implied value"))?;

    // --- Equity bridge ---
    let bridge = match (assumptions.total_debt, assumptions.cash) {
        (Some(debt), Some(cash)) => Some((debt, cash)),
        _ => None,
    };

    let bridge_overflow = || ValuationError::overflow("Enterprise-to-equity bridge");
    let (enterprise_value, equity_value) = if assumptions.multiple_type.is_equity_based() {
        match bridge {
            Some((debt, cash)) => (
                implied_value
                    .checked_add(debt)
                    .and_then(|v| v.checked_sub(cash))
                    .ok_or_else(bridge_overflow)?,
                Some(implied_value),
            ),
            None => {
                push_warning(
                    &mut warnings,
                    format!(
                        "No debt/cash supplied for {}; enterprise value reported equal to implied equity value",
                        assumptions.multiple_type
                    ),
                );
                (implied_value, Some(implied_value))
            }
        }
    } else {
        let equity = bridge
            .map(|(debt, cash)| {
                implied_value
                    .checked_sub(debt)
                    .and_then(|v| v.checked_add(cash))
                    .ok_or_else(bridge_overflow)
            })
            .transpose()?;
        (implied_value, equity)
    };

    let value_per_share = match (equity_value, assumptions.shares_outstanding) {
        (Some(equity), Some(shares)) => Some(divide_by_shares(equity, shares)?),
        _ => None,
    };

    tracing::debug!(
        subject = %assumptions.subject_name,
        multiple = %assumptions.multiple_type,
        %applied_multiple,
        %implied_value,
        "Comps valuation complete"
    );

    let detail = CompsDetail {
        subject_name: assumptions.subject_name.clone(),
        multiple_type: assumptions.multiple_type.to_string(),
        summary_statistic: assumptions.summary_statistic.to_string(),
        applied_multiple,
        subject_metric: assumptions.subject_metric,
        implied_value,
        peers,
        statistics,
        peers_excluded,
    };

    let result = ValuationResult {
        ticker: None,
        currency: assumptions.currency.clone(),
        enterprise_value,
        equity_value,
        value_per_share,
        detail: ValuationDetail::Comps(detail),
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Trading Comparables Analysis",
        assumptions,
        warnings,
        elapsed,
        result,
    ))
}

/// Pull the subject metric for `multiple_type` out of a statement period.
/// Book value is not carried on statements, so P/B always needs an
/// explicit metric.
pub fn subject_metric(period: &StatementPeriod, multiple_type: MultipleType) -> EngineResult<Money> {
    let context = format!("{multiple_type} subject metric");
    match multiple_type {
        MultipleType::EvEbitda => period.require(period.ebitda, "ebitda", &context),
        MultipleType::EvRevenue => period.require(period.revenue, "revenue", &context),
        MultipleType::EvEbit => period.require(period.ebit, "ebit", &context),
        MultipleType::PriceEarnings => period.require(period.net_income, "net_income", &context),
        MultipleType::PriceBook => period.require(None, "book_value", &context),
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn compute_peer_multiples(peers: &[&Peer]) -> EngineResult<Vec<PeerMultiple>> {
    peers
        .iter()
        .map(|peer| {
            if peer.metric <= Decimal::ZERO {
                return Err(ValuationError::invalid_input(
                    "peers.metric",
                    format!(
                        "{}: metric must be positive (got {}); set include = false to drop the peer",
                        peer.name, peer.metric
                    ),
                ));
            }
            let multiple = peer.enterprise_value.checked_div(peer.metric).ok_or_else(|| {
                ValuationError::invalid_input(
                    "peers.metric",
                    format!(
                        "{}: value / metric is out of range (metric {})",
                        peer.name, peer.metric
                    ),
                )
            })?;
            Ok(PeerMultiple {
                name: peer.name.clone(),
                value: peer.enterprise_value,
                metric: peer.metric,
                multiple,
            })
        })
        .collect()
}

fn compute_statistics(peers: &[PeerMultiple]) -> EngineResult<PeerStatistics> {
    let count = peers.len();
    let mut sorted_vals: Vec<Multiple> = peers.iter().map(|p| p.multiple).collect();
    sorted_vals.sort();

    let sum = sorted_vals
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
        .ok_or_else(|| ValuationError::overflow("Sum of peer multiples"))?;
    let mean = sum / Decimal::from(count as i64);

    let median = if count % 2 == 0 {
        let mid = count / 2;
        sorted_vals[mid - 1]
            .checked_add(sorted_vals[mid])
            .ok_or_else(|| ValuationError::overflow("Median peer multiple"))?
            / dec!(2)
    } else {
        sorted_vals[count / 2]
    };

    // Sample standard deviation
    let std_dev = if count > 1 {
        let squares = sorted_vals
            .iter()
            .try_fold(Decimal::ZERO, |acc, v| {
                let diff = *v - mean;
                diff.checked_mul(diff).and_then(|sq| acc.checked_add(sq))
            })
            .ok_or_else(|| ValuationError::overflow("Dispersion of peer multiples"))?;
        let variance = squares / Decimal::from((count - 1) as i64);
        variance.sqrt().unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };

    Ok(PeerStatistics {
        count,
        min: sorted_vals[0],
        max: sorted_vals[count - 1],
        median,
        mean,
        std_dev,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
