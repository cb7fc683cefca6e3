use serde::{Deserialize, Serialize};

use crate::pe::lbo::{run_lbo, LboAssumptions};
use crate::result::{ValuationMethod, ValuationResult};
use crate::statement::FinancialStatement;
use crate::types::ComputationOutput;
use crate::valuation::comps::{run_comps, CompsAssumptions};
use crate::valuation::dcf::{run_dcf, DcfAssumptions};
use crate::EngineResult;

#[cfg(feature = "batch")]
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A statement and the assumptions to value it under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfInput {
    pub statement: FinancialStatement,
    pub assumptions: DcfAssumptions,
}

/// One valuation to run, tagged by methodology.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ValuationRequest {
    Dcf(DcfInput),
    Comps(CompsAssumptions),
    Lbo(LboAssumptions),
}

impl ValuationRequest {
    pub fn method(&self) -> ValuationMethod {
        match self {
            ValuationRequest::Dcf(_) => ValuationMethod::Dcf,
            ValuationRequest::Comps(_) => ValuationMethod::Comps,
            ValuationRequest::Lbo(_) => ValuationMethod::Lbo,
        }
    }
}

/// A valuation methodology with a typed input.
pub trait ValuationModel {
    type Input;

    fn method(&self) -> ValuationMethod;
    fn run(&self, input: &Self::Input) -> EngineResult<ComputationOutput<ValuationResult>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DcfModel;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompsModel;

#[derive(Debug, Clone, Copy, Default)]
pub struct LboModel;

impl ValuationModel for DcfModel {
    type Input = DcfInput;

    fn method(&self) -> ValuationMethod {
        ValuationMethod::Dcf
    }

    fn run(&self, input: &Self::Input) -> EngineResult<ComputationOutput<ValuationResult>> {
        run_dcf(&input.statement, &input.assumptions)
    }
}

impl ValuationModel for CompsModel {
    type Input = CompsAssumptions;

    fn method(&self) -> ValuationMethod {
        ValuationMethod::Comps
    }

    fn run(&self, input: &Self::Input) -> EngineResult<ComputationOutput<ValuationResult>> {
        run_comps(input)
    }
}

impl ValuationModel for LboModel {
    type Input = LboAssumptions;

    fn method(&self) -> ValuationMethod {
        ValuationMethod::Lbo
    }

    fn run(&self, input: &Self::Input) -> EngineResult<ComputationOutput<ValuationResult>> {
        run_lbo(input)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Dispatch a request to its engine.
pub fn run_valuation(request: &ValuationRequest) -> EngineResult<ComputationOutput<ValuationResult>> {
    match request {
        ValuationRequest::Dcf(input) => run_model(DcfModel, input),
        ValuationRequest::Comps(assumptions) => run_model(CompsModel, assumptions),
        ValuationRequest::Lbo(assumptions) => run_model(LboModel, assumptions),
    }
}

/// Run one model inside a tracing span named after its method.
pub fn run_model<M: ValuationModel>(
    model: M,
    input: &M::Input,
) -> EngineResult<ComputationOutput<ValuationResult>> {
    let span = tracing::debug_span!("valuation", method = %model.method());
    let _guard = span.enter();
    model.run(input)
}

/// Run independent requests in parallel. Results come back in input order
/// and one failure does not affect the others.
#[cfg(feature = "batch")]
pub fn run_batch(
    requests: &[ValuationRequest],
) -> Vec<EngineResult<ComputationOutput<ValuationResult>>> {
    tracing::debug!(count = requests.len(), "Running valuation batch");
    requests.par_iter().map(run_valuation).collect()
}

/// DCF the same assumptions across many tickers in parallel.
#[cfg(feature = "batch")]
pub fn run_dcf_batch(
    statements: &[FinancialStatement],
    assumptions: &DcfAssumptions,
) -> Vec<EngineResult<ComputationOutput<ValuationResult>>> {
    tracing::debug!(count = statements.len(), "Running DCF batch");
    statements
        .par_iter()
        .map(|statement| run_dcf(statement, assumptions))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
