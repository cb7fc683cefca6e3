use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};

use equity_valuation_core::engine::{self, ValuationRequest};
use equity_valuation_core::statement::FinancialStatement;
use equity_valuation_core::types::ComputationOutput;
use equity_valuation_core::valuation::dcf::DcfAssumptions;
use equity_valuation_core::{EngineResult, ValuationResult};

use crate::input;

/// Arguments for a mixed batch of valuation requests
#[derive(Args)]
pub struct BatchArgs {
    /// JSON or YAML array of requests, each tagged with "method"
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for one DCF across many tickers
#[derive(Args)]
pub struct BatchDcfArgs {
    /// File holding `statements` and shared `assumptions`
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Deserialize)]
pub struct BatchDcfRequest {
    pub statements: Vec<FinancialStatement>,
    pub assumptions: DcfAssumptions,
}

pub fn run_batch(args: BatchArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let requests: Vec<ValuationRequest> = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for batch".into());
    };

    let results = engine::run_batch(&requests);
    let rows = requests
        .iter()
        .zip(results)
        .enumerate()
        .map(|(index, (request, result))| summarize(index, &request.method().to_string(), None, result))
        .collect();
    Ok(Value::Array(rows))
}

pub fn run_batch_dcf(args: BatchDcfArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: BatchDcfRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for batch-dcf".into());
    };

    let results = engine::run_dcf_batch(&request.statements, &request.assumptions);
    let rows = request
        .statements
        .iter()
        .zip(results)
        .enumerate()
        .map(|(index, (statement, result))| {
            summarize(index, "DCF", Some(statement.ticker.as_str()), result)
        })
        .collect();
    Ok(Value::Array(rows))
}

/// One flat row per request so table and csv output stay readable; a failed
/// request reports its error without aborting the batch.
fn summarize(
    index: usize,
    method: &str,
    ticker: Option<&str>,
    result: EngineResult<ComputationOutput<ValuationResult>>,
) -> Value {
    match result {
        Ok(out) => {
            let r = out.result;
            json!({
                "index": index,
                "method": method,
                "ticker": ticker.map(str::to_string).or(r.ticker),
                "enterprise_value": r.enterprise_value.to_string(),
                "equity_value": r.equity_value.map(|v| v.to_string()),
                "value_per_share": r.value_per_share.map(|v| v.to_string()),
                "warnings": out.warnings.len(),
                "error": Value::Null,
            })
        }
        Err(e) => {
            tracing::warn!(index, error = %e, "Batch item failed");
            json!({
                "index": index,
                "method": method,
                "ticker": ticker,
                "enterprise_value": Value::Null,
                "equity_value": Value::Null,
                "value_per_share": Value::Null,
                "warnings": 0,
                "error": e.to_string(),
            })
        }
    }
}
