//! Sum command - add up a numeric field over matching objects
//!
//! Prints `0` for empty input. An object without a numeric value for the
//! field fails the command.

use std::convert::Infallible;

use anyhow::Result;
use clap::Args;
use rill_config::Config;
use rill_pipeline::Source;
use serde_json::Value;
use thiserror::Error;

use super::filter::{self, FilterArgs};

/// Sum command arguments
#[derive(Args, Debug)]
pub struct SumArgs {
    /// Numeric field to add up
    #[arg(value_name = "FIELD")]
    pub field: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Object without a usable number in the summed field
///
/// `index` counts objects that passed the filter, from 0.
#[derive(Debug, Error)]
#[error("matching object {index} has no numeric '{field}' field")]
pub struct NotNumeric {
    index: usize,
    field: String,
}

/// Run the sum command
pub async fn run(args: SumArgs, config: &Config, source: Source<Value>) -> Result<()> {
    let total = execute(args, config, source).await?;
    println!("{total}");
    Ok(())
}

async fn execute(args: SumArgs, config: &Config, source: Source<Value>) -> Result<f64> {
    let field = args.field;

    let totals = filter::processor(&config.pipeline, args.filter)
        .map(move |object: Value, index| {
            object
                .get(&field)
                .and_then(Value::as_f64)
                .ok_or_else(|| NotNumeric {
                    index,
                    field: field.clone(),
                })
        })
        .fold(0.0, |acc: f64, value: f64| Ok::<_, Infallible>(acc + value))
        .collect(source)
        .await?;

    // fold emits exactly one chunk, even for empty input
    Ok(totals.first().copied().unwrap_or_default())
}
