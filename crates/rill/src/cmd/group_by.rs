//! Group-by command - print matching objects bucketed by a field
//!
//! Output is a single JSON object whose keys appear in first-seen order.

use std::convert::Infallible;

use anyhow::Result;
use clap::Args;
use rill_config::Config;
use rill_pipeline::Source;
use serde_json::{Map, Value};

use super::filter::{self, FilterArgs};

/// Group-by command arguments
#[derive(Args, Debug)]
pub struct GroupByArgs {
    /// Field whose value is the group key
    #[arg(value_name = "FIELD")]
    pub field: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Run the group-by command
pub async fn run(args: GroupByArgs, config: &Config, source: Source<Value>) -> Result<()> {
    let groups = execute(args, config, source).await?;
    println!("{}", serde_json::to_string_pretty(&groups)?);
    Ok(())
}

async fn execute(args: GroupByArgs, config: &Config, source: Source<Value>) -> Result<Value> {
    let field = args.field;
    let processor = filter::processor(&config.pipeline, args.filter);

    let groups = processor
        .group_by(source, |object: &Value| {
            Ok::<_, Infallible>(filter::key_of(object, &field))
        })
        .await?;

    let object: Map<String, Value> = groups
        .into_iter()
        .map(|(key, objects)| (key, Value::Array(objects)))
        .collect();

    Ok(Value::Object(object))
}
