//! Collect command - print matching objects, one per line

use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use rill_config::Config;
use rill_pipeline::Source;
use serde_json::Value;

use super::filter::{self, FilterArgs};

/// Collect command arguments
#[derive(Args, Debug)]
pub struct CollectArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Run the collect command
pub async fn run(args: CollectArgs, config: &Config, source: Source<Value>) -> Result<()> {
    let objects = execute(args, config, source).await?;

    let mut out = io::stdout().lock();
    for object in &objects {
        writeln!(out, "{object}")?;
    }

    Ok(())
}

async fn execute(args: CollectArgs, config: &Config, source: Source<Value>) -> Result<Vec<Value>> {
    let processor = filter::processor(&config.pipeline, args.filter);
    Ok(processor.collect(source).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_collect_keeps_order() {
        let args = CollectArgs {
            filter: FilterArgs {
                filter: Some("keep=true".parse().unwrap()),
            },
        };
        let source = Source::iter(vec![
            json!({"id": 1, "keep": true}),
            json!({"id": 2, "keep": false}),
            json!({"id": 3, "keep": true}),
        ]);

        let objects = execute(args, &Config::default(), source).await.unwrap();
        let ids: Vec<_> = objects.iter().map(|o| o["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(3)]);
    }

    #[tokio::test]
    async fn test_collect_propagates_source_error() {
        let (sender, source) = Source::channel(1);
        tokio::spawn(async move {
            sender.send(json!({"id": 1})).await.unwrap();
            sender.fail("malformed JSON on line 2").await.unwrap();
        });

        let args = CollectArgs {
            filter: FilterArgs::default(),
        };
        let err = execute(args, &Config::default(), source).await.unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
