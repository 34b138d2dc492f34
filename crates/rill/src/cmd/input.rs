//! JSON lines reader feeding a pipeline source
//!
//! Lines are read by a spawned task and pushed through `Source::channel`,
//! so reading pauses whenever the pipeline is busy. Blank lines are skipped.
//! A read failure or a malformed line raises the source's error signal.

use std::path::PathBuf;

use rill_pipeline::{Source, SourceSender};
use serde_json::Value;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

/// Input errors, raised through the source
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Spawn a reader for `path` (stdin when `None`) and return its source
pub fn spawn_reader(path: Option<PathBuf>, capacity: usize) -> Source<Value> {
    let (sender, source) = Source::channel(capacity);

    tokio::spawn(async move {
        match path {
            Some(path) => match File::open(&path).await {
                Ok(file) => read_lines(BufReader::new(file), sender).await,
                Err(source) => {
                    let _ = sender.fail(InputError::Open { path, source }).await;
                }
            },
            None => read_lines(BufReader::new(tokio::io::stdin()), sender).await,
        }
    });

    source
}

/// Push every JSON line of `reader` into `sender`
pub async fn read_lines<R>(reader: R, sender: SourceSender<Value>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line = 0;

    loop {
        line += 1;
        let text = match lines.next_line().await {
            Ok(Some(text)) => text,
            Ok(None) => break,
            Err(source) => {
                let _ = sender.fail(InputError::Read { line, source }).await;
                return;
            }
        };

        if text.trim().is_empty() {
            continue;
        }

        let value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(source) => {
                let _ = sender.fail(InputError::Malformed { line, source }).await;
                return;
            }
        };

        if sender.send(value).await.is_err() {
            debug!(line, "pipeline gone, stopping input reader");
            return;
        }
    }

    debug!(lines = line - 1, "input finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_pipeline::Processor;
    use serde_json::json;
    use std::io::Write;

    fn source_of(text: &'static str) -> Source<Value> {
        let (sender, source) = Source::channel(1);
        tokio::spawn(read_lines(text.as_bytes(), sender));
        source
    }

    #[tokio::test]
    async fn test_reads_objects_and_skips_blank_lines() {
        let source = source_of("{\"a\":1}\n\n{\"a\":2}\n   \n");
        let items = Processor::new().collect(source).await.unwrap();

        assert_eq!(items, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[tokio::test]
    async fn test_malformed_line_fails_pipeline() {
        let source = source_of("{\"a\":1}\n{not json}\n{\"a\":3}\n");
        let err = Processor::<Value>::new().collect(source).await.unwrap_err();

        assert!(err.is_upstream());
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"name\":\"Ana\"}}").unwrap();
        writeln!(file, "{{\"name\":\"Bia\"}}").unwrap();

        let source = spawn_reader(Some(file.path().to_path_buf()), 4);
        let items = Processor::new().collect(source).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["name"], "Bia");
    }

    #[tokio::test]
    async fn test_missing_file_fails_pipeline() {
        let source = spawn_reader(Some(PathBuf::from("/nonexistent/input.jsonl")), 4);
        let err = Processor::<Value>::new().collect(source).await.unwrap_err();

        assert!(err.to_string().contains("failed to open"));
    }
}
