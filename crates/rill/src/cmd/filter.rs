//! `--filter FIELD=VALUE` matching shared by every command

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use clap::Args;
use rill_config::PipelineConfig;
use rill_pipeline::Processor;
use serde_json::Value;

/// Filter arguments shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only keep objects whose FIELD equals VALUE
    #[arg(short, long, value_name = "FIELD=VALUE")]
    pub filter: Option<FieldFilter>,
}

/// Top-level field equality check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    field: String,
    value: String,
}

impl FieldFilter {
    /// Whether `object` has `field` equal to `value`
    ///
    /// Strings compare by content, other JSON values by their JSON text,
    /// so `age=30` matches `{"age": 30}` and `ok=true` matches `{"ok": true}`.
    pub fn matches(&self, object: &Value) -> bool {
        match object.get(&self.field) {
            Some(Value::String(s)) => *s == self.value,
            Some(other) => other.to_string() == self.value,
            None => false,
        }
    }
}

impl FromStr for FieldFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((field, value)) if !field.trim().is_empty() => Ok(Self {
                field: field.trim().to_string(),
                value: value.to_string(),
            }),
            _ => Err(format!("expected FIELD=VALUE, got '{s}'")),
        }
    }
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// Processor over JSON objects, starting with the filter stage if any
pub fn processor(config: &PipelineConfig, args: FilterArgs) -> Processor<Value> {
    let processor = Processor::with_config(config);

    match args.filter {
        Some(filter) => {
            processor.filter(move |object: &Value| Ok::<_, Infallible>(filter.matches(object)))
        }
        None => processor,
    }
}

/// Key used for grouping: strings as-is, missing fields as `null`
pub fn key_of(object: &Value, field: &str) -> String {
    match object.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => Value::Null.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse() {
        let filter: FieldFilter = "country=BR".parse().unwrap();
        assert_eq!(filter.to_string(), "country=BR");

        let filter: FieldFilter = "note=a=b".parse().unwrap();
        assert_eq!(filter.value, "a=b");

        assert!("country".parse::<FieldFilter>().is_err());
        assert!("=BR".parse::<FieldFilter>().is_err());
    }

    #[test]
    fn test_matches() {
        let object = json!({"country": "BR", "age": 30, "ok": true});

        assert!("country=BR".parse::<FieldFilter>().unwrap().matches(&object));
        assert!("age=30".parse::<FieldFilter>().unwrap().matches(&object));
        assert!("ok=true".parse::<FieldFilter>().unwrap().matches(&object));
        assert!(!"country=DE".parse::<FieldFilter>().unwrap().matches(&object));
        assert!(!"missing=1".parse::<FieldFilter>().unwrap().matches(&object));
    }

    #[test]
    fn test_key_of() {
        let object = json!({"country": "BR", "age": 30});
        assert_eq!(key_of(&object, "country"), "BR");
        assert_eq!(key_of(&object, "age"), "30");
        assert_eq!(key_of(&object, "missing"), "null");
    }

    #[tokio::test]
    async fn test_processor_applies_filter() {
        let args = FilterArgs {
            filter: Some("country=BR".parse().unwrap()),
        };
        let objects = vec![json!({"country": "BR"}), json!({"country": "DE"})];

        let items = processor(&PipelineConfig::default(), args)
            .collect(objects.clone())
            .await
            .unwrap();
        assert_eq!(items, vec![json!({"country": "BR"})]);

        let all = processor(&PipelineConfig::default(), FilterArgs::default())
            .collect(objects)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
