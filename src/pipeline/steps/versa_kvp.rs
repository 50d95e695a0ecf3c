//! `versa_kvp`: `<ISO8601±ZZZZ> <logType>, k=v, k=v, …` shape. Splits on
//! commas outside double-quoted spans, handling escaped `\"` and `\\`.

use chrono::DateTime;
use serde_json::Value as JsonValue;

use crate::error::PipelineError;
use crate::model::{Event, Value};
use crate::pipeline::{Step, StepContext, StepOutcome};

const INT_ALLOWLIST: &[&str] = &["flowid", "sourceport", "destport", "sessionid", "bytes", "packets"];
const FLOAT_ALLOWLIST: &[&str] = &["latency", "jitter", "loss"];

pub struct VersaKvp;

impl VersaKvp {
    pub fn from_config(_raw: &JsonValue) -> Result<Self, PipelineError> {
        Ok(Self)
    }
}

impl Step for VersaKvp {
    fn kind(&self) -> &'static str {
        "versa_kvp"
    }

    fn run(&self, event: &mut Event, _ctx: &StepContext) -> Result<StepOutcome, PipelineError> {
        let raw = event.raw().to_string();
        let (timestamp, rest) = raw.split_once(' ').ok_or_else(|| PipelineError::Transform {
            step: "versa_kvp".into(),
            reason: "missing timestamp/logType separator".into(),
        })?;
        let (log_type, kvp_rest) = rest.split_once(',').ok_or_else(|| PipelineError::Transform {
            step: "versa_kvp".into(),
            reason: "missing logType/kvp separator".into(),
        })?;

        event.insert("@timestamp", Value::Str(timestamp.to_string()));
        if let Ok(parsed) = DateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%z")
            .or_else(|_| DateTime::parse_from_rfc3339(timestamp))
        {
            event.insert(
                "@timestamp_parsed",
                Value::Str(parsed.with_timezone(&chrono::Utc).to_rfc3339()),
            );
        }
        event.insert("_log_type", Value::Str(log_type.trim().to_string()));

        for (key, value) in split_kvp(kvp_rest) {
            let normalized = key.trim().to_string();
            let lower = normalized.to_lowercase();
            if INT_ALLOWLIST.contains(&lower.as_str()) {
                if let Ok(n) = value.parse::<i64>() {
                    event.insert(normalized, Value::Int(n));
                    continue;
                }
            }
            if FLOAT_ALLOWLIST.contains(&lower.as_str()) {
                if let Ok(f) = value.parse::<f64>() {
                    event.insert(normalized, Value::Float(f));
                    continue;
                }
            }
            event.insert(normalized, Value::Str(value));
        }

        Ok(StepOutcome::Continue)
    }
}

/// Splits on commas outside double-quoted spans; `\"` and `\\` are
/// unescaped within quoted spans.
fn split_kvp(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() && (chars[i + 1] == '"' || chars[i + 1] == '\\') {
            current.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == '"' {
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if c == ',' && !in_quotes {
            if let Some(pair) = split_one(&current) {
                pairs.push(pair);
            }
            current.clear();
            i += 1;
            continue;
        }
        current.push(c);
        i += 1;
    }
    if let Some(pair) = split_one(&current) {
        pairs.push(pair);
    }
    pairs
}

fn split_one(token: &str) -> Option<(String, String)> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (k, v) = trimmed.split_once('=')?;
    Some((k.to_string(), v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentStore;
    use crate::model::EventMeta;

    fn ctx() -> StepContext {
        StepContext {
            enrichment: EnrichmentStore::empty(),
        }
    }

    #[test]
    fn parses_basic_kvp_line() {
        let raw = "2024-01-15T10:30:45+0000 FLOW, flowId=42, sourcePort=5000, latency=1.25";
        let step = VersaKvp::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw(raw, EventMeta::new("s1"));
        step.run(&mut e, &ctx()).ok().unwrap();

        assert_eq!(e.get("_log_type").unwrap().as_str(), Some("FLOW"));
        assert_eq!(e.get("flowId").unwrap().as_i64(), Some(42));
        assert_eq!(e.get("sourcePort").unwrap().as_i64(), Some(5000));
        match e.get("latency").unwrap() {
            Value::Float(f) => assert!((*f - 1.25).abs() < 1e-9),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn comma_inside_quotes_is_not_a_separator() {
        let raw = r#"2024-01-15T10:30:45+0000 LOG, msg="hello, world", ok=1"#;
        let step = VersaKvp::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw(raw, EventMeta::new("s1"));
        step.run(&mut e, &ctx()).ok().unwrap();
        assert_eq!(e.get("msg").unwrap().as_str(), Some("hello, world"));
    }
}
