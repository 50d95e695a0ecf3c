//! `universal_kv`: scans a message-like field for `key=value` tokens and
//! normalizes `severity` into the ordered bucket set.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::PipelineError;
use crate::model::{Event, Value};
use crate::pipeline::{Step, StepContext, StepOutcome};

const DEFAULT_SOURCE_FIELDS: &[&str] =
    &["message", "raw", "msg", "log", "syslog_message", "content"];

const SEVERITY_FIELDS: &[&str] = &[
    "severity",
    "sev",
    "level",
    "priority",
    "pri",
    "risk",
    "threat_level",
    "alert_level",
    "log_level",
    "event_severity",
];

const SEPARATORS: &[char] = &[' ', '\t', ',', ';', '|'];

#[derive(Debug, Deserialize, Default)]
struct Config {
    #[serde(default)]
    source_fields: Vec<String>,
}

pub struct UniversalKv {
    source_fields: Vec<String>,
}

impl UniversalKv {
    pub fn from_config(raw: &JsonValue) -> Result<Self, PipelineError> {
        let cfg: Config = if raw.is_null() {
            Config::default()
        } else {
            serde_json::from_value(raw.clone())
                .map_err(|e| PipelineError::ConfigInvalid(e.to_string()))?
        };
        let source_fields = if cfg.source_fields.is_empty() {
            DEFAULT_SOURCE_FIELDS.iter().map(|s| s.to_string()).collect()
        } else {
            cfg.source_fields
        };
        Ok(Self { source_fields })
    }
}

impl Step for UniversalKv {
    fn kind(&self) -> &'static str {
        "universal_kv"
    }

    fn run(&self, event: &mut Event, _ctx: &StepContext) -> Result<StepOutcome, PipelineError> {
        let text = self
            .source_fields
            .iter()
            .chain(std::iter::once(&"_raw".to_string()))
            .find_map(|field| {
                if field == "_raw" {
                    Some(event.raw().to_string())
                } else {
                    event.get(field).and_then(Value::as_str).map(str::to_string)
                }
            });

        let Some(text) = text else {
            return Ok(StepOutcome::Continue);
        };

        let pairs = extract_pairs(&text);
        let mut count = 0usize;
        for (key, value) in pairs {
            let normalized_key = normalize_key(&key);
            if event.insert_if_absent(normalized_key, Value::Str(value)) {
                count += 1;
            }
        }
        if count > 0 {
            event.insert("_kv_parsed", Value::Bool(true));
            event.insert("_kv_field_count", Value::Int(count as i64));
        }

        normalize_severity(event);

        Ok(StepOutcome::Continue)
    }
}

fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace(['.', '-'], "_")
}

/// Tokenize `key=value`, `key="quoted"`, `key='quoted'` pairs separated by
/// {space, tab, comma, semicolon, pipe}.
fn extract_pairs(text: &str) -> Vec<(String, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    let mut pairs = Vec::new();

    while i < chars.len() {
        // skip separators / whitespace between tokens
        while i < chars.len() && (SEPARATORS.contains(&chars[i]) || chars[i].is_whitespace()) {
            i += 1;
        }
        let key_start = i;
        while i < chars.len() && chars[i] != '=' && !SEPARATORS.contains(&chars[i]) && !chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() || chars[i] != '=' {
            // not a key=value token; skip to next separator
            while i < chars.len() && !SEPARATORS.contains(&chars[i]) {
                i += 1;
            }
            continue;
        }
        let key: String = chars[key_start..i].iter().collect();
        if key.is_empty() {
            i += 1;
            continue;
        }
        i += 1; // consume '='

        let value = if i < chars.len() && (chars[i] == '"' || chars[i] == '\'') {
            let quote = chars[i];
            i += 1;
            let val_start = i;
            while i < chars.len() && chars[i] != quote {
                i += 1;
            }
            let val: String = chars[val_start..i].iter().collect();
            if i < chars.len() {
                i += 1; // consume closing quote
            }
            val
        } else {
            let val_start = i;
            while i < chars.len() && !SEPARATORS.contains(&chars[i]) {
                i += 1;
            }
            chars[val_start..i].iter().collect()
        };

        pairs.push((key, value));
    }
    pairs
}

fn normalize_severity(event: &mut Event) {
    let found = SEVERITY_FIELDS
        .iter()
        .find_map(|field| event.get(*field).and_then(Value::as_str).map(|s| (*field, s.to_string())));

    let Some((field, original)) = found else {
        return;
    };

    let bucket = bucket_for(&original);
    event.insert("_original_severity", Value::Str(original));
    event.insert("severity", Value::Str(bucket.to_string()));
    // If the source field wasn't literally named `severity`, the original
    // field is left in place (untouched data other than the canonical copy).
    let _ = field;
}

fn bucket_for(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();
    const CRITICAL: &[&str] = &["crit", "fatal", "emergency"];
    const HIGH: &[&str] = &["error", "alert"];
    const MEDIUM: &[&str] = &["warn"];
    const LOW: &[&str] = &["info", "notice"];
    const DEBUG: &[&str] = &["debug", "trace"];

    if CRITICAL.iter().any(|s| lower.contains(s)) {
        "critical"
    } else if HIGH.iter().any(|s| lower.contains(s)) {
        "high"
    } else if MEDIUM.iter().any(|s| lower.contains(s)) {
        "medium"
    } else if LOW.iter().any(|s| lower.contains(s)) {
        "low"
    } else if DEBUG.iter().any(|s| lower.contains(s)) {
        "debug"
    } else {
        "low"
    }
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
    fn extracts_simple_pairs_and_normalizes_severity() {
        let step = UniversalKv::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw(
            "src=10.0.0.1 action=allow severity=critical",
            EventMeta::new("s1"),
        );
        step.run(&mut e, &ctx()).ok().unwrap();
        assert_eq!(e.get("src").unwrap().as_str(), Some("10.0.0.1"));
        assert_eq!(e.get("action").unwrap().as_str(), Some("allow"));
        assert_eq!(e.get("severity").unwrap().as_str(), Some("critical"));
        assert_eq!(e.get("_kv_parsed").unwrap(), &Value::Bool(true));
    }

    #[test]
    fn severity_warning_maps_to_medium() {
        let step = UniversalKv::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw(
            "src=10.0.0.2 action=deny severity=warning",
            EventMeta::new("s1"),
        );
        step.run(&mut e, &ctx()).ok().unwrap();
        assert_eq!(e.get("severity").unwrap().as_str(), Some("medium"));
        assert_eq!(
            e.get("_original_severity").unwrap().as_str(),
            Some("warning")
        );
    }

    #[test]
    fn quoted_values_with_separators_inside_are_preserved() {
        let step = UniversalKv::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw(
            r#"msg="hello, world" user=bob"#,
            EventMeta::new("s1"),
        );
        step.run(&mut e, &ctx()).ok().unwrap();
        assert_eq!(e.get("msg").unwrap().as_str(), Some("hello, world"));
        assert_eq!(e.get("user").unwrap().as_str(), Some("bob"));
    }

    #[test]
    fn idempotent_on_second_run() {
        let step = UniversalKv::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw("src=10.0.0.1 severity=info", EventMeta::new("s1"));
        step.run(&mut e, &ctx()).ok().unwrap();
        let first: std::collections::BTreeMap<_, _> = e.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        step.run(&mut e, &ctx()).ok().unwrap();
        let second: std::collections::BTreeMap<_, _> = e.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_severity_defaults_to_low() {
        assert_eq!(bucket_for("something-odd"), "low");
    }
}
