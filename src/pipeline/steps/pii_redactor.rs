//! `pii_redactor`: replaces detected PII in all string values, recursing
//! into nested maps and lists.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use crate::error::PipelineError;
use crate::model::Event;
use crate::pipeline::{Step, StepContext, StepOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    Ssn,
    Email,
    CreditCard,
    Phone,
    Ipv4,
    Ipv6,
}

impl Detector {
    fn tag(&self) -> &'static str {
        match self {
            Detector::Ssn => "[SSN]",
            Detector::Email => "[EMAIL]",
            Detector::CreditCard => "[CREDIT_CARD]",
            Detector::Phone => "[PHONE]",
            Detector::Ipv4 => "[IPV4]",
            Detector::Ipv6 => "[IPV6]",
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            Detector::Ssn => &SSN_RE,
            Detector::Email => &EMAIL_RE,
            Detector::CreditCard => &CREDIT_CARD_RE,
            Detector::Phone => &PHONE_RE,
            Detector::Ipv4 => &IPV4_RE,
            Detector::Ipv6 => &IPV6_RE,
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "ssn" => Some(Detector::Ssn),
            "email" => Some(Detector::Email),
            "credit_card" => Some(Detector::CreditCard),
            "phone" => Some(Detector::Phone),
            "ipv4" => Some(Detector::Ipv4),
            "ipv6" => Some(Detector::Ipv6),
            _ => None,
        }
    }
}

static SSN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[\w.+-]+@[\w-]+\.[A-Za-z]{2,}\b").unwrap());
static CREDIT_CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){13,16}\b").unwrap());
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap());
static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap());
static IPV6_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[A-Fa-f0-9]{1,4}:){2,7}[A-Fa-f0-9]{1,4}\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Mode {
    Tags,
    Replacement,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Tags
    }
}

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default = "default_detectors")]
    detectors: Vec<String>,
    #[serde(default)]
    mode: Mode,
    #[serde(default = "default_replacement")]
    replacement: String,
    #[serde(default)]
    custom: HashMap<String, String>,
}

fn default_detectors() -> Vec<String> {
    vec![
        "ssn".into(),
        "email".into(),
        "credit_card".into(),
        "phone".into(),
        "ipv4".into(),
        "ipv6".into(),
    ]
}

fn default_replacement() -> String {
    "[REDACTED]".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detectors: default_detectors(),
            mode: Mode::default(),
            replacement: default_replacement(),
            custom: HashMap::new(),
        }
    }
}

pub struct PiiRedactor {
    detectors: Vec<Detector>,
    custom: Vec<(Regex, String)>,
    mode: Mode,
    replacement: String,
}

impl PiiRedactor {
    pub fn from_config(raw: &JsonValue) -> Result<Self, PipelineError> {
        let cfg: Config = if raw.is_null() {
            Config::default()
        } else {
            serde_json::from_value(raw.clone())
                .map_err(|e| PipelineError::ConfigInvalid(e.to_string()))?
        };
        let detectors = cfg.detectors.iter().filter_map(|s| Detector::parse(s)).collect();
        let mut custom = Vec::new();
        for (name, pattern) in cfg.custom {
            let re = Regex::new(&pattern)
                .map_err(|e| PipelineError::ConfigInvalid(format!("custom detector {name}: {e}")))?;
            custom.push((re, format!("[{}]", name.to_uppercase())));
        }
        Ok(Self {
            detectors,
            custom,
            mode: cfg.mode,
            replacement: cfg.replacement,
        })
    }

    fn redact(&self, text: &mut String) {
        for detector in &self.detectors {
            let tag = match self.mode {
                Mode::Tags => detector.tag(),
                Mode::Replacement => self.replacement.as_str(),
            };
            if detector.regex().is_match(text) {
                *text = detector.regex().replace_all(text, tag).into_owned();
            }
        }
        for (re, tag) in &self.custom {
            let tag = match self.mode {
                Mode::Tags => tag.as_str(),
                Mode::Replacement => self.replacement.as_str(),
            };
            if re.is_match(text) {
                *text = re.replace_all(text, tag).into_owned();
            }
        }
    }
}

impl Step for PiiRedactor {
    fn kind(&self) -> &'static str {
        "pii_redactor"
    }

    fn run(&self, event: &mut Event, _ctx: &StepContext) -> Result<StepOutcome, PipelineError> {
        for (key, value) in event.iter_mut() {
            if key == crate::model::event::RAW_KEY {
                // _raw must never be dropped or mutated by any transform.
                continue;
            }
            value.map_strings_mut(&mut |s| self.redact(s));
        }
        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentStore;
    use crate::model::{EventMeta, Value};

    fn ctx() -> StepContext {
        StepContext {
            enrichment: EnrichmentStore::empty(),
        }
    }

    #[test]
    fn redacts_email_and_ssn_with_tags() {
        let step = PiiRedactor::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw("contact me", EventMeta::new("s1"));
        e.insert(
            "note",
            Value::Str("email alice@example.com ssn 123-45-6789".into()),
        );
        step.run(&mut e, &ctx()).ok().unwrap();
        let note = e.get("note").unwrap().as_str().unwrap();
        assert!(note.contains("[EMAIL]"));
        assert!(note.contains("[SSN]"));
    }

    #[test]
    fn raw_is_never_touched() {
        let step = PiiRedactor::from_config(&JsonValue::Null).unwrap();
        let raw = "ssn 123-45-6789";
        let mut e = Event::from_raw(raw, EventMeta::new("s1"));
        step.run(&mut e, &ctx()).ok().unwrap();
        assert_eq!(e.raw(), raw);
    }

    #[test]
    fn recurses_into_nested_maps_and_lists() {
        let step = PiiRedactor::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw("x", EventMeta::new("s1"));
        let mut inner = std::collections::BTreeMap::new();
        inner.insert("email".to_string(), Value::Str("bob@example.com".into()));
        e.insert(
            "nested",
            Value::List(vec![Value::Map(inner)]),
        );
        step.run(&mut e, &ctx()).ok().unwrap();
        if let Value::List(items) = e.get("nested").unwrap() {
            if let Value::Map(m) = &items[0] {
                assert_eq!(m.get("email").unwrap().as_str(), Some("[EMAIL]"));
                return;
            }
        }
        panic!("expected nested map in list");
    }
}
