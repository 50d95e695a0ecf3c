//! `field_filter`: include/exclude the event based on whether a named
//! field's value is in a given set.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

use crate::error::PipelineError;
use crate::model::{Event, Value};
use crate::pipeline::{Step, StepContext, StepOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Mode {
    Include,
    Exclude,
}

#[derive(Debug, Deserialize)]
struct Config {
    field: String,
    values: Vec<String>,
    mode: Mode,
}

pub struct FieldFilter {
    field: String,
    values: HashSet<String>,
    mode: Mode,
}

impl FieldFilter {
    pub fn from_config(raw: &JsonValue) -> Result<Self, PipelineError> {
        let cfg: Config = serde_json::from_value(raw.clone())
            .map_err(|e| PipelineError::ConfigInvalid(format!("field_filter: {e}")))?;
        Ok(Self {
            field: cfg.field,
            values: cfg.values.into_iter().collect(),
            mode: cfg.mode,
        })
    }
}

impl Step for FieldFilter {
    fn kind(&self) -> &'static str {
        "field_filter"
    }

    fn run(&self, event: &mut Event, _ctx: &StepContext) -> Result<StepOutcome, PipelineError> {
        let present = event
            .get(&self.field)
            .and_then(Value::as_str)
            .map(|s| self.values.contains(s))
            .unwrap_or(false);

        let keep = match self.mode {
            Mode::Include => present,
            Mode::Exclude => !present,
        };

        if keep {
            Ok(StepOutcome::Continue)
        } else {
            Ok(StepOutcome::Drop)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentStore;
    use crate::model::EventMeta;
    use serde_json::json;

    fn ctx() -> StepContext {
        StepContext {
            enrichment: EnrichmentStore::empty(),
        }
    }

    #[test]
    fn include_mode_keeps_matching_values() {
        let cfg = json!({"field": "severity", "values": ["high", "critical"], "mode": "include"});
        let step = FieldFilter::from_config(&cfg).unwrap();
        let mut e = Event::from_raw("x", EventMeta::new("s1"));
        e.insert("severity", Value::Str("critical".into()));
        assert!(matches!(step.run(&mut e, &ctx()).unwrap(), StepOutcome::Continue));
    }

    #[test]
    fn exclude_mode_drops_matching_values() {
        let cfg = json!({"field": "severity", "values": ["debug"], "mode": "exclude"});
        let step = FieldFilter::from_config(&cfg).unwrap();
        let mut e = Event::from_raw("x", EventMeta::new("s1"));
        e.insert("severity", Value::Str("debug".into()));
        assert!(matches!(step.run(&mut e, &ctx()).unwrap(), StepOutcome::Drop));
    }
}
