//! `asn_enrich`: looks up an IP field against the Enrichment Store's ASN
//! database snapshot and merges {asn_number, asn_org}.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::PipelineError;
use crate::model::{Event, Value};
use crate::pipeline::{Step, StepContext, StepOutcome};

use super::geoip_enrich::find_ip;

const DEFAULT_SOURCE_FIELDS: &[&str] = &["src", "source_ip", "ip", "sourceIPv4Address"];

#[derive(Debug, Deserialize, Default)]
struct Config {
    #[serde(default)]
    source_fields: Vec<String>,
}

pub struct AsnEnrich {
    source_fields: Vec<String>,
}

impl AsnEnrich {
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

impl Step for AsnEnrich {
    fn kind(&self) -> &'static str {
        "asn_enrich"
    }

    fn run(&self, event: &mut Event, ctx: &StepContext) -> Result<StepOutcome, PipelineError> {
        let Some(ip) = find_ip(event, &self.source_fields) else {
            return Ok(StepOutcome::Continue);
        };
        if let Some(fields) = ctx.enrichment.lookup_asn(ip) {
            if let Some(n) = fields.asn_number {
                event.insert("asn_number", Value::Int(n));
            }
            if let Some(org) = fields.asn_org {
                event.insert("asn_org", Value::Str(org));
            }
        }
        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentStore;
    use crate::model::EventMeta;

    #[test]
    fn missing_database_is_a_no_op() {
        let step = AsnEnrich::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw("x", EventMeta::new("s1"));
        e.insert("src", Value::Str("1.2.3.4".into()));
        let ctx = StepContext {
            enrichment: EnrichmentStore::empty(),
        };
        step.run(&mut e, &ctx).ok().unwrap();
        assert!(e.get("asn_number").is_none());
    }
}
