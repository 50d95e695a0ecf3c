//! `geoip_enrich`: looks up an IP field against the Enrichment Store's geo
//! database snapshot and merges geo fields.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::PipelineError;
use crate::model::{Event, Value};
use crate::pipeline::{Step, StepContext, StepOutcome};

const DEFAULT_SOURCE_FIELDS: &[&str] = &["src", "source_ip", "ip", "sourceIPv4Address"];

#[derive(Debug, Deserialize, Default)]
struct Config {
    #[serde(default)]
    source_fields: Vec<String>,
}

pub struct GeoIpEnrich {
    source_fields: Vec<String>,
}

impl GeoIpEnrich {
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

impl Step for GeoIpEnrich {
    fn kind(&self) -> &'static str {
        "geoip_enrich"
    }

    fn run(&self, event: &mut Event, ctx: &StepContext) -> Result<StepOutcome, PipelineError> {
        let Some(ip) = find_ip(event, &self.source_fields) else {
            return Ok(StepOutcome::Continue);
        };
        if let Some(fields) = ctx.enrichment.lookup_geo(ip) {
            if let Some(city) = fields.geo_city {
                event.insert("geo_city", Value::Str(city));
            }
            if let Some(country) = fields.geo_country {
                event.insert("geo_country", Value::Str(country));
            }
            if let Some(lat) = fields.geo_lat {
                event.insert("geo_lat", Value::Float(lat));
            }
            if let Some(lon) = fields.geo_lon {
                event.insert("geo_lon", Value::Float(lon));
            }
            if let Some(tz) = fields.geo_timezone {
                event.insert("geo_timezone", Value::Str(tz));
            }
        }
        Ok(StepOutcome::Continue)
    }
}

pub(super) fn find_ip(event: &Event, fields: &[String]) -> Option<std::net::IpAddr> {
    fields
        .iter()
        .find_map(|f| event.get(f).and_then(Value::as_str))
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentStore;
    use crate::model::EventMeta;

    #[test]
    fn missing_database_is_a_no_op() {
        let step = GeoIpEnrich::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw("x", EventMeta::new("s1"));
        e.insert("src", Value::Str("1.2.3.4".into()));
        let ctx = StepContext {
            enrichment: EnrichmentStore::empty(),
        };
        step.run(&mut e, &ctx).ok().unwrap();
        assert!(e.get("geo_city").is_none());
    }

    #[test]
    fn missing_ip_field_is_a_no_op() {
        let step = GeoIpEnrich::from_config(&JsonValue::Null).unwrap();
        let mut e = Event::from_raw("x", EventMeta::new("s1"));
        let ctx = StepContext {
            enrichment: EnrichmentStore::empty(),
        };
        assert!(step.run(&mut e, &ctx).is_ok());
    }
}
