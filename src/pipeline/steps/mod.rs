//! Recognized pipeline step kinds. Each module implements [`super::Step`]
//! for one kind; [`build`] is the small dispatch table the compiler's
//! interpreter loop uses to turn a [`StepSpec`] into a runnable step.

mod asn_enrich;
mod field_filter;
mod geoip_enrich;
mod palo_alto_csv;
mod pii_redactor;
mod universal_kv;
mod versa_kvp;

use crate::error::PipelineError;
use crate::model::StepSpec;

use super::Step;

pub fn build(spec: &StepSpec) -> Result<Box<dyn Step>, PipelineError> {
    match spec.kind.as_str() {
        "universal_kv" => Ok(Box::new(universal_kv::UniversalKv::from_config(
            &spec.config,
        )?)),
        "palo_alto_csv" => Ok(Box::new(palo_alto_csv::PaloAltoCsv::from_config(
            &spec.config,
        )?)),
        "versa_kvp" => Ok(Box::new(versa_kvp::VersaKvp::from_config(&spec.config)?)),
        "geoip_enrich" => Ok(Box::new(geoip_enrich::GeoIpEnrich::from_config(
            &spec.config,
        )?)),
        "asn_enrich" => Ok(Box::new(asn_enrich::AsnEnrich::from_config(
            &spec.config,
        )?)),
        "pii_redactor" => Ok(Box::new(pii_redactor::PiiRedactor::from_config(
            &spec.config,
        )?)),
        "field_filter" => Ok(Box::new(field_filter::FieldFilter::from_config(
            &spec.config,
        )?)),
        other => Err(PipelineError::ConfigInvalid(format!(
            "unrecognized step kind: {other}"
        ))),
    }
}
