//! `/preview/regex`, `/preview/enrich`: lets the UI try a route predicate
//! or an enrichment lookup against a sample without mutating any
//! dataplane state.

use std::net::IpAddr;

use axum::extract::State;
use axum::Json;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ApiError;

use super::AppState;

#[derive(Deserialize)]
pub struct RegexPreviewRequest {
    pub sample: String,
    pub pattern: String,
}

#[derive(Serialize)]
pub struct RegexPreviewResponse {
    pub matched: bool,
    pub captures: BTreeMap<String, String>,
}

pub async fn regex(
    Json(req): Json<RegexPreviewRequest>,
) -> Result<Json<RegexPreviewResponse>, ApiError> {
    let re = Regex::new(&req.pattern).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let mut captures = BTreeMap::new();
    let matched = match re.captures(&req.sample) {
        Some(caps) => {
            for name in re.capture_names().flatten() {
                if let Some(m) = caps.name(name) {
                    captures.insert(name.to_string(), m.as_str().to_string());
                }
            }
            true
        }
        None => false,
    };
    Ok(Json(RegexPreviewResponse { matched, captures }))
}

#[derive(Deserialize)]
pub struct EnrichPreviewRequest {
    pub sample: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Serialize)]
pub struct EnrichPreviewResponse {
    pub enriched: bool,
    pub geo: Option<crate::enrichment::GeoFields>,
    pub asn: Option<crate::enrichment::AsnFields>,
}

pub async fn enrich(
    State(state): State<AppState>,
    Json(req): Json<EnrichPreviewRequest>,
) -> Result<Json<EnrichPreviewResponse>, ApiError> {
    let candidate_ip = match &req.ip {
        Some(ip) => Some(ip.clone()),
        None => req
            .pattern
            .as_ref()
            .and_then(|pattern| Regex::new(pattern).ok())
            .and_then(|re| re.find(&req.sample).map(|m| m.as_str().to_string()))
            .or_else(|| extract_first_ip(&req.sample)),
    };

    let Some(candidate_ip) = candidate_ip else {
        return Ok(Json(EnrichPreviewResponse {
            enriched: false,
            geo: None,
            asn: None,
        }));
    };

    let Ok(ip) = candidate_ip.parse::<IpAddr>() else {
        return Ok(Json(EnrichPreviewResponse {
            enriched: false,
            geo: None,
            asn: None,
        }));
    };

    let geo = state.enrichment.lookup_geo(ip);
    let asn = state.enrichment.lookup_asn(ip);
    Ok(Json(EnrichPreviewResponse {
        enriched: geo.is_some() || asn.is_some(),
        geo,
        asn,
    }))
}

fn extract_first_ip(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != ':')
        .find(|tok| tok.parse::<IpAddr>().is_ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_first_ip_finds_ipv4_token() {
        assert_eq!(
            extract_first_ip("src=10.0.0.1 action=allow"),
            Some("10.0.0.1".to_string())
        );
    }
}
