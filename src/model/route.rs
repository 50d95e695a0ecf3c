//! Route entity: ordered predicate -> (pipeline, destination) dispatch rule.

use serde::{Deserialize, Serialize};

/// The predicate language pins its two syntaxes behind an explicit
/// discriminator so the runtime never has to guess which one a given
/// spec means.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateSpec {
    /// Unconditional match.
    True,
    /// A regular expression with named capture groups, evaluated against
    /// `_raw`. A match is `true`; named captures are exported into the
    /// event map unless the key already exists.
    Regex { pattern: String },
    /// A bounded JS-like boolean expression over `_raw` and already-parsed
    /// fields.
    Expr { source: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub id: String,
    pub name: String,
    pub predicate: PredicateSpec,
    pub pipeline_id: String,
    pub destination_id: String,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub order: i64,
}
