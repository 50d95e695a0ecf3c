//! Router: ordered predicate evaluation dispatching to (pipeline,
//! destination) pairs.

pub mod predicate;

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::RouterError;
use crate::model::{Event, RouteSpec};
use predicate::CompiledPredicate;

/// A single dispatch produced by evaluating the route table against an
/// event.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub route_name: String,
    pub pipeline_id: String,
    pub destination_id: String,
}

#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub spec: RouteSpec,
    pub predicate: CompiledPredicate,
}

/// An immutable, pre-compiled snapshot of the route table. Readers hold a
/// reference for the duration of one event's processing; updates publish
/// a new snapshot atomically via [`Router::swap`] — a copy-on-write
/// snapshot referenced by an atomic pointer.
#[derive(Debug, Default)]
pub struct RouteTable {
    pub routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn compile(specs: Vec<RouteSpec>) -> Result<Self, RouterError> {
        let mut routes: Vec<RouteSpec> = specs;
        routes.sort_by_key(|r| r.order);
        let mut compiled = Vec::with_capacity(routes.len());
        for spec in routes {
            let predicate = CompiledPredicate::compile(&spec.predicate)?;
            compiled.push(CompiledRoute { spec, predicate });
        }
        Ok(Self { routes: compiled })
    }
}

pub struct Router {
    table: ArcSwap<RouteTable>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::default()),
        }
    }

    /// Atomically publish a new route table. Readers already mid-dispatch
    /// hold their own `Arc` of the old table via [`Router::snapshot`] and
    /// are unaffected; new dispatches see the new table in full.
    pub fn swap(&self, table: RouteTable) {
        self.table.store(Arc::new(table));
    }

    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Evaluate the route table against `event` in declared order. The
    /// first matching route with `final=true` terminates evaluation;
    /// non-final matches continue. Predicate evaluation failures are
    /// caught by the caller around `evaluate` (the predicate language here
    /// cannot panic, but step config or regex edge cases are treated as
    /// `false`, surfaced as a `PredicateRuntimeError` where it matters).
    pub fn dispatch(&self, event: &mut Event) -> Vec<Dispatch> {
        let snapshot = self.snapshot();
        let mut out = Vec::new();
        for route in &snapshot.routes {
            if route.predicate.evaluate(event) {
                out.push(Dispatch {
                    route_name: route.spec.name.clone(),
                    pipeline_id: route.spec.pipeline_id.clone(),
                    destination_id: route.spec.destination_id.clone(),
                });
                if route.spec.is_final {
                    break;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventMeta, PredicateSpec};

    fn route(name: &str, predicate: PredicateSpec, is_final: bool, order: i64) -> RouteSpec {
        RouteSpec {
            id: name.to_string(),
            name: name.to_string(),
            predicate,
            pipeline_id: format!("p_{name}"),
            destination_id: format!("d_{name}"),
            is_final,
            order,
        }
    }

    #[test]
    fn first_final_match_stops_evaluation() {
        let routes = vec![
            route(
                "r1",
                PredicateSpec::Regex {
                    pattern: "AUDIT".to_string(),
                },
                false,
                0,
            ),
            route("r2", PredicateSpec::True, true, 1),
        ];
        let table = RouteTable::compile(routes).unwrap();
        let router = Router::new();
        router.swap(table);

        let mut e1 = Event::from_raw("... AUDIT ...", EventMeta::new("s1"));
        let d1 = router.dispatch(&mut e1);
        assert_eq!(d1.len(), 2);
        assert_eq!(d1[0].destination_id, "d_r1");
        assert_eq!(d1[1].destination_id, "d_r2");

        let mut e2 = Event::from_raw("INFO ...", EventMeta::new("s1"));
        let d2 = router.dispatch(&mut e2);
        assert_eq!(d2.len(), 1);
        assert_eq!(d2[0].destination_id, "d_r2");
    }

    #[test]
    fn no_matching_route_drops_the_event() {
        let routes = vec![route(
            "r1",
            PredicateSpec::Regex {
                pattern: "NEVER".to_string(),
            },
            true,
            0,
        )];
        let table = RouteTable::compile(routes).unwrap();
        let router = Router::new();
        router.swap(table);

        let mut e = Event::from_raw("anything else", EventMeta::new("s1"));
        assert!(router.dispatch(&mut e).is_empty());
    }

    #[test]
    fn swap_is_atomic_for_in_flight_snapshot_holders() {
        let router = Router::new();
        router.swap(RouteTable::compile(vec![route("r1", PredicateSpec::True, true, 0)]).unwrap());
        let held = router.snapshot();
        router.swap(RouteTable::compile(vec![route("r2", PredicateSpec::True, true, 0)]).unwrap());
        // the snapshot taken before the swap is untouched
        assert_eq!(held.routes[0].spec.name, "r1");
        assert_eq!(router.snapshot().routes[0].spec.name, "r2");
    }
}
