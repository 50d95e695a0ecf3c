//! Pipeline Engine: an ordered chain of pure transforms on the Event map,
//! dispatched by a small interpreter loop over a tagged step variant
//! rather than a deep trait-object hierarchy, though the variant itself
//! is expressed as a trait object here so new step kinds can be added
//! without touching the engine.

pub mod steps;

use std::sync::Arc;

use crate::enrichment::EnrichmentStore;
use crate::error::PipelineError;
use crate::model::{Event, PipelineCounters, PipelineSpec, StepSpec};

/// What a step decided to do with the event.
pub enum StepOutcome {
    Continue,
    Drop,
}

/// Context threaded through every step invocation: the things a step may
/// read but never mutates directly (enrichment snapshots, wall time).
pub struct StepContext {
    pub enrichment: Arc<EnrichmentStore>,
}

/// A single pipeline transform. Implementations must be pure functions of
/// `(event, ctx)` — no I/O beyond enrichment-store lookups.
pub trait Step: Send + Sync {
    fn kind(&self) -> &'static str;
    fn run(&self, event: &mut Event, ctx: &StepContext) -> Result<StepOutcome, PipelineError>;
}

struct CompiledStep {
    step: Box<dyn Step>,
    strict_mode: bool,
}

/// A compiled, ready-to-run pipeline.
pub struct Pipeline {
    pub spec: PipelineSpec,
    steps: Vec<CompiledStep>,
    pub counters: Arc<PipelineCounters>,
}

/// Outcome of running a full pipeline against one event.
pub enum PipelineOutcome {
    Kept,
    Dropped,
}

impl Pipeline {
    pub fn compile(spec: PipelineSpec) -> Result<Self, PipelineError> {
        let mut steps = Vec::with_capacity(spec.steps.len());
        for step_spec in &spec.steps {
            steps.push(CompiledStep {
                step: steps::build(step_spec)?,
                strict_mode: step_spec.strict_mode,
            });
        }
        Ok(Self {
            spec,
            steps,
            counters: PipelineCounters::new(),
        })
    }

    /// Run every step in order. `_raw` is guaranteed present on exit
    /// because no step is ever given the ability to remove it (enforced
    /// by [`crate::model::Event::remove`]).
    pub fn run(&self, event: &mut Event, ctx: &StepContext) -> PipelineOutcome {
        for compiled in &self.steps {
            match compiled.step.run(event, ctx) {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Drop) => {
                    self.counters
                        .filtered
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    return PipelineOutcome::Dropped;
                }
                Err(err) => {
                    self.counters
                        .errors
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    tracing::warn!(pipeline = %self.spec.id, step = compiled.step.kind(), error = %err, "pipeline step failed");
                    if compiled.strict_mode {
                        self.counters
                            .filtered
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        return PipelineOutcome::Dropped;
                    }
                }
            }
        }
        self.counters
            .processed
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        PipelineOutcome::Kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventMeta;

    fn ctx() -> StepContext {
        StepContext {
            enrichment: EnrichmentStore::empty(),
        }
    }

    #[test]
    fn unknown_step_kind_is_rejected_at_compile_time() {
        let spec = PipelineSpec {
            id: "p1".into(),
            name: "p1".into(),
            steps: vec![StepSpec {
                kind: "not_a_real_step".into(),
                config: serde_json::Value::Null,
                strict_mode: false,
            }],
        };
        assert!(Pipeline::compile(spec).is_err());
    }

    #[test]
    fn empty_pipeline_keeps_event_unchanged() {
        let spec = PipelineSpec {
            id: "p1".into(),
            name: "p1".into(),
            steps: vec![],
        };
        let pipeline = Pipeline::compile(spec).unwrap();
        let mut event = Event::from_raw("hello", EventMeta::new("s1"));
        let c = ctx();
        match pipeline.run(&mut event, &c) {
            PipelineOutcome::Kept => {}
            PipelineOutcome::Dropped => panic!("expected kept"),
        }
        assert_eq!(event.raw(), "hello");
    }
}
