//! Per-event cost of running a representative pipeline (normalize + redact)
//! end to end through the compiled step chain.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use logstream_hub::enrichment::EnrichmentStore;
use logstream_hub::model::{Event, EventMeta, PipelineSpec, StepSpec};
use logstream_hub::pipeline::{Pipeline, StepContext};

fn sample_pipeline() -> Pipeline {
    let spec = PipelineSpec {
        id: "bench".into(),
        name: "bench".into(),
        steps: vec![
            StepSpec {
                kind: "universal_kv".into(),
                config: serde_json::Value::Null,
                strict_mode: false,
            },
            StepSpec {
                kind: "pii_redactor".into(),
                config: serde_json::Value::Null,
                strict_mode: false,
            },
        ],
    };
    Pipeline::compile(spec).expect("bench pipeline compiles")
}

fn bench_run(c: &mut Criterion) {
    let pipeline = sample_pipeline();
    let ctx = StepContext {
        enrichment: EnrichmentStore::empty(),
    };
    let raw = "<14>1 2024-01-01T00:00:00Z host app - - - src=10.0.0.1 user=alice email=alice@example.com action=allow";

    c.bench_function("pipeline_run_universal_kv_pii_redactor", |b| {
        b.iter(|| {
            let mut event = Event::from_raw(black_box(raw), EventMeta::new("bench-source"));
            let outcome = pipeline.run(&mut event, &ctx);
            black_box(outcome)
        });
    });
}

criterion_group!(benches, bench_run);
criterion_main!(benches);
