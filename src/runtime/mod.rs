//! Application runtime: owns every live Source, Pipeline, Destination and
//! the Router, and performs the atomic reconfiguration protocol: build
//! the new component stopped, start it, swap the public reference under
//! a single mutation lock, then drain and stop the previous instance.
//! This module is the control plane's sole mutation surface onto the
//! dataplane; `src/api` never touches a component directly.

pub mod library;
pub mod loadtest;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::buffer::NextRecord;
use crate::config::AppConfig;
use crate::destination::Batcher;
use crate::enrichment::EnrichmentStore;
use crate::error::{DestinationError, PipelineError, RouterError, SourceError};
use crate::listener::RunningSource;
use crate::livetail::capture::CaptureWriter;
use crate::metrics::metrics;
use crate::model::{
    CaptureFormat, CaptureInfo, DestinationSpec, Event, EventMeta, PipelineSpec, RouteSpec,
    SourceSpec,
};
use crate::pipeline::{Pipeline, PipelineOutcome, StepContext};
use crate::router::{Router, RouteTable};

/// Everything needed to turn a raw record from one source into dispatched,
/// batched events: a reference to the pipeline table, the destination
/// table, the router and the enrichment store. Cloned cheaply (all fields
/// are `Arc`s) into each source's dispatch task.
#[derive(Clone)]
struct DispatchContext {
    router: Arc<Router>,
    pipelines: Arc<ArcSwap<HashMap<String, Arc<Pipeline>>>>,
    destinations: Arc<ArcSwap<HashMap<String, Arc<Batcher>>>>,
    enrichment: Arc<EnrichmentStore>,
}

struct RunningSourceHandle {
    source: Arc<RunningSource>,
    dispatch_task: tokio::task::JoinHandle<()>,
}

pub struct Runtime {
    pub config: AppConfig,
    sources: DashMap<String, Arc<RunningSourceHandle>>,
    pipelines: Arc<ArcSwap<HashMap<String, Arc<Pipeline>>>>,
    destinations: Arc<ArcSwap<HashMap<String, Arc<Batcher>>>>,
    destination_specs: DashMap<String, DestinationSpec>,
    pipeline_specs: DashMap<String, PipelineSpec>,
    routes: Mutex<Vec<RouteSpec>>,
    router: Arc<Router>,
    pub enrichment: Arc<EnrichmentStore>,
    http_client: reqwest::Client,
    captures: DashMap<String, (String, Arc<CaptureWriter>)>, // capture_id -> (source_id, writer)
    pub loadtest: loadtest::LoadTestRegistry,
    started_at: std::time::Instant,
}

impl Runtime {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.sink_timeout())
            .build()
            .expect("reqwest client builds with static configuration");

        Arc::new(Self {
            config,
            sources: DashMap::new(),
            pipelines: Arc::new(ArcSwap::from_pointee(HashMap::new())),
            destinations: Arc::new(ArcSwap::from_pointee(HashMap::new())),
            destination_specs: DashMap::new(),
            pipeline_specs: DashMap::new(),
            routes: Mutex::new(Vec::new()),
            router: Arc::new(Router::new()),
            enrichment: EnrichmentStore::empty(),
            http_client,
            captures: DashMap::new(),
            loadtest: loadtest::LoadTestRegistry::default(),
            started_at: std::time::Instant::now(),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn dispatch_ctx(&self) -> DispatchContext {
        DispatchContext {
            router: Arc::clone(&self.router),
            pipelines: Arc::clone(&self.pipelines),
            destinations: Arc::clone(&self.destinations),
            enrichment: Arc::clone(&self.enrichment),
        }
    }

    // ---------------------------------------------------------------
    // Sources
    // ---------------------------------------------------------------

    pub async fn create_source(self: &Arc<Self>, spec: SourceSpec) -> Result<SourceSpec, SourceError> {
        if self.sources.contains_key(&spec.id) {
            return Err(SourceError::AlreadyExists(spec.id));
        }
        self.start_source(spec.clone()).await?;
        Ok(spec)
    }

    pub async fn replace_source(self: &Arc<Self>, id: &str, spec: SourceSpec) -> Result<SourceSpec, SourceError> {
        // Atomic reconfiguration: build+start the new instance before
        // draining the old one, so readers (the live-tail hub, metrics)
        // never observe a gap.
        let previous = self.sources.get(id).map(|e| Arc::clone(e.value()));
        self.start_source(spec.clone()).await?;
        if let Some(previous) = previous {
            previous.dispatch_task.abort();
            previous.source.stop().await;
        }
        Ok(spec)
    }

    pub fn list_sources(&self) -> Vec<SourceSpec> {
        self.sources.iter().map(|e| e.value().source.spec.clone()).collect()
    }

    pub fn get_source(&self, id: &str) -> Option<Arc<RunningSource>> {
        self.sources.get(id).map(|e| Arc::clone(&e.value().source))
    }

    pub async fn delete_source(self: &Arc<Self>, id: &str) -> Result<(), SourceError> {
        let Some((_, handle)) = self.sources.remove(id) else {
            return Err(SourceError::NotFound(id.to_string()));
        };
        handle.dispatch_task.abort();
        handle.source.stop().await;
        Ok(())
    }

    pub async fn start_source_by_id(self: &Arc<Self>, id: &str) -> Result<(), SourceError> {
        let spec = self
            .sources
            .get(id)
            .map(|e| e.value().source.spec.clone())
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        let mut enabled = spec;
        enabled.enabled = true;
        self.replace_source(id, enabled).await?;
        Ok(())
    }

    pub async fn stop_source_by_id(self: &Arc<Self>, id: &str) -> Result<(), SourceError> {
        let spec = self
            .sources
            .get(id)
            .map(|e| e.value().source.spec.clone())
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        let mut disabled = spec;
        disabled.enabled = false;
        self.replace_source(id, disabled).await?;
        Ok(())
    }

    async fn start_source(self: &Arc<Self>, spec: SourceSpec) -> Result<(), SourceError> {
        let source = RunningSource::start(spec.clone()).await?;
        let dispatch_task = tokio::spawn(run_dispatch_loop(
            Arc::clone(&source),
            self.dispatch_ctx(),
        ));
        self.sources.insert(
            spec.id.clone(),
            Arc::new(RunningSourceHandle {
                source,
                dispatch_task,
            }),
        );
        Ok(())
    }

    // ---------------------------------------------------------------
    // Pipelines
    // ---------------------------------------------------------------

    pub fn create_pipeline(&self, spec: PipelineSpec) -> Result<PipelineSpec, PipelineError> {
        if self.pipeline_specs.contains_key(&spec.id) {
            return Err(PipelineError::ConfigInvalid(format!(
                "pipeline {} already exists",
                spec.id
            )));
        }
        self.put_pipeline(spec.clone())?;
        Ok(spec)
    }

    pub fn replace_pipeline(&self, id: &str, spec: PipelineSpec) -> Result<PipelineSpec, PipelineError> {
        let _ = id;
        self.put_pipeline(spec.clone())?;
        Ok(spec)
    }

    fn put_pipeline(&self, spec: PipelineSpec) -> Result<(), PipelineError> {
        let compiled = Arc::new(Pipeline::compile(spec.clone())?);
        self.pipeline_specs.insert(spec.id.clone(), spec.clone());
        let mut next: HashMap<String, Arc<Pipeline>> = (**self.pipelines.load()).clone();
        next.insert(spec.id, compiled);
        self.pipelines.store(Arc::new(next));
        Ok(())
    }

    pub fn delete_pipeline(&self, id: &str) -> Result<(), PipelineError> {
        self.pipeline_specs
            .remove(id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;
        let mut next: HashMap<String, Arc<Pipeline>> = (**self.pipelines.load()).clone();
        next.remove(id);
        self.pipelines.store(Arc::new(next));
        Ok(())
    }

    pub fn list_pipelines(&self) -> Vec<PipelineSpec> {
        self.pipeline_specs.iter().map(|e| e.value().clone()).collect()
    }

    /// `/pipelines/stats`: `[{id, name, filtered}]`.
    pub fn pipeline_stats(&self) -> Vec<serde_json::Value> {
        let snapshot = self.pipelines.load();
        snapshot
            .values()
            .map(|p| {
                serde_json::json!({
                    "id": p.spec.id,
                    "name": p.spec.name,
                    "filtered": p.counters.filtered.load(Ordering::Relaxed),
                    "processed": p.counters.processed.load(Ordering::Relaxed),
                    "errors": p.counters.errors.load(Ordering::Relaxed),
                })
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Destinations
    // ---------------------------------------------------------------

    pub fn create_destination(&self, spec: DestinationSpec) -> Result<DestinationSpec, DestinationError> {
        if self.destination_specs.contains_key(&spec.id) {
            return Err(DestinationError::ConfigInvalid(format!(
                "destination {} already exists",
                spec.id
            )));
        }
        self.put_destination(spec.clone());
        Ok(spec)
    }

    pub fn replace_destination(&self, id: &str, spec: DestinationSpec) -> Result<DestinationSpec, DestinationError> {
        let _ = id;
        self.put_destination(spec.clone());
        Ok(spec)
    }

    fn put_destination(&self, spec: DestinationSpec) {
        self.destination_specs.insert(spec.id.clone(), spec.clone());
        if !spec.enabled {
            let mut next: HashMap<String, Arc<Batcher>> = (**self.destinations.load()).clone();
            next.remove(&spec.id);
            self.destinations.store(Arc::new(next));
            return;
        }
        let batcher = Batcher::spawn(spec.clone(), self.http_client.clone(), self.config.sink_timeout());
        let mut next: HashMap<String, Arc<Batcher>> = (**self.destinations.load()).clone();
        next.insert(spec.id, batcher);
        self.destinations.store(Arc::new(next));
    }

    pub fn delete_destination(&self, id: &str) -> Result<(), DestinationError> {
        self.destination_specs
            .remove(id)
            .ok_or_else(|| DestinationError::NotFound(id.to_string()))?;
        let mut next: HashMap<String, Arc<Batcher>> = (**self.destinations.load()).clone();
        next.remove(id);
        self.destinations.store(Arc::new(next));
        Ok(())
    }

    pub fn list_destinations(&self) -> Vec<DestinationSpec> {
        self.destination_specs.iter().map(|e| e.value().clone()).collect()
    }

    pub fn destination_status(&self, id: &str) -> Option<crate::model::DestinationStatus> {
        self.destinations.load().get(id).map(|b| b.status())
    }

    // ---------------------------------------------------------------
    // Routes
    // ---------------------------------------------------------------

    /// Replaces the entire route set as a single atomic swap; routes are
    /// re-ordered as a set rather than one at a time.
    pub fn set_routes(&self, routes: Vec<RouteSpec>) -> Result<(), RouterError> {
        let table = RouteTable::compile(routes.clone())?;
        self.router.swap(table);
        *self.routes.lock() = routes;
        Ok(())
    }

    pub fn list_routes(&self) -> Vec<RouteSpec> {
        self.routes.lock().clone()
    }

    pub fn upsert_route(&self, spec: RouteSpec) -> Result<(), RouterError> {
        let mut routes = self.routes.lock().clone();
        if let Some(existing) = routes.iter_mut().find(|r| r.id == spec.id) {
            *existing = spec;
        } else {
            routes.push(spec);
        }
        self.set_routes(routes)
    }

    pub fn delete_route(&self, id: &str) -> Result<(), RouterError> {
        let mut routes = self.routes.lock().clone();
        let before = routes.len();
        routes.retain(|r| r.id != id);
        if routes.len() == before {
            return Err(RouterError::NotFound(id.to_string()));
        }
        self.set_routes(routes)
    }

    // ---------------------------------------------------------------
    // Captures
    // ---------------------------------------------------------------

    pub fn start_capture(&self, source_id: &str, format: CaptureFormat) -> anyhow::Result<CaptureInfo> {
        let source = self
            .get_source(source_id)
            .ok_or_else(|| anyhow::anyhow!("source {source_id} not found"))?;
        let sandbox = self.config.data_dir.join("captures");
        let writer = Arc::new(CaptureWriter::start(&sandbox, source_id, format)?);
        let info = writer.info().clone();
        source.hub.add_capture(Arc::clone(&writer));
        self.captures
            .insert(info.id.clone(), (source_id.to_string(), writer));
        Ok(info)
    }

    pub fn stop_capture(&self, capture_id: &str) -> anyhow::Result<()> {
        let (_, (source_id, writer)) = self
            .captures
            .remove(capture_id)
            .ok_or_else(|| anyhow::anyhow!("capture {capture_id} not found"))?;
        writer.flush();
        if let Some(source) = self.get_source(&source_id) {
            source.hub.remove_capture(capture_id);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Load test
    // ---------------------------------------------------------------

    pub async fn start_loadtest(
        self: &Arc<Self>,
        events_per_second: u64,
        size_bytes: usize,
        workers: u32,
        template: String,
        compression: bool,
    ) -> Result<(), SourceError> {
        loadtest::reset_counters();
        let spec = SourceSpec {
            id: loadtest::LoadTestRegistry::source_id().to_string(),
            name: "load test".to_string(),
            kind: crate::model::SourceKind::Synthetic {
                events_per_second,
                template,
                workers,
                size_bytes,
                compression,
            },
            enabled: true,
            ring_buffer_capacity: 10_000,
        };
        self.start_source(spec).await?;
        self.loadtest.mark_started(events_per_second);
        Ok(())
    }

    pub async fn stop_loadtest(self: &Arc<Self>) -> Result<(), SourceError> {
        let id = loadtest::LoadTestRegistry::source_id();
        if self.sources.contains_key(id) {
            self.delete_source(id).await?;
        }
        self.loadtest.mark_stopped();
        Ok(())
    }

    pub fn loadtest_status(&self) -> loadtest::LoadTestStatus {
        self.loadtest.status(loadtest::produced_total())
    }

    /// Phased shutdown: stop every Listener so no new raw record enters a
    /// ring buffer, let each source's dispatch task drain
    /// whatever is already buffered (bounded by `shutdown_grace_seconds`),
    /// then drop the destination table so every Batcher's accumulator
    /// observes its channel close and flushes its open batch.
    pub async fn shutdown(self: &Arc<Self>) {
        tracing::info!("shutdown: stopping listeners");
        let handles: Vec<Arc<RunningSourceHandle>> = self
            .sources
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        for handle in &handles {
            handle.source.stop().await;
        }

        tracing::info!("shutdown: draining dispatch tasks");
        let drain_deadline = self.config.shutdown_grace();
        tokio::time::sleep(drain_deadline).await;
        for handle in &handles {
            handle.dispatch_task.abort();
        }

        tracing::info!("shutdown: closing destination batchers");
        self.destinations.store(Arc::new(HashMap::new()));
        tokio::time::sleep(self.config.shutdown_grace()).await;
    }
}

/// Per-source dispatch task: pulls raw records off the ring buffer in
/// receive order, builds an `Event`, and runs it through the Router and
/// Pipeline Engine synchronously before handing dispatched copies to each
/// destination's Batcher. Router and Pipeline Engine are invoked
/// synchronously on the listener's post-framing task path; one task per
/// source preserves per-source FIFO order through to each destination
/// queue as long as the cursor never falls behind. A slow-consumer
/// signal here is itself counted as an ingest drop, matching the ring
/// buffer's own semantics.
async fn run_dispatch_loop(source: Arc<RunningSource>, ctx: DispatchContext) {
    let mut cursor = source.buffer.subscribe();
    let source_id = source.spec.id.clone();

    loop {
        match cursor.next().await {
            NextRecord::Record(record) => {
                let mut event = Event::from_raw(record.raw, EventMeta::new(&source_id));
                let dispatches = ctx.router.dispatch(&mut event);

                if dispatches.is_empty() {
                    continue;
                }

                let pipelines = ctx.pipelines.load();
                let destinations = ctx.destinations.load();
                let step_ctx = StepContext {
                    enrichment: Arc::clone(&ctx.enrichment),
                };

                for dispatch in dispatches {
                    let timer = std::time::Instant::now();
                    let Some(pipeline) = pipelines.get(&dispatch.pipeline_id) else {
                        tracing::warn!(pipeline = %dispatch.pipeline_id, "route references unknown pipeline");
                        continue;
                    };
                    let mut event_copy = event.clone();
                    let outcome = pipeline.run(&mut event_copy, &step_ctx);

                    metrics()
                        .pipeline_processing_seconds
                        .with_label_values(&[&dispatch.pipeline_id, &dispatch.route_name, &source_id])
                        .observe(timer.elapsed().as_secs_f64());

                    if let PipelineOutcome::Dropped = outcome {
                        continue;
                    }

                    metrics()
                        .ingest_events_total
                        .with_label_values(&[&source_id, &dispatch.route_name, &dispatch.destination_id])
                        .inc();

                    if let Some(batcher) = destinations.get(&dispatch.destination_id) {
                        batcher.enqueue(event_copy);
                    }
                }
            }
            NextRecord::SlowConsumer { skipped } => {
                source.counters.record_dropped(skipped);
            }
            NextRecord::Closed => return,
        }
    }
}
