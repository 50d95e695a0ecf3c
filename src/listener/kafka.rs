//! Kafka source listener: a consumer group subscribed to N topics; each
//! message's value is one record; offsets are committed only after the
//! record is enqueued (at-least-once).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use tokio::task::JoinHandle;

use crate::error::SourceError;
use crate::model::{SourceKind, SourceSpec};

use super::{stopped, FrameSink};

pub async fn spawn(
    spec: SourceSpec,
    sink: FrameSink,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, SourceError> {
    let SourceKind::Kafka {
        brokers,
        topics,
        group_id,
    } = spec.kind.clone()
    else {
        unreachable!("kafka::spawn called with non-kafka source kind")
    };

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers.join(","))
        .set("group.id", &group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .set("session.timeout.ms", "6000")
        .create()
        .map_err(|e| SourceError::StartFailed {
            reason: format!("kafka consumer create: {e}"),
        })?;

    let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
    consumer
        .subscribe(&topic_refs)
        .map_err(|e| SourceError::StartFailed {
            reason: format!("kafka subscribe {topics:?}: {e}"),
        })?;

    Ok(tokio::spawn(run(consumer, sink, stop)))
}

async fn run(consumer: StreamConsumer, sink: FrameSink, stop: Arc<AtomicBool>) {
    loop {
        if stopped(&stop) {
            return;
        }
        let recv = tokio::time::timeout(std::time::Duration::from_millis(500), consumer.recv()).await;
        match recv {
            Ok(Ok(message)) => {
                match message.payload_view::<str>() {
                    Some(Ok(text)) => sink.accept(text.to_string()),
                    Some(Err(_)) => sink.record_framing_error(),
                    None => {}
                }
                // Commit only after the record has been enqueued into the
                // ring buffer, matching the at-least-once contract.
                if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                    tracing::warn!(error = %e, "kafka offset commit failed");
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "kafka consumer error");
                sink.record_framing_error();
            }
            Err(_) => {} // poll timeout: loop back and re-check `stop`
        }
    }
}
