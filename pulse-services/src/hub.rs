//! Event hub
//!
//! One explicit publish/subscribe channel for producer events. Analysis
//! producers (and the trend engine itself) hold an [`EventPublisher`]; the
//! gateway runs a single consumer loop that maps each event to a stream
//! message and hands it to the dispatcher. There is no ambient global
//! emitter: whoever needs to publish is handed a publisher explicitly.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pulse_core::{AnalysisEvent, Priority, StreamMessage, StreamPayload};

use crate::analytics::TrendEngine;
use crate::dispatcher::Dispatcher;

/// Clone-able handle producers use to publish events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<AnalysisEvent>,
}

impl EventPublisher {
    /// Wrap a raw sender (tests observe the channel directly)
    pub(crate) fn from_sender(tx: mpsc::Sender<AnalysisEvent>) -> Self {
        Self { tx }
    }

    /// Publish an event, fire-and-forget.
    ///
    /// Uses `try_send` so a publisher never blocks (or deadlocks the hub
    /// loop publishing into its own queue); a full hub drops the event with
    /// a warning.
    pub fn publish(&self, event: AnalysisEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("Event hub rejected event: {}", e);
        }
    }
}

/// Consumer half of the hub
pub struct EventHub {
    rx: mpsc::Receiver<AnalysisEvent>,
}

/// Create a connected publisher/hub pair
pub fn event_channel(capacity: usize) -> (EventPublisher, EventHub) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventPublisher { tx }, EventHub { rx })
}

impl EventHub {
    /// Consume events until every publisher is dropped.
    ///
    /// `ContentProcessed` is the ingestion path: it runs through the trend
    /// engine first and the analyzed result is broadcast. Every other event
    /// maps directly to a stream message.
    pub async fn run(mut self, engine: Arc<TrendEngine>, dispatcher: Arc<Dispatcher>) {
        info!("Event hub consumer started");
        while let Some(event) = self.rx.recv().await {
            match event {
                AnalysisEvent::ContentProcessed {
                    content_id,
                    text,
                    source,
                    categories,
                } => {
                    let analysis = engine
                        .process_content(&content_id, &text, &source, &categories)
                        .await;
                    let message = StreamMessage::new(
                        pulse_core::Topic::ContentProcessed,
                        StreamPayload::ContentAnalysis {
                            content_id: content_id.clone(),
                            sentiment: analysis.sentiment,
                            categories,
                            summary: None,
                        },
                        Priority::Medium,
                    )
                    .with_source(source)
                    .with_content_id(content_id)
                    .with_symbols(analysis.symbols);
                    dispatcher.publish(message).await;
                }
                other => {
                    if let Some(message) = other.into_stream_message() {
                        dispatcher.publish(message).await;
                    } else {
                        debug!("Event produced no stream message");
                    }
                }
            }
        }
        info!("Event hub consumer stopped: all publishers dropped");
    }
}
