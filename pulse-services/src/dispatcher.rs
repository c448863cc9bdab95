//! Broadcast dispatcher
//!
//! Resolves the subscriber set for a message, applies each connection's
//! filters, and writes with priority-aware backpressure: critical messages
//! go to the whole matched set in one pass, everything else is delivered in
//! bounded chunks awaited one after another. Per-recipient failures are
//! contained here; `publish` never raises.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pulse_core::{Priority, ServerFrame, StreamMessage};

use crate::registry::{ConnectionId, ConnectionRegistry};

/// A recipient stuck longer than this has its frame dropped (the connection
/// stays up; the idle reaper deals with truly dead peers)
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

enum DeliveryOutcome {
    Delivered,
    Dead,
    TimedOut,
}

/// Fan-out engine over the connection registry
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    chunk_size: usize,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        let chunk_size = registry.config().dispatch.chunk_size.max(1);
        Self {
            registry,
            chunk_size,
        }
    }

    /// Deliver a message to every matching subscriber.
    ///
    /// Chunk N is fully delivered (or skipped per recipient) before chunk
    /// N+1 begins; no ordering holds between concurrent `publish` calls.
    pub async fn publish(&self, message: StreamMessage) {
        let recipients = self.registry.recipients(&message);
        if recipients.is_empty() {
            debug!("No subscribers for {} message", message.topic);
            return;
        }

        let plan = chunk_plan(recipients.len(), self.chunk_size, message.priority);
        debug!(
            "Dispatching {} {} message to {} subscribers in {} pass(es)",
            message.priority_str(),
            message.topic,
            recipients.len(),
            plan.len()
        );

        let frame = ServerFrame::StreamUpdate { message };
        let mut offset = 0;
        for size in plan {
            self.deliver(&frame, &recipients[offset..offset + size]).await;
            offset += size;
        }
    }

    /// Push an admin message to every live connection
    pub async fn admin_broadcast(&self, message: String, priority: Priority) {
        let recipients = self.registry.all_connections();
        if recipients.is_empty() {
            return;
        }
        let frame = ServerFrame::AdminMessage { message, priority };
        let plan = chunk_plan(recipients.len(), self.chunk_size, priority);
        let mut offset = 0;
        for size in plan {
            self.deliver(&frame, &recipients[offset..offset + size]).await;
            offset += size;
        }
    }

    /// Deliver one chunk, awaiting every recipient in it.
    ///
    /// Dead recipients are silently deregistered; successful deliveries
    /// refresh the connection's activity timestamp (idempotent, so an
    /// aborted broadcast leaves no inconsistent state behind).
    async fn deliver(
        &self,
        frame: &ServerFrame,
        chunk: &[(ConnectionId, mpsc::Sender<ServerFrame>)],
    ) {
        let sends = chunk.iter().map(|(id, sender)| {
            let frame = frame.clone();
            async move {
                match tokio::time::timeout(SEND_TIMEOUT, sender.send(frame)).await {
                    Ok(Ok(())) => (*id, DeliveryOutcome::Delivered),
                    Ok(Err(_)) => (*id, DeliveryOutcome::Dead),
                    Err(_) => (*id, DeliveryOutcome::TimedOut),
                }
            }
        });

        for (id, outcome) in join_all(sends).await {
            match outcome {
                DeliveryOutcome::Delivered => self.registry.touch(id),
                DeliveryOutcome::Dead => {
                    debug!("Recipient {} is gone, deregistering", id);
                    self.registry.disconnect(id, "dead_recipient");
                }
                DeliveryOutcome::TimedOut => {
                    warn!("Delivery to {} timed out, frame dropped", id);
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

trait PriorityStr {
    fn priority_str(&self) -> &'static str;
}

impl PriorityStr for StreamMessage {
    fn priority_str(&self) -> &'static str {
        match self.priority {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

/// Partition a fan-out of `total` recipients into delivery passes.
///
/// Critical traffic trades fairness for latency: one unbounded pass.
/// Everything else is bounded to `chunk_size` per pass.
fn chunk_plan(total: usize, chunk_size: usize, priority: Priority) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    if priority == Priority::Critical {
        return vec![total];
    }
    let mut plan = Vec::with_capacity(total.div_ceil(chunk_size));
    let mut remaining = total;
    while remaining > 0 {
        let size = remaining.min(chunk_size);
        plan.push(size);
        remaining -= size;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use pulse_core::{FilterSet, Priority, StreamPayload, Topic};
    use tokio::sync::mpsc::Receiver;

    #[test]
    fn critical_is_one_unbounded_pass() {
        assert_eq!(chunk_plan(500, 50, Priority::Critical), vec![500]);
    }

    #[test]
    fn medium_fanout_is_chunked() {
        assert_eq!(chunk_plan(120, 50, Priority::Medium), vec![50, 50, 20]);
        assert_eq!(chunk_plan(50, 50, Priority::Low), vec![50]);
        assert_eq!(chunk_plan(0, 50, Priority::Medium), Vec::<usize>::new());
    }

    fn trend_message(symbols: &[&str], priority: Priority) -> StreamMessage {
        StreamMessage::new(
            Topic::RealTimeTrends,
            StreamPayload::RealTimeTrend {
                symbol: symbols.first().unwrap_or(&"X").to_string(),
                previous_sentiment: 0.0,
                current_sentiment: 0.5,
                change: 0.5,
                volume: 1,
            },
            priority,
        )
        .with_symbols(symbols.iter().map(|s| s.to_string()).collect())
    }

    fn subscribed_client(
        registry: &Arc<ConnectionRegistry>,
        filters: Option<FilterSet>,
    ) -> (ConnectionId, Receiver<ServerFrame>) {
        let (tx, mut rx) = mpsc::channel(256);
        let id = registry.accept(tx, None).unwrap();
        // Drain the accept ack
        let _ = rx.try_recv();
        registry
            .subscribe(id, &["real_time_trends".to_string()], filters)
            .unwrap();
        (id, rx)
    }

    #[tokio::test]
    async fn every_matching_subscriber_receives_a_medium_fanout() {
        let registry = Arc::new(ConnectionRegistry::new(GatewayConfig::default()));
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        let mut clients = Vec::new();
        for _ in 0..120 {
            clients.push(subscribed_client(&registry, None));
        }

        dispatcher
            .publish(trend_message(&["AAPL"], Priority::Medium))
            .await;

        for (_, rx) in &mut clients {
            match rx.try_recv().unwrap() {
                ServerFrame::StreamUpdate { message } => {
                    assert_eq!(message.topic, Topic::RealTimeTrends);
                }
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn filters_gate_delivery_per_connection() {
        let registry = Arc::new(ConnectionRegistry::new(GatewayConfig::default()));
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        let (_aapl_id, mut aapl_rx) = subscribed_client(
            &registry,
            Some(FilterSet {
                symbols: Some(vec!["AAPL".to_string()]),
                ..FilterSet::default()
            }),
        );
        let (_open_id, mut open_rx) = subscribed_client(&registry, None);

        dispatcher
            .publish(trend_message(&["TSLA"], Priority::Medium))
            .await;

        assert!(aapl_rx.try_recv().is_err());
        assert!(matches!(
            open_rx.try_recv().unwrap(),
            ServerFrame::StreamUpdate { .. }
        ));
    }

    #[tokio::test]
    async fn dead_recipient_is_deregistered_silently() {
        let registry = Arc::new(ConnectionRegistry::new(GatewayConfig::default()));
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        let (dead_id, dead_rx) = subscribed_client(&registry, None);
        let (live_id, mut live_rx) = subscribed_client(&registry, None);
        drop(dead_rx);

        dispatcher
            .publish(trend_message(&["AAPL"], Priority::Critical))
            .await;

        assert!(!registry.contains(dead_id));
        assert!(registry.contains(live_id));
        assert!(matches!(
            live_rx.try_recv().unwrap(),
            ServerFrame::StreamUpdate { .. }
        ));
    }

    #[tokio::test]
    async fn unsubscribed_topics_receive_nothing() {
        let registry = Arc::new(ConnectionRegistry::new(GatewayConfig::default()));
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        let (tx, mut rx) = mpsc::channel(16);
        let id = registry.accept(tx, None).unwrap();
        let _ = rx.try_recv();
        registry
            .subscribe(id, &["breaking_news".to_string()], None)
            .unwrap();

        dispatcher
            .publish(trend_message(&["AAPL"], Priority::High))
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn admin_broadcast_reaches_every_connection() {
        let registry = Arc::new(ConnectionRegistry::new(GatewayConfig::default()));
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        // Not subscribed to anything: admin messages still arrive
        let (tx, mut rx) = mpsc::channel(16);
        let _id = registry.accept(tx, None).unwrap();
        let _ = rx.try_recv();

        dispatcher
            .admin_broadcast("maintenance at 22:00 UTC".to_string(), Priority::High)
            .await;

        match rx.try_recv().unwrap() {
            ServerFrame::AdminMessage { message, priority } => {
                assert_eq!(message, "maintenance at 22:00 UTC");
                assert_eq!(priority, Priority::High);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}
