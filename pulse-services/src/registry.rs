//! Connection registry
//!
//! Owns all per-connection state: active subscriptions, filters, the token
//! bucket, liveness timestamps and the outbound frame channel. Commands from
//! the read loop mutate it; the dispatcher and scheduler read and sweep it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use pulse_core::{
    ConnectionSnapshot, FilterSet, GatewayError, GatewayResult, RateLimitInfo, ServerFrame,
    StreamMessage, Topic,
};

use crate::config::GatewayConfig;
use crate::rate_limiter::TokenBucket;

/// Unique identifier for a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// State owned exclusively by the gateway for one connection
#[derive(Debug)]
pub struct ConnectionState {
    pub subscriptions: HashSet<Topic>,
    pub filters: FilterSet,
    pub identity: Option<String>,
    pub bucket: TokenBucket,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    sender: mpsc::Sender<ServerFrame>,
}

/// Fire-and-forget analytics events for external telemetry collaborators
#[derive(Debug, Clone, Serialize)]
pub enum TelemetryEvent {
    ConnectionClosed {
        connection_id: u64,
        duration_secs: i64,
        reason: String,
    },
}

/// Result of a subscribe command
#[derive(Debug, Clone)]
pub struct SubscribeOutcome {
    /// Valid topics from the request (unknown names already dropped)
    pub accepted: Vec<Topic>,
    /// Full subscription set after the union
    pub active: Vec<Topic>,
    /// Filters after the merge
    pub filters: FilterSet,
}

/// Result of an unsubscribe command
#[derive(Debug, Clone)]
pub struct UnsubscribeOutcome {
    pub removed: Vec<Topic>,
    pub active: Vec<Topic>,
}

/// Aggregate registry statistics (pure read, no side effects)
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_connections: usize,
    pub subscribers_per_topic: HashMap<String, usize>,
    pub mean_subscriptions: f64,
}

/// Registry of all live connections, keyed by connection id
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    /// Slot counter gating `accept`; the map alone is check-then-insert and
    /// racing accepts could overshoot the ceiling
    active: AtomicUsize,
    connections: DashMap<ConnectionId, ConnectionState>,
    config: GatewayConfig,
    telemetry_tx: broadcast::Sender<TelemetryEvent>,
}

impl ConnectionRegistry {
    pub fn new(config: GatewayConfig) -> Self {
        let (telemetry_tx, _) = broadcast::channel(256);
        Self {
            next_id: AtomicU64::new(1),
            active: AtomicUsize::new(0),
            connections: DashMap::new(),
            config,
            telemetry_tx,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Accept a new connection, handing it a full token bucket.
    ///
    /// Rejects with `CapacityExceeded` at the configured ceiling; on success
    /// the `connection_established` ack is pushed down the frame channel.
    pub fn accept(
        &self,
        sender: mpsc::Sender<ServerFrame>,
        identity: Option<String>,
    ) -> GatewayResult<ConnectionId> {
        let max = self.config.max_connections;
        // Reserve a slot atomically; every reservation is followed by an
        // insert and every removal releases the slot in disconnect
        let reserve = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            });
        if let Err(current) = reserve {
            warn!("Rejecting connection: {} of {} slots in use", current, max);
            return Err(GatewayError::CapacityExceeded { current, max });
        }

        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();

        let ack = ServerFrame::ConnectionEstablished {
            connection_id: id.to_string(),
            available_topics: Topic::ALL.to_vec(),
            rate_limit: RateLimitInfo {
                max_tokens: self.config.rate_limit.max_tokens,
                refill_rate: self.config.rate_limit.refill_rate,
                refill_interval_secs: self.config.rate_limit.refill_interval.as_secs(),
            },
        };
        if sender.try_send(ack).is_err() {
            debug!("Connection {} closed before the accept ack", id);
        }

        self.connections.insert(
            id,
            ConnectionState {
                subscriptions: HashSet::new(),
                filters: FilterSet::default(),
                identity,
                bucket: TokenBucket::full(self.config.rate_limit.max_tokens),
                connected_at: now,
                last_activity: now,
                sender,
            },
        );

        info!("Connection accepted: {}", id);
        Ok(id)
    }

    /// Remove a connection and emit the closure telemetry event.
    ///
    /// Fire-and-forget: the telemetry send never blocks teardown.
    pub fn disconnect(&self, id: ConnectionId, reason: &str) {
        if let Some((_, state)) = self.connections.remove(&id) {
            self.active.fetch_sub(1, Ordering::SeqCst);
            let duration_secs = (Utc::now() - state.connected_at).num_seconds();
            let _ = self.telemetry_tx.send(TelemetryEvent::ConnectionClosed {
                connection_id: id.0,
                duration_secs,
                reason: reason.to_string(),
            });
            info!(
                "Connection {} closed after {}s ({})",
                id, duration_secs, reason
            );
        }
    }

    /// Admin force-disconnect: a terminal notice, then removal
    pub fn force_disconnect(&self, id: ConnectionId, reason: &str) -> GatewayResult<()> {
        let sender = self
            .connections
            .get(&id)
            .map(|state| state.sender.clone())
            .ok_or(GatewayError::InvalidSession(id.0))?;
        let _ = sender.try_send(ServerFrame::ForcedDisconnect {
            reason: reason.to_string(),
        });
        self.disconnect(id, "forced_disconnect");
        Ok(())
    }

    /// Take one rate-limit token for an inbound command.
    ///
    /// `Ok(false)` means the caller must reject the command with a
    /// `rate_limited` frame and leave all state untouched.
    pub fn try_consume(&self, id: ConnectionId) -> GatewayResult<bool> {
        let mut state = self
            .connections
            .get_mut(&id)
            .ok_or(GatewayError::InvalidSession(id.0))?;
        Ok(state.bucket.try_consume())
    }

    /// Subscribe to topics, merging any supplied filters.
    ///
    /// Unknown topic names are dropped; an entirely invalid request fails
    /// with `NoValidTopics` and mutates nothing.
    pub fn subscribe(
        &self,
        id: ConnectionId,
        raw_types: &[String],
        filters: Option<FilterSet>,
    ) -> GatewayResult<SubscribeOutcome> {
        let accepted = Topic::parse_many(raw_types);
        if accepted.is_empty() {
            return Err(GatewayError::NoValidTopics);
        }

        let mut state = self
            .connections
            .get_mut(&id)
            .ok_or(GatewayError::InvalidSession(id.0))?;

        for topic in &accepted {
            state.subscriptions.insert(*topic);
        }
        if let Some(partial) = filters {
            state.filters.merge(partial);
        }
        state.last_activity = Utc::now();

        debug!("{} subscribed to {:?}", id, accepted);
        Ok(SubscribeOutcome {
            active: sorted_topics(&state.subscriptions),
            filters: state.filters.clone(),
            accepted,
        })
    }

    /// Unsubscribe from topics; per-topic no-op when not subscribed
    pub fn unsubscribe(
        &self,
        id: ConnectionId,
        raw_types: &[String],
    ) -> GatewayResult<UnsubscribeOutcome> {
        let requested = Topic::parse_many(raw_types);
        let mut state = self
            .connections
            .get_mut(&id)
            .ok_or(GatewayError::InvalidSession(id.0))?;

        let mut removed = Vec::new();
        for topic in requested {
            if state.subscriptions.remove(&topic) {
                removed.push(topic);
            }
        }
        state.last_activity = Utc::now();

        debug!("{} unsubscribed from {:?}", id, removed);
        Ok(UnsubscribeOutcome {
            active: sorted_topics(&state.subscriptions),
            removed,
        })
    }

    /// Shallow-merge a partial filter set into the active filters
    pub fn update_filters(
        &self,
        id: ConnectionId,
        partial: FilterSet,
    ) -> GatewayResult<FilterSet> {
        let mut state = self
            .connections
            .get_mut(&id)
            .ok_or(GatewayError::InvalidSession(id.0))?;
        state.filters.merge(partial);
        state.last_activity = Utc::now();
        Ok(state.filters.clone())
    }

    /// Read-only snapshot for client self-inspection
    pub fn status(&self, id: ConnectionId) -> GatewayResult<ConnectionSnapshot> {
        let state = self
            .connections
            .get(&id)
            .ok_or(GatewayError::InvalidSession(id.0))?;
        Ok(ConnectionSnapshot {
            connection_id: id.to_string(),
            subscriptions: sorted_topics(&state.subscriptions),
            filters: state.filters.clone(),
            connected_at: state.connected_at,
            last_activity: state.last_activity,
            rate_tokens: state.bucket.tokens(),
        })
    }

    /// Queue a frame for one connection.
    ///
    /// Fails with `InvalidSession` once the connection has been removed, so
    /// a read loop replying through the registry observes its own eviction.
    /// A full channel drops the frame rather than blocking the caller.
    pub fn push_frame(&self, id: ConnectionId, frame: ServerFrame) -> GatewayResult<()> {
        let sender = self
            .connections
            .get(&id)
            .map(|state| state.sender.clone())
            .ok_or(GatewayError::InvalidSession(id.0))?;
        if sender.try_send(frame).is_err() {
            debug!("Frame channel for {} is full or closed, frame dropped", id);
        }
        Ok(())
    }

    /// Idempotent activity refresh (used after successful dispatch)
    pub fn touch(&self, id: ConnectionId) {
        if let Some(mut state) = self.connections.get_mut(&id) {
            state.last_activity = Utc::now();
        }
    }

    /// Resolve the recipients of a message: subscribed to its topic and
    /// passing their own filter set. Senders are cloned out so delivery
    /// never holds registry locks.
    pub fn recipients(
        &self,
        message: &StreamMessage,
    ) -> Vec<(ConnectionId, mpsc::Sender<ServerFrame>)> {
        self.connections
            .iter()
            .filter(|entry| {
                entry.subscriptions.contains(&message.topic)
                    && entry.filters.matches(message)
            })
            .map(|entry| (*entry.key(), entry.sender.clone()))
            .collect()
    }

    /// Every live connection's sender (admin broadcast)
    pub fn all_connections(&self) -> Vec<(ConnectionId, mpsc::Sender<ServerFrame>)> {
        self.connections
            .iter()
            .map(|entry| (*entry.key(), entry.sender.clone()))
            .collect()
    }

    /// Refill every connection's token bucket (scheduler tick)
    pub fn refill_all(&self) {
        let rate = self.config.rate_limit.refill_rate;
        for mut entry in self.connections.iter_mut() {
            entry.bucket.refill(rate);
        }
    }

    /// Evict connections idle past the configured window.
    ///
    /// Each evicted connection receives exactly one `timeout` frame before
    /// its state is removed.
    pub fn reap_idle(&self) -> Vec<ConnectionId> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.idle_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(30));

        let stale: Vec<(ConnectionId, mpsc::Sender<ServerFrame>)> = self
            .connections
            .iter()
            .filter(|entry| entry.last_activity < cutoff)
            .map(|entry| (*entry.key(), entry.sender.clone()))
            .collect();

        for (id, sender) in &stale {
            let _ = sender.try_send(ServerFrame::Timeout {
                idle_secs: self.config.idle_window.as_secs(),
            });
            self.disconnect(*id, "idle_timeout");
        }

        if !stale.is_empty() {
            info!("Reaped {} idle connections", stale.len());
        }
        stale.into_iter().map(|(id, _)| id).collect()
    }

    /// Aggregate statistics; pure read
    pub fn stats(&self) -> RegistryStats {
        let total = self.connections.len();
        let mut per_topic: HashMap<String, usize> = HashMap::new();
        let mut subscription_total = 0usize;
        for entry in self.connections.iter() {
            subscription_total += entry.subscriptions.len();
            for topic in &entry.subscriptions {
                *per_topic.entry(topic.as_str().to_string()).or_default() += 1;
            }
        }
        RegistryStats {
            total_connections: total,
            subscribers_per_topic: per_topic,
            mean_subscriptions: if total == 0 {
                0.0
            } else {
                subscription_total as f64 / total as f64
            },
        }
    }

    /// Subscribe to fire-and-forget telemetry events
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Backdate a connection's activity timestamp (test hook for reaping)
    #[cfg(test)]
    pub(crate) fn backdate_activity(&self, id: ConnectionId, secs: i64) {
        if let Some(mut state) = self.connections.get_mut(&id) {
            state.last_activity = Utc::now() - chrono::Duration::seconds(secs);
        }
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.connections.len())
            .field("max_connections", &self.config.max_connections)
            .finish()
    }
}

/// Topics in protocol order, for deterministic frames
fn sorted_topics(set: &HashSet<Topic>) -> Vec<Topic> {
    Topic::ALL.iter().copied().filter(|t| set.contains(t)).collect()
}
