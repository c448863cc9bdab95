//! Background maintenance scheduler
//!
//! Owns the periodic jobs the gateway needs to stay healthy: token refill,
//! idle-connection reaping, trend sweeps and stale-tracker cleanup. Each
//! job is a named tokio interval task; a panicking tick kills only its own
//! task, never a sibling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::analytics::TrendEngine;
use crate::registry::ConnectionRegistry;

const TOKEN_REFILL_INTERVAL: Duration = Duration::from_secs(60);
const IDLE_REAP_INTERVAL: Duration = Duration::from_secs(60);
const TREND_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const TRACKER_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Handle over the running maintenance tasks
pub struct Scheduler {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    /// Spawn all maintenance loops
    pub fn start(registry: Arc<ConnectionRegistry>, engine: Arc<TrendEngine>) -> Self {
        let mut tasks = Vec::new();

        let refill_registry = Arc::clone(&registry);
        tasks.push((
            "token-refill",
            tokio::spawn(run_interval("token-refill", TOKEN_REFILL_INTERVAL, move || {
                let registry = Arc::clone(&refill_registry);
                async move {
                    registry.refill_all();
                }
            })),
        ));

        let reap_registry = Arc::clone(&registry);
        tasks.push((
            "idle-reap",
            tokio::spawn(run_interval("idle-reap", IDLE_REAP_INTERVAL, move || {
                let registry = Arc::clone(&reap_registry);
                async move {
                    let reaped = registry.reap_idle();
                    if !reaped.is_empty() {
                        info!("Reaped {} idle connection(s)", reaped.len());
                    }
                }
            })),
        ));

        let sweep_engine = Arc::clone(&engine);
        tasks.push((
            "trend-sweep",
            tokio::spawn(run_interval("trend-sweep", TREND_SWEEP_INTERVAL, move || {
                let engine = Arc::clone(&sweep_engine);
                async move {
                    engine.sweep();
                }
            })),
        ));

        let cleanup_engine = Arc::clone(&engine);
        tasks.push((
            "tracker-cleanup",
            tokio::spawn(run_interval(
                "tracker-cleanup",
                TRACKER_CLEANUP_INTERVAL,
                move || {
                    let engine = Arc::clone(&cleanup_engine);
                    async move {
                        engine.evict_stale();
                    }
                },
            )),
        ));

        info!("Scheduler started {} maintenance task(s)", tasks.len());
        Self { tasks }
    }

    /// Abort every maintenance task
    pub fn shutdown(&mut self) {
        for (name, handle) in self.tasks.drain(..) {
            debug!("Stopping maintenance task {}", name);
            handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_interval<F, Fut>(name: &'static str, period: Duration, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick fires immediately; skip it so jobs start one period in
    interval.tick().await;
    loop {
        interval.tick().await;
        debug!("Maintenance tick: {}", name);
        tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::KeywordAnalyzer;
    use crate::config::GatewayConfig;
    use crate::hub::event_channel;

    #[tokio::test(start_paused = true)]
    async fn refill_task_restores_tokens() {
        let registry = Arc::new(ConnectionRegistry::new(GatewayConfig::default()));
        let (publisher, _hub) = event_channel(64);
        let engine = Arc::new(TrendEngine::new(
            Arc::new(KeywordAnalyzer),
            publisher,
            GatewayConfig::default().analytics,
        ));

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let id = registry.accept(tx, None).unwrap();
        let _ = rx.try_recv();
        for _ in 0..100 {
            assert!(registry.try_consume(id).unwrap());
        }
        assert!(!registry.try_consume(id).unwrap());

        let mut scheduler = Scheduler::start(Arc::clone(&registry), engine);
        // Let the spawned interval task register its timer before advancing
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(125)).await;
        // Let the spawned interval task observe the advanced clock
        tokio::task::yield_now().await;

        assert!(registry.try_consume(id).unwrap());
        scheduler.shutdown();
    }
}
