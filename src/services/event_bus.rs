//! Event bus: bridges Postgres NOTIFY onto the gateway's channel fabric.
//!
//! A dedicated long-lived listener connection subscribes to `dcm_events`;
//! each committed `{channel, event, data}` payload is handed to the gateway
//! for fan-out. NOTIFY is at-most-once: if the listener connection drops,
//! events published during the gap are lost, the gap is logged, and
//! consumers needing durability re-query after reconnect.
//!
//! The bus also owns the metrics ticker: every 5 seconds one compact
//! aggregate query becomes a `metric.update` on the `metrics` channel.

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::adapters::postgres::NOTIFY_CHANNEL;
use crate::domain::models::{BusEvent, EventName};
use crate::domain::ports::MetricsRepository;
use crate::gateway::channels::METRICS_CHANNEL;
use crate::gateway::Gateway;

/// Interval between `metric.update` emissions.
const METRICS_INTERVAL: Duration = Duration::from_secs(5);

/// Initial reconnect backoff after a dropped listener connection.
const RECONNECT_BACKOFF_INITIAL: Duration = Duration::from_millis(500);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(30);

pub struct EventBus {
    pool: PgPool,
    gateway: Arc<Gateway>,
    metrics: Arc<dyn MetricsRepository>,
}

impl EventBus {
    pub fn new(pool: PgPool, gateway: Arc<Gateway>, metrics: Arc<dyn MetricsRepository>) -> Self {
        Self {
            pool,
            gateway,
            metrics,
        }
    }

    /// Spawn the listener loop and the metrics ticker.
    pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let bus = self.clone();
        let listener_shutdown = shutdown.clone();
        tokio::spawn(async move {
            bus.run_listener(listener_shutdown).await;
        });

        tokio::spawn(async move {
            self.run_metrics_ticker(shutdown).await;
        });
    }

    async fn run_listener(&self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = RECONNECT_BACKOFF_INITIAL;

        loop {
            if *shutdown.borrow() {
                return;
            }

            let mut listener = match PgListener::connect_with(&self.pool).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::warn!("event listener connect failed, retrying: {err}");
                    tokio::select! {
                        () = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => return,
                    }
                    backoff = (backoff * 2).min(RECONNECT_BACKOFF_MAX);
                    continue;
                }
            };

            if let Err(err) = listener.listen(NOTIFY_CHANNEL).await {
                tracing::warn!("LISTEN {NOTIFY_CHANNEL} failed, retrying: {err}");
                tokio::select! {
                    () = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => return,
                }
                backoff = (backoff * 2).min(RECONNECT_BACKOFF_MAX);
                continue;
            }

            tracing::info!("event bus listening on {NOTIFY_CHANNEL}");
            backoff = RECONNECT_BACKOFF_INITIAL;

            loop {
                tokio::select! {
                    notification = listener.recv() => {
                        match notification {
                            Ok(notification) => {
                                self.dispatch(notification.payload()).await;
                            }
                            Err(err) => {
                                // Events published during the outage are
                                // lost; consumers re-query after reconnect.
                                tracing::warn!(
                                    "event listener dropped, notifications may be lost: {err}"
                                );
                                break;
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::info!("event bus detached");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, payload: &str) {
        match serde_json::from_str::<BusEvent>(payload) {
            Ok(event) => self.gateway.broadcast(&event).await,
            Err(err) => {
                tracing::warn!("discarding malformed NOTIFY payload: {err}");
            }
        }
    }

    async fn run_metrics_ticker(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(METRICS_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.metrics.snapshot().await {
                        Ok(snapshot) => {
                            let data = match serde_json::to_value(&snapshot) {
                                Ok(data) => data,
                                Err(err) => {
                                    tracing::warn!("metrics serialization failed: {err}");
                                    continue;
                                }
                            };
                            self.gateway
                                .broadcast(&BusEvent::new(
                                    METRICS_CHANNEL,
                                    EventName::MetricUpdate,
                                    data,
                                ))
                                .await;
                        }
                        Err(err) => {
                            tracing::warn!("metrics aggregate query failed: {err}");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
