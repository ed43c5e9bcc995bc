//! Real-time gateway server.
//!
//! A WebSocket endpoint on its own port. Each connection gets a reader task
//! and a writer task; the writer drains a per-client queue so fan-out never
//! blocks on a slow socket. All registries are process-local; the store
//! remains the source of truth.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::domain::models::config::{GatewayConfig, Mode};
use crate::domain::models::{BusEvent, EventName};
use crate::domain::ports::SubscriptionRepository;
use crate::gateway::channels::{Channel, GLOBAL_CHANNEL};
use crate::gateway::delivery::DeliveryTracker;
use crate::gateway::protocol::{
    ClientFrame, ServerFrame, CLOSE_NORMAL, CLOSE_PING_TIMEOUT, PARSE_ERROR_CODE,
};
use crate::gateway::registry::{ClientRegistry, Outbound};
use crate::services::token_service::TokenService;

/// The real-time gateway. One instance per process, created at startup and
/// torn down at shutdown; tests can instantiate as many as they need.
pub struct Gateway {
    registry: Arc<ClientRegistry>,
    delivery: Arc<DeliveryTracker>,
    tokens: Arc<TokenService>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    config: GatewayConfig,
    mode: Mode,
}

impl Gateway {
    pub fn new(
        tokens: Arc<TokenService>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        config: GatewayConfig,
        mode: Mode,
    ) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new()),
            delivery: Arc::new(DeliveryTracker::new(
                config.retry_timeout_secs,
                config.retry_max_attempts,
            )),
            tokens,
            subscriptions,
            config,
            mode,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn delivery(&self) -> &Arc<DeliveryTracker> {
        &self.delivery
    }

    /// Serve the WebSocket endpoint until the shutdown signal flips.
    pub async fn serve(
        self: Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        let router = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(self.clone());

        tracing::info!("real-time gateway listening on {addr}");

        self.clone().spawn_heartbeat(shutdown.clone());
        self.clone().spawn_retry_sweep(shutdown.clone());

        let listener = TcpListener::bind(addr).await?;
        let mut shutdown_rx = shutdown;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await?;

        self.close_all(CLOSE_NORMAL, "shutting down").await;
        Ok(())
    }

    /// Fan an event out to every subscriber of its channel. Task, subtask
    /// and message events are tracked for at-least-once redelivery.
    ///
    /// Dead subscribers discovered mid-fan-out are removed, and their
    /// disconnect announcements join the queue rather than recursing.
    pub async fn broadcast(&self, event: &BusEvent) {
        let mut queue = VecDeque::from([event.clone()]);
        while let Some(event) = queue.pop_front() {
            for client_id in self.fan_out(&event).await {
                if let Some(announcement) = self.remove_client(&client_id).await {
                    queue.push_back(announcement);
                }
            }
        }
    }

    /// Send one event to every subscriber; returns clients whose writers
    /// are gone.
    async fn fan_out(&self, event: &BusEvent) -> Vec<String> {
        let tracked = EventName::from_str(&event.event).is_some_and(|name| name.requires_ack());
        let message_id = tracked.then(|| Uuid::new_v4().to_string());

        let frame = ServerFrame::event(
            message_id.clone(),
            event.channel.clone(),
            event.event.clone(),
            event.data.clone(),
        );

        let mut dead = Vec::new();
        for client_id in self.registry.subscribers_of(&event.channel).await {
            if self.registry.send_to(&client_id, frame.clone()).await {
                if let Some(message_id) = &message_id {
                    self.delivery.track(message_id, &client_id, frame.clone()).await;
                }
            } else {
                // Broken pipe: assume the client is gone.
                dead.push(client_id);
            }
        }
        dead
    }

    /// Drop a client from every registry; returns the disconnect
    /// announcement owed for authenticated clients.
    async fn remove_client(&self, client_id: &str) -> Option<BusEvent> {
        self.delivery.drop_client(client_id).await;
        let state = self.registry.unregister(client_id).await?;
        if !state.authenticated {
            return None;
        }
        state.agent_id.map(|agent_id| {
            BusEvent::new(
                GLOBAL_CHANNEL,
                EventName::AgentDisconnected,
                serde_json::json!({ "agent_id": agent_id }),
            )
        })
    }

    /// Handle one upgraded socket for its whole lifetime.
    async fn handle_socket(self: Arc<Self>, socket: WebSocket) {
        let (mut ws_tx, mut ws_rx) = socket.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

        let client_id = self.registry.register(out_tx).await;
        tracing::debug!(client_id = %client_id, "client connected");

        self.registry
            .send_to(&client_id, ServerFrame::connected(client_id.clone()))
            .await;

        // Writer: drains the per-client queue in order.
        let writer = tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                match outbound {
                    Outbound::Frame(frame) => {
                        let text = match serde_json::to_string(&frame) {
                            Ok(text) => text,
                            Err(_) => continue,
                        };
                        if ws_tx.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Outbound::Close { code, reason } => {
                        let _ = ws_tx
                            .send(Message::Close(Some(CloseFrame {
                                code,
                                reason: reason.into(),
                            })))
                            .await;
                        break;
                    }
                }
            }
        });

        // Reader: parse and dispatch frames until the peer goes away.
        while let Some(message) = ws_rx.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => self.handle_frame(&client_id, frame).await,
                    Err(_) => {
                        // Malformed frames never disconnect.
                        self.registry
                            .send_to(
                                &client_id,
                                ServerFrame::error("unparseable frame", PARSE_ERROR_CODE),
                            )
                            .await;
                    }
                },
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }

        self.evict(&client_id, None).await;
        writer.abort();
        tracing::debug!(client_id = %client_id, "client disconnected");
    }

    async fn handle_frame(&self, client_id: &str, frame: ClientFrame) {
        match frame {
            ClientFrame::Subscribe { channel, id } => {
                let reply = self.subscribe(client_id, &channel).await;
                let frame = match reply {
                    Ok(()) => ServerFrame::ack(id),
                    Err(reason) => ServerFrame::nack(id, reason),
                };
                self.registry.send_to(client_id, frame).await;
            }
            ClientFrame::Unsubscribe { channel, id } => {
                let frame = match Channel::parse(&channel) {
                    Some(_) => {
                        self.registry.unsubscribe(client_id, &channel).await;
                        if let Some(agent_id) = self.registry.agent_of(client_id).await {
                            let _ = self.subscriptions.remove(&agent_id, &channel).await;
                        }
                        ServerFrame::ack(id)
                    }
                    None => ServerFrame::nack(id, format!("invalid channel: {channel}")),
                };
                self.registry.send_to(client_id, frame).await;
            }
            ClientFrame::Publish {
                channel,
                event,
                data,
                id,
            } => {
                let frame = match self.publish(client_id, &channel, &event, data).await {
                    Ok(()) => ServerFrame::ack(id),
                    Err(reason) => ServerFrame::nack(id, reason),
                };
                self.registry.send_to(client_id, frame).await;
            }
            ClientFrame::Auth {
                agent_id,
                session_id,
                token,
                id,
            } => {
                self.authenticate(client_id, agent_id, session_id, token, id).await;
            }
            ClientFrame::Ping => {
                self.registry.touch_ping(client_id).await;
                self.registry.send_to(client_id, ServerFrame::pong()).await;
            }
            ClientFrame::Pong => {
                self.registry.touch_ping(client_id).await;
            }
            ClientFrame::Ack { message_id } => {
                self.delivery.ack(&message_id, client_id).await;
            }
        }
    }

    async fn subscribe(&self, client_id: &str, raw_channel: &str) -> Result<(), String> {
        let channel = Channel::parse(raw_channel)
            .ok_or_else(|| format!("invalid channel: {raw_channel}"))?;

        if let Channel::Agent(target) = &channel {
            // Private channels: only an authenticated client may join its
            // own agent channel.
            let agent = self.registry.agent_of(client_id).await;
            let authenticated = self.registry.is_authenticated(client_id).await;
            if !authenticated || agent.as_deref() != Some(target.as_str()) {
                return Err(format!("subscription to {raw_channel} denied"));
            }
        }

        self.registry.subscribe(client_id, raw_channel).await;

        // Durable topic interests survive reconnects via the store.
        if matches!(channel, Channel::Topic(_)) {
            if let Some(agent_id) = self.registry.agent_of(client_id).await {
                let _ = self.subscriptions.add(&agent_id, raw_channel).await;
            }
        }
        Ok(())
    }

    async fn publish(
        &self,
        client_id: &str,
        raw_channel: &str,
        event: &str,
        data: serde_json::Value,
    ) -> Result<(), String> {
        let channel =
            Channel::parse(raw_channel).ok_or_else(|| format!("invalid channel: {raw_channel}"))?;
        if EventName::from_str(event).is_none() {
            return Err(format!("unknown event name: {event}"));
        }
        if channel.publish_requires_auth() && !self.registry.is_authenticated(client_id).await {
            return Err("authentication required to publish on this channel".to_string());
        }

        self.broadcast(&BusEvent {
            channel: raw_channel.to_string(),
            event: event.to_string(),
            data,
        })
        .await;
        Ok(())
    }

    async fn authenticate(
        &self,
        client_id: &str,
        agent_id: Option<String>,
        session_id: Option<String>,
        token: Option<String>,
        id: Option<String>,
    ) {
        let (agent_id, session_id) = match token {
            Some(token) => match self.tokens.verify(&token) {
                Ok(claims) => (claims.agent_id, claims.session_id),
                Err(err) => {
                    tracing::warn!(client_id = %client_id, "token rejected: {err}");
                    self.registry
                        .send_to(client_id, ServerFrame::error("invalid token", "4001"))
                        .await;
                    return;
                }
            },
            None => {
                if self.mode.is_production() {
                    self.registry
                        .send_to(
                            client_id,
                            ServerFrame::error("token required in production", "4002"),
                        )
                        .await;
                    return;
                }
                match agent_id {
                    // Development shortcut: identity without proof.
                    Some(agent_id) => (agent_id, session_id),
                    None => {
                        self.registry
                            .send_to(client_id, ServerFrame::error("missing credentials", "4003"))
                            .await;
                        return;
                    }
                }
            }
        };

        let restored = self
            .registry
            .authenticate(client_id, &agent_id, session_id.as_deref())
            .await;

        self.registry
            .subscribe(client_id, &Channel::agent(&agent_id))
            .await;
        if let Some(session_id) = &session_id {
            self.registry
                .subscribe(client_id, &Channel::session(session_id))
                .await;
        }
        for channel in restored {
            self.registry.subscribe(client_id, &channel).await;
        }
        if let Ok(durable) = self.subscriptions.list_for_agent(&agent_id).await {
            for subscription in durable {
                self.registry.subscribe(client_id, &subscription.channel).await;
            }
        }

        self.registry.send_to(client_id, ServerFrame::ack(id)).await;

        self.broadcast(&BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::AgentConnected,
            serde_json::json!({ "agent_id": agent_id, "session_id": session_id }),
        ))
        .await;
    }

    /// Remove a client everywhere; optionally queue a close code first.
    async fn evict(&self, client_id: &str, close: Option<(u16, &str)>) {
        if let Some((code, reason)) = close {
            self.registry.close(client_id, code, reason).await;
        }
        if let Some(announcement) = self.remove_client(client_id).await {
            self.broadcast(&announcement).await;
        }
    }

    fn spawn_heartbeat(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.heartbeat_interval_secs);
        let timeout = ChronoDuration::seconds(self.config.heartbeat_timeout_secs as i64);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cutoff = Utc::now() - timeout;
                        for client_id in self.registry.silent_since(cutoff).await {
                            tracing::info!(client_id = %client_id, "evicting silent client");
                            self.evict(&client_id, Some((CLOSE_PING_TIMEOUT, "ping timeout"))).await;
                        }
                        for client_id in self.registry.all_client_ids().await {
                            self.registry.send_to(&client_id, ServerFrame::ping()).await;
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }

    fn spawn_retry_sweep(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.retry_interval_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for entry in self.delivery.due_retries(Utc::now()).await {
                            if !self.registry.send_to(&entry.client_id, entry.frame.clone()).await {
                                self.delivery.drop_client(&entry.client_id).await;
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
        });
    }

    async fn close_all(&self, code: u16, reason: &str) {
        for client_id in self.registry.all_client_ids().await {
            self.registry.close(&client_id, code, reason).await;
            self.registry.unregister(&client_id).await;
        }
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(gateway): State<Arc<Gateway>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| gateway.handle_socket(socket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::Mutex;

    use crate::domain::errors::DomainResult;
    use crate::domain::models::TopicSubscription;

    #[derive(Default)]
    struct MemorySubscriptionRepository {
        rows: Mutex<Vec<TopicSubscription>>,
    }

    #[async_trait]
    impl crate::domain::ports::SubscriptionRepository for MemorySubscriptionRepository {
        async fn add(&self, agent_id: &str, channel: &str) -> DomainResult<TopicSubscription> {
            let mut rows = self.rows.lock().await;
            if let Some(existing) = rows
                .iter()
                .find(|s| s.agent_id == agent_id && s.channel == channel)
            {
                return Ok(existing.clone());
            }
            let subscription = TopicSubscription::new(agent_id, channel);
            rows.push(subscription.clone());
            Ok(subscription)
        }

        async fn remove(&self, agent_id: &str, channel: &str) -> DomainResult<u64> {
            let mut rows = self.rows.lock().await;
            let before = rows.len();
            rows.retain(|s| !(s.agent_id == agent_id && s.channel == channel));
            Ok((before - rows.len()) as u64)
        }

        async fn list_for_agent(&self, agent_id: &str) -> DomainResult<Vec<TopicSubscription>> {
            Ok(self
                .rows
                .lock()
                .await
                .iter()
                .filter(|s| s.agent_id == agent_id)
                .cloned()
                .collect())
        }
    }

    fn gateway(mode: Mode) -> Arc<Gateway> {
        Arc::new(Gateway::new(
            Arc::new(TokenService::new("test-secret", 3600)),
            Arc::new(MemorySubscriptionRepository::default()),
            GatewayConfig::default(),
            mode,
        ))
    }

    async fn connect(gateway: &Gateway) -> (String, UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client_id = gateway.registry().register(tx).await;
        (client_id, rx)
    }

    /// Drain queued frames until an ack/error shows up, skipping events.
    fn next_control_frame(rx: &mut UnboundedReceiver<Outbound>) -> serde_json::Value {
        loop {
            let outbound = rx.try_recv().expect("expected a queued frame");
            if let Outbound::Frame(frame) = outbound {
                let json = serde_json::to_value(&frame).expect("serializable frame");
                if json.get("type").is_some() || json.get("code").is_some() {
                    return json;
                }
            }
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(outbound) = rx.try_recv() {
            if let Outbound::Frame(frame) = outbound {
                frames.push(serde_json::to_value(&frame).expect("serializable frame"));
            }
        }
        frames
    }

    #[tokio::test]
    async fn private_channel_denied_without_auth_and_for_other_agents() {
        let gateway = gateway(Mode::Development);
        let (client_id, mut rx) = connect(&gateway).await;

        // Unauthenticated: denied.
        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Subscribe {
                    channel: "agents/other".into(),
                    id: Some("1".into()),
                },
            )
            .await;
        let ack = next_control_frame(&mut rx);
        assert_eq!(ack["type"], "ack");
        assert_eq!(ack["success"], false);

        // Authenticate as `self` in development mode.
        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Auth {
                    agent_id: Some("self".into()),
                    session_id: None,
                    token: None,
                    id: Some("2".into()),
                },
            )
            .await;
        let ack = next_control_frame(&mut rx);
        assert_eq!(ack["type"], "ack");
        assert_eq!(ack["success"], true);

        // Own channel allowed.
        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Subscribe {
                    channel: "agents/self".into(),
                    id: Some("3".into()),
                },
            )
            .await;
        let ack = next_control_frame(&mut rx);
        assert_eq!(ack["success"], true);

        // Someone else's channel still denied.
        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Subscribe {
                    channel: "agents/other".into(),
                    id: Some("4".into()),
                },
            )
            .await;
        let ack = next_control_frame(&mut rx);
        assert_eq!(ack["success"], false);
    }

    #[tokio::test]
    async fn production_requires_token_and_rejects_invalid_ones() {
        let gateway = gateway(Mode::Production);
        let (client_id, mut rx) = connect(&gateway).await;

        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Auth {
                    agent_id: Some("self".into()),
                    session_id: None,
                    token: None,
                    id: None,
                },
            )
            .await;
        let error = next_control_frame(&mut rx);
        assert_eq!(error["code"], "4002");
        assert!(!gateway.registry().is_authenticated(&client_id).await);

        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Auth {
                    agent_id: None,
                    session_id: None,
                    token: Some("bogus.deadbeef".into()),
                    id: None,
                },
            )
            .await;
        let error = next_control_frame(&mut rx);
        assert_eq!(error["code"], "4001");
        assert!(!gateway.registry().is_authenticated(&client_id).await);
    }

    #[tokio::test]
    async fn valid_token_authenticates_and_auto_subscribes() {
        let tokens = Arc::new(TokenService::new("test-secret", 3600));
        let gateway = Arc::new(Gateway::new(
            tokens.clone(),
            Arc::new(MemorySubscriptionRepository::default()),
            GatewayConfig::default(),
            Mode::Production,
        ));
        let (client_id, mut rx) = connect(&gateway).await;

        let token = tokens.issue("worker-1", Some("sess-1")).unwrap();
        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Auth {
                    agent_id: None,
                    session_id: None,
                    token: Some(token),
                    id: Some("1".into()),
                },
            )
            .await;

        let ack = next_control_frame(&mut rx);
        assert_eq!(ack["success"], true);
        assert!(gateway.registry().is_authenticated(&client_id).await);
        assert_eq!(
            gateway.registry().agent_of(&client_id).await.as_deref(),
            Some("worker-1")
        );
        assert!(gateway
            .registry()
            .subscribers_of("agents/worker-1")
            .await
            .contains(&client_id));
        assert!(gateway
            .registry()
            .subscribers_of("sessions/sess-1")
            .await
            .contains(&client_id));

        // The connection announcement lands on global, which includes us.
        let frames = drain(&mut rx);
        assert!(frames
            .iter()
            .any(|f| f.get("event").is_some_and(|e| e == "agent.connected")));
    }

    #[tokio::test]
    async fn publish_validates_event_names_and_channel_auth() {
        let gateway = gateway(Mode::Development);
        let (client_id, mut rx) = connect(&gateway).await;

        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Publish {
                    channel: "global".into(),
                    event: "task.renamed".into(),
                    data: serde_json::json!({}),
                    id: Some("1".into()),
                },
            )
            .await;
        assert_eq!(next_control_frame(&mut rx)["success"], false);

        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Publish {
                    channel: "sessions/s1".into(),
                    event: "system.info".into(),
                    data: serde_json::json!({}),
                    id: Some("2".into()),
                },
            )
            .await;
        assert_eq!(next_control_frame(&mut rx)["success"], false);

        // Global publish needs no auth; we receive our own event first.
        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Publish {
                    channel: "global".into(),
                    event: "system.info".into(),
                    data: serde_json::json!({ "hello": true }),
                    id: Some("3".into()),
                },
            )
            .await;
        let frames = drain(&mut rx);
        assert!(frames
            .iter()
            .any(|f| f.get("event").is_some_and(|e| e == "system.info")));
        assert!(frames
            .iter()
            .any(|f| f.get("type").is_some_and(|t| t == "ack") && f["success"] == true));
    }

    #[tokio::test]
    async fn tracked_events_pend_until_acked() {
        let gateway = gateway(Mode::Development);
        let (client_id, mut rx) = connect(&gateway).await;

        gateway
            .broadcast(&BusEvent::new(
                GLOBAL_CHANNEL,
                EventName::TaskCompleted,
                serde_json::json!({ "id": 1 }),
            ))
            .await;
        assert_eq!(gateway.delivery().pending_count().await, 1);

        let frames = drain(&mut rx);
        let event = frames
            .iter()
            .find(|f| f.get("event").is_some_and(|e| e == "task.completed"))
            .expect("tracked event delivered");
        let message_id = event["id"].as_str().expect("tracked event carries id");

        gateway
            .handle_frame(
                &client_id,
                ClientFrame::Ack {
                    message_id: message_id.to_string(),
                },
            )
            .await;
        assert_eq!(gateway.delivery().pending_count().await, 0);
    }

    #[tokio::test]
    async fn untracked_events_are_fire_and_forget() {
        let gateway = gateway(Mode::Development);
        let (_client_id, mut rx) = connect(&gateway).await;

        gateway
            .broadcast(&BusEvent::new(
                GLOBAL_CHANNEL,
                EventName::SystemInfo,
                serde_json::json!({}),
            ))
            .await;
        assert_eq!(gateway.delivery().pending_count().await, 0);
        let frames = drain(&mut rx);
        let event = frames
            .iter()
            .find(|f| f.get("event").is_some())
            .expect("event delivered");
        assert!(event.get("id").is_none(), "untracked events carry no ack id");
    }

    #[tokio::test]
    async fn dead_subscriber_is_evicted_on_broadcast() {
        let gateway = gateway(Mode::Development);
        let (client_id, rx) = connect(&gateway).await;
        drop(rx);

        gateway
            .broadcast(&BusEvent::new(
                GLOBAL_CHANNEL,
                EventName::SystemInfo,
                serde_json::json!({}),
            ))
            .await;
        assert_eq!(gateway.registry().client_count().await, 0);
        assert!(gateway.registry().agent_of(&client_id).await.is_none());
    }

    #[tokio::test]
    async fn topic_subscriptions_restore_after_reconnect() {
        let gateway = gateway(Mode::Development);

        let (first, mut rx) = connect(&gateway).await;
        gateway
            .handle_frame(
                &first,
                ClientFrame::Auth {
                    agent_id: Some("worker-1".into()),
                    session_id: None,
                    token: None,
                    id: None,
                },
            )
            .await;
        gateway
            .handle_frame(
                &first,
                ClientFrame::Subscribe {
                    channel: "topics/deploys".into(),
                    id: None,
                },
            )
            .await;
        drain(&mut rx);
        gateway.evict(&first, None).await;

        let (second, _rx2) = connect(&gateway).await;
        gateway
            .handle_frame(
                &second,
                ClientFrame::Auth {
                    agent_id: Some("worker-1".into()),
                    session_id: None,
                    token: None,
                    id: None,
                },
            )
            .await;
        assert!(gateway
            .registry()
            .subscribers_of("topics/deploys")
            .await
            .contains(&second));
    }
}
