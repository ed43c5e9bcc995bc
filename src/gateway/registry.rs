//! In-memory client registry for the real-time gateway.
//!
//! Owns the client map, the channel subscriber table, and the persistent
//! per-agent subscription sets. All durable state lives in the store; none
//! of this survives a restart.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::gateway::channels::GLOBAL_CHANNEL;
use crate::gateway::protocol::ServerFrame;

/// A message queued toward one client's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    Frame(ServerFrame),
    Close { code: u16, reason: String },
}

/// Per-connection state.
#[derive(Debug)]
pub struct ClientState {
    pub client_id: String,
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
    pub authenticated: bool,
    pub subscriptions: HashSet<String>,
    pub connected_at: DateTime<Utc>,
    pub last_ping: DateTime<Utc>,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ClientState {
    /// Queue a frame for this client. Returns false when the connection's
    /// writer is gone (the client should be evicted).
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.sender.send(Outbound::Frame(frame)).is_ok()
    }

    /// Queue a close with the given code.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.sender
            .send(Outbound::Close {
                code,
                reason: reason.into(),
            })
            .is_ok()
    }
}

/// Registry of connected clients and channel subscriptions.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, ClientState>>,
    channels: RwLock<HashMap<String, HashSet<String>>>,
    /// agent_id -> channels, retained across reconnects for restoration.
    agent_subscriptions: RwLock<HashMap<String, HashSet<String>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh connection: issue a client id, auto-subscribe to
    /// `global`, and remember the outbound sender.
    pub async fn register(&self, sender: mpsc::UnboundedSender<Outbound>) -> String {
        let client_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut subscriptions = HashSet::new();
        subscriptions.insert(GLOBAL_CHANNEL.to_string());

        let state = ClientState {
            client_id: client_id.clone(),
            agent_id: None,
            session_id: None,
            authenticated: false,
            subscriptions,
            connected_at: now,
            last_ping: now,
            sender,
        };

        self.clients.write().await.insert(client_id.clone(), state);
        self.channels
            .write()
            .await
            .entry(GLOBAL_CHANNEL.to_string())
            .or_default()
            .insert(client_id.clone());

        client_id
    }

    /// Remove the client from every channel set and the client map.
    /// Returns the removed state so the caller can announce disconnects.
    pub async fn unregister(&self, client_id: &str) -> Option<ClientState> {
        let state = self.clients.write().await.remove(client_id)?;
        let mut channels = self.channels.write().await;
        for channel in &state.subscriptions {
            if let Some(subscribers) = channels.get_mut(channel) {
                subscribers.remove(client_id);
                if subscribers.is_empty() {
                    channels.remove(channel);
                }
            }
        }
        Some(state)
    }

    pub async fn subscribe(&self, client_id: &str, channel: &str) -> bool {
        let mut clients = self.clients.write().await;
        let Some(state) = clients.get_mut(client_id) else {
            return false;
        };
        state.subscriptions.insert(channel.to_string());
        let agent_id = state.agent_id.clone();
        drop(clients);

        self.channels
            .write()
            .await
            .entry(channel.to_string())
            .or_default()
            .insert(client_id.to_string());

        if let Some(agent_id) = agent_id {
            self.agent_subscriptions
                .write()
                .await
                .entry(agent_id)
                .or_default()
                .insert(channel.to_string());
        }
        true
    }

    pub async fn unsubscribe(&self, client_id: &str, channel: &str) -> bool {
        let mut clients = self.clients.write().await;
        let Some(state) = clients.get_mut(client_id) else {
            return false;
        };
        state.subscriptions.remove(channel);
        let agent_id = state.agent_id.clone();
        drop(clients);

        if let Some(subscribers) = self.channels.write().await.get_mut(channel) {
            subscribers.remove(client_id);
        }
        if let Some(agent_id) = agent_id {
            if let Some(channels) = self.agent_subscriptions.write().await.get_mut(&agent_id) {
                channels.remove(channel);
            }
        }
        true
    }

    /// Mark the client authenticated and return the persisted channel set
    /// to restore.
    pub async fn authenticate(
        &self,
        client_id: &str,
        agent_id: &str,
        session_id: Option<&str>,
    ) -> HashSet<String> {
        {
            let mut clients = self.clients.write().await;
            if let Some(state) = clients.get_mut(client_id) {
                state.agent_id = Some(agent_id.to_string());
                state.session_id = session_id.map(String::from);
                state.authenticated = true;
            }
        }
        self.agent_subscriptions
            .read()
            .await
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Queue a frame for one client. False when the client is gone or its
    /// writer has shut down.
    pub async fn send_to(&self, client_id: &str, frame: ServerFrame) -> bool {
        let clients = self.clients.read().await;
        match clients.get(client_id) {
            Some(state) => state.send(frame),
            None => false,
        }
    }

    /// Queue a close toward one client.
    pub async fn close(&self, client_id: &str, code: u16, reason: &str) -> bool {
        let clients = self.clients.read().await;
        match clients.get(client_id) {
            Some(state) => state.close(code, reason),
            None => false,
        }
    }

    /// Subscriber ids for a channel.
    pub async fn subscribers_of(&self, channel: &str) -> Vec<String> {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn touch_ping(&self, client_id: &str) {
        if let Some(state) = self.clients.write().await.get_mut(client_id) {
            state.last_ping = Utc::now();
        }
    }

    /// Clients whose `last_ping` is older than the cutoff.
    pub async fn silent_since(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.clients
            .read()
            .await
            .values()
            .filter(|state| state.last_ping < cutoff)
            .map(|state| state.client_id.clone())
            .collect()
    }

    pub async fn all_client_ids(&self) -> Vec<String> {
        self.clients.read().await.keys().cloned().collect()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_authenticated(&self, client_id: &str) -> bool {
        self.clients
            .read()
            .await
            .get(client_id)
            .is_some_and(|state| state.authenticated)
    }

    pub async fn agent_of(&self, client_id: &str) -> Option<String> {
        self.clients
            .read()
            .await
            .get(client_id)
            .and_then(|state| state.agent_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> (
        mpsc::UnboundedSender<Outbound>,
        mpsc::UnboundedReceiver<Outbound>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn register_auto_subscribes_global() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = sender();
        let client_id = registry.register(tx).await;
        assert_eq!(registry.subscribers_of("global").await, vec![client_id]);
    }

    #[tokio::test]
    async fn unregister_clears_channel_sets() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = sender();
        let client_id = registry.register(tx).await;
        registry.subscribe(&client_id, "topics/deploys").await;

        let state = registry.unregister(&client_id).await.unwrap();
        assert!(state.subscriptions.contains("topics/deploys"));
        assert!(registry.subscribers_of("global").await.is_empty());
        assert!(registry.subscribers_of("topics/deploys").await.is_empty());
    }

    #[tokio::test]
    async fn authenticated_subscriptions_persist_across_reconnect() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = sender();
        let first = registry.register(tx).await;
        registry.authenticate(&first, "agent-1", None).await;
        registry.subscribe(&first, "topics/deploys").await;
        registry.unregister(&first).await;

        let (tx2, _rx2) = sender();
        let second = registry.register(tx2).await;
        let restored = registry.authenticate(&second, "agent-1", None).await;
        assert!(restored.contains("topics/deploys"));
    }

    #[tokio::test]
    async fn send_to_dead_client_reports_failure() {
        let registry = ClientRegistry::new();
        let (tx, rx) = sender();
        let client_id = registry.register(tx).await;
        drop(rx);
        assert!(!registry.send_to(&client_id, ServerFrame::ping()).await);
    }

    #[tokio::test]
    async fn silent_clients_detected() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = sender();
        let client_id = registry.register(tx).await;

        assert!(registry
            .silent_since(Utc::now() - chrono::Duration::seconds(60))
            .await
            .is_empty());
        let stale = registry.silent_since(Utc::now() + chrono::Duration::seconds(1)).await;
        assert_eq!(stale, vec![client_id]);
    }
}
