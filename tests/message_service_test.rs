//! Message service behavior against the in-memory store fake.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{EventLog, FakeMessageRepository};
use dcm::domain::errors::DomainError;
use dcm::domain::ports::{MessageFilter, MessageRepository};
use dcm::services::{MessageService, PostMessage};

fn service() -> (MessageService, Arc<FakeMessageRepository>, Arc<EventLog>) {
    let log = Arc::new(EventLog::default());
    let repo = Arc::new(FakeMessageRepository::new(log.clone()));
    (MessageService::new(repo.clone(), 3600), repo, log)
}

fn post(to: Option<&str>, ttl: Option<i64>) -> PostMessage {
    PostMessage {
        from_agent: "a".into(),
        to_agent: to.map(String::from),
        topic: "task.completed".into(),
        content: serde_json::json!({ "ok": true }),
        priority: None,
        ttl_seconds: ttl,
    }
}

#[tokio::test]
async fn direct_message_reaches_recipient_and_private_channel() {
    let (service, _repo, log) = service();
    let message = service.post_message(post(Some("b"), None)).await.unwrap();

    assert_eq!(message.priority, 0);
    assert!(message.expires_at.is_some());

    let events = log.events_named("message.new").await;
    let channels: Vec<&str> = events.iter().map(|e| e.channel.as_str()).collect();
    assert_eq!(channels, vec!["global", "agents/b"]);

    let visible = service
        .get_messages("b", MessageFilter::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert!(!visible[0].already_read);
    assert!(!visible[0].is_broadcast);

    // Not visible to a third party.
    let other = service
        .get_messages("c", MessageFilter::default())
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn broadcast_publishes_only_on_global() {
    let (service, _repo, log) = service();
    service.post_message(post(None, None)).await.unwrap();

    let events = log.events_named("message.new").await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].channel, "global");

    let visible = service
        .get_messages("anyone", MessageFilter::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert!(visible[0].is_broadcast);

    let without_broadcasts = service
        .get_messages(
            "anyone",
            MessageFilter {
                include_broadcasts: false,
                ..MessageFilter::default()
            },
        )
        .await
        .unwrap();
    assert!(without_broadcasts.is_empty());
}

#[tokio::test]
async fn invalid_topic_and_priority_rejected() {
    let (service, _repo, _log) = service();

    let mut bad_topic = post(None, None);
    bad_topic.topic = "task.exploded".into();
    assert!(matches!(
        service.post_message(bad_topic).await,
        Err(DomainError::Validation { .. })
    ));

    let mut bad_priority = post(None, None);
    bad_priority.priority = Some(11);
    assert!(matches!(
        service.post_message(bad_priority).await,
        Err(DomainError::Validation { .. })
    ));

    let mut bad_ttl = post(None, None);
    bad_ttl.ttl_seconds = Some(0);
    assert!(service.post_message(bad_ttl).await.is_err());
    let mut bad_ttl = post(None, None);
    bad_ttl.ttl_seconds = Some(86_401);
    assert!(service.post_message(bad_ttl).await.is_err());
}

#[tokio::test]
async fn non_object_content_is_wrapped() {
    let (service, _repo, _log) = service();
    let mut input = post(None, None);
    input.content = serde_json::json!("plain string");
    let message = service.post_message(input).await.unwrap();
    assert!(message.content.is_object());
    assert!(message.content.get("message").is_some());
}

#[tokio::test]
async fn ttl_expiry_hides_then_cleanup_removes() {
    let (service, repo, _log) = service();
    service.post_message(post(Some("b"), Some(1))).await.unwrap();

    let visible = service
        .get_messages("b", MessageFilter::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let visible = service
        .get_messages("b", MessageFilter::default())
        .await
        .unwrap();
    assert!(visible.is_empty(), "expired message must be filtered out");

    let removed = repo.delete_expired(chrono::Utc::now()).await.unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn mark_read_is_idempotent_and_emits_once() {
    let (service, repo, log) = service();
    let message = service.post_message(post(Some("b"), None)).await.unwrap();

    assert!(service.mark_read("b", message.id).await.unwrap());
    assert!(!service.mark_read("b", message.id).await.unwrap());
    assert!(!service.mark_read("b", message.id).await.unwrap());

    let stored = repo.get(message.id).await.unwrap().unwrap();
    assert_eq!(stored.read_by, vec!["b".to_string()]);
    assert_eq!(log.events_named("message.read").await.len(), 1);

    let visible = service
        .get_messages("b", MessageFilter::default())
        .await
        .unwrap();
    assert!(visible[0].already_read);
}

#[tokio::test]
async fn mark_read_unknown_message_is_not_found() {
    let (service, _repo, _log) = service();
    assert!(matches!(
        service.mark_read("b", uuid::Uuid::new_v4()).await,
        Err(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn topic_filter_and_limit_apply() {
    let (service, _repo, _log) = service();
    for _ in 0..3 {
        service.post_message(post(Some("b"), None)).await.unwrap();
    }
    let mut heartbeat = post(Some("b"), None);
    heartbeat.topic = "agent.heartbeat".into();
    service.post_message(heartbeat).await.unwrap();

    let filtered = service
        .get_messages(
            "b",
            MessageFilter {
                topic: dcm::domain::models::MessageTopic::from_str("agent.heartbeat"),
                ..MessageFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);

    let limited = service
        .get_messages(
            "b",
            MessageFilter {
                limit: 2,
                ..MessageFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);
}
