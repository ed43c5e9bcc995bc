//! Wave controller lifecycle against the in-memory store fake.

mod common;

use chrono::Utc;
use std::sync::Arc;

use common::{EventLog, FakeTaskListRepository, FakeWaveRepository};
use dcm::domain::errors::DomainError;
use dcm::domain::models::WaveStatus;
use dcm::domain::ports::WaveAggregate;
use dcm::services::WaveController;

fn controller() -> (WaveController, Arc<FakeWaveRepository>, Arc<EventLog>) {
    let log = Arc::new(EventLog::default());
    let waves = Arc::new(FakeWaveRepository::new(log.clone()));
    let task_lists = Arc::new(FakeTaskListRepository::default());
    (
        WaveController::new(waves.clone(), task_lists),
        waves,
        log,
    )
}

#[tokio::test]
async fn get_or_create_is_idempotent() {
    let (controller, _waves, _log) = controller();
    let first = controller.get_or_create_wave("s1", 0).await.unwrap();
    let second = controller.get_or_create_wave("s1", 0).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.status, WaveStatus::Pending);
    assert_eq!(second.total_tasks, 0);
}

#[tokio::test]
async fn negative_wave_numbers_rejected() {
    let (controller, _waves, _log) = controller();
    assert!(matches!(
        controller.get_or_create_wave("s1", -1).await,
        Err(DomainError::Validation { .. })
    ));
}

#[tokio::test]
async fn mixed_outcomes_fail_the_wave_with_counters() {
    let (controller, waves, log) = controller();

    controller.get_or_create_wave("s1", 0).await.unwrap();
    waves.set_total("s1", 0, 2).await;
    controller.start_wave("s1", 0).await.unwrap();

    // First subtask completes: wave stays running.
    let wave = controller.complete_task("s1", 0, false).await.unwrap();
    assert_eq!(wave.completed_tasks, 1);
    assert_eq!(wave.failed_tasks, 0);
    assert_eq!(wave.status, WaveStatus::Running);

    // Second fails: terminal, failed wins.
    let wave = controller.complete_task("s1", 0, true).await.unwrap();
    assert_eq!(wave.status, WaveStatus::Failed);
    assert_eq!(wave.completed_tasks, 1);
    assert_eq!(wave.failed_tasks, 1);
    assert!(wave.completed_at.is_some());

    let failures = log.events_named("wave.failed").await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].channel, "global");
    assert_eq!(failures[0].data["completed_tasks"], 1);
    assert_eq!(failures[0].data["failed_tasks"], 1);
    assert!(failures[0].data["duration_ms"].is_i64());
}

#[tokio::test]
async fn all_complete_wave_completes() {
    let (controller, waves, log) = controller();
    controller.get_or_create_wave("s1", 0).await.unwrap();
    waves.set_total("s1", 0, 2).await;
    controller.start_wave("s1", 0).await.unwrap();

    controller.complete_task("s1", 0, false).await.unwrap();
    let wave = controller.complete_task("s1", 0, false).await.unwrap();
    assert_eq!(wave.status, WaveStatus::Completed);
    assert_eq!(log.events_named("wave.completed").await.len(), 1);
    assert!(log.events_named("wave.failed").await.is_empty());
}

#[tokio::test]
async fn counter_invariant_holds_throughout() {
    let (controller, waves, _log) = controller();
    controller.get_or_create_wave("s1", 0).await.unwrap();
    waves.set_total("s1", 0, 5).await;
    controller.start_wave("s1", 0).await.unwrap();

    for i in 0..5 {
        let wave = controller.complete_task("s1", 0, i % 2 == 0).await.unwrap();
        assert!(wave.counters_consistent());
    }
}

#[tokio::test]
async fn start_gated_on_prior_waves_terminal() {
    let (controller, waves, log) = controller();
    controller.get_or_create_wave("s1", 0).await.unwrap();
    controller.get_or_create_wave("s1", 1).await.unwrap();
    waves.set_total("s1", 0, 1).await;

    // Wave 1 cannot start while wave 0 is open.
    controller.start_wave("s1", 0).await.unwrap();
    assert!(matches!(
        controller.start_wave("s1", 1).await,
        Err(DomainError::Conflict(_))
    ));

    controller.complete_task("s1", 0, false).await.unwrap();
    let wave = controller.start_wave("s1", 1).await.unwrap();
    assert_eq!(wave.status, WaveStatus::Running);

    let transitions = log.events_named("wave.transitioned").await;
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[1].data["from"], 0);
    assert_eq!(transitions[1].data["to"], 1);
}

#[tokio::test]
async fn start_is_idempotent_when_running() {
    let (controller, _waves, _log) = controller();
    controller.get_or_create_wave("s1", 0).await.unwrap();
    controller.start_wave("s1", 0).await.unwrap();
    let again = controller.start_wave("s1", 0).await.unwrap();
    assert_eq!(again.status, WaveStatus::Running);
}

#[tokio::test]
async fn transition_starts_the_next_existing_wave() {
    let (controller, waves, _log) = controller();
    controller.get_or_create_wave("s1", 0).await.unwrap();
    controller.get_or_create_wave("s1", 1).await.unwrap();
    waves.set_total("s1", 0, 1).await;
    controller.start_wave("s1", 0).await.unwrap();
    controller.complete_task("s1", 0, false).await.unwrap();

    let next = controller.transition_to_next_wave("s1").await.unwrap();
    assert_eq!(next.map(|w| (w.wave_number, w.status)), Some((1, WaveStatus::Running)));

    // No wave 2: transition is a no-op.
    assert!(controller.transition_to_next_wave("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn current_prefers_running_over_pending() {
    let (controller, _waves, _log) = controller();
    assert!(controller.get_current_wave("s1").await.unwrap().is_none());

    controller.get_or_create_wave("s1", 0).await.unwrap();
    let current = controller.get_current_wave("s1").await.unwrap().unwrap();
    assert_eq!(current.status, WaveStatus::Pending);

    controller.start_wave("s1", 0).await.unwrap();
    let current = controller.get_current_wave("s1").await.unwrap().unwrap();
    assert_eq!(current.status, WaveStatus::Running);
}

#[tokio::test]
async fn history_falls_back_to_task_list_aggregates() {
    let log = Arc::new(EventLog::default());
    let waves = Arc::new(FakeWaveRepository::new(log));
    let task_lists = Arc::new(FakeTaskListRepository::default());
    task_lists.aggregates.lock().await.extend([
        WaveAggregate {
            wave_number: 0,
            total_tasks: 2,
            completed_tasks: 2,
            failed_tasks: 0,
            earliest_started: Some(Utc::now()),
            latest_completed: Some(Utc::now()),
        },
        WaveAggregate {
            wave_number: 1,
            total_tasks: 3,
            completed_tasks: 1,
            failed_tasks: 0,
            earliest_started: Some(Utc::now()),
            latest_completed: None,
        },
    ]);
    let controller = WaveController::new(waves, task_lists);

    let history = controller.get_wave_history("s1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, WaveStatus::Completed);
    assert_eq!(history[0].total_tasks, 2);
    assert_eq!(history[1].status, WaveStatus::Running);
    assert_eq!(history[1].completed_tasks, 1);
}
