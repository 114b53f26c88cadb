//! The per-action pipeline: validation, generation, commit, conclusion.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use serde_json::json;
use uuid::Uuid;

use questforge_core::error::GeneratorError;
use questforge_core::session::{LogEntryKind, TokenUsage};
use questforge_engine::{EngineConfig, SessionEngine, TurnResult};
use questforge_test_support::{RecordingStore, ScriptedGenerator, StallingGenerator, StepClock};

use common::{definition, engine_with, narrative_response, opening};

/// Creates a session with one joined member and returns the pieces the test
/// needs to drive and inspect it.
async fn session_with(
    store: Arc<RecordingStore>,
    generator: Arc<ScriptedGenerator>,
    config: EngineConfig,
) -> (SessionEngine, Uuid, Uuid) {
    let engine = engine_with(store, generator, config);
    let session_id = Uuid::new_v4();
    let member_id = Uuid::new_v4();
    engine
        .create_session(session_id, definition(), opening())
        .await
        .unwrap();
    engine.join(session_id, member_id).await;
    (engine, session_id, member_id)
}

#[tokio::test]
async fn test_a_committed_turn_bumps_the_version_and_appends_two_entries() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let mut response = narrative_response(
        "The torch throws long shadows down the stairwell.",
        json!({ "location": "crypt stairs" }),
        &["descend", "turn back"],
    );
    response.usage = Some(TokenUsage {
        prompt_tokens: 640,
        completion_tokens: 88,
    });
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(response)]));
    let (engine, session_id, member_id) =
        session_with(store.clone(), generator, EngineConfig::default()).await;

    // Act: "use torch" prefix-matches the carried "a rusty torch".
    let result = engine
        .submit_action(session_id, member_id, "use torch".to_owned())
        .await
        .unwrap();

    // Assert
    let update = match result {
        TurnResult::Updated(update) => update,
        other => panic!("expected Updated, got {other:?}"),
    };
    assert_eq!(update.version, 2);
    assert_eq!(update.state["location"], json!("crypt stairs"));
    assert_eq!(
        update.available_actions,
        vec!["descend".to_owned(), "turn back".to_owned()]
    );
    assert_eq!(
        update.usage,
        Some(TokenUsage {
            prompt_tokens: 640,
            completion_tokens: 88,
        })
    );

    // Opening narrative + player action + new narrative.
    assert_eq!(update.log.len(), 3);
    assert_eq!(update.log[1].kind, LogEntryKind::Player);
    assert_eq!(update.log[1].text, "use torch");
    assert_eq!(update.log[1].member_id, Some(member_id));
    assert_eq!(update.log[2].kind, LogEntryKind::Narrative);

    // The whole record was durably committed at the new version.
    let record = store.record(session_id).unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.log.len(), 3);
}

#[tokio::test]
async fn test_a_rejected_action_logs_once_and_leaves_the_version_alone() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(Vec::new()));
    let (engine, session_id, member_id) =
        session_with(store.clone(), generator.clone(), EngineConfig::default()).await;

    // Act: no sword in the inventory.
    let result = engine
        .submit_action(session_id, member_id, "use sword".to_owned())
        .await
        .unwrap();

    // Assert
    let message = match result {
        TurnResult::ValidationRejected { message } => message,
        other => panic!("expected ValidationRejected, got {other:?}"),
    };
    assert!(message.contains("sword"));

    let snapshot = engine.get_snapshot(session_id).await.unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.log.len(), 2);
    assert_eq!(snapshot.log[1].kind, LogEntryKind::Player);

    // The generator was never consulted, and the action went through the
    // independent durable append.
    assert!(generator.requests().is_empty());
    assert_eq!(store.appends().len(), 1);
    assert_eq!(store.record(session_id).unwrap().version, 1);
}

#[tokio::test]
async fn test_a_generation_timeout_aborts_without_a_version_bump() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let engine = engine_with(
        store.clone(),
        Arc::new(StallingGenerator),
        EngineConfig {
            generation_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        },
    );
    let session_id = Uuid::new_v4();
    let member_id = Uuid::new_v4();
    engine
        .create_session(session_id, definition(), opening())
        .await
        .unwrap();
    engine.join(session_id, member_id).await;

    // Act
    let result = engine
        .submit_action(session_id, member_id, "look around".to_owned())
        .await
        .unwrap();

    // Assert
    assert!(matches!(result, TurnResult::GenerationFailed { .. }));
    let snapshot = engine.get_snapshot(session_id).await.unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.log.len(), 2);
    assert_eq!(snapshot.log[1].text, "look around");
    assert_eq!(store.record(session_id).unwrap().version, 1);
}

#[tokio::test]
async fn test_a_generator_error_still_leaves_the_action_on_durable_record() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![Err(GeneratorError::Backend(
        "model overloaded".to_owned(),
    ))]));
    let (engine, session_id, member_id) =
        session_with(store.clone(), generator, EngineConfig::default()).await;

    // Act
    let result = engine
        .submit_action(session_id, member_id, "look around".to_owned())
        .await
        .unwrap();

    // Assert
    let message = match result {
        TurnResult::GenerationFailed { message } => message,
        other => panic!("expected GenerationFailed, got {other:?}"),
    };
    assert!(message.contains("model overloaded"));
    assert_eq!(store.appends().len(), 1);
    assert_eq!(store.record(session_id).unwrap().log.len(), 2);
}

#[tokio::test]
async fn test_an_empty_narrative_counts_as_a_generation_failure() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(narrative_response(
        "   ",
        json!({}),
        &[],
    ))]));
    let (engine, session_id, member_id) =
        session_with(store, generator, EngineConfig::default()).await;

    // Act
    let result = engine
        .submit_action(session_id, member_id, "look around".to_owned())
        .await
        .unwrap();

    // Assert
    assert!(matches!(result, TurnResult::GenerationFailed { .. }));
    assert_eq!(
        engine.get_snapshot(session_id).await.unwrap().version,
        1
    );
}

#[tokio::test]
async fn test_repeated_failed_turns_raise_the_stuck_flag() {
    // Arrange: two failures, then a success; the third attempt crosses the
    // default threshold of 3.
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Err(GeneratorError::Backend("overloaded".to_owned())),
        Err(GeneratorError::Backend("overloaded".to_owned())),
        Ok(narrative_response("The fog thins at last.", json!({}), &[])),
    ]));
    let (engine, session_id, member_id) =
        session_with(store, generator.clone(), EngineConfig::default()).await;

    // Act
    for _ in 0..3 {
        engine
            .submit_action(session_id, member_id, "look around".to_owned())
            .await
            .unwrap();
    }

    // Assert: attempts 1 and 2 were not stuck, attempt 3 was, and every
    // request carried the first unmet required plot point as the hint.
    let requests = generator.requests();
    assert_eq!(requests.len(), 3);
    assert!(!requests[0].stuck);
    assert!(!requests[1].stuck);
    assert!(requests[2].stuck);
    for request in &requests {
        assert_eq!(
            request.next_required_plot_point.as_deref(),
            Some("find the crypt key")
        );
    }
}

#[tokio::test]
async fn test_a_failed_durable_save_rolls_the_turn_back() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(narrative_response(
        "The vault door grinds open.",
        json!({ "door": "open" }),
        &["enter"],
    ))]));
    let (engine, session_id, member_id) =
        session_with(store.clone(), generator, EngineConfig::default()).await;
    store.fail_saves(true);

    // Act
    let result = engine
        .submit_action(session_id, member_id, "look around".to_owned())
        .await
        .unwrap();

    // Assert
    assert!(matches!(result, TurnResult::CommitFailed { .. }));

    // No version advance, no narrative entry, no state change; only the
    // independently appended player action remains.
    let snapshot = engine.get_snapshot(session_id).await.unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.log.len(), 2);
    assert_eq!(snapshot.log[1].kind, LogEntryKind::Player);
    assert_eq!(snapshot.state["door"], json!("locked"));
    assert_eq!(
        snapshot.available_actions,
        vec!["look around".to_owned(), "use torch".to_owned()]
    );
}

#[tokio::test]
async fn test_a_commit_failure_does_not_poison_the_next_turn() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(narrative_response("First try.", json!({}), &[])),
        Ok(narrative_response(
            "Second try lands.",
            json!({ "location": "crypt stairs" }),
            &["descend"],
        )),
    ]));
    let (engine, session_id, member_id) =
        session_with(store.clone(), generator, EngineConfig::default()).await;

    store.fail_saves(true);
    let failed = engine
        .submit_action(session_id, member_id, "look around".to_owned())
        .await
        .unwrap();
    assert!(matches!(failed, TurnResult::CommitFailed { .. }));
    store.fail_saves(false);

    // Act
    let result = engine
        .submit_action(session_id, member_id, "press on".to_owned())
        .await
        .unwrap();

    // Assert: version moved 1 -> 2 exactly once across both turns.
    let update = match result {
        TurnResult::Updated(update) => update,
        other => panic!("expected Updated, got {other:?}"),
    };
    assert_eq!(update.version, 2);
    assert_eq!(update.state["location"], json!("crypt stairs"));
    // Log: opening + two player actions + one narrative.
    assert_eq!(update.log.len(), 4);
}

#[tokio::test]
async fn test_delta_keys_outside_the_schema_are_dropped_not_fatal() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(narrative_response(
        "A strange hum fills the air.",
        json!({ "location": "crypt stairs", "mana": 40 }),
        &[],
    ))]));
    let (engine, session_id, member_id) =
        session_with(store, generator, EngineConfig::default()).await;

    // Act
    let result = engine
        .submit_action(session_id, member_id, "look around".to_owned())
        .await
        .unwrap();

    // Assert
    let update = match result {
        TurnResult::Updated(update) => update,
        other => panic!("expected Updated, got {other:?}"),
    };
    assert_eq!(update.state["location"], json!("crypt stairs"));
    assert!(!update.state.contains_key("mana"));
}

#[tokio::test]
async fn test_an_achieved_plot_point_is_recorded_once_and_resets_progress() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(narrative_response(
            "Under the altar you find a blackened key.",
            json!({ "achieved_plot_point": "Find the Crypt Key" }),
            &["unlock the door"],
        )),
        Ok(narrative_response(
            "You already hold the key.",
            json!({ "achieved_plot_point": "find the crypt key" }),
            &[],
        )),
    ]));
    let (engine, session_id, member_id) =
        session_with(store.clone(), generator.clone(), EngineConfig::default()).await;

    // Act
    engine
        .submit_action(session_id, member_id, "search the altar".to_owned())
        .await
        .unwrap();
    engine
        .submit_action(session_id, member_id, "search again".to_owned())
        .await
        .unwrap();

    // Assert: the marker was normalized to the declared description and not
    // recorded twice, and the hint moved past the completed plot point.
    let record = store.record(session_id).unwrap();
    assert_eq!(
        record.completed_plot_points,
        vec!["find the crypt key".to_owned()]
    );
    // Turn 1 reset the counter; turn 2's repeat marker did not reset again,
    // so its own attempt is still on the books.
    assert_eq!(record.turns_since_progress, 1);

    let requests = generator.requests();
    assert_eq!(requests[1].next_required_plot_point, None);
}

#[tokio::test]
async fn test_meeting_every_gate_concludes_the_session() {
    // Arrange: one turn achieves the required plot point and opens the door
    // the conclusion condition watches.
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(narrative_response(
        "The key turns; the vault door swings wide.",
        json!({ "achieved_plot_point": "find the crypt key", "door": "open" }),
        &[],
    ))]));
    let (engine, session_id, member_id) =
        session_with(store.clone(), generator, EngineConfig::default()).await;

    // Act
    let result = engine
        .submit_action(session_id, member_id, "unlock the vault".to_owned())
        .await
        .unwrap();

    // Assert
    let (update, summary) = match result {
        TurnResult::Concluded { update, summary } => (update, summary),
        other => panic!("expected Concluded, got {other:?}"),
    };
    assert_eq!(update.version, 2);
    assert!(summary.contains("find the crypt key"));
    assert!(store.record(session_id).unwrap().concluded);
}

#[tokio::test]
async fn test_a_concluded_session_is_read_only() {
    // Arrange
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(narrative_response(
        "The vault door swings wide.",
        json!({ "achieved_plot_point": "find the crypt key", "door": "open" }),
        &[],
    ))]));
    let (engine, session_id, member_id) =
        session_with(store.clone(), generator, EngineConfig::default()).await;
    engine
        .submit_action(session_id, member_id, "unlock the vault".to_owned())
        .await
        .unwrap();
    let log_before = engine.get_snapshot(session_id).await.unwrap().log.len();

    // Act
    let result = engine
        .submit_action(session_id, member_id, "look around".to_owned())
        .await
        .unwrap();

    // Assert: rejected without even a log append.
    assert!(matches!(result, TurnResult::ValidationRejected { .. }));
    let snapshot = engine.get_snapshot(session_id).await.unwrap();
    assert_eq!(snapshot.log.len(), log_before);
    assert_eq!(snapshot.version, 2);
}

#[tokio::test]
async fn test_a_malformed_conclusion_condition_keeps_the_session_going() {
    // Arrange: the condition list is garbage, the required plot point is
    // achieved; evaluation fails and the session simply continues.
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(narrative_response(
        "The key is yours.",
        json!({ "achieved_plot_point": "find the crypt key" }),
        &[],
    ))]));
    let mut definition = definition();
    definition.conclusion_conditions = vec![json!("victory")];
    let engine = engine_with(store.clone(), generator, EngineConfig::default());
    let session_id = Uuid::new_v4();
    let member_id = Uuid::new_v4();
    engine
        .create_session(session_id, definition, opening())
        .await
        .unwrap();
    engine.join(session_id, member_id).await;

    // Act
    let result = engine
        .submit_action(session_id, member_id, "search the altar".to_owned())
        .await
        .unwrap();

    // Assert
    assert!(matches!(result, TurnResult::Updated(_)));
    assert!(!store.record(session_id).unwrap().concluded);
}

#[tokio::test]
async fn test_turns_for_one_session_resolve_serially_in_order() {
    // Arrange: a ticking clock makes the serialization visible in the log
    // timestamps.
    let store = Arc::new(RecordingStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(narrative_response("First.", json!({}), &[])),
        Ok(narrative_response("Second.", json!({}), &[])),
    ]));
    let clock = StepClock::new(
        chrono::Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap(),
        chrono::Duration::seconds(1),
    );
    let engine = Arc::new(SessionEngine::new(
        store,
        generator,
        Arc::new(clock),
        EngineConfig::default(),
    ));
    let session_id = Uuid::new_v4();
    let member_id = Uuid::new_v4();
    let other_member = Uuid::new_v4();
    engine
        .create_session(session_id, definition(), opening())
        .await
        .unwrap();
    engine.join(session_id, member_id).await;
    engine.join(session_id, other_member).await;

    // Act: two members race; the per-session queue serializes them.
    let (first, second) = tokio::join!(
        engine.submit_action(session_id, member_id, "press on".to_owned()),
        engine.submit_action(session_id, other_member, "follow".to_owned()),
    );
    first.unwrap();
    second.unwrap();

    // Assert: versions 2 and 3 were assigned once each, the log grew by two
    // entries per turn with no interleaving inside a turn, and timestamps
    // are strictly ordered.
    let snapshot = engine.get_snapshot(session_id).await.unwrap();
    assert_eq!(snapshot.version, 3);
    assert_eq!(snapshot.log.len(), 5);
    assert_eq!(snapshot.log[1].kind, LogEntryKind::Player);
    assert_eq!(snapshot.log[2].kind, LogEntryKind::Narrative);
    assert_eq!(snapshot.log[3].kind, LogEntryKind::Player);
    assert_eq!(snapshot.log[4].kind, LogEntryKind::Narrative);
    for window in snapshot.log.windows(2) {
        assert!(window[0].occurred_at < window[1].occurred_at);
    }
}
