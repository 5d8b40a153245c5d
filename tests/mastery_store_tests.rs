use std::sync::Arc;

use chrono::{Duration, Utc};

use tutor_backend_rust::services::mastery::{ConceptMastery, LearningSignal};
use tutor_backend_rust::store::{self, keys, KvStore};

mod common;

fn signal(concept: &str, delta: f64) -> LearningSignal {
    LearningSignal {
        signal_type: "test_answer".to_string(),
        concept_id: concept.to_string(),
        concept_label: concept.to_uppercase(),
        confidence: 0.8,
        mastery_delta: delta,
        timestamp: Utc::now(),
        context: None,
    }
}

/// Rewrites a record's scheduled review into the past, the way time passing
/// would, so due queries have something to find.
async fn backdate_review(store: &Arc<dyn KvStore>, user: &str, concept: &str, days: i64) {
    let key = keys::mastery_key(user, concept);
    let mut record: ConceptMastery = store::get_json(store.as_ref(), &key)
        .await
        .unwrap()
        .expect("record should exist");
    record.next_review_date = Utc::now() - Duration::days(days);
    store::put_json(store.as_ref(), &key, &record).await.unwrap();
    store
        .hash_set(
            &keys::review_queue_key(user),
            concept,
            &record.next_review_date.timestamp_millis().to_string(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn create_mastery_uses_policy_defaults() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    let record = mastery
        .create_mastery("u1", "photosynthesis", "Photosynthesis", None)
        .await
        .unwrap();

    assert!((record.mastery_score - 0.1).abs() < 1e-9);
    assert!((record.ease_factor - 2.5).abs() < 1e-9);
    assert_eq!(record.interval_days, 0);
    assert_eq!(record.total_attempts, 0);

    let until_review = record.next_review_date - record.created_at;
    assert_eq!(until_review.num_days(), 1);
}

#[tokio::test]
async fn missing_record_is_absent_not_an_error() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    assert!(mastery.mastery("u1", "nothing").await.unwrap().is_none());
    assert!(mastery
        .effective_mastery("u1", "nothing")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn signal_upserts_and_reports_the_change() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    let change = mastery
        .update_from_signal("u1", &signal("osmosis", 0.2))
        .await
        .unwrap();

    assert!((change.previous_mastery - 0.1).abs() < 1e-9);
    assert!((change.new_mastery - 0.3).abs() < 1e-9);
    assert!(change.new_confidence > change.previous_confidence);

    let record = mastery.mastery("u1", "osmosis").await.unwrap().unwrap();
    assert_eq!(record.total_attempts, 1);
    assert_eq!(record.correct_attempts, 1);
}

#[tokio::test]
async fn mastery_score_clamps_to_unit_interval() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    let change = mastery
        .update_from_signal("u1", &signal("osmosis", 5.0))
        .await
        .unwrap();
    assert!((change.new_mastery - 1.0).abs() < 1e-9);

    let change = mastery
        .update_from_signal("u1", &signal("osmosis", -5.0))
        .await
        .unwrap();
    assert!((change.new_mastery - 0.0).abs() < 1e-9);
}

#[tokio::test]
async fn confidence_caps_at_one() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    for _ in 0..10 {
        mastery
            .update_from_signal("u1", &signal("osmosis", 0.05))
            .await
            .unwrap();
    }

    let record = mastery.mastery("u1", "osmosis").await.unwrap().unwrap();
    assert!((record.confidence - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn streaks_follow_the_delta_sign() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    mastery.update_from_signal("u1", &signal("osmosis", 0.1)).await.unwrap();
    mastery.update_from_signal("u1", &signal("osmosis", 0.1)).await.unwrap();

    let record = mastery.mastery("u1", "osmosis").await.unwrap().unwrap();
    assert_eq!(record.streak_correct, 2);
    assert_eq!(record.streak_wrong, 0);

    mastery.update_from_signal("u1", &signal("osmosis", -0.1)).await.unwrap();

    let record = mastery.mastery("u1", "osmosis").await.unwrap().unwrap();
    assert_eq!(record.streak_correct, 0);
    assert_eq!(record.streak_wrong, 1);
    assert_eq!(record.total_attempts, 3);
    assert_eq!(record.correct_attempts, 2);
}

#[tokio::test]
async fn schedule_advances_through_the_sm2_ladder() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    mastery.update_from_signal("u1", &signal("osmosis", 0.1)).await.unwrap();
    let record = mastery.mastery("u1", "osmosis").await.unwrap().unwrap();
    assert_eq!(record.interval_days, 1);

    mastery.update_from_signal("u1", &signal("osmosis", 0.1)).await.unwrap();
    let record = mastery.mastery("u1", "osmosis").await.unwrap().unwrap();
    assert_eq!(record.interval_days, 6);
    assert!(record.ease_factor > 2.5);

    mastery.update_from_signal("u1", &signal("osmosis", -0.1)).await.unwrap();
    let record = mastery.mastery("u1", "osmosis").await.unwrap().unwrap();
    assert_eq!(record.interval_days, 1);
    assert!(record.ease_factor < 2.6);
}

#[tokio::test]
async fn fresh_record_has_effective_close_to_stored() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    mastery.update_from_signal("u1", &signal("osmosis", 0.4)).await.unwrap();
    let effective = mastery
        .effective_mastery("u1", "osmosis")
        .await
        .unwrap()
        .unwrap();

    assert!((effective.effective_mastery - effective.stored_mastery).abs() < 0.005);
}

#[tokio::test]
async fn stale_record_decays_at_read_time() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    let mut stale = signal("osmosis", 0.8);
    stale.timestamp = Utc::now() - Duration::days(30);
    mastery.update_from_signal("u1", &stale).await.unwrap();

    let effective = mastery
        .effective_mastery("u1", "osmosis")
        .await
        .unwrap()
        .unwrap();

    assert!((effective.stored_mastery - 0.9).abs() < 1e-9);
    assert!(effective.effective_mastery < 0.1);
    assert!(effective.days_since_interaction > 29.0);
}

#[tokio::test]
async fn ranking_orders_by_effective_not_stored_score() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    // Stored 0.9 but a month stale; decays well below the fresh 0.5.
    let mut stale = signal("stale", 0.8);
    stale.timestamp = Utc::now() - Duration::days(30);
    mastery.update_from_signal("u1", &stale).await.unwrap();
    mastery.update_from_signal("u1", &signal("fresh", 0.4)).await.unwrap();

    let weakest = mastery.weakest_concepts("u1", 10).await.unwrap();
    assert_eq!(weakest[0].record.concept_id, "stale");

    let strongest = mastery.strongest_concepts("u1", 10).await.unwrap();
    assert_eq!(strongest[0].record.concept_id, "fresh");
}

#[tokio::test]
async fn due_query_filters_on_date_regardless_of_mastery() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    mastery.update_from_signal("u1", &signal("overdue", 0.9)).await.unwrap();
    mastery.update_from_signal("u1", &signal("scheduled", 0.1)).await.unwrap();
    backdate_review(&store, "u1", "overdue", 3).await;

    let due = mastery.concepts_due_for_review("u1", 10).await.unwrap();
    let ids: Vec<&str> = due.iter().map(|c| c.record.concept_id.as_str()).collect();

    assert!(ids.contains(&"overdue"));
    assert!(!ids.contains(&"scheduled"));
    assert!(due.iter().all(|c| c.is_due_for_review));
}

#[tokio::test]
async fn summary_counts_bands_and_due() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    mastery.update_from_signal("u1", &signal("mastered", 0.9)).await.unwrap();
    mastery.update_from_signal("u1", &signal("learning", 0.4)).await.unwrap();
    mastery.update_from_signal("u1", &signal("weak", 0.05)).await.unwrap();
    backdate_review(&store, "u1", "weak", 1).await;

    let summary = mastery.mastery_summary("u1").await.unwrap();

    assert_eq!(summary.total_concepts, 3);
    assert_eq!(summary.mastered_count, 1);
    assert_eq!(summary.learning_count, 1);
    assert_eq!(summary.weak_count, 1);
    assert_eq!(summary.due_count, 1);
    assert!(summary.average_effective_mastery > 0.0);
    assert!(summary.average_effective_mastery <= 1.0);
}

#[tokio::test]
async fn remove_mastery_clears_record_and_indexes() {
    let store = common::memory_store();
    let mastery = common::mastery_service(&store);

    mastery.update_from_signal("u1", &signal("osmosis", 0.4)).await.unwrap();
    mastery.remove_mastery("u1", "osmosis").await.unwrap();

    assert!(mastery.mastery("u1", "osmosis").await.unwrap().is_none());
    assert!(mastery.weakest_concepts("u1", 10).await.unwrap().is_empty());
    assert!(mastery
        .concepts_due_for_review("u1", 10)
        .await
        .unwrap()
        .is_empty());
}
