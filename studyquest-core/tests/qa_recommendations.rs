//! Recommendation ranking through the engine facade: category priority,
//! starter sets, staleness, and the optional narrative.

use chrono::Duration;
use std::sync::Arc;
use studyquest_core::engine::{Engine, EngineConfig, QuizSubmission};
use studyquest_core::model::{Difficulty, UserId};
use studyquest_core::recommend::{RecommendationCategory, DEFAULT_TOPICS};
use studyquest_core::store::{MemoryStore, ProgressStore};
use studyquest_core::testing::MockGenerator;

fn harness() -> (Arc<MemoryStore>, Engine<MemoryStore, MockGenerator>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::with_generator(
        store.clone(),
        EngineConfig::default(),
        MockGenerator::new(),
    );
    (store, engine)
}

fn submit(user: &str, topic: &str, correct: u32, total: u32) -> QuizSubmission {
    QuizSubmission {
        user_id: UserId::from(user),
        topic: topic.to_string(),
        difficulty: Difficulty::Medium,
        correct,
        total,
    }
}

/// Backdate a topic's last attempt so it counts as stale.
fn age_topic(store: &MemoryStore, user: &UserId, topic: &str, days: i64) {
    store
        .with_user(user, &mut |state| {
            if let Some(progress) = state.topics.get_mut(topic) {
                progress.last_attempted_at = progress.last_attempted_at - Duration::days(days);
            }
            Ok(())
        })
        .unwrap();
}

#[tokio::test]
async fn qa_new_user_gets_starter_topics() {
    let (_, engine) = harness();

    let report = engine
        .recommendations(&UserId::from("fresh"), None, false)
        .await
        .unwrap();

    assert_eq!(report.recommendations.len(), 5);
    assert!(report
        .recommendations
        .iter()
        .all(|r| r.category == RecommendationCategory::NewLearning));
    assert_eq!(report.recommendations[0].topic, DEFAULT_TOPICS[0]);
    assert_eq!(report.overall_stats.total_attempts, 0);
    assert!(report.narrative.is_none());
}

#[tokio::test]
async fn qa_weak_then_review_then_new() {
    let (store, engine) = harness();
    let user = UserId::from("u");

    // Weak: 40%. Stale-but-strong: 90%, backdated 10 days. Fresh: 95%.
    engine.submit_quiz(submit("u", "Algorithms", 4, 10)).unwrap();
    engine.submit_quiz(submit("u", "SQL", 9, 10)).unwrap();
    engine.submit_quiz(submit("u", "Python Programming", 19, 20)).unwrap();
    age_topic(&store, &user, "SQL", 10);

    let report = engine.recommendations(&user, Some(4), false).await.unwrap();
    let recs = &report.recommendations;

    assert_eq!(recs[0].topic, "Algorithms");
    assert_eq!(recs[0].category, RecommendationCategory::WeakArea);
    assert_eq!(recs[0].recommended_difficulty, Difficulty::Easy);
    assert!(recs[0].reason.contains("40%"));

    assert_eq!(recs[1].topic, "SQL");
    assert_eq!(recs[1].category, RecommendationCategory::Review);
    assert_eq!(recs[1].recommended_difficulty, Difficulty::Hard);

    // Remaining slots fill from the catalog, skipping studied topics.
    assert_eq!(recs.len(), 4);
    for rec in &recs[2..] {
        assert_eq!(rec.category, RecommendationCategory::NewLearning);
        assert_ne!(rec.topic, "Python Programming");
    }

    assert_eq!(report.overall_stats.total_attempts, 3);
    assert_eq!(report.overall_stats.topics_studied, 3);
}

#[tokio::test]
async fn qa_weak_areas_fill_before_anything_else() {
    let (_, engine) = harness();
    let user = UserId::from("u");

    engine.submit_quiz(submit("u", "A", 1, 10)).unwrap();
    engine.submit_quiz(submit("u", "B", 3, 10)).unwrap();
    engine.submit_quiz(submit("u", "C", 5, 10)).unwrap();

    let report = engine.recommendations(&user, Some(2), false).await.unwrap();

    // Largest gap first, and the cap cuts the list before any new topics.
    let topics: Vec<&str> = report
        .recommendations
        .iter()
        .map(|r| r.topic.as_str())
        .collect();
    assert_eq!(topics, vec!["A", "B"]);
    assert!(report
        .recommendations
        .iter()
        .all(|r| r.category == RecommendationCategory::WeakArea));
}

#[tokio::test]
async fn qa_narrative_attached_on_request() {
    let (_, engine) = harness();
    let user = UserId::from("u");

    engine.submit_quiz(submit("u", "Rust", 5, 10)).unwrap();

    let without = engine.recommendations(&user, None, false).await.unwrap();
    assert!(without.narrative.is_none());

    let with = engine.recommendations(&user, None, true).await.unwrap();
    let narrative = with.narrative.unwrap();
    assert!(!narrative.motivational_message.is_empty());
    assert!(!narrative.priority_advice.is_empty());
}

#[tokio::test]
async fn qa_estimated_xp_reflects_difficulty_and_gap() {
    let (_, engine) = harness();
    let user = UserId::from("u");

    engine.submit_quiz(submit("u", "Rust", 4, 10)).unwrap();

    let report = engine.recommendations(&user, Some(1), false).await.unwrap();
    let rec = &report.recommendations[0];
    // Easy tier (120) plus the improvement bonus (70-40)*0.5 = 15.
    assert_eq!(rec.estimated_xp_gain, 135);
}
