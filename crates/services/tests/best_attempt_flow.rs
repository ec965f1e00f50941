use std::sync::Arc;

use edu_core::model::{
    AnswerRecord, Attempt, AttemptId, Question, QuestionId, QuizType, SlotKey, UserId,
};
use edu_core::time::fixed_now;
use services::{AppConfig, AppServices, AttemptService, Clock, CurrentBest, SaveOutcome};
use storage::local::{KeyValueStore, MemoryStore};
use storage::repository::{AttemptRepository, QuestionRepository, Storage};
use storage::InMemoryRepository;

const USER: UserId = UserId::new(1);

fn attempt(slot: &SlotKey, total: u32, correct: u32) -> Attempt {
    Attempt::new(
        AttemptId::generate(),
        slot.clone(),
        fixed_now(),
        total,
        correct,
        total - correct,
    )
    .unwrap()
}

fn answers(area: &str, correct: u32, total: u32) -> Vec<AnswerRecord> {
    (0..total)
        .map(|i| AnswerRecord {
            question_id: QuestionId::new(u64::from(i) + 1),
            area: Some(area.to_owned()),
            selected_option: Some(0),
            is_correct: i < correct,
        })
        .collect()
}

async fn services(repo: &InMemoryRepository) -> AppServices {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    AppServices::from_storage(
        Storage::from_repository(repo.clone()),
        store,
        &AppConfig::default(),
        Clock::fixed(fixed_now()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn sixty_then_seventy_five_then_ninety_on_fewer_questions() {
    let repo = InMemoryRepository::new();
    let app = services(&repo).await;
    let attempts = app.attempts();
    let slot = SlotKey::new(QuizType::Area, Some("Lógica"), None);

    let first = attempt(&slot, 20, 12);
    assert!(matches!(
        attempts
            .save_attempt(USER, &first, &answers("Lógica", 12, 20))
            .await
            .unwrap(),
        SaveOutcome::Saved {
            replaced: false,
            ..
        }
    ));

    let second = attempt(&slot, 20, 15);
    assert!(matches!(
        attempts
            .save_attempt(USER, &second, &answers("Lógica", 15, 20))
            .await
            .unwrap(),
        SaveOutcome::Saved { replaced: true, .. }
    ));

    let third = attempt(&slot, 15, 14);
    assert_eq!(third.percentage(), 93);
    let outcome = attempts
        .save_attempt(USER, &third, &answers("Lógica", 14, 15))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SaveOutcome::NotImproved {
            current_best: CurrentBest::Local(id)
        } if id == second.id()
    ));

    let best = repo.find_best(USER, &slot).await.unwrap().unwrap();
    assert_eq!(best.attempt, second);
    assert_eq!(
        attempts.best_attempt(USER, &slot).await.unwrap(),
        Some(second)
    );
}

#[tokio::test]
async fn equal_or_worse_percentage_keeps_first_best() {
    let repo = InMemoryRepository::new();
    let svc = AttemptService::new(Arc::new(repo.clone()), Arc::new(MemoryStore::new()));
    let slot = SlotKey::general(QuizType::General);

    let a = attempt(&slot, 10, 7);
    svc.save_attempt(USER, &a, &[]).await.unwrap();
    for b in [attempt(&slot, 10, 7), attempt(&slot, 20, 13)] {
        let outcome = svc.save_attempt(USER, &b, &[]).await.unwrap();
        assert!(!outcome.is_accepted());
    }

    assert_eq!(
        repo.find_best(USER, &slot).await.unwrap().unwrap().attempt,
        a
    );
}

#[tokio::test]
async fn accepted_save_forces_mastery_recompute() {
    let repo = InMemoryRepository::new();
    let app = services(&repo).await;
    let slot = SlotKey::new(QuizType::Area, Some("Português"), None);

    app.attempts()
        .save_attempt(USER, &attempt(&slot, 4, 1), &answers("Português", 1, 4))
        .await
        .unwrap();
    assert_eq!(
        app.mastery().mastery(USER).await.unwrap().get("Português"),
        Some(25)
    );

    app.attempts()
        .save_attempt(USER, &attempt(&slot, 4, 3), &answers("Português", 3, 4))
        .await
        .unwrap();
    assert_eq!(
        app.mastery().mastery(USER).await.unwrap().get("Português"),
        Some(75)
    );
}

#[tokio::test]
async fn offline_quiz_still_finishes() {
    let repo = InMemoryRepository::new();
    for id in 1..=3 {
        let q = Question::new(
            QuestionId::new(id),
            Some("Lógica"),
            None,
            format!("Q{id}"),
            vec!["a".into(), "b".into()],
            1,
            "",
        )
        .unwrap();
        repo.upsert_question(&q).await.unwrap();
    }
    let app = services(&repo).await;
    let quiz = app.quiz();
    let slot = SlotKey::new(QuizType::Area, Some("Lógica"), None);

    let mut session = quiz.start(USER, &slot, 3).await.unwrap();
    while !session.is_complete() {
        quiz.answer(USER, &mut session, 0).unwrap();
    }
    assert_eq!(app.review_queue().entries(USER).len(), 3);

    repo.set_offline(true);
    let finished = quiz.finish(USER, session).await.unwrap();
    assert_eq!(finished.attempt.percentage(), 0);
    assert!(matches!(finished.outcome, SaveOutcome::LocalOnly { .. }));
    assert_eq!(
        app.attempts().best_attempt(USER, &slot).await.unwrap(),
        Some(finished.attempt)
    );
    assert!(quiz.snapshot(USER, &slot).is_none());
}
