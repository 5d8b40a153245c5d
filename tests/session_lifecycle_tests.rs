use tutor_backend_rust::services::sessions::{
    AnswerInput, Evaluation, QuestionDraft, SessionConfig, SessionError, SessionStatus,
};
use tutor_backend_rust::services::sm2::Difficulty;

mod common;

fn config(target: i64) -> SessionConfig {
    SessionConfig {
        target_question_count: Some(target),
        focus_concept_ids: None,
        difficulty: None,
    }
}

fn question(concept: &str) -> QuestionDraft {
    QuestionDraft {
        concept_id: concept.to_lowercase(),
        concept_label: concept.to_string(),
        difficulty: Difficulty::Medium,
        question_type: "short_answer".to_string(),
        question: format!("Explain {concept}"),
        expected_answer: "...".to_string(),
        hints: vec!["think about energy".to_string()],
    }
}

fn answer(evaluation: Evaluation) -> AnswerInput {
    AnswerInput {
        user_answer: "an answer".to_string(),
        evaluation,
        feedback: "feedback".to_string(),
        mastery_change: 0.05,
        previous_mastery: 0.4,
        new_mastery: 0.45,
    }
}

fn assert_invariant(
    session: &tutor_backend_rust::services::sessions::TestSession,
) {
    assert_eq!(session.current_index as usize, session.results.len());
    assert!(session.results.len() <= session.questions.len());
}

#[tokio::test]
async fn start_session_opens_an_empty_active_session() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    let session = sessions.start_session("u1", config(3)).await.unwrap();

    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.current_index, 0);
    assert!(session.questions.is_empty());
    assert!(session.results.is_empty());
    assert_eq!(session.score, 0);
    assert_eq!(session.target_question_count, 3);

    let active = sessions.active_session("u1").await.unwrap().unwrap();
    assert_eq!(active.session_id, session.session_id);
}

#[tokio::test]
async fn invalid_target_count_is_rejected() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    let err = sessions.start_session("u1", config(0)).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidTargetCount));
}

#[tokio::test]
async fn question_append_and_current_question() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    sessions.start_session("u1", config(3)).await.unwrap();
    let session = sessions
        .add_question("u1", question("Photosynthesis"))
        .await
        .unwrap();
    assert_eq!(session.questions.len(), 1);
    assert_invariant(&session);

    let current = sessions.current_question("u1").await.unwrap().unwrap();
    assert_eq!(current.concept_label, "Photosynthesis");
}

#[tokio::test]
async fn first_correct_answer_scores_one_hundred() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    sessions.start_session("u1", config(3)).await.unwrap();
    sessions
        .add_question("u1", question("Photosynthesis"))
        .await
        .unwrap();
    let session = sessions
        .record_answer("u1", answer(Evaluation::Correct))
        .await
        .unwrap();

    assert_eq!(session.correct_count, 1);
    assert_eq!(session.current_index, 1);
    assert_eq!(session.score, 100);
    assert_invariant(&session);
}

#[tokio::test]
async fn correct_then_incorrect_scores_fifty() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    sessions.start_session("u1", config(2)).await.unwrap();
    for concept in ["Osmosis", "Diffusion"] {
        sessions.add_question("u1", question(concept)).await.unwrap();
    }
    sessions
        .record_answer("u1", answer(Evaluation::Correct))
        .await
        .unwrap();
    let session = sessions
        .record_answer("u1", answer(Evaluation::Incorrect))
        .await
        .unwrap();

    assert_eq!(session.score, 50);
    assert!(session.is_complete());
    assert_invariant(&session);
}

#[tokio::test]
async fn mixed_answers_score_seventy() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    sessions.start_session("u1", config(5)).await.unwrap();
    for i in 0..5 {
        sessions
            .add_question("u1", question(&format!("Concept{i}")))
            .await
            .unwrap();
    }
    for evaluation in [
        Evaluation::Correct,
        Evaluation::Correct,
        Evaluation::Correct,
        Evaluation::Partial,
        Evaluation::Incorrect,
    ] {
        sessions.record_answer("u1", answer(evaluation)).await.unwrap();
    }

    let session = sessions.active_session("u1").await.unwrap().unwrap();
    assert_eq!(session.correct_count, 3);
    assert_eq!(session.partial_count, 1);
    assert_eq!(session.incorrect_count, 1);
    assert_eq!(session.score, 70);
    assert_invariant(&session);
}

#[tokio::test]
async fn counters_always_agree_with_the_result_log() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    sessions.start_session("u1", config(4)).await.unwrap();
    for i in 0..4 {
        sessions
            .add_question("u1", question(&format!("Concept{i}")))
            .await
            .unwrap();
    }
    for evaluation in [
        Evaluation::Partial,
        Evaluation::Incorrect,
        Evaluation::Correct,
        Evaluation::Partial,
    ] {
        let session = sessions.record_answer("u1", answer(evaluation)).await.unwrap();

        let correct = session
            .results
            .iter()
            .filter(|r| r.evaluation == Evaluation::Correct)
            .count() as i64;
        let partial = session
            .results
            .iter()
            .filter(|r| r.evaluation == Evaluation::Partial)
            .count() as i64;
        let incorrect = session
            .results
            .iter()
            .filter(|r| r.evaluation == Evaluation::Incorrect)
            .count() as i64;

        assert_eq!(session.correct_count, correct);
        assert_eq!(session.partial_count, partial);
        assert_eq!(session.incorrect_count, incorrect);
        assert_invariant(&session);
    }
}

#[tokio::test]
async fn answer_without_session_is_a_precondition_error() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    let err = sessions
        .record_answer("u1", answer(Evaluation::Correct))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NoActiveSession));
}

#[tokio::test]
async fn answer_without_pending_question_is_rejected() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    sessions.start_session("u1", config(3)).await.unwrap();
    let err = sessions
        .record_answer("u1", answer(Evaluation::Correct))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NoPendingQuestion));
}

#[tokio::test]
async fn pause_and_resume_flip_status_only() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    sessions.start_session("u1", config(3)).await.unwrap();
    let paused = sessions.pause_session("u1").await.unwrap();
    assert_eq!(paused.status, SessionStatus::Paused);

    let resumed = sessions.resume_session("u1").await.unwrap();
    assert_eq!(resumed.status, SessionStatus::Active);
    assert_eq!(resumed.session_id, paused.session_id);
}

#[tokio::test]
async fn restart_abandons_the_previous_session() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    let first = sessions.start_session("u1", config(3)).await.unwrap();
    let second = sessions.start_session("u1", config(3)).await.unwrap();
    assert_ne!(first.session_id, second.session_id);

    let active = sessions.active_session("u1").await.unwrap().unwrap();
    assert_eq!(active.session_id, second.session_id);

    let history = sessions.session_history("u1", 10).await.unwrap();
    assert_eq!(history, vec![first.session_id.clone()]);

    let archived = sessions
        .archived_session(&first.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(archived.status, SessionStatus::Abandoned);
}

#[tokio::test]
async fn complete_archives_and_returns_a_summary() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    sessions.start_session("u1", config(1)).await.unwrap();
    sessions.add_question("u1", question("Photosynthesis")).await.unwrap();
    sessions
        .record_answer("u1", answer(Evaluation::Correct))
        .await
        .unwrap();

    let (session, summary) = sessions.complete_session("u1").await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.completed_at.is_some());
    assert_eq!(summary.score, 100);
    assert_eq!(summary.correct.len(), 1);
    assert!(summary.concepts_to_review.is_empty());

    assert!(sessions.active_session("u1").await.unwrap().is_none());

    let archived = sessions
        .archived_session(&session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(archived.status, SessionStatus::Completed);

    let history = sessions.session_history("u1", 10).await.unwrap();
    assert_eq!(history, vec![session.session_id]);
}

#[tokio::test]
async fn abandon_without_session_is_a_noop() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    let abandoned = sessions.abandon_session("u1").await.unwrap();
    assert!(abandoned.is_none());
    assert!(sessions.session_history("u1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn terminal_sessions_accept_no_further_mutation() {
    let store = common::memory_store();
    let sessions = common::session_service(&store);

    sessions.start_session("u1", config(1)).await.unwrap();
    sessions.complete_session("u1").await.unwrap();

    let err = sessions
        .add_question("u1", question("Photosynthesis"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NoActiveSession));

    let err = sessions.pause_session("u1").await.unwrap_err();
    assert!(matches!(err, SessionError::NoActiveSession));
}
