use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::sm2::Difficulty;
use crate::services::summary::{self, TestSessionSummary};
use crate::store::{self, keys, KvStore, StoreError};

const DEFAULT_TARGET_QUESTION_COUNT: i64 = 5;
const MAX_TARGET_QUESTION_COUNT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Evaluation {
    Correct,
    Partial,
    Incorrect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestQuestion {
    pub question_id: String,
    pub concept_id: String,
    pub concept_label: String,
    pub difficulty: Difficulty,
    pub question_type: String,
    pub question: String,
    pub expected_answer: String,
    pub hints: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub question_id: String,
    pub question_index: i64,
    pub user_answer: String,
    pub evaluation: Evaluation,
    pub feedback: String,
    pub mastery_change: f64,
    pub previous_mastery: f64,
    pub new_mastery: f64,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSession {
    pub session_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub target_question_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_concept_ids: Option<Vec<String>>,
    pub difficulty: Difficulty,
    pub questions: Vec<TestQuestion>,
    pub current_index: i64,
    pub results: Vec<TestResult>,
    pub score: i64,
    pub correct_count: i64,
    pub partial_count: i64,
    pub incorrect_count: i64,
}

impl TestSession {
    /// Answer-count driven: complete once enough answers landed, no matter
    /// how many questions were appended.
    pub fn is_complete(&self) -> bool {
        self.results.len() as i64 >= self.target_question_count
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub target_question_count: Option<i64>,
    pub focus_concept_ids: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub concept_id: String,
    pub concept_label: String,
    pub difficulty: Difficulty,
    pub question_type: String,
    pub question: String,
    pub expected_answer: String,
    #[serde(default)]
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub user_answer: String,
    pub evaluation: Evaluation,
    pub feedback: String,
    pub mastery_change: f64,
    pub previous_mastery: f64,
    pub new_mastery: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no open test session for this user")]
    NoActiveSession,
    #[error("no unanswered question to record a result against")]
    NoPendingQuestion,
    #[error("targetQuestionCount must be between 1 and 100")]
    InvalidTargetCount,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `score = round(100 * (correct + 0.5 * partial) / answered)`, 0 when
/// nothing has been answered yet.
pub fn compute_score(correct_count: i64, partial_count: i64, answered: i64) -> i64 {
    if answered == 0 {
        return 0;
    }
    let weighted = correct_count as f64 + 0.5 * partial_count as f64;
    (100.0 * weighted / answered as f64).round() as i64
}

/// Owns the single open session per user. "Single open" is a store-enforced
/// convention, not a lock: concurrent starts race and the last whole-blob
/// write wins, matching the rest of the persistence model.
pub struct SessionService {
    store: Arc<dyn KvStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Opens a fresh session, abandoning any session still open for the
    /// user first.
    pub async fn start_session(
        &self,
        user_id: &str,
        config: SessionConfig,
    ) -> Result<TestSession, SessionError> {
        let target = config
            .target_question_count
            .unwrap_or(DEFAULT_TARGET_QUESTION_COUNT);
        if !(1..=MAX_TARGET_QUESTION_COUNT).contains(&target) {
            return Err(SessionError::InvalidTargetCount);
        }

        if let Some(mut open) = self.active_session(user_id).await? {
            open.status = SessionStatus::Abandoned;
            open.completed_at = Some(Utc::now());
            open.updated_at = Utc::now();
            self.archive_session(&open).await;
        }

        let now = Utc::now();
        let session = TestSession {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            status: SessionStatus::Active,
            started_at: now,
            updated_at: now,
            completed_at: None,
            target_question_count: target,
            focus_concept_ids: config.focus_concept_ids,
            difficulty: config.difficulty.unwrap_or(Difficulty::Medium),
            questions: Vec::new(),
            current_index: 0,
            results: Vec::new(),
            score: 0,
            correct_count: 0,
            partial_count: 0,
            incorrect_count: 0,
        };
        self.write_open(&session).await?;
        Ok(session)
    }

    pub async fn active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<TestSession>, SessionError> {
        let session: Option<TestSession> =
            store::get_json(self.store.as_ref(), &keys::session_key(user_id)).await?;
        Ok(session)
    }

    pub async fn add_question(
        &self,
        user_id: &str,
        draft: QuestionDraft,
    ) -> Result<TestSession, SessionError> {
        let mut session = self.require_open(user_id).await?;
        session.questions.push(TestQuestion {
            question_id: uuid::Uuid::new_v4().to_string(),
            concept_id: draft.concept_id,
            concept_label: draft.concept_label,
            difficulty: draft.difficulty,
            question_type: draft.question_type,
            question: draft.question,
            expected_answer: draft.expected_answer,
            hints: draft.hints,
            created_at: Utc::now(),
        });
        session.updated_at = Utc::now();
        self.write_open(&session).await?;
        Ok(session)
    }

    pub async fn current_question(
        &self,
        user_id: &str,
    ) -> Result<Option<TestQuestion>, SessionError> {
        let Some(session) = self.active_session(user_id).await? else {
            return Ok(None);
        };
        Ok(session.questions.get(session.current_index as usize).cloned())
    }

    /// Appends a result against the current question, advances the cursor
    /// and re-derives the score from the full result log.
    pub async fn record_answer(
        &self,
        user_id: &str,
        input: AnswerInput,
    ) -> Result<TestSession, SessionError> {
        let mut session = self.require_open(user_id).await?;
        let index = session.current_index as usize;
        let Some(question) = session.questions.get(index) else {
            return Err(SessionError::NoPendingQuestion);
        };

        session.results.push(TestResult {
            question_id: question.question_id.clone(),
            question_index: session.current_index,
            user_answer: input.user_answer,
            evaluation: input.evaluation,
            feedback: input.feedback,
            mastery_change: input.mastery_change,
            previous_mastery: input.previous_mastery,
            new_mastery: input.new_mastery,
            answered_at: Utc::now(),
        });
        session.current_index += 1;
        match input.evaluation {
            Evaluation::Correct => session.correct_count += 1,
            Evaluation::Partial => session.partial_count += 1,
            Evaluation::Incorrect => session.incorrect_count += 1,
        }

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
        session.score = compute_score(correct, partial, session.results.len() as i64);
        session.updated_at = Utc::now();

        self.write_open(&session).await?;
        Ok(session)
    }

    pub async fn pause_session(&self, user_id: &str) -> Result<TestSession, SessionError> {
        self.set_status(user_id, SessionStatus::Paused).await
    }

    pub async fn resume_session(&self, user_id: &str) -> Result<TestSession, SessionError> {
        self.set_status(user_id, SessionStatus::Active).await
    }

    /// Terminal transition: archive the full session, drop it from the
    /// open slot and return the summary.
    pub async fn complete_session(
        &self,
        user_id: &str,
    ) -> Result<(TestSession, TestSessionSummary), SessionError> {
        let mut session = self.require_open(user_id).await?;
        let now = Utc::now();
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
        session.updated_at = now;

        self.archive_session(&session).await;
        self.store.delete(&keys::session_key(user_id)).await?;

        let report = summary::build_summary(&session, now);
        Ok((session, report))
    }

    /// Same archival as completion, no summary. A no-op when nothing is
    /// open: no error, no history mutation.
    pub async fn abandon_session(
        &self,
        user_id: &str,
    ) -> Result<Option<TestSession>, SessionError> {
        let Some(mut session) = self.active_session(user_id).await? else {
            return Ok(None);
        };
        let now = Utc::now();
        session.status = SessionStatus::Abandoned;
        session.completed_at = Some(now);
        session.updated_at = now;

        self.archive_session(&session).await;
        self.store.delete(&keys::session_key(user_id)).await?;
        Ok(Some(session))
    }

    pub async fn session_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<String>, SessionError> {
        let stop = limit.min(keys::SESSION_HISTORY_CAP).max(1) as i64 - 1;
        let ids = self
            .store
            .list_range(&keys::session_history_key(user_id), 0, stop)
            .await?;
        Ok(ids)
    }

    pub async fn archived_session(
        &self,
        session_id: &str,
    ) -> Result<Option<TestSession>, SessionError> {
        let session =
            store::get_json(self.store.as_ref(), &keys::session_archive_key(session_id)).await?;
        Ok(session)
    }

    async fn require_open(&self, user_id: &str) -> Result<TestSession, SessionError> {
        self.active_session(user_id)
            .await?
            .ok_or(SessionError::NoActiveSession)
    }

    async fn set_status(
        &self,
        user_id: &str,
        status: SessionStatus,
    ) -> Result<TestSession, SessionError> {
        let mut session = self.require_open(user_id).await?;
        session.status = status;
        session.updated_at = Utc::now();
        self.write_open(&session).await?;
        Ok(session)
    }

    async fn write_open(&self, session: &TestSession) -> Result<(), SessionError> {
        store::put_json(
            self.store.as_ref(),
            &keys::session_key(&session.user_id),
            session,
        )
        .await?;
        Ok(())
    }

    /// Best effort: history bookkeeping must never abort the terminal
    /// transition it accompanies, so failures are logged and swallowed.
    async fn archive_session(&self, session: &TestSession) {
        if let Err(err) = store::put_json(
            self.store.as_ref(),
            &keys::session_archive_key(&session.session_id),
            session,
        )
        .await
        {
            tracing::warn!(
                session_id = %session.session_id,
                error = %err,
                "failed to write session archive"
            );
            return;
        }

        let history_key = keys::session_history_key(&session.user_id);
        if let Err(err) = self
            .store
            .list_push_front(&history_key, &session.session_id)
            .await
        {
            tracing::warn!(
                session_id = %session.session_id,
                error = %err,
                "failed to append session history"
            );
            return;
        }
        if let Err(err) = self
            .store
            .list_trim(&history_key, 0, keys::SESSION_HISTORY_CAP as i64 - 1)
            .await
        {
            tracing::warn!(
                session_id = %session.session_id,
                error = %err,
                "failed to trim session history"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_formula() {
        assert_eq!(compute_score(0, 0, 0), 0);
        assert_eq!(compute_score(1, 0, 1), 100);
        assert_eq!(compute_score(1, 0, 2), 50);
        assert_eq!(compute_score(3, 1, 5), 70);
        assert_eq!(compute_score(0, 1, 3), 17);
    }
}
