use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::sessions::{Evaluation, TestSession};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    pub question_id: String,
    pub question: String,
    pub concept_id: String,
    pub concept_label: String,
    pub previous_mastery: f64,
    pub new_mastery: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSessionSummary {
    pub session_id: String,
    pub score: i64,
    pub duration_minutes: i64,
    pub total_answered: i64,
    pub correct_count: i64,
    pub partial_count: i64,
    pub incorrect_count: i64,
    pub correct: Vec<SummaryEntry>,
    pub partial: Vec<SummaryEntry>,
    pub incorrect: Vec<SummaryEntry>,
    pub concepts_to_review: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Pure report over a session: results grouped by evaluation and joined to
/// their questions, plus template recommendations keyed on the score band.
/// Works on open sessions too (duration falls back to `now`).
pub fn build_summary(session: &TestSession, now: DateTime<Utc>) -> TestSessionSummary {
    let ended = session.completed_at.unwrap_or(now);
    let duration_minutes = (ended - session.started_at).num_minutes().max(0);

    let mut correct = Vec::new();
    let mut partial = Vec::new();
    let mut incorrect = Vec::new();
    let mut concepts_to_review = Vec::new();
    let mut seen_review: HashSet<String> = HashSet::new();

    for result in &session.results {
        let question = session
            .questions
            .iter()
            .find(|q| q.question_id == result.question_id);
        let (question_text, concept_id, concept_label) = match question {
            Some(q) => (q.question.clone(), q.concept_id.clone(), q.concept_label.clone()),
            None => (String::new(), String::new(), String::new()),
        };

        let entry = SummaryEntry {
            question_id: result.question_id.clone(),
            question: question_text,
            concept_id: concept_id.clone(),
            concept_label,
            previous_mastery: result.previous_mastery,
            new_mastery: result.new_mastery,
            feedback: match result.evaluation {
                Evaluation::Correct => None,
                _ => Some(result.feedback.clone()),
            },
        };

        match result.evaluation {
            Evaluation::Correct => correct.push(entry),
            Evaluation::Partial | Evaluation::Incorrect => {
                if !concept_id.is_empty() && seen_review.insert(concept_id.clone()) {
                    concepts_to_review.push(concept_id);
                }
                if result.evaluation == Evaluation::Partial {
                    partial.push(entry);
                } else {
                    incorrect.push(entry);
                }
            }
        }
    }

    let recommendations = build_recommendations(
        session.score,
        incorrect.len(),
        partial.len(),
        concepts_to_review.len(),
    );

    TestSessionSummary {
        session_id: session.session_id.clone(),
        score: session.score,
        duration_minutes,
        total_answered: session.results.len() as i64,
        correct_count: session.correct_count,
        partial_count: session.partial_count,
        incorrect_count: session.incorrect_count,
        correct,
        partial,
        incorrect,
        concepts_to_review,
        recommendations,
    }
}

fn build_recommendations(
    score: i64,
    incorrect_count: usize,
    partial_count: usize,
    review_count: usize,
) -> Vec<String> {
    let mut out = Vec::new();

    if score >= 90 {
        out.push("Excellent work. Consider moving on to harder material.".to_string());
    } else if score >= 70 {
        out.push("Solid result. A quick review of the missed items will lock it in.".to_string());
    } else if score >= 50 {
        out.push("You are getting there. Schedule another session on these concepts soon.".to_string());
    } else {
        out.push("These concepts need more work. Revisit the material before testing again.".to_string());
    }

    if incorrect_count > 0 {
        out.push(format!(
            "Focus on the {} concept{} you missed before the next session.",
            review_count,
            if review_count == 1 { "" } else { "s" }
        ));
    }
    if partial_count > 0 {
        out.push(
            "Some answers were only partially correct. Re-read the feedback on those questions."
                .to_string(),
        );
    }

    out
}
