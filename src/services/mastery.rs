use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::services::sm2::{self, next_schedule};
use crate::store::{self, keys, KvStore, StoreError};

const DEFAULT_INITIAL_MASTERY: f64 = 0.1;
const DEFAULT_INITIAL_CONFIDENCE: f64 = 0.5;
const DEFAULT_EASE_FACTOR: f64 = 2.5;
const CONFIDENCE_STEP: f64 = 0.1;
const MASTERED_THRESHOLD: f64 = 0.8;
const WEAK_THRESHOLD: f64 = 0.3;

// Ranking queries pull more index candidates than requested because the
// stored-score order and the decayed order can disagree.
const RANK_CANDIDATE_FACTOR: usize = 3;

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMastery {
    pub concept_id: String,
    pub concept_label: String,
    pub mastery_score: f64,
    pub confidence: f64,
    pub interval_days: i64,
    pub ease_factor: f64,
    pub streak_correct: i64,
    pub streak_wrong: i64,
    pub total_attempts: i64,
    pub correct_attempts: i64,
    pub last_interaction: DateTime<Utc>,
    pub next_review_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningSignal {
    #[serde(rename = "type")]
    pub signal_type: String,
    pub concept_id: String,
    pub concept_label: String,
    pub confidence: f64,
    pub mastery_delta: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryChange {
    pub previous_mastery: f64,
    pub new_mastery: f64,
    pub previous_confidence: f64,
    pub new_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveMastery {
    pub concept_id: String,
    pub concept_label: String,
    pub stored_mastery: f64,
    pub effective_mastery: f64,
    pub is_due_for_review: bool,
    pub days_since_interaction: f64,
}

/// A mastery record joined with its read-time decay, as consumed by the
/// ranking queries and the adaptive selector.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedConcept {
    #[serde(flatten)]
    pub record: ConceptMastery,
    pub effective_mastery: f64,
    pub is_due_for_review: bool,
    pub days_since_interaction: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterySummary {
    pub total_concepts: i64,
    pub mastered_count: i64,
    pub learning_count: i64,
    pub weak_count: i64,
    pub due_count: i64,
    pub average_effective_mastery: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum MasteryError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-(user, concept) mastery records over the injected store. Every
/// mutation is a single read-modify-write on one concept; there is no
/// cross-concept transaction.
pub struct MasteryService {
    store: Arc<dyn KvStore>,
}

impl MasteryService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn mastery(
        &self,
        user_id: &str,
        concept_id: &str,
    ) -> Result<Option<ConceptMastery>, MasteryError> {
        let record =
            store::get_json(self.store.as_ref(), &keys::mastery_key(user_id, concept_id)).await?;
        Ok(record)
    }

    pub async fn create_mastery(
        &self,
        user_id: &str,
        concept_id: &str,
        concept_label: &str,
        initial_score: Option<f64>,
    ) -> Result<ConceptMastery, MasteryError> {
        let now = Utc::now();
        let record = ConceptMastery {
            concept_id: concept_id.to_string(),
            concept_label: concept_label.to_string(),
            mastery_score: initial_score.unwrap_or(DEFAULT_INITIAL_MASTERY).clamp(0.0, 1.0),
            confidence: DEFAULT_INITIAL_CONFIDENCE,
            interval_days: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            streak_correct: 0,
            streak_wrong: 0,
            total_attempts: 0,
            correct_attempts: 0,
            last_interaction: now,
            next_review_date: now + Duration::days(1),
            created_at: now,
        };
        self.write_record(user_id, &record).await?;
        Ok(record)
    }

    /// Upsert from one learning signal: clamp the score delta, bump
    /// confidence, update streaks and advance the SM-2 schedule. A positive
    /// delta counts as a correct recall; zero and negative deltas take the
    /// incorrect branch.
    pub async fn update_from_signal(
        &self,
        user_id: &str,
        signal: &LearningSignal,
    ) -> Result<MasteryChange, MasteryError> {
        let mut record = match self.mastery(user_id, &signal.concept_id).await? {
            Some(record) => record,
            None => {
                self.create_mastery(user_id, &signal.concept_id, &signal.concept_label, None)
                    .await?
            }
        };

        let previous_mastery = record.mastery_score;
        let previous_confidence = record.confidence;
        let is_correct = signal.mastery_delta > 0.0;

        record.mastery_score = (record.mastery_score + signal.mastery_delta).clamp(0.0, 1.0);
        record.confidence = (record.confidence + CONFIDENCE_STEP).min(1.0);
        record.total_attempts += 1;
        if is_correct {
            record.correct_attempts += 1;
            record.streak_correct += 1;
            record.streak_wrong = 0;
        } else {
            record.streak_wrong += 1;
            record.streak_correct = 0;
        }

        let schedule = next_schedule(is_correct, record.interval_days, record.ease_factor);
        record.interval_days = schedule.interval_days;
        record.ease_factor = schedule.ease_factor;
        record.last_interaction = signal.timestamp;
        record.next_review_date = Utc::now() + Duration::days(schedule.interval_days);

        self.write_record(user_id, &record).await?;

        Ok(MasteryChange {
            previous_mastery,
            new_mastery: record.mastery_score,
            previous_confidence,
            new_confidence: record.confidence,
        })
    }

    pub async fn effective_mastery(
        &self,
        user_id: &str,
        concept_id: &str,
    ) -> Result<Option<EffectiveMastery>, MasteryError> {
        let Some(record) = self.mastery(user_id, concept_id).await? else {
            return Ok(None);
        };
        let ranked = rank_record(record, Utc::now());
        Ok(Some(EffectiveMastery {
            concept_id: ranked.record.concept_id.clone(),
            concept_label: ranked.record.concept_label.clone(),
            stored_mastery: ranked.record.mastery_score,
            effective_mastery: ranked.effective_mastery,
            is_due_for_review: ranked.is_due_for_review,
            days_since_interaction: ranked.days_since_interaction,
        }))
    }

    /// Lowest decayed mastery first. Candidates come from the stored-score
    /// index; the final order applies decay per read because it cannot be
    /// precomputed in the index.
    pub async fn weakest_concepts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<RankedConcept>, MasteryError> {
        let mut ranked = self.ranked_candidates(user_id, limit, true).await?;
        ranked.sort_by(|a, b| {
            a.effective_mastery
                .partial_cmp(&b.effective_mastery)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    pub async fn strongest_concepts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<RankedConcept>, MasteryError> {
        let mut ranked = self.ranked_candidates(user_id, limit, false).await?;
        ranked.sort_by(|a, b| {
            b.effective_mastery
                .partial_cmp(&a.effective_mastery)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Concepts whose scheduled review date has passed, soonest-due first,
    /// regardless of mastery.
    pub async fn concepts_due_for_review(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<RankedConcept>, MasteryError> {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let queue = self
            .store
            .hash_entries(&keys::review_queue_key(user_id))
            .await?;

        let mut due: Vec<(String, i64)> = queue
            .into_iter()
            .filter_map(|(concept_id, raw)| raw.parse::<i64>().ok().map(|ms| (concept_id, ms)))
            .filter(|(_, ms)| *ms <= now_ms)
            .collect();
        due.sort_by_key(|(_, ms)| *ms);
        due.truncate(limit);

        let mut out = Vec::with_capacity(due.len());
        for (concept_id, _) in due {
            if let Some(record) = self.mastery(user_id, &concept_id).await? {
                out.push(rank_record(record, now));
            }
        }
        Ok(out)
    }

    pub async fn mastery_summary(&self, user_id: &str) -> Result<MasterySummary, MasteryError> {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let index = self
            .store
            .hash_entries(&keys::mastery_index_key(user_id))
            .await?;

        let mut total = 0_i64;
        let mut mastered = 0_i64;
        let mut learning = 0_i64;
        let mut weak = 0_i64;
        let mut effective_sum = 0.0;

        for concept_id in index.keys() {
            let Some(record) = self.mastery(user_id, concept_id).await? else {
                continue;
            };
            let ranked = rank_record(record, now);
            total += 1;
            effective_sum += ranked.effective_mastery;
            if ranked.effective_mastery > MASTERED_THRESHOLD {
                mastered += 1;
            } else if ranked.effective_mastery <= WEAK_THRESHOLD {
                weak += 1;
            } else {
                learning += 1;
            }
        }

        let due_count = self
            .store
            .hash_entries(&keys::review_queue_key(user_id))
            .await?
            .values()
            .filter(|raw| raw.parse::<i64>().map(|ms| ms <= now_ms).unwrap_or(false))
            .count() as i64;

        Ok(MasterySummary {
            total_concepts: total,
            mastered_count: mastered,
            learning_count: learning,
            weak_count: weak,
            due_count,
            average_effective_mastery: if total > 0 {
                sm2::round3(effective_sum / total as f64)
            } else {
                0.0
            },
        })
    }

    /// Administrative removal; mastery records are otherwise never deleted.
    pub async fn remove_mastery(
        &self,
        user_id: &str,
        concept_id: &str,
    ) -> Result<(), MasteryError> {
        self.store
            .delete(&keys::mastery_key(user_id, concept_id))
            .await?;
        self.store
            .hash_remove(&keys::mastery_index_key(user_id), concept_id)
            .await?;
        self.store
            .hash_remove(&keys::review_queue_key(user_id), concept_id)
            .await?;
        Ok(())
    }

    /// All known records joined with their decayed mastery; label and fuzzy
    /// topic resolution in the selector scans these.
    pub async fn all_ranked(&self, user_id: &str) -> Result<Vec<RankedConcept>, MasteryError> {
        let now = Utc::now();
        let index = self
            .store
            .hash_entries(&keys::mastery_index_key(user_id))
            .await?;
        let mut out = Vec::with_capacity(index.len());
        for concept_id in index.keys() {
            if let Some(record) = self.mastery(user_id, concept_id).await? {
                out.push(rank_record(record, now));
            }
        }
        Ok(out)
    }

    async fn ranked_candidates(
        &self,
        user_id: &str,
        limit: usize,
        ascending: bool,
    ) -> Result<Vec<RankedConcept>, MasteryError> {
        let now = Utc::now();
        let index = self
            .store
            .hash_entries(&keys::mastery_index_key(user_id))
            .await?;

        let mut scored: Vec<(String, f64)> = index
            .into_iter()
            .filter_map(|(concept_id, raw)| raw.parse::<f64>().ok().map(|s| (concept_id, s)))
            .collect();
        scored.sort_by(|a, b| {
            let ordering = a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal);
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
        scored.truncate(limit.saturating_mul(RANK_CANDIDATE_FACTOR).max(limit));

        let mut out = Vec::with_capacity(scored.len());
        for (concept_id, _) in scored {
            if let Some(record) = self.mastery(user_id, &concept_id).await? {
                out.push(rank_record(record, now));
            }
        }
        Ok(out)
    }

    async fn write_record(
        &self,
        user_id: &str,
        record: &ConceptMastery,
    ) -> Result<(), MasteryError> {
        store::put_json(
            self.store.as_ref(),
            &keys::mastery_key(user_id, &record.concept_id),
            record,
        )
        .await?;
        self.store
            .hash_set(
                &keys::mastery_index_key(user_id),
                &record.concept_id,
                &record.mastery_score.to_string(),
            )
            .await?;
        self.store
            .hash_set(
                &keys::review_queue_key(user_id),
                &record.concept_id,
                &record.next_review_date.timestamp_millis().to_string(),
            )
            .await?;
        Ok(())
    }
}

pub fn rank_record(record: ConceptMastery, now: DateTime<Utc>) -> RankedConcept {
    let elapsed_ms = (now - record.last_interaction).num_milliseconds().max(0);
    let days = elapsed_ms as f64 / MS_PER_DAY;
    let effective = sm2::effective_mastery(record.mastery_score, days);
    let is_due = record.next_review_date <= now;
    RankedConcept {
        record,
        effective_mastery: effective,
        is_due_for_review: is_due,
        days_since_interaction: days,
    }
}
