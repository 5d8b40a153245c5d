use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::services::mastery::{MasteryError, MasteryService, RankedConcept};
use crate::services::sm2::{difficulty_for_mastery, Difficulty};

const POOL_LIMIT: usize = 20;
const DUE_BONUS: f64 = 0.3;
const STALENESS_WEIGHT: f64 = 0.02;
const STALENESS_CAP: f64 = 0.2;
const FUZZY_MIN_TOKEN_LEN: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConcept {
    pub concept_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentHit {
    pub snippet: String,
    pub relevance: f64,
}

/// External concept/content lookup. Implemented elsewhere (the content
/// ingestion side of the application); the engine only decides what to
/// test, never generates wording.
#[async_trait::async_trait]
pub trait ConceptCatalog: Send + Sync {
    async fn find_concept(&self, topic: &str) -> Result<Option<CatalogConcept>, String>;
    async fn search_content(&self, query: &str) -> Result<Vec<ContentHit>, String>;
}

/// Fixed-list catalog for tests and store-less runs.
#[derive(Default)]
pub struct StaticCatalog {
    concepts: Vec<CatalogConcept>,
    content: Vec<String>,
}

impl StaticCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(concepts: Vec<CatalogConcept>, content: Vec<String>) -> Self {
        Self { concepts, content }
    }
}

#[async_trait::async_trait]
impl ConceptCatalog for StaticCatalog {
    async fn find_concept(&self, topic: &str) -> Result<Option<CatalogConcept>, String> {
        Ok(self
            .concepts
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(topic) || c.concept_id == topic)
            .cloned())
    }

    async fn search_content(&self, query: &str) -> Result<Vec<ContentHit>, String> {
        let needle = query.to_lowercase();
        Ok(self
            .content
            .iter()
            .filter(|text| text.to_lowercase().contains(&needle))
            .map(|text| ContentHit {
                snippet: text.clone(),
                relevance: 0.5,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub topic: Option<String>,
    #[serde(default)]
    pub exclude_concept_ids: Vec<String>,
    pub difficulty_override: Option<Difficulty>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptSelection {
    pub concept_id: String,
    pub concept_label: String,
    pub difficulty: Difficulty,
    pub question_type: String,
    pub effective_mastery: f64,
    pub is_due_for_review: bool,
    pub rationale: String,
}

/// Tagged outcome instead of sentinel strings: "not in the concept graph"
/// and "not found anywhere" are distinct states so the caller can choose
/// between offering existing topics and asking for new material.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SelectionOutcome {
    Found { selection: ConceptSelection },
    NotFoundInGraph { selection: ConceptSelection },
    NotFoundAnywhere { topic: String },
    EmptyPool,
}

#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error(transparent)]
    Mastery(#[from] MasteryError),
    #[error("catalog lookup failed: {0}")]
    Catalog(String),
}

pub struct AdaptiveSelector {
    mastery: Arc<MasteryService>,
    catalog: Arc<dyn ConceptCatalog>,
    rng: Mutex<StdRng>,
}

impl AdaptiveSelector {
    pub fn new(mastery: Arc<MasteryService>, catalog: Arc<dyn ConceptCatalog>) -> Self {
        Self {
            mastery,
            catalog,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic question-type choice for tests.
    pub fn with_seed(
        mastery: Arc<MasteryService>,
        catalog: Arc<dyn ConceptCatalog>,
        seed: u64,
    ) -> Self {
        Self {
            mastery,
            catalog,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub async fn select_next(
        &self,
        user_id: &str,
        request: &SelectionRequest,
    ) -> Result<SelectionOutcome, SelectorError> {
        match request.topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => {
                self.select_for_topic(user_id, topic, request.difficulty_override)
                    .await
            }
            _ => self.select_from_pool(user_id, request).await,
        }
    }

    /// Candidate pool = due-for-review ∪ weakest, minus the caller's
    /// exclusion set; highest priority wins.
    async fn select_from_pool(
        &self,
        user_id: &str,
        request: &SelectionRequest,
    ) -> Result<SelectionOutcome, SelectorError> {
        let excluded: HashSet<&str> = request
            .exclude_concept_ids
            .iter()
            .map(String::as_str)
            .collect();

        let due = self
            .mastery
            .concepts_due_for_review(user_id, POOL_LIMIT)
            .await?;
        let weakest = self.mastery.weakest_concepts(user_id, POOL_LIMIT).await?;

        let mut pool: Vec<RankedConcept> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for candidate in due.into_iter().chain(weakest) {
            if excluded.contains(candidate.record.concept_id.as_str()) {
                continue;
            }
            if seen.insert(candidate.record.concept_id.clone()) {
                pool.push(candidate);
            }
        }

        let best = pool.into_iter().max_by(|a, b| {
            let pa = selection_priority(a.effective_mastery, a.is_due_for_review, a.days_since_interaction);
            let pb = selection_priority(b.effective_mastery, b.is_due_for_review, b.days_since_interaction);
            pa.partial_cmp(&pb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.record.concept_id.cmp(&a.record.concept_id))
        });

        let Some(candidate) = best else {
            return Ok(SelectionOutcome::EmptyPool);
        };

        let priority = selection_priority(
            candidate.effective_mastery,
            candidate.is_due_for_review,
            candidate.days_since_interaction,
        );
        let rationale = format!(
            "picked from review pool: effective mastery {:.3}, {}priority {:.2}",
            candidate.effective_mastery,
            if candidate.is_due_for_review { "due for review, " } else { "" },
            priority,
        );
        Ok(SelectionOutcome::Found {
            selection: self.build_selection(&candidate, None, rationale),
        })
    }

    /// Resolution order for an explicit topic: exact match on stored
    /// mastery, fuzzy label match, catalog concept lookup, content-search
    /// fallback with a synthetic concept id, then "not found anywhere".
    async fn select_for_topic(
        &self,
        user_id: &str,
        topic: &str,
        difficulty_override: Option<Difficulty>,
    ) -> Result<SelectionOutcome, SelectorError> {
        let known = self.mastery.all_ranked(user_id).await?;

        let exact = known.iter().find(|r| {
            r.record.concept_id == topic || r.record.concept_label.eq_ignore_ascii_case(topic)
        });
        if let Some(candidate) = exact {
            let rationale = format!("exact match on tracked concept for \"{topic}\"");
            return Ok(SelectionOutcome::Found {
                selection: self.build_selection(candidate, difficulty_override, rationale),
            });
        }

        if let Some(candidate) = best_fuzzy_match(topic, &known) {
            let rationale = format!(
                "fuzzy label match: \"{}\" for topic \"{topic}\"",
                candidate.record.concept_label
            );
            return Ok(SelectionOutcome::Found {
                selection: self.build_selection(candidate, difficulty_override, rationale),
            });
        }

        let from_catalog = self
            .catalog
            .find_concept(topic)
            .await
            .map_err(SelectorError::Catalog)?;
        if let Some(concept) = from_catalog {
            let difficulty = difficulty_override.unwrap_or(Difficulty::Easy);
            return Ok(SelectionOutcome::Found {
                selection: ConceptSelection {
                    concept_id: concept.concept_id,
                    concept_label: concept.label,
                    difficulty,
                    question_type: self.pick_question_type(difficulty),
                    effective_mastery: 0.0,
                    is_due_for_review: false,
                    rationale: format!("untracked concept resolved from catalog for \"{topic}\""),
                },
            });
        }

        let hits = self
            .catalog
            .search_content(topic)
            .await
            .map_err(SelectorError::Catalog)?;
        if !hits.is_empty() {
            let difficulty = difficulty_override.unwrap_or(Difficulty::Easy);
            return Ok(SelectionOutcome::NotFoundInGraph {
                selection: ConceptSelection {
                    concept_id: synthetic_concept_id(topic),
                    concept_label: topic.to_string(),
                    difficulty,
                    question_type: self.pick_question_type(difficulty),
                    effective_mastery: 0.0,
                    is_due_for_review: false,
                    rationale: format!(
                        "no concept in the graph; synthesized from {} content match{}",
                        hits.len(),
                        if hits.len() == 1 { "" } else { "es" }
                    ),
                },
            });
        }

        Ok(SelectionOutcome::NotFoundAnywhere {
            topic: topic.to_string(),
        })
    }

    fn build_selection(
        &self,
        candidate: &RankedConcept,
        difficulty_override: Option<Difficulty>,
        rationale: String,
    ) -> ConceptSelection {
        let difficulty =
            difficulty_override.unwrap_or_else(|| difficulty_for_mastery(candidate.effective_mastery));
        ConceptSelection {
            concept_id: candidate.record.concept_id.clone(),
            concept_label: candidate.record.concept_label.clone(),
            difficulty,
            question_type: self.pick_question_type(difficulty),
            effective_mastery: candidate.effective_mastery,
            is_due_for_review: candidate.is_due_for_review,
            rationale,
        }
    }

    // Which question shape to use within a band is presentation policy;
    // only the randomness source matters here, and it is injectable.
    fn pick_question_type(&self, difficulty: Difficulty) -> String {
        let types = question_types_for(difficulty);
        let index = self.rng.lock().random_range(0..types.len());
        types[index].to_string()
    }
}

pub fn selection_priority(effective_mastery: f64, is_due: bool, days_since_interaction: f64) -> f64 {
    let staleness = (STALENESS_WEIGHT * days_since_interaction).min(STALENESS_CAP);
    let due_bonus = if is_due { DUE_BONUS } else { 0.0 };
    ((1.0 - effective_mastery) + due_bonus + staleness).clamp(0.0, 1.0)
}

pub fn question_types_for(difficulty: Difficulty) -> &'static [&'static str] {
    match difficulty {
        Difficulty::Easy => &["multiple_choice", "true_false", "flashcard"],
        Difficulty::Medium => &["short_answer", "multiple_choice", "fill_blank"],
        Difficulty::Hard => &["short_answer", "explanation"],
    }
}

fn best_fuzzy_match<'a>(topic: &str, known: &'a [RankedConcept]) -> Option<&'a RankedConcept> {
    let tokens: Vec<String> = topic
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.len() >= FUZZY_MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect();
    if tokens.is_empty() {
        return None;
    }

    known
        .iter()
        .map(|candidate| {
            let label = candidate.record.concept_label.to_lowercase();
            let overlap = tokens.iter().filter(|t| label.contains(t.as_str())).count();
            (candidate, overlap)
        })
        .filter(|(_, overlap)| *overlap > 0)
        .max_by_key(|(_, overlap)| *overlap)
        .map(|(candidate, _)| candidate)
}

fn synthetic_concept_id(topic: &str) -> String {
    let slug: String = topic
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    format!("topic:{}", slug)
}
