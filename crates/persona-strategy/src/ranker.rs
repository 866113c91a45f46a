/// Similarity ranking of personas against a topic context.
///
/// Scores are cosine similarities. Candidates are sorted by score, highest first, with
/// ties kept in pool order, and then cut down by a [`MatchPolicy`]:
///
/// 1. Keep every candidate scoring above the threshold.
/// 2. Nothing kept: fall back to the top `fallback_results`.
/// 3. Fewer than `min_results` kept: top up to `min_results` when the pool is larger
///    than that, otherwise to at least `fallback_results`.
///
/// Generated pools skip all of this and return every candidate.
use serde::{Deserialize, Serialize};

use crate::model::{PersonaId, PersonaRecord};

/// Cosine similarity of two vectors.
///
/// Accumulates in `f64` so large components cannot overflow. Returns 0 when either
/// vector has zero magnitude, the lengths differ, or the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot_product, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot_product / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// Scores strictly above this are relevant.
    pub threshold: f32,
    /// Minimum list size when the pool is larger than this.
    pub min_results: usize,
    /// List size when nothing clears the threshold.
    pub fallback_results: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_results: 10,
            fallback_results: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMode {
    /// Apply threshold and fallbacks.
    Thresholded,
    /// Return the whole pool sorted; used for machine-generated personas.
    Unconditional,
}

/// Which rule decided the size of a ranked set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOutcome {
    AboveThreshold,
    MinimumTopUp,
    EmptyFallback,
    Unconditional,
}

impl SelectionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionOutcome::AboveThreshold => "above_threshold",
            SelectionOutcome::MinimumTopUp => "minimum_top_up",
            SelectionOutcome::EmptyFallback => "empty_fallback",
            SelectionOutcome::Unconditional => "unconditional",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPersona {
    pub id: PersonaId,
    pub persona: PersonaRecord,
    pub embedding_text: String,
    pub score: f32,
}

/// Ordered result of one ranking run.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMatchSet {
    entries: Vec<RankedPersona>,
    outcome: SelectionOutcome,
    pool_size: usize,
}

impl RankedMatchSet {
    pub fn entries(&self) -> &[RankedPersona] {
        &self.entries
    }

    pub fn outcome(&self) -> SelectionOutcome {
        self.outcome
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: PersonaId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = PersonaId> + '_ {
        self.entries.iter().map(|e| e.id)
    }
}

/// Decide which `(index, score)` pairs survive, in output order.
///
/// `scored` is in pool order; the result is sorted by descending score (stable).
/// Non-finite scores count as 0.
pub fn select(
    mut scored: Vec<(usize, f32)>,
    policy: &MatchPolicy,
    mode: RankingMode,
) -> (Vec<(usize, f32)>, SelectionOutcome) {
    for (_, score) in scored.iter_mut() {
        if !score.is_finite() {
            *score = 0.0;
        }
    }
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    let pool_size = scored.len();

    if mode == RankingMode::Unconditional {
        return (scored, SelectionOutcome::Unconditional);
    }

    let kept = scored
        .iter()
        .take_while(|(_, score)| *score > policy.threshold)
        .count();

    let (len, outcome) = if kept == 0 {
        (policy.fallback_results, SelectionOutcome::EmptyFallback)
    } else if kept < policy.min_results {
        if pool_size > policy.min_results {
            (policy.min_results, SelectionOutcome::MinimumTopUp)
        } else {
            (kept.max(policy.fallback_results), SelectionOutcome::MinimumTopUp)
        }
    } else {
        (kept, SelectionOutcome::AboveThreshold)
    };

    scored.truncate(len);
    (scored, outcome)
}

/// Score every persona against `context` and apply the policy.
///
/// `personas`, `texts` and `vectors` are index-aligned; the index becomes the
/// persona's id.
pub fn rank(
    personas: &[PersonaRecord],
    texts: &[String],
    vectors: &[Vec<f32>],
    context: &[f32],
    policy: &MatchPolicy,
    mode: RankingMode,
) -> RankedMatchSet {
    let scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(context, v)))
        .collect();

    let (selected, outcome) = select(scored, policy, mode);
    let entries = selected
        .into_iter()
        .map(|(i, score)| RankedPersona {
            id: PersonaId(i),
            persona: personas[i].clone(),
            embedding_text: texts[i].clone(),
            score,
        })
        .collect();

    RankedMatchSet {
        entries,
        outcome,
        pool_size: personas.len(),
    }
}
