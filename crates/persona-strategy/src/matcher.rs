/// Semantic persona matching.
///
/// Composes the persona and context texts, embeds them (documents and query), ranks
/// the personas and installs the result into the session. Every step consumes the
/// previous step's output, so nothing is pipelined.
use tracing::info;

use crate::compose::{compose_context_text, compose_embedding_text};
use crate::error::AppError;
use crate::model::PersonaOrigin;
use crate::ranker::{rank, MatchPolicy, RankedMatchSet, RankingMode};
use crate::session::Session;
use persona_common::embedding::{EmbeddingBackend, Embedder};
use persona_common::error::CommonError;

/// Rank the session's personas against its topic and query fan-out.
///
/// On failure the previous analysis is already gone: a failed run never leaves stale
/// matches behind and never installs partial ones.
pub async fn match_personas<'s, B: EmbeddingBackend>(
    session: &'s mut Session,
    embedder: &Embedder<B>,
    policy: &MatchPolicy,
) -> Result<&'s RankedMatchSet, AppError> {
    let topic = session.topic().trim().to_string();
    if topic.is_empty() {
        return Err(AppError::MissingInput("topic must not be empty".to_string()));
    }
    if session.personas().is_empty() {
        return Err(AppError::MissingInput(
            "no personas loaded; upload or generate personas first".to_string(),
        ));
    }
    let credential = session
        .credential()
        .map(str::to_string)
        .ok_or(AppError::MissingCredential)?;

    session.invalidate_analysis();

    let texts: Vec<String> = session
        .personas()
        .iter()
        .map(compose_embedding_text)
        .collect();
    let persona_vectors = embedder.embed_documents(&texts, &credential).await?;

    let context_text = compose_context_text(&topic, session.query_intents());
    let context_vector = embedder.embed_query(&context_text, &credential).await?;

    let dim = persona_vectors.first().map(Vec::len).unwrap_or(0);
    if context_vector.len() != dim {
        return Err(CommonError::EmbeddingUnavailable(format!(
            "context vector has {} dimensions, persona vectors have {dim}",
            context_vector.len()
        ))
        .into());
    }

    let mode = match session.persona_origin() {
        Some(PersonaOrigin::Generated) => RankingMode::Unconditional,
        _ => RankingMode::Thresholded,
    };
    let ranked = rank(
        session.personas(),
        &texts,
        &persona_vectors,
        &context_vector,
        policy,
        mode,
    );

    info!(
        topic = %topic,
        pool = ranked.pool_size(),
        matched = ranked.len(),
        outcome = ranked.outcome().as_str(),
        query_intents = session.query_intents().len(),
        "persona matching complete"
    );

    Ok(session.install_matches(ranked))
}
