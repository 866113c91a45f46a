/// Text composition for semantic matching.
///
/// A persona is embedded as its summary, goals, pain points and keywords joined in a
/// fixed order. The name and preferred formats say nothing about intent and are left
/// out, so two personas that differ only in those fields embed identically.
use crate::model::{PersonaRecord, QueryIntentRecord};

const FIELD_SEPARATOR: &str = " | ";
const CONTEXT_LABEL: &str = " - Related queries and intents: ";

/// Compose the document text embedded for a persona.
pub fn compose_embedding_text(persona: &PersonaRecord) -> String {
    [
        persona.summary.as_str(),
        persona.goals.as_str(),
        persona.pain_points.as_str(),
        persona.keywords.as_str(),
    ]
    .join(FIELD_SEPARATOR)
}

/// Compose the query text the personas are ranked against.
///
/// Without query intents this is the topic verbatim. Otherwise every query, then every
/// user intent, is appended after a fixed label.
pub fn compose_context_text(topic: &str, intents: &[QueryIntentRecord]) -> String {
    if intents.is_empty() {
        return topic.to_string();
    }

    let queries: Vec<&str> = intents.iter().map(|i| i.query.as_str()).collect();
    let user_intents: Vec<&str> = intents.iter().map(|i| i.user_intent.as_str()).collect();
    format!(
        "{topic}{CONTEXT_LABEL}{} {}",
        queries.join(" "),
        user_intents.join(" ")
    )
}
