/// Interactive session state.
///
/// Everything the user has supplied (topic, credential, persona pool, query fan-out)
/// and everything derived from it (matches, selection, generated text) lives here.
/// Derived state is dropped by a single routine, [`Session::invalidate_analysis`],
/// whenever an input it depends on changes.
use std::collections::HashSet;

use tracing::info;

use crate::error::AppError;
use crate::model::{PersonaId, PersonaOrigin, PersonaRecord, QueryIntentRecord};
use crate::ranker::RankedMatchSet;

#[derive(Debug, Default)]
pub struct Session {
    topic: String,
    credential: Option<String>,
    personas: Vec<PersonaRecord>,
    persona_origin: Option<PersonaOrigin>,
    query_intents: Vec<QueryIntentRecord>,
    matches: Option<RankedMatchSet>,
    selected: HashSet<PersonaId>,
    strategy_text: Option<String>,
    funnel_text: Option<String>,
}

impl Session {
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential: credential.filter(|c| !c.trim().is_empty()),
            ..Self::default()
        }
    }

    // --- Inputs ---

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Replace the topic. Returns `true` when it changed and the analysis was reset.
    pub fn set_topic(&mut self, topic: &str) -> bool {
        let topic = topic.trim();
        if topic == self.topic {
            return false;
        }
        self.topic = topic.to_string();
        self.invalidate_analysis();
        true
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn set_credential(&mut self, credential: &str) {
        let credential = credential.trim();
        self.credential = (!credential.is_empty()).then(|| credential.to_string());
    }

    pub fn personas(&self) -> &[PersonaRecord] {
        &self.personas
    }

    pub fn persona_origin(&self) -> Option<PersonaOrigin> {
        self.persona_origin
    }

    /// Replace the persona pool. Always resets the analysis.
    pub fn load_personas(&mut self, personas: Vec<PersonaRecord>, origin: PersonaOrigin) {
        info!(count = personas.len(), ?origin, "persona pool loaded");
        self.personas = personas;
        self.persona_origin = Some(origin);
        self.invalidate_analysis();
    }

    pub fn query_intents(&self) -> &[QueryIntentRecord] {
        &self.query_intents
    }

    /// Replace the query fan-out. Always resets the analysis.
    pub fn load_query_intents(&mut self, intents: Vec<QueryIntentRecord>) {
        info!(count = intents.len(), "query fan-out loaded");
        self.query_intents = intents;
        self.invalidate_analysis();
    }

    pub fn clear_query_intents(&mut self) {
        self.query_intents.clear();
        self.invalidate_analysis();
    }

    // --- Derived state ---

    /// Drop matches, selection and all generated text.
    pub fn invalidate_analysis(&mut self) {
        if self.matches.is_some() || self.strategy_text.is_some() || self.funnel_text.is_some() {
            info!("inputs changed, analysis reset");
        }
        self.matches = None;
        self.selected.clear();
        self.strategy_text = None;
        self.funnel_text = None;
    }

    pub fn matches(&self) -> Option<&RankedMatchSet> {
        self.matches.as_ref()
    }

    /// Install a fresh ranking, replacing any earlier one along with its selection and
    /// generated text.
    pub fn install_matches(&mut self, matches: RankedMatchSet) -> &RankedMatchSet {
        self.invalidate_analysis();
        self.matches.insert(matches)
    }

    // --- Selection ---

    pub fn is_selected(&self, id: PersonaId) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn select(&mut self, id: PersonaId) -> Result<(), AppError> {
        self.ensure_matched(id)?;
        self.selected.insert(id);
        Ok(())
    }

    pub fn deselect(&mut self, id: PersonaId) -> Result<(), AppError> {
        self.ensure_matched(id)?;
        self.selected.remove(&id);
        Ok(())
    }

    /// Flip membership. Returns the new state.
    pub fn toggle(&mut self, id: PersonaId) -> Result<bool, AppError> {
        self.ensure_matched(id)?;
        if self.selected.remove(&id) {
            Ok(false)
        } else {
            self.selected.insert(id);
            Ok(true)
        }
    }

    pub fn select_all(&mut self) {
        if let Some(matches) = &self.matches {
            self.selected.extend(matches.ids());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Selected personas in ranked order.
    pub fn selected_subset(&self) -> Vec<&PersonaRecord> {
        let Some(matches) = &self.matches else {
            return Vec::new();
        };
        matches
            .entries()
            .iter()
            .filter(|e| self.selected.contains(&e.id))
            .map(|e| &e.persona)
            .collect()
    }

    fn ensure_matched(&self, id: PersonaId) -> Result<(), AppError> {
        match &self.matches {
            Some(matches) if matches.contains(id) => Ok(()),
            _ => Err(AppError::UnknownPersona(id.0)),
        }
    }

    // --- Generated text ---

    pub fn strategy_text(&self) -> Option<&str> {
        self.strategy_text.as_deref()
    }

    /// Store a new strategy. Any funnel built on the previous one is dropped.
    pub fn set_strategy_text(&mut self, text: String) {
        self.strategy_text = Some(text);
        self.funnel_text = None;
    }

    pub fn funnel_text(&self) -> Option<&str> {
        self.funnel_text.as_deref()
    }

    pub fn set_funnel_text(&mut self, text: String) {
        self.funnel_text = Some(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranker::{rank, MatchPolicy, RankingMode};

    fn persona(name: &str) -> PersonaRecord {
        PersonaRecord {
            name: name.to_string(),
            summary: format!("{name} summary"),
            goals: String::new(),
            pain_points: String::new(),
            keywords: String::new(),
            preferred_formats: String::new(),
        }
    }

    /// Session with three personas ranked 2, 0, 1.
    fn matched_session() -> Session {
        let personas = vec![persona("a"), persona("b"), persona("c")];
        let mut session = Session::new(Some("key".to_string()));
        session.set_topic("budgeting");
        session.load_personas(personas.clone(), PersonaOrigin::Upload);

        let texts = vec![String::new(); 3];
        let vectors = vec![vec![0.6, 0.8], vec![0.0, 1.0], vec![1.0, 0.0]];
        let set = rank(
            &personas,
            &texts,
            &vectors,
            &[1.0, 0.0],
            &MatchPolicy::default(),
            RankingMode::Unconditional,
        );
        session.install_matches(set);
        session
    }

    #[test]
    fn test_selected_subset_follows_ranked_order() {
        let mut session = matched_session();
        session.select(PersonaId(1)).unwrap();
        session.select(PersonaId(2)).unwrap();

        let names: Vec<&str> = session
            .selected_subset()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn test_toggle_and_deselect() {
        let mut session = matched_session();
        assert!(session.toggle(PersonaId(0)).unwrap());
        assert!(session.is_selected(PersonaId(0)));
        assert!(!session.toggle(PersonaId(0)).unwrap());
        assert!(!session.is_selected(PersonaId(0)));

        session.select_all();
        assert_eq!(session.selected_count(), 3);
        session.deselect(PersonaId(2)).unwrap();
        assert_eq!(session.selected_count(), 2);
        session.clear_selection();
        assert!(session.selected_subset().is_empty());
    }

    #[test]
    fn test_selecting_unmatched_persona_fails() {
        let mut session = Session::new(None);
        assert!(matches!(
            session.select(PersonaId(0)),
            Err(AppError::UnknownPersona(0))
        ));

        let mut session = matched_session();
        assert!(matches!(
            session.toggle(PersonaId(7)),
            Err(AppError::UnknownPersona(7))
        ));
    }

    #[test]
    fn test_topic_change_clears_selection_and_generated_text() {
        let mut session = matched_session();
        session.select_all();
        session.set_strategy_text("strategy".to_string());
        session.set_funnel_text("funnel".to_string());

        assert!(session.set_topic("retirement planning"));

        assert!(session.matches().is_none());
        assert_eq!(session.selected_count(), 0);
        assert!(session.strategy_text().is_none());
        assert!(session.funnel_text().is_none());
    }

    #[test]
    fn test_same_topic_keeps_analysis() {
        let mut session = matched_session();
        session.select_all();
        assert!(!session.set_topic("  budgeting "));
        assert!(session.matches().is_some());
        assert_eq!(session.selected_count(), 3);
    }

    #[test]
    fn test_new_sources_reset_analysis() {
        let mut session = matched_session();
        session.select_all();
        session.load_query_intents(Vec::new());
        assert!(session.matches().is_none());

        let mut session = matched_session();
        session.set_strategy_text("strategy".to_string());
        session.load_personas(vec![persona("d")], PersonaOrigin::Generated);
        assert!(session.matches().is_none());
        assert!(session.strategy_text().is_none());
        assert_eq!(session.persona_origin(), Some(PersonaOrigin::Generated));

        let mut session = matched_session();
        session.clear_query_intents();
        assert!(session.matches().is_none());
    }

    #[test]
    fn test_installing_matches_clears_previous_selection() {
        let mut session = matched_session();
        session.select_all();
        session.set_strategy_text("old".to_string());

        let replacement = session.matches().cloned().unwrap();
        session.install_matches(replacement);

        assert_eq!(session.selected_count(), 0);
        assert!(session.strategy_text().is_none());
        assert_eq!(session.matches().map(|m| m.len()), Some(3));
    }

    #[test]
    fn test_new_strategy_drops_funnel() {
        let mut session = matched_session();
        session.set_strategy_text("first".to_string());
        session.set_funnel_text("funnel".to_string());
        session.set_strategy_text("second".to_string());
        assert_eq!(session.strategy_text(), Some("second"));
        assert!(session.funnel_text().is_none());
    }

    #[test]
    fn test_blank_credential_is_ignored() {
        let mut session = Session::new(Some("  ".to_string()));
        assert!(session.credential().is_none());
        session.set_credential(" key ");
        assert_eq!(session.credential(), Some("key"));
        session.set_credential("");
        assert!(session.credential().is_none());
    }
}
