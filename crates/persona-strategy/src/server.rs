/// MCP server driving one persona strategy session over stdio.
///
/// The workflow mirrors the dashboard it replaces:
/// 1. `set_api_key`, `set_topic`
/// 2. `load_personas` or `generate_personas` (or `persona_generation_prompt` + paste)
/// 3. optionally `load_query_fan_out` / `generate_query_fan_out`
/// 4. `match_personas`, then adjust with `set_persona_selection`
/// 5. `generate_strategy`, then `generate_funnel`
///
/// The session sits behind one mutex held for the whole tool call, so calls are
/// processed strictly one after another.
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::AppError;
use crate::matcher;
use crate::model::{ConversionGoal, PersonaId, PersonaOrigin};
use crate::parser::{extract_csv_block, parse_personas, parse_query_intents};
use crate::prompt;
use crate::ranker::MatchPolicy;
use crate::session::Session;
use persona_common::embedding::Embedder;
use persona_common::gemini::GeminiClient;
use persona_common::generation::Generator;
use persona_common::mcp_api::{
    CacheStatsResponse, GenerateFunnelParams, LoadPersonasParams, LoadQueryFanOutParams,
    LoadResponse, MatchListResponse, MatchPersonasParams, OkResponse, PersonaMatch,
    SessionStatusResponse, SetApiKeyParams, SetPersonaSelectionParams, SetTopicParams,
    TextResponse, TopicResponse,
};

#[derive(Clone)]
pub struct PersonaStrategyServer {
    session: Arc<Mutex<Session>>,
    embedder: Arc<Embedder<GeminiClient>>,
    generator: Arc<Generator<GeminiClient>>,
    policy: MatchPolicy,
    tool_router: ToolRouter<PersonaStrategyServer>,
}

impl PersonaStrategyServer {
    pub fn new(
        session: Session,
        embedder: Arc<Embedder<GeminiClient>>,
        generator: Arc<Generator<GeminiClient>>,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            embedder,
            generator,
            policy,
            tool_router: Self::tool_router(),
        }
    }

    async fn generate(&self, session: &Session, prompt: &str) -> Result<String, AppError> {
        let credential = session.credential().ok_or(AppError::MissingCredential)?;
        let text = self.generator.generate(prompt, credential).await?;
        Ok(text.to_string())
    }
}

fn require_topic(session: &Session) -> Result<String, AppError> {
    let topic = session.topic();
    if topic.is_empty() {
        return Err(AppError::MissingInput(
            "topic must not be empty; call set_topic first".to_string(),
        ));
    }
    Ok(topic.to_string())
}

fn to_match_list(session: &Session) -> Result<MatchListResponse, AppError> {
    let matches = session
        .matches()
        .ok_or_else(|| AppError::NotReady("no matches yet; call match_personas".to_string()))?;

    Ok(MatchListResponse {
        topic: session.topic().to_string(),
        outcome: matches.outcome().as_str().to_string(),
        pool_size: matches.pool_size(),
        matches: matches
            .entries()
            .iter()
            .map(|e| PersonaMatch {
                persona_id: e.id.0,
                name: e.persona.name.clone(),
                summary: e.persona.summary.clone(),
                preferred_formats: e.persona.preferred_formats.clone(),
                score: e.score,
                selected: session.is_selected(e.id),
            })
            .collect(),
    })
}

#[tool_router]
impl PersonaStrategyServer {
    #[tool(description = "Set the Generative Language API key used for embeddings and generation in this session.")]
    async fn set_api_key(
        &self,
        Parameters(params): Parameters<SetApiKeyParams>,
    ) -> Result<Json<OkResponse>, String> {
        if params.api_key.trim().is_empty() {
            return Err("api_key must not be empty".to_string());
        }
        let mut session = self.session.lock().await;
        session.set_credential(&params.api_key);
        info!("api key configured");
        Ok(Json(OkResponse { ok: true }))
    }

    #[tool(description = "Set the core topic. Changing it discards existing matches, selections and generated text.")]
    async fn set_topic(
        &self,
        Parameters(params): Parameters<SetTopicParams>,
    ) -> Result<Json<TopicResponse>, String> {
        let topic = params.topic.trim().to_string();
        if topic.is_empty() {
            return Err("topic must not be empty".to_string());
        }
        let mut session = self.session.lock().await;
        let analysis_reset = session.set_topic(&topic);
        info!(topic = %topic, analysis_reset, "topic set");
        Ok(Json(TopicResponse {
            topic,
            analysis_reset,
        }))
    }

    #[tool(description = "Return a prompt that asks a language model for 3-5 personas as CSV. Paste the model's reply into load_personas with origin 'generated'.")]
    async fn persona_generation_prompt(&self) -> Result<Json<TextResponse>, String> {
        let session = self.session.lock().await;
        let topic = require_topic(&session).map_err(|e| e.to_string())?;
        Ok(Json(TextResponse {
            text: prompt::persona_generation_prompt(&topic),
        }))
    }

    #[tool(description = "Load a persona table from CSV text (columns: persona_name, summary, goals, pain_points, keywords, preferred_formats). Replaces the current pool and resets the analysis.")]
    async fn load_personas(
        &self,
        Parameters(params): Parameters<LoadPersonasParams>,
    ) -> Result<Json<LoadResponse>, String> {
        let origin = params.origin.unwrap_or(PersonaOrigin::Upload);
        let personas = parse_personas(extract_csv_block(&params.csv))
            .map_err(|e| format!("loading personas failed: {e}"))?;
        let labels = personas.iter().map(|p| p.name.clone()).collect();

        let mut session = self.session.lock().await;
        session.load_personas(personas, origin);
        Ok(Json(LoadResponse {
            loaded: session.personas().len(),
            labels,
            analysis_reset: true,
        }))
    }

    #[tool(description = "Generate 3-5 personas for the current topic with the language model and load them. Generated personas are never filtered by relevance.")]
    async fn generate_personas(&self) -> Result<Json<LoadResponse>, String> {
        let mut session = self.session.lock().await;
        let topic = require_topic(&session).map_err(|e| e.to_string())?;

        let reply = self
            .generate(&session, &prompt::persona_generation_prompt(&topic))
            .await
            .map_err(|e| format!("persona generation failed: {e}"))?;
        let personas = parse_personas(extract_csv_block(&reply))
            .map_err(|e| format!("generated persona CSV could not be parsed: {e}"))?;
        let labels = personas.iter().map(|p| p.name.clone()).collect();

        session.load_personas(personas, PersonaOrigin::Generated);
        Ok(Json(LoadResponse {
            loaded: session.personas().len(),
            labels,
            analysis_reset: true,
        }))
    }

    #[tool(description = "Load query fan-out data from CSV text (columns: query, type, user_intent, reasoning). Used to enrich matching and strategy prompts.")]
    async fn load_query_fan_out(
        &self,
        Parameters(params): Parameters<LoadQueryFanOutParams>,
    ) -> Result<Json<LoadResponse>, String> {
        let intents = parse_query_intents(extract_csv_block(&params.csv))
            .map_err(|e| format!("loading query fan-out failed: {e}"))?;
        let labels = intents.iter().map(|i| i.query.clone()).collect();

        let mut session = self.session.lock().await;
        session.load_query_intents(intents);
        Ok(Json(LoadResponse {
            loaded: session.query_intents().len(),
            labels,
            analysis_reset: true,
        }))
    }

    #[tool(description = "Generate query fan-out data for the current topic with the language model and load it.")]
    async fn generate_query_fan_out(&self) -> Result<Json<LoadResponse>, String> {
        let mut session = self.session.lock().await;
        let topic = require_topic(&session).map_err(|e| e.to_string())?;

        let reply = self
            .generate(&session, &prompt::query_fan_out_prompt(&topic))
            .await
            .map_err(|e| format!("query fan-out generation failed: {e}"))?;
        let intents = parse_query_intents(extract_csv_block(&reply))
            .map_err(|e| format!("generated query fan-out CSV could not be parsed: {e}"))?;
        let labels = intents.iter().map(|i| i.query.clone()).collect();

        session.load_query_intents(intents);
        Ok(Json(LoadResponse {
            loaded: session.query_intents().len(),
            labels,
            analysis_reset: true,
        }))
    }

    #[tool(description = "Remove the query fan-out data. Resets the analysis.")]
    async fn clear_query_fan_out(&self) -> Result<Json<OkResponse>, String> {
        let mut session = self.session.lock().await;
        session.clear_query_intents();
        Ok(Json(OkResponse { ok: true }))
    }

    #[tool(description = "Rank the loaded personas by semantic relevance to the topic (and query fan-out, if loaded). Replaces earlier matches; all matches are selected unless select_all is false.")]
    async fn match_personas(
        &self,
        Parameters(params): Parameters<MatchPersonasParams>,
    ) -> Result<Json<MatchListResponse>, String> {
        let mut session = self.session.lock().await;
        matcher::match_personas(&mut session, &self.embedder, &self.policy)
            .await
            .map_err(|e| format!("matching failed: {e}"))?;

        if params.select_all.unwrap_or(true) {
            session.select_all();
        }
        to_match_list(&session).map(Json).map_err(|e| e.to_string())
    }

    #[tool(description = "List the current matches with their scores and selection state.")]
    async fn list_matches(&self) -> Result<Json<MatchListResponse>, String> {
        let session = self.session.lock().await;
        to_match_list(&session).map(Json).map_err(|e| e.to_string())
    }

    #[tool(description = "Select or deselect one matched persona for strategy generation. Omitting selected flips it.")]
    async fn set_persona_selection(
        &self,
        Parameters(params): Parameters<SetPersonaSelectionParams>,
    ) -> Result<Json<MatchListResponse>, String> {
        let mut session = self.session.lock().await;
        let id = PersonaId(params.persona_id);
        let result = match params.selected {
            Some(true) => session.select(id),
            Some(false) => session.deselect(id),
            None => session.toggle(id).map(|_| ()),
        };
        result.map_err(|e| e.to_string())?;
        to_match_list(&session).map(Json).map_err(|e| e.to_string())
    }

    #[tool(description = "Select every matched persona.")]
    async fn select_all_personas(&self) -> Result<Json<MatchListResponse>, String> {
        let mut session = self.session.lock().await;
        session.select_all();
        to_match_list(&session).map(Json).map_err(|e| e.to_string())
    }

    #[tool(description = "Deselect every matched persona.")]
    async fn clear_persona_selection(&self) -> Result<Json<MatchListResponse>, String> {
        let mut session = self.session.lock().await;
        session.clear_selection();
        to_match_list(&session).map(Json).map_err(|e| e.to_string())
    }

    #[tool(description = "Generate a content strategy for the selected personas. Replaces any earlier strategy and funnel.")]
    async fn generate_strategy(&self) -> Result<Json<TextResponse>, String> {
        let mut session = self.session.lock().await;
        if session.matches().is_none() {
            return Err(AppError::NotReady("no matches yet; call match_personas".to_string()).to_string());
        }
        let selected = session.selected_subset();
        if selected.is_empty() {
            return Err(AppError::NotReady("select at least one persona".to_string()).to_string());
        }
        let prompt = prompt::strategy_prompt(session.topic(), &selected, session.query_intents());

        let text = self
            .generate(&session, &prompt)
            .await
            .map_err(|e| format!("strategy generation failed: {e}"))?;
        session.set_strategy_text(text.clone());
        info!(chars = text.len(), "strategy generated");
        Ok(Json(TextResponse { text }))
    }

    #[tool(description = "Turn the current strategy into an integrated marketing funnel aimed at a conversion goal.")]
    async fn generate_funnel(
        &self,
        Parameters(params): Parameters<GenerateFunnelParams>,
    ) -> Result<Json<TextResponse>, String> {
        let product_name = params.product_name.trim().to_string();
        let target_url = params.target_url.trim().to_string();
        if product_name.is_empty() || target_url.is_empty() {
            return Err(AppError::MissingInput(
                "product_name and target_url are required".to_string(),
            )
            .to_string());
        }
        let goal = ConversionGoal {
            product_name,
            action: params.action,
            target_url,
            description: params.description,
        };

        let mut session = self.session.lock().await;
        let strategy = session
            .strategy_text()
            .ok_or_else(|| {
                AppError::NotReady("no strategy yet; call generate_strategy".to_string()).to_string()
            })?;
        let prompt = prompt::funnel_prompt(session.topic(), strategy, &goal, session.query_intents());

        let text = self
            .generate(&session, &prompt)
            .await
            .map_err(|e| format!("funnel generation failed: {e}"))?;
        session.set_funnel_text(text.clone());
        info!(chars = text.len(), "funnel generated");
        Ok(Json(TextResponse { text }))
    }

    #[tool(description = "Summarize the session: configured inputs, matches, selection, generated text and embedding cache usage.")]
    async fn session_status(&self) -> Result<Json<SessionStatusResponse>, String> {
        let stats = self.embedder.cache_stats().await;
        let session = self.session.lock().await;
        Ok(Json(SessionStatusResponse {
            api_key_configured: session.credential().is_some(),
            topic: session.topic().to_string(),
            persona_count: session.personas().len(),
            persona_origin: session.persona_origin(),
            query_intent_count: session.query_intents().len(),
            match_count: session.matches().map(|m| m.len()).unwrap_or(0),
            selected_count: session.selected_count(),
            has_strategy: session.strategy_text().is_some(),
            has_funnel: session.funnel_text().is_some(),
            embedding_cache: CacheStatsResponse {
                entries: stats.entries,
                hits: stats.hits,
                misses: stats.misses,
            },
        }))
    }
}

#[tool_handler]
impl ServerHandler for PersonaStrategyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "persona-strategy".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Persona strategy MCP server. Set an API key and a topic, load or generate \
personas (and optionally query fan-out data), then call match_personas to rank personas by \
semantic relevance. Adjust the selection with set_persona_selection, then call \
generate_strategy and generate_funnel. session_status summarizes the session."
                    .to_string(),
            ),
        }
    }
}
