use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetApiKeyParams {
    /// Generative Language API key used for embedding and generation calls.
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetTopicParams {
    /// Core business topic the content strategy is planned around.
    pub topic: String,
}

/// Where a persona table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PersonaOrigin {
    /// A table maintained by the user (file upload). Matches are thresholded.
    Upload,
    /// Output of the persona generation prompt. Matches are never filtered.
    Generated,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoadPersonasParams {
    /// CSV text with the header
    /// `persona_name,summary,goals,pain_points,keywords,preferred_formats`.
    /// A fenced ```csv block inside a longer reply is extracted automatically.
    pub csv: String,
    /// Origin of the table (default: "upload").
    pub origin: Option<PersonaOrigin>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoadQueryFanOutParams {
    /// CSV text with the header `query,type,user_intent,reasoning`.
    pub csv: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MatchPersonasParams {
    /// Select every matched persona afterwards (default: true).
    pub select_all: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetPersonaSelectionParams {
    /// Persona id as reported by `match_personas` / `list_matches`.
    pub persona_id: usize,
    /// Whether the persona takes part in strategy generation.
    /// Omit to flip the current state.
    pub selected: Option<bool>,
}

/// What the funnel should ultimately get the user to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConversionAction {
    Purchase,
    SubmitForm,
    BookConsultation,
    Subscribe,
    DownloadApp,
}

impl ConversionAction {
    pub fn label(self) -> &'static str {
        match self {
            ConversionAction::Purchase => "Purchase a product",
            ConversionAction::SubmitForm => "Submit a form",
            ConversionAction::BookConsultation => "Book a consultation",
            ConversionAction::Subscribe => "Subscribe to the service",
            ConversionAction::DownloadApp => "Download the app",
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerateFunnelParams {
    /// Product or service name the funnel converts into.
    pub product_name: String,
    /// Desired conversion action.
    pub action: ConversionAction,
    /// Landing URL of the final conversion step.
    pub target_url: String,
    /// Optional short description of the product or service.
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TopicResponse {
    pub topic: String,
    /// True when earlier matches and generated text were discarded.
    pub analysis_reset: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct LoadResponse {
    pub loaded: usize,
    /// Persona names or queries, in table order.
    pub labels: Vec<String>,
    pub analysis_reset: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PersonaMatch {
    pub persona_id: usize,
    pub name: String,
    pub summary: String,
    pub preferred_formats: String,
    /// Cosine similarity between the topic context and the persona, in [-1, 1].
    pub score: f32,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct MatchListResponse {
    pub topic: String,
    /// Which selection rule produced the list.
    pub outcome: String,
    pub pool_size: usize,
    pub matches: Vec<PersonaMatch>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheStatsResponse {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SessionStatusResponse {
    pub api_key_configured: bool,
    pub topic: String,
    pub persona_count: usize,
    pub persona_origin: Option<PersonaOrigin>,
    pub query_intent_count: usize,
    pub match_count: usize,
    pub selected_count: usize,
    pub has_strategy: bool,
    pub has_funnel: bool,
    pub embedding_cache: CacheStatsResponse,
}
