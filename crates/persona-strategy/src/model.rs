use serde::{Deserialize, Serialize};

pub use persona_common::mcp_api::{ConversionAction, PersonaOrigin};

/// A target-audience profile loaded from a persona table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaRecord {
    /// Display name (`persona_name` column). Not guaranteed unique.
    pub name: String,
    pub summary: String,
    pub goals: String,
    pub pain_points: String,
    /// Comma-separated search keywords.
    pub keywords: String,
    /// Comma-separated content formats, e.g. "short video, podcast".
    pub preferred_formats: String,
}

/// One row of a query fan-out table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryIntentRecord {
    pub query: String,
    /// Query type, e.g. "Question" or "Commercial" (`type` column).
    pub kind: String,
    pub user_intent: String,
    pub reasoning: String,
}

/// Row index of a persona in the loaded pool. Names can repeat, indices cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonaId(pub usize);

impl std::fmt::Display for PersonaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversion target for the funnel prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionGoal {
    pub product_name: String,
    pub action: ConversionAction,
    pub target_url: String,
    pub description: Option<String>,
}
