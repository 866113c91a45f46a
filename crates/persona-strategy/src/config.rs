use crate::error::AppError;
use crate::ranker::MatchPolicy;

/// Application configuration loaded explicitly from environment variables.
///
/// The API key is optional at startup; it can be supplied later through the
/// `set_api_key` tool. Gemini endpoint settings are read by
/// `GeminiClientConfig::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Generative Language API key. `None` until the user provides one.
    pub api_key: Option<String>,
    /// Threshold and fallback sizes used when ranking uploaded personas.
    pub policy: MatchPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `GEMINI_API_KEY`: API key for embedding and generation calls
    /// - `MATCH_THRESHOLD`: relevance cut-off in [-1, 1] (default: 0.5)
    /// - `MATCH_MIN_RESULTS`: minimum list size for large pools (default: 10)
    /// - `MATCH_FALLBACK_RESULTS`: list size when nothing is relevant (default: 5)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = MatchPolicy::default();

        let api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());

        let threshold = match lookup("MATCH_THRESHOLD") {
            Some(raw) => raw.trim().parse::<f32>().map_err(|e| {
                AppError::Config(format!("MATCH_THRESHOLD must be a number: {e}"))
            })?,
            None => defaults.threshold,
        };
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "MATCH_THRESHOLD must be within [-1, 1], got {threshold}"
            )));
        }

        let min_results = parse_count(&lookup, "MATCH_MIN_RESULTS", defaults.min_results)?;
        let fallback_results =
            parse_count(&lookup, "MATCH_FALLBACK_RESULTS", defaults.fallback_results)?;
        if fallback_results == 0 {
            return Err(AppError::Config(
                "MATCH_FALLBACK_RESULTS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            policy: MatchPolicy {
                threshold,
                min_results,
                fallback_results,
            },
        })
    }
}

fn parse_count(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
) -> Result<usize, AppError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|e| AppError::Config(format!("{name} must be a non-negative integer: {e}"))),
        None => Ok(default),
    }
}
