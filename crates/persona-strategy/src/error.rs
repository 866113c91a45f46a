use persona_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("no API key configured; call set_api_key or set GEMINI_API_KEY")]
    MissingCredential,

    #[error("{kind} CSV is missing columns: {}", columns.join(", "))]
    MissingColumns {
        kind: &'static str,
        columns: Vec<String>,
    },

    #[error("parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("persona {0} is not part of the current matches")]
    UnknownPersona(usize),

    #[error("config error: {0}")]
    Config(String),
}
