/// Error types shared by the persona strategy crates.
///
/// These errors represent failures of the external model services (embedding and
/// generation) and of requests that can never be sent to them. Application-specific
/// errors are defined in the server crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("empty {0} request")]
    EmptyRequest(&'static str),
}
