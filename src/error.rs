use axum::http::StatusCode;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    // pipeline stages - what the caller of SmartChat sees
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to analyze question: {0}")]
    Routing(String),

    #[error("Failed to execute database query: {0}")]
    DataFetch(String),

    #[error("Failed to generate response: {0}")]
    AnswerSynthesis(String),

    #[error("Request cancelled")]
    Cancelled,

    // collaborator transport
    #[error("LLM API error: {0}")]
    Llm(String),

    #[error("No response from the language model")]
    EmptyCompletion,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Missing API key")]
    #[diagnostic(
        code(smartql::missing_api_key),
        help("set OPENAI_API_KEY, or ANTHROPIC_API_KEY with --provider claude")
    )]
    MissingApiKey,

    #[error("Storage credentials not configured")]
    #[diagnostic(
        code(smartql::missing_storage),
        help("set SUPABASE_URL and SUPABASE_API_KEY")
    )]
    MissingStorage,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl Error {
    /// Status code used when the error is reported over http.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Cancelled => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
