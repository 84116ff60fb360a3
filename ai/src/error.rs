use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("request to the model service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model service answered {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response from the model service: {0}")]
    Malformed(String),
}
