use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
}
