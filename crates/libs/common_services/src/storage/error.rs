use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to build object URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Object store returned an error: {0}")]
    RemoteServerError(String),
}
