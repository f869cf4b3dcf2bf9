use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("json error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("influxdb {op} failed with {status}: {body}")]
    Store {
        op: &'static str,
        status: StatusCode,
        body: String,
    },
}

impl Error {
    /// Coarse error class, used as a log field and metric attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::Url(_) => "config",
            Error::Io(_) => "io",
            Error::Http(_) => "http",
            Error::Status { .. } => "fetch",
            Error::Parse(_) => "parse",
            Error::Store { .. } => "store",
        }
    }
}
