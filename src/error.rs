use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{venue} rejected order: {reason}")]
    Rejected { venue: &'static str, reason: String },

    #[error("Invalid order parameters: {0}")]
    InvalidOrder(String),

    #[error("Order not found on venue")]
    OrderNotFound,

    #[error("Order already in a terminal state")]
    AlreadyTerminal,

    #[error("Book invariant violated: {0}")]
    BookInvariant(String),

    #[error("Invalid symbol: {0}")]
    Symbol(String),

    #[error("Stuck position: {0}")]
    Stuck(String),
}

impl Error {
    /// Transport failures are retried; everything else is terminal for the
    /// operation that produced it.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_) | Error::Http(_) | Error::Io(_) | Error::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
